pub mod cdn;
pub mod deployer;
pub mod errors;
pub mod http_request;
pub mod retry;
pub mod signature;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
