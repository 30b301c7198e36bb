pub mod config;
pub mod engine;
pub mod error;
pub mod jurisdiction;
pub mod policy;
pub mod request;
pub mod residence;
pub mod service;
pub mod store;
pub mod utils;
pub mod visibility;

pub use error::{TransferError, ValidationError};
pub use service::TransferService;
