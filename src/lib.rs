pub mod api;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod pricing;

pub use config::Config;
pub use datasource::{LedgerSource, NavSource, PriceSource};
pub use error::AppError;
