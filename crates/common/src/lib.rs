pub mod config;
pub mod error;
pub mod exchange;
pub mod types;

pub use config::{Config, LogFormat};
pub use error::{Error, ErrorKind, Result};
pub use exchange::{OrderGateway, PriceFeed};
pub use types::*;
