pub mod catalog;
pub mod config;
pub mod credential_store;
pub mod logging;

pub use catalog::*;
pub use config::*;
pub use logging::*;
