pub mod connection;
pub mod runner;

pub use connection::*;
pub use runner::*;
