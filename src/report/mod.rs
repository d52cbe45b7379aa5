mod coercion;
mod dispatcher;
mod engine;
mod error;
mod parameters;
mod shaper;
mod types;

pub use coercion::*;
pub use dispatcher::*;
pub use engine::*;
pub use error::*;
pub use parameters::*;
pub use shaper::*;
pub use types::*;

#[cfg(test)]
mod report_tests;
