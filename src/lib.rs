pub mod api;
pub mod core;
pub mod error;
pub mod report;

pub use error::{Error, Result};
