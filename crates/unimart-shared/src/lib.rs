//! Domain records, rules and helpers shared by every UniMart crate.

pub mod constants;
pub mod error;
pub mod paths;
pub mod search;
pub mod time;
pub mod types;
pub mod validation;

pub use error::{Categorize, ErrorCategory, ValidationError};
pub use types::*;
