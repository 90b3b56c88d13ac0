//! API request handlers

mod health;
mod incidents;
mod public;
mod stats;

pub use health::*;
pub use incidents::*;
pub use public::*;
pub use stats::*;
