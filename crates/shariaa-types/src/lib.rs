//! Shared types for the Shariaa contract-review session core.

mod api;
mod file;
mod interaction;
mod session;
mod stats;
mod term;

pub use api::*;
pub use file::*;
pub use interaction::*;
pub use session::*;
pub use stats::*;
pub use term::*;
