//! Text-generation provider interface.
//!
//! Providers are async and pluggable: a real HTTP backend, a local-model
//! placeholder, and a deterministic mock. Calls from the engine go through a
//! [`RequestQueue`], which serializes them and enforces rate-limit spacing.

mod providers;
mod queue;
mod retry;
mod types;

pub use providers::*;
pub use queue::*;
pub use retry::*;
pub use types::*;
