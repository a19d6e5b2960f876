//! # Sandbox Rules
//!
//! The world data model for the tavern sandbox - agents, actions, and the
//! game state aggregate. This crate is the single source of truth for state
//! shape and does not contain any simulation logic.

pub mod actions;
pub mod entities;
pub mod error;
pub mod mechanics;
pub mod world_state;

pub use actions::*;
pub use entities::*;
pub use error::*;
pub use mechanics::*;
pub use world_state::*;
