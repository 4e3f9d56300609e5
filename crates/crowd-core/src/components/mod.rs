//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to agent entities.
//! Behavior lives in systems and in the population store.

mod agent;
mod common;

pub use agent::*;
pub use common::*;
