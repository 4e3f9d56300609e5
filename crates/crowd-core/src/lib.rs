//! Crowd Core - crowd formation and population simulation
//!
//! A lane runner drags a crowd of followers through gates, hazards and a
//! finish line. This crate keeps that crowd: who is in it, where each member
//! stands in the grid behind the leader, and how every gate or hazard
//! resizes it.
//!
//! # Architecture
//!
//! Agents live in a `hecs` world owned by the [`store::PopulationStore`]:
//! - **Entities**: crowd members, live or pooled
//! - **Components**: pure data (`Transform`, `Vertical`, `Member`, `Falling`, ...)
//! - **Systems**: formation layout, jump arcs, falling agents
//!
//! Everything outside the crowd (renderer, audio, game-over handling) is a
//! collaborator passed in through [`session::SessionContext`].
//!
//! # Example
//!
//! ```rust,no_run
//! use crowd_core::prelude::*;
//!
//! let mut engine = CrowdEngine::headless();
//! engine.begin_session();
//!
//! let mut gate = Gate::new(GateOp::Multiply, 2.0);
//! engine.pass_gate(&mut gate);
//!
//! loop {
//!     engine.tick(1.0 / 60.0, Pose::default()); // 60 FPS
//! }
//! ```

pub mod components;
pub mod engine;
pub mod error;
pub mod finish;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod systems;
pub mod triggers;

pub use error::{load_config, InitError};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::{CrowdEngine, CrowdSnapshot};
    pub use crate::error::{load_config, InitError};
    pub use crate::protocol::{ChangeOutcome, PopulationChange};
    pub use crate::session::{AgentSink, Cue, CueSink, GameOverArbiter, NullSink, SessionContext};
    pub use crate::triggers::{
        DamageMode, DestructibleWall, Gate, GatePair, GateProofing, GateSide, HazardKind, MutantHorde, Obstacle,
    };
    pub use crowd_logic::config::{AgentTemplate, CrowdConfig};
    pub use crowd_logic::gates::GateOp;
    pub use crowd_logic::lod::LayoutMode;
}
