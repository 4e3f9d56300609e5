//! Session context - win flag and the external collaborators the crowd calls into.
//!
//! Everything the crowd needs from the outside world is a fire-and-forget
//! callback: audio cues, the game-over arbiter, and the render/collision
//! sink keyed by agent handle. They are passed in once at construction
//! instead of looked up at runtime.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use crate::components::Transform;

/// Sound cues the crowd asks the audio layer to play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cue {
    Jump,
    Damage,
    GateMultiply,
}

/// Receives audio cues. No acknowledgment is expected.
pub trait CueSink {
    fn play(&mut self, cue: Cue);
}

/// Decides what happens when the crowd runs out.
pub trait GameOverArbiter {
    /// The crowd reached zero outside a win sequence. Called once per
    /// transition into zero.
    fn population_depleted(&mut self);

    /// The finish-line drain emptied the crowd and its hold elapsed.
    fn finish_sequence_complete(&mut self) {}
}

/// Render/collision side of each agent, keyed by the same handle.
pub trait AgentSink {
    fn spawned(&mut self, _agent: Entity, _transform: &Transform) {}
    fn set_active(&mut self, _agent: Entity, _active: bool) {}
    /// Agent went back to the pool
    fn released(&mut self, _agent: Entity) {}
    /// Agent was destroyed for good
    fn destroyed(&mut self, _agent: Entity) {}
}

/// Collaborator that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl CueSink for NullSink {
    fn play(&mut self, _cue: Cue) {}
}

impl GameOverArbiter for NullSink {
    fn population_depleted(&mut self) {}
}

impl AgentSink for NullSink {}

/// Per-session state shared by every crowd component
pub struct SessionContext {
    winning: bool,
    pub(crate) cues: Box<dyn CueSink>,
    pub(crate) arbiter: Box<dyn GameOverArbiter>,
    pub(crate) agents: Box<dyn AgentSink>,
}

impl SessionContext {
    pub fn new(
        cues: Box<dyn CueSink>,
        arbiter: Box<dyn GameOverArbiter>,
        agents: Box<dyn AgentSink>,
    ) -> Self {
        Self {
            winning: false,
            cues,
            arbiter,
            agents,
        }
    }

    /// Context with no collaborators attached
    pub fn headless() -> Self {
        Self::new(Box::new(NullSink), Box::new(NullSink), Box::new(NullSink))
    }

    pub fn with_cues(mut self, cues: Box<dyn CueSink>) -> Self {
        self.cues = cues;
        self
    }

    pub fn with_arbiter(mut self, arbiter: Box<dyn GameOverArbiter>) -> Self {
        self.arbiter = arbiter;
        self
    }

    pub fn with_agents(mut self, agents: Box<dyn AgentSink>) -> Self {
        self.agents = agents;
        self
    }

    /// True from the moment the finish line is reached until the next session
    pub fn is_winning(&self) -> bool {
        self.winning
    }

    /// Only the finish-line trigger and the session reset write this
    pub(crate) fn set_winning(&mut self, winning: bool) {
        self.winning = winning;
    }

    pub fn play(&mut self, cue: Cue) {
        self.cues.play(cue);
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::headless()
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("winning", &self.winning)
            .finish_non_exhaustive()
    }
}
