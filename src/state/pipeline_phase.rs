//! Pipeline lifecycle phases
//!
//! `Idle -> Started -> Running -> (Draining ->) Finished`. A pipeline is
//! single-use: `Finished` is terminal and there is no way back to `Idle`.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Represents where a pipeline is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelinePhase {
    /// Constructed, `start()` not yet called
    Idle,

    /// Seed submitted, dispatcher spawned but not yet consuming
    Started,

    /// Dispatcher is consuming results and scheduling new work
    Running,

    /// Stopped: no new submissions, in-flight work still drains
    Draining,

    /// Dispatcher exited
    Finished,
}

impl PipelinePhase {
    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: PipelinePhase) -> bool {
        use PipelinePhase::*;
        matches!(
            (self, next),
            (Idle, Started)
                | (Started, Running)
                | (Started, Draining)
                | (Started, Finished)
                | (Running, Draining)
                | (Running, Finished)
                | (Draining, Finished)
        )
    }

    /// Returns true once `start()` has been called
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started | Self::Running | Self::Draining)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Finished => "finished",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Started => 1,
            Self::Running => 2,
            Self::Draining => 3,
            Self::Finished => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Started,
            2 => Self::Running,
            3 => Self::Draining,
            _ => Self::Finished,
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Phase shared between the pipeline handle and its dispatcher task
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl Default for PhaseCell {
    fn default() -> Self {
        Self(AtomicU8::new(PipelinePhase::Idle.to_u8()))
    }
}

impl PhaseCell {
    pub fn get(&self) -> PipelinePhase {
        PipelinePhase::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Moves to `next` if the transition is legal; returns whether it moved
    pub fn advance(&self, next: PipelinePhase) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                PipelinePhase::from_u8(current)
                    .can_transition_to(next)
                    .then_some(next.to_u8())
            })
            .is_ok()
    }
}
