//! Error types for definition building, machine construction, and firing.

use thiserror::Error;

use crate::hooks::{HookKind, HookTarget};
use crate::name::{EventName, StateName};

/// Errors detected while building a [`Definition`](crate::Definition).
///
/// Build-time errors fail fast: a definition that carries any of these can
/// never back a running machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// An event was declared but no transition rule references it.
    #[error("event `{0}` is declared but has no transition rules")]
    NotEnoughTransitions(EventName),

    /// A declaration collides with an earlier one.
    #[error("{0} is already defined")]
    AlreadyDefined(String),

    /// A declaration references a state no transition rule resolves.
    #[error("state `{0}` is not declared by any transition rule")]
    InvalidState(StateName),

    /// A callback registration references an unknown hook kind/target
    /// combination or an undeclared event or state.
    #[error("invalid callback name: no `{kind}` hook for {target}")]
    InvalidCallbackName {
        /// The hook kind that was registered.
        kind: HookKind,
        /// The rejected target.
        target: HookTarget,
    },
}

/// Errors detected while spawning a machine from a valid definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnError {
    /// An initial transition is declared but its target state was supplied
    /// neither by the definition nor by the caller.
    #[error("an initial transition is declared but no initial state was supplied")]
    MissingInitialState,

    /// The supplied initial state is not declared by any transition rule.
    #[error("state `{0}` is not declared by any transition rule")]
    InvalidState(StateName),
}

/// Per-call failures of the firing APIs.
///
/// These are errors about the *call*, not transition outcomes: a legal call
/// whose event has no rule from the current state yields
/// [`FireOutcome::NoTransition`](crate::FireOutcome::NoTransition) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FireError {
    /// The fired event name is not declared by the machine's definition.
    #[error("event `{0}` is not declared by this machine")]
    InvalidEvent(EventName),

    /// The waited-for state is not declared by the machine's definition.
    #[error("state `{0}` is not declared by this machine")]
    InvalidState(StateName),

    /// The machine was terminated; the event queue accepts nothing further.
    #[error("the event queue is dead")]
    QueueDead,

    /// The event queue is at capacity (non-blocking enqueue only).
    #[error("the event queue is full")]
    QueueFull,
}

/// Failure signalled by a callback handler.
///
/// A handler failure aborts the remaining pipeline phases. If the state
/// mutation had already committed, it stands; the pipeline is not
/// transactional.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
}

impl CallbackError {
    /// A callback failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for CallbackError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
