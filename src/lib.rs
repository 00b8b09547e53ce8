//! # tokio-machine
//!
//! Runtime-defined Tokio async finite state machines with guarded
//! transitions, lifecycle callbacks, and serialized event processing.
//!
//! A [`Definition`] declares states, events, transition rules, and
//! callbacks; [`StateMachine::spawn`] turns it into a worker task that
//! processes fired events strictly one at a time. Any number of tasks and
//! threads may fire events through clones of the returned [`MachineHandle`]
//! — the machine's state is only ever touched by its own worker, so callers
//! never hold a lock.
//!
//! ## Example
//!
//! ```rust
//! use tokio_machine::{Definition, Rule, StateMachine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let definition = Definition::builder()
//!     .initial("green")
//!     .rule(Rule::on("slow").from("green").to("yellow"))
//!     .rule(Rule::on("stop").from("yellow").to("red"))
//!     .rule(Rule::on("ready").from("red").to("yellow"))
//!     .rule(Rule::on("go").from("yellow").to("green"))
//!     .on_enter("red", |ctx| {
//!         println!("stopped after {}", ctx.event());
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let (machine, _task) = StateMachine::spawn(definition)?;
//! assert_eq!(machine.current_state(), "green");
//!
//! let outcome = machine.fire("slow").await?;
//! assert!(outcome.is_succeeded());
//! assert_eq!(machine.current_state(), "yellow");
//!
//! assert!(machine.can_fire("stop"));
//! assert!(!machine.can_fire("slow"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Firing modes
//!
//! [`MachineHandle::fire`] waits for the queued event's own outcome;
//! [`MachineHandle::fire_async`] returns at enqueue time and leaves the
//! outcome to callback side effects. Both modes share one FIFO queue, so
//! events are processed in admission order regardless of how they were
//! fired.
//!
//! ## Observability
//!
//! The engine emits transition lifecycle events (attempted, succeeded,
//! cancelled, failed, no-transition) through [`tracing`]; install any
//! subscriber to consume them.

mod context;
mod definition;
mod error;
mod hooks;
mod machine;
mod name;
mod pipeline;
mod resolver;

pub use context::TransitionContext;
pub use definition::{
    Definition, DefinitionBuilder, EventMatch, InitialState, Rule, StateMatch, Target,
    TransitionRule,
};
pub use error::{CallbackError, DefinitionError, FireError, SpawnError};
pub use hooks::{Handler, HookKind, HookResult, HookTarget};
pub use machine::{MachineHandle, MachineTask, SpawnOptions, StateMachine, DEFAULT_QUEUE_CAPACITY};
pub use name::{EventName, StateName, ANY_EVENT, ANY_STATE, INIT_EVENT, NONE_STATE};
pub use pipeline::FireOutcome;
