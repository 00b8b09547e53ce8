//! Per-transition context shared with callback handlers.

use serde_json::Value;

use crate::name::{EventName, StateName};

/// Context of one in-flight transition.
///
/// A fresh context is created for every fired event and passed `&mut` to
/// each handler in the pipeline, so a handler can observe the transition and
/// veto it before the state commits.
///
/// # Example
///
/// ```rust
/// use tokio_machine::{Definition, Rule};
///
/// let definition = Definition::builder()
///     .rule(Rule::on("deliver").from("packed").to("shipped"))
///     .before("deliver", |ctx| {
///         if ctx.args().is_empty() {
///             ctx.cancel(); // no address, no delivery
///         }
///         Ok(())
///     })
///     .build()
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct TransitionContext {
    event: EventName,
    from: StateName,
    to: StateName,
    args: Vec<Value>,
    cancelled: bool,
}

impl TransitionContext {
    pub(crate) fn new(event: EventName, from: StateName, to: StateName, args: Vec<Value>) -> Self {
        Self {
            event,
            from,
            to,
            args,
            cancelled: false,
        }
    }

    /// The fired event.
    #[must_use]
    pub fn event(&self) -> &EventName {
        &self.event
    }

    /// The state the machine is transitioning out of.
    #[must_use]
    pub fn from(&self) -> &StateName {
        &self.from
    }

    /// The state the machine is transitioning into.
    #[must_use]
    pub fn to(&self) -> &StateName {
        &self.to
    }

    /// Arguments passed to the firing call, if any.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Veto the transition.
    ///
    /// Honoured in the `before` phase: the pipeline stops and the state is
    /// left untouched. After the state has committed, cancelling only
    /// suppresses the remaining observer hooks.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Whether a handler has cancelled this transition.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
