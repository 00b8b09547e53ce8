//! The ordered callback pipeline surrounding each transition.

use crate::context::TransitionContext;
use crate::definition::Definition;
use crate::error::CallbackError;
use crate::hooks::{HookKind, HookRegistry, HookTarget};
use crate::name::StateName;

/// Outcome of one fired event.
///
/// These are ordinary results, not errors: callers branch on them without
/// any unwinding machinery. Call-level failures (undeclared event, dead
/// queue) are reported separately as [`FireError`](crate::FireError).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    /// The transition ran to completion and the state moved.
    Succeeded {
        /// State before the transition.
        from: StateName,
        /// State after the transition.
        to: StateName,
    },
    /// A `before` hook vetoed the transition; the state is unchanged.
    Cancelled,
    /// The event is declared but no rule matches the current state; the
    /// state is unchanged.
    NoTransition,
    /// A handler failed. Phases already committed stand; the remaining
    /// phases were skipped.
    Failed(CallbackError),
}

impl FireOutcome {
    /// Whether the transition committed.
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Run the full pipeline for an already-resolved transition, committing
/// `current` between the before and exit phases.
pub(crate) fn run(
    definition: &Definition,
    current: &mut StateName,
    mut ctx: TransitionContext,
) -> FireOutcome {
    let hooks = definition.hooks();
    let any = HookTarget::Any;
    let event_target = HookTarget::Event(ctx.event().clone());
    let from_target = HookTarget::State(ctx.from().clone());
    let to_target = HookTarget::State(ctx.to().clone());

    tracing::trace!(event = %ctx.event(), from = %ctx.from(), to = %ctx.to(), "transition attempted");

    for target in [&event_target, &any] {
        if let Err(err) = run_hooks(hooks, HookKind::Before, target, &mut ctx) {
            tracing::warn!(event = %ctx.event(), from = %ctx.from(), %err, "before hook failed");
            return FireOutcome::Failed(err);
        }
        if ctx.is_cancelled() {
            tracing::debug!(event = %ctx.event(), from = %ctx.from(), "transition cancelled");
            return FireOutcome::Cancelled;
        }
    }

    *current = ctx.to().clone();

    let observer_phases = [
        (HookKind::Exit, &from_target),
        (HookKind::Exit, &any),
        (HookKind::Transition, &any),
        (HookKind::Transition, &event_target),
        (HookKind::Enter, &to_target),
        (HookKind::Enter, &any),
        (HookKind::After, &event_target),
        (HookKind::After, &any),
    ];
    for (kind, target) in observer_phases {
        if let Err(err) = run_hooks(hooks, kind, target, &mut ctx) {
            tracing::warn!(
                event = %ctx.event(),
                from = %ctx.from(),
                to = %ctx.to(),
                %err,
                "transition failed after commit"
            );
            return FireOutcome::Failed(err);
        }
        if ctx.is_cancelled() {
            // The state is already committed; only the remaining observers
            // are suppressed.
            break;
        }
    }

    tracing::debug!(event = %ctx.event(), from = %ctx.from(), to = %ctx.to(), "transition succeeded");
    FireOutcome::Succeeded {
        from: ctx.from().clone(),
        to: ctx.to().clone(),
    }
}

fn run_hooks(
    hooks: &HookRegistry,
    kind: HookKind,
    target: &HookTarget,
    ctx: &mut TransitionContext,
) -> Result<(), CallbackError> {
    for handler in hooks.select(kind, target) {
        handler(ctx)?;
        if ctx.is_cancelled() {
            break;
        }
    }
    Ok(())
}
