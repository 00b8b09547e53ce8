//! Lifecycle callback registration and lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::TransitionContext;
use crate::error::CallbackError;
use crate::name::{EventName, StateName};

/// Result returned by every callback handler.
pub type HookResult = Result<(), CallbackError>;

/// A registered callback handler.
pub type Handler = Arc<dyn Fn(&mut TransitionContext) -> HookResult + Send + Sync>;

/// The lifecycle point a callback attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Runs before the state commits; the last chance to veto.
    Before,
    /// Runs right after commit, reflecting the state just left.
    Exit,
    /// Runs for the transition itself, between exit and enter.
    Transition,
    /// Runs reflecting the state just entered.
    Enter,
    /// Runs last, once every other phase finished.
    After,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Before => "before",
            Self::Exit => "exit",
            Self::Transition => "transition",
            Self::Enter => "enter",
            Self::After => "after",
        })
    }
}

/// What a callback is keyed to.
///
/// `Before`, `After`, and `Transition` hooks target events; `Enter` and
/// `Exit` hooks target states. `Any` is valid for every kind and fires in
/// addition to name-specific hooks, never instead of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookTarget {
    /// Matches every transition.
    Any,
    /// A specific event.
    Event(EventName),
    /// A specific state.
    State(StateName),
}

impl fmt::Display for HookTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Event(event) => write!(f, "event `{event}`"),
            Self::State(state) => write!(f, "state `{state}`"),
        }
    }
}

/// All handlers registered on a definition, keyed by `(kind, target)`.
///
/// Handlers sharing a key run in registration order.
#[derive(Clone, Default)]
pub(crate) struct HookRegistry {
    entries: HashMap<(HookKind, HookTarget), Vec<Handler>>,
}

impl HookRegistry {
    pub(crate) fn register(&mut self, kind: HookKind, target: HookTarget, handler: Handler) {
        self.entries.entry((kind, target)).or_default().push(handler);
    }

    pub(crate) fn select(&self, kind: HookKind, target: &HookTarget) -> &[Handler] {
        self.entries
            .get(&(kind, target.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .map(|((kind, target), handlers)| format!("{kind}/{target} x{}", handlers.len()))
            .collect();
        keys.sort();
        f.debug_struct("HookRegistry").field("entries", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handlers_run_in_registration_order() {
        let mut registry = HookRegistry::default();
        let target = HookTarget::Event(EventName::from("go"));
        registry.register(HookKind::Before, target.clone(), Arc::new(|_| Ok(())));
        registry.register(HookKind::Before, target.clone(), Arc::new(|_| Ok(())));

        assert_eq!(registry.select(HookKind::Before, &target).len(), 2);
        assert!(registry.select(HookKind::After, &target).is_empty());
    }

    #[test]
    fn any_target_is_a_distinct_key() {
        let mut registry = HookRegistry::default();
        registry.register(HookKind::Enter, HookTarget::Any, Arc::new(|_| Ok(())));

        let named = HookTarget::State(StateName::from("green"));
        assert!(registry.select(HookKind::Enter, &named).is_empty());
        assert_eq!(registry.select(HookKind::Enter, &HookTarget::Any).len(), 1);
    }
}
