//! Pure transition resolution against a definition.

use crate::definition::{Definition, EventMatch, StateMatch, Target, TransitionRule};
use crate::name::{EventName, StateName};

/// A rule match with its target resolved relative to the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedTransition {
    pub(crate) from: StateName,
    pub(crate) to: StateName,
}

/// Find the transition `event` triggers from `current`, if any.
///
/// Matching order: an exact `(event, current)` rule wins; a wildcard-from
/// rule for the same event is the fallback; a catch-all any-event rule for
/// the current state comes last. A wildcard never overrides a concrete
/// match.
pub(crate) fn resolve(
    definition: &Definition,
    current: &StateName,
    event: &EventName,
) -> Option<ResolvedTransition> {
    let rules = definition.rules();

    let matched = rules
        .iter()
        .find(|rule| named_event(rule) == Some(event) && named_from(rule) == Some(current))
        .or_else(|| {
            rules
                .iter()
                .find(|rule| named_event(rule) == Some(event) && rule.from == StateMatch::Any)
        })
        .or_else(|| {
            rules
                .iter()
                .find(|rule| rule.event == EventMatch::Any && named_from(rule) == Some(current))
        })?;

    let to = match &matched.to {
        Target::Stay => current.clone(),
        Target::State(state) => state.clone(),
    };
    Some(ResolvedTransition {
        from: current.clone(),
        to,
    })
}

fn named_event(rule: &TransitionRule) -> Option<&EventName> {
    match &rule.event {
        EventMatch::Named(event) => Some(event),
        EventMatch::Any => None,
    }
}

fn named_from(rule: &TransitionRule) -> Option<&StateName> {
    match &rule.from {
        StateMatch::Named(state) => Some(state),
        StateMatch::Any => None,
    }
}
