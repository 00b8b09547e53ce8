//! Immutable machine definitions and the builder that validates them.

use std::fmt;
use std::sync::Arc;

use crate::context::TransitionContext;
use crate::error::{CallbackError, DefinitionError, SpawnError};
use crate::hooks::{Handler, HookKind, HookRegistry, HookTarget};
use crate::name::{EventName, StateName};

/// Event side of a transition rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventMatch {
    /// Matches any fired event name.
    Any,
    /// Matches exactly one event.
    Named(EventName),
}

impl fmt::Display for EventMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any_event"),
            Self::Named(event) => fmt::Display::fmt(event, f),
        }
    }
}

/// Source-state side of a transition rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateMatch {
    /// Matches any current state.
    Any,
    /// Matches exactly one state.
    Named(StateName),
}

impl fmt::Display for StateMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Named(state) => fmt::Display::fmt(state, f),
        }
    }
}

/// Destination of a transition rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Remain in the current state (re-entrant transition).
    Stay,
    /// Move to the named state.
    State(StateName),
}

/// One declared transition: `(event, from) -> to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRule {
    /// The event this rule answers to.
    pub event: EventMatch,
    /// The state this rule fires from.
    pub from: StateMatch,
    /// Where the machine goes.
    pub to: Target,
}

/// Value-type rule declaration consumed by [`DefinitionBuilder::rule`].
///
/// A rule with no `from` clause applies from any state; a rule with no `to`
/// clause keeps the machine where it is.
///
/// # Example
///
/// ```rust
/// use tokio_machine::{Definition, Rule};
///
/// let definition = Definition::builder()
///     .rule(Rule::on("slow").from("green").to("yellow"))
///     .rule(Rule::on("go").from_each(["yellow", "red"]).to("green"))
///     .rule(Rule::on("panic").to("red"))
///     .build()
///     .unwrap();
/// assert!(definition.has_event("panic"));
/// ```
#[derive(Debug, Clone)]
pub struct Rule {
    event: EventMatch,
    from: Vec<StateMatch>,
    to: Target,
}

impl Rule {
    /// A rule answering to the named event.
    pub fn on(event: impl Into<EventName>) -> Self {
        Self {
            event: EventMatch::Named(event.into()),
            from: Vec::new(),
            to: Target::Stay,
        }
    }

    /// A catch-all rule answering to any fired event.
    pub fn any_event() -> Self {
        Self {
            event: EventMatch::Any,
            from: Vec::new(),
            to: Target::Stay,
        }
    }

    /// Add a source state.
    #[must_use]
    pub fn from(mut self, state: impl Into<StateName>) -> Self {
        self.from.push(StateMatch::Named(state.into()));
        self
    }

    /// Fire from any state.
    #[must_use]
    pub fn from_any(mut self) -> Self {
        self.from.push(StateMatch::Any);
        self
    }

    /// Add several source states at once.
    #[must_use]
    pub fn from_each<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StateName>,
    {
        self.from
            .extend(states.into_iter().map(|state| StateMatch::Named(state.into())));
        self
    }

    /// Set the destination state.
    #[must_use]
    pub fn to(mut self, state: impl Into<StateName>) -> Self {
        self.to = Target::State(state.into());
        self
    }

    /// Keep the machine in its current state (the default).
    #[must_use]
    pub fn stay(mut self) -> Self {
        self.to = Target::Stay;
        self
    }

    fn into_rules(self) -> Vec<TransitionRule> {
        let froms = if self.from.is_empty() {
            vec![StateMatch::Any]
        } else {
            self.from
        };
        froms
            .into_iter()
            .map(|from| TransitionRule {
                event: self.event.clone(),
                from,
                to: self.to.clone(),
            })
            .collect()
    }
}

/// How a machine picks up its first state.
///
/// By default the initial transition is applied silently (no callbacks) as
/// soon as the machine spawns. `silent(false)` runs the full pipeline
/// instead; `deferred()` declares the transition but leaves firing it to the
/// caller; [`InitialState::at_spawn`] defers naming the target state to
/// [`StateMachine::spawn_at`](crate::StateMachine::spawn_at).
#[derive(Debug, Clone)]
pub struct InitialState {
    pub(crate) state: Option<StateName>,
    pub(crate) event: EventName,
    pub(crate) defer: bool,
    pub(crate) silent: bool,
}

impl InitialState {
    /// An initial transition into the named state.
    pub fn new(state: impl Into<StateName>) -> Self {
        Self {
            state: Some(state.into()),
            event: EventName::init(),
            defer: false,
            silent: true,
        }
    }

    /// An initial transition whose target the caller supplies at spawn.
    pub fn at_spawn() -> Self {
        Self {
            state: None,
            event: EventName::init(),
            defer: false,
            silent: true,
        }
    }

    /// Use a custom event name for the initial transition.
    #[must_use]
    pub fn event(mut self, event: impl Into<EventName>) -> Self {
        self.event = event.into();
        self
    }

    /// Declare the initial transition without auto-firing it; the machine
    /// stays in the unset state until the caller fires the initial event.
    #[must_use]
    pub fn deferred(mut self) -> Self {
        self.defer = true;
        self
    }

    /// Whether the initial transition runs the callback pipeline.
    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

/// Start configuration resolved at spawn time.
#[derive(Debug, Clone)]
pub(crate) struct StartPlan {
    pub(crate) start: StateName,
    pub(crate) auto_fire: Option<EventName>,
}

/// Immutable description of states, events, transition rules, and callbacks.
///
/// Built once through [`Definition::builder`]; read-only for the lifetime of
/// every machine spawned from it.
#[derive(Debug, Clone)]
pub struct Definition {
    rules: Vec<TransitionRule>,
    states: Vec<StateName>,
    events: Vec<EventName>,
    terminal: Vec<StateName>,
    initial: Option<InitialState>,
    hooks: HookRegistry,
}

impl Definition {
    /// Start building a definition.
    #[must_use]
    pub fn builder() -> DefinitionBuilder {
        DefinitionBuilder::default()
    }

    /// Declared states, derived from rule endpoints, in declaration order.
    #[must_use]
    pub fn states(&self) -> &[StateName] {
        &self.states
    }

    /// Declared events, in declaration order.
    #[must_use]
    pub fn events(&self) -> &[EventName] {
        &self.events
    }

    /// The ordered transition rules.
    #[must_use]
    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    /// Whether `name` is a declared state.
    #[must_use]
    pub fn has_state(&self, name: &str) -> bool {
        self.states.iter().any(|state| state.as_str() == name)
    }

    /// Whether `name` is a declared event.
    #[must_use]
    pub fn has_event(&self, name: &str) -> bool {
        self.events.iter().any(|event| event.as_str() == name)
    }

    /// Whether `state` is declared terminal.
    #[must_use]
    pub fn is_terminal(&self, state: &StateName) -> bool {
        self.terminal.iter().any(|terminal| terminal == state)
    }

    pub(crate) fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Resolve the effective start state, inserting or updating the initial
    /// transition rule when one is declared.
    pub(crate) fn finalize_initial(
        mut self,
        override_state: Option<StateName>,
    ) -> Result<(Self, StartPlan), SpawnError> {
        let Some(init) = self.initial.clone() else {
            let start = match override_state {
                Some(state) => {
                    if !self.has_state(state.as_str()) {
                        return Err(SpawnError::InvalidState(state));
                    }
                    state
                }
                None => StateName::none(),
            };
            return Ok((self, StartPlan { start, auto_fire: None }));
        };

        let target = override_state
            .or_else(|| init.state.clone())
            .ok_or(SpawnError::MissingInitialState)?;
        upsert_init_rule(&mut self.rules, &init.event, &target);
        push_unique(&mut self.states, StateName::none());
        push_unique(&mut self.states, target.clone());
        push_unique(&mut self.events, init.event.clone());

        let plan = if init.defer {
            StartPlan {
                start: StateName::none(),
                auto_fire: None,
            }
        } else if init.silent {
            StartPlan {
                start: target,
                auto_fire: None,
            }
        } else {
            StartPlan {
                start: StateName::none(),
                auto_fire: Some(init.event),
            }
        };
        Ok((self, plan))
    }
}

fn upsert_init_rule(rules: &mut Vec<TransitionRule>, event: &EventName, target: &StateName) {
    let from = StateMatch::Named(StateName::none());
    let existing = rules.iter_mut().find(|rule| {
        rule.from == from && matches!(&rule.event, EventMatch::Named(name) if name == event)
    });
    match existing {
        Some(rule) => rule.to = Target::State(target.clone()),
        None => rules.push(TransitionRule {
            event: EventMatch::Named(event.clone()),
            from,
            to: Target::State(target.clone()),
        }),
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// Builds and validates a [`Definition`].
///
/// Structural errors — an event with no rules, duplicate declarations,
/// callbacks naming unknown targets — are reported by [`build`], before any
/// machine can exist.
///
/// [`build`]: DefinitionBuilder::build
#[derive(Default)]
pub struct DefinitionBuilder {
    rules: Vec<TransitionRule>,
    declared_events: Vec<EventName>,
    duplicate_events: Vec<EventName>,
    terminal: Vec<StateName>,
    initial: Option<InitialState>,
    initial_redefined: bool,
    hooks: Vec<(HookKind, HookTarget, Handler)>,
}

impl DefinitionBuilder {
    /// Pre-declare an event.
    ///
    /// Declaring is optional — rules declare their events implicitly — but a
    /// pre-declared event left without rules fails the build.
    #[must_use]
    pub fn event(mut self, event: impl Into<EventName>) -> Self {
        let event = event.into();
        if self.declared_events.contains(&event) {
            self.duplicate_events.push(event);
        } else {
            self.declared_events.push(event);
        }
        self
    }

    /// Add a transition rule.
    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.extend(rule.into_rules());
        self
    }

    /// Declare the initial state, entered silently when the machine spawns.
    #[must_use]
    pub fn initial(self, state: impl Into<StateName>) -> Self {
        self.initial_with(InitialState::new(state))
    }

    /// Declare the initial transition with explicit options.
    #[must_use]
    pub fn initial_with(mut self, initial: InitialState) -> Self {
        if self.initial.is_some() {
            self.initial_redefined = true;
        }
        self.initial = Some(initial);
        self
    }

    /// Mark a state terminal; [`MachineHandle::is_terminated`] reports
    /// whether the machine currently occupies one.
    ///
    /// [`MachineHandle::is_terminated`]: crate::MachineHandle::is_terminated
    #[must_use]
    pub fn terminal(mut self, state: impl Into<StateName>) -> Self {
        push_unique(&mut self.terminal, state.into());
        self
    }

    /// Register a callback from a raw `(kind, target, handler)` tuple.
    ///
    /// The named registration methods below are sugar over this entry point.
    #[must_use]
    pub fn callback<F>(mut self, kind: HookKind, target: HookTarget, handler: F) -> Self
    where
        F: Fn(&mut TransitionContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.hooks.push((kind, target, handler));
        self
    }

    /// Run before the named event commits; may cancel or fail the
    /// transition.
    #[must_use]
    pub fn before<F>(self, event: impl Into<EventName>, handler: F) -> Self
    where
        F: Fn(&mut TransitionContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback(HookKind::Before, HookTarget::Event(event.into()), handler)
    }

    /// Run before any event commits.
    #[must_use]
    pub fn before_any<F>(self, handler: F) -> Self
    where
        F: Fn(&mut TransitionContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback(HookKind::Before, HookTarget::Any, handler)
    }

    /// Run after every phase of the named event's transition.
    #[must_use]
    pub fn after<F>(self, event: impl Into<EventName>, handler: F) -> Self
    where
        F: Fn(&mut TransitionContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback(HookKind::After, HookTarget::Event(event.into()), handler)
    }

    /// Run after every phase of any transition.
    #[must_use]
    pub fn after_any<F>(self, handler: F) -> Self
    where
        F: Fn(&mut TransitionContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback(HookKind::After, HookTarget::Any, handler)
    }

    /// Run when the machine leaves the named state.
    #[must_use]
    pub fn on_exit<F>(self, state: impl Into<StateName>, handler: F) -> Self
    where
        F: Fn(&mut TransitionContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback(HookKind::Exit, HookTarget::State(state.into()), handler)
    }

    /// Run when the machine leaves any state.
    #[must_use]
    pub fn on_exit_any<F>(self, handler: F) -> Self
    where
        F: Fn(&mut TransitionContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback(HookKind::Exit, HookTarget::Any, handler)
    }

    /// Run when the machine enters the named state.
    #[must_use]
    pub fn on_enter<F>(self, state: impl Into<StateName>, handler: F) -> Self
    where
        F: Fn(&mut TransitionContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback(HookKind::Enter, HookTarget::State(state.into()), handler)
    }

    /// Run when the machine enters any state.
    #[must_use]
    pub fn on_enter_any<F>(self, handler: F) -> Self
    where
        F: Fn(&mut TransitionContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback(HookKind::Enter, HookTarget::Any, handler)
    }

    /// Run for every successful transition, between the exit and enter
    /// phases.
    #[must_use]
    pub fn on_transition<F>(self, handler: F) -> Self
    where
        F: Fn(&mut TransitionContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback(HookKind::Transition, HookTarget::Any, handler)
    }

    /// Run for every successful transition triggered by the named event.
    #[must_use]
    pub fn on_event<F>(self, event: impl Into<EventName>, handler: F) -> Self
    where
        F: Fn(&mut TransitionContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callback(HookKind::Transition, HookTarget::Event(event.into()), handler)
    }

    /// Validate everything declared so far and produce the definition.
    pub fn build(self) -> Result<Definition, DefinitionError> {
        if self.initial_redefined {
            return Err(DefinitionError::AlreadyDefined(
                "the initial state".to_string(),
            ));
        }
        if let Some(event) = self.duplicate_events.first() {
            return Err(DefinitionError::AlreadyDefined(format!("event `{event}`")));
        }

        let mut rules = self.rules;
        if let Some(init) = &self.initial {
            if let Some(state) = &init.state {
                upsert_init_rule(&mut rules, &init.event, state);
            }
        }

        for (index, rule) in rules.iter().enumerate() {
            let clash = rules[..index]
                .iter()
                .any(|earlier| earlier.event == rule.event && earlier.from == rule.from);
            if clash {
                return Err(DefinitionError::AlreadyDefined(format!(
                    "transition `{}` from `{}`",
                    rule.event, rule.from
                )));
            }
        }

        let mut events = Vec::new();
        for event in &self.declared_events {
            push_unique(&mut events, event.clone());
        }
        for rule in &rules {
            if let EventMatch::Named(event) = &rule.event {
                push_unique(&mut events, event.clone());
            }
        }

        for declared in &self.declared_events {
            let covered = rules
                .iter()
                .any(|rule| matches!(&rule.event, EventMatch::Named(event) if event == declared));
            if !covered {
                return Err(DefinitionError::NotEnoughTransitions(declared.clone()));
            }
        }

        let mut states = Vec::new();
        for rule in &rules {
            if let StateMatch::Named(state) = &rule.from {
                push_unique(&mut states, state.clone());
            }
            if let Target::State(state) = &rule.to {
                push_unique(&mut states, state.clone());
            }
        }

        for terminal in &self.terminal {
            if !states.contains(terminal) {
                return Err(DefinitionError::InvalidState(terminal.clone()));
            }
        }

        let mut hooks = HookRegistry::default();
        for (kind, target, handler) in self.hooks {
            let valid = match (kind, &target) {
                (_, HookTarget::Any) => true,
                (
                    HookKind::Before | HookKind::After | HookKind::Transition,
                    HookTarget::Event(event),
                ) => events.contains(event),
                (HookKind::Enter | HookKind::Exit, HookTarget::State(state)) => {
                    states.contains(state)
                }
                _ => false,
            };
            if !valid {
                return Err(DefinitionError::InvalidCallbackName { kind, target });
            }
            hooks.register(kind, target, handler);
        }

        Ok(Definition {
            rules,
            states,
            events,
            terminal: self.terminal,
            initial: self.initial,
            hooks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traffic_light() -> DefinitionBuilder {
        Definition::builder()
            .rule(Rule::on("slow").from("green").to("yellow"))
            .rule(Rule::on("stop").from("yellow").to("red"))
            .rule(Rule::on("ready").from("red").to("yellow"))
            .rule(Rule::on("go").from("yellow").to("green"))
    }

    #[test]
    fn derives_states_and_events_from_rules() {
        let definition = traffic_light().build().unwrap();

        assert_eq!(definition.events().len(), 4);
        assert_eq!(definition.states().len(), 3);
        assert!(definition.has_state("green"));
        assert!(definition.has_event("stop"));
        assert!(!definition.has_state("blue"));
        assert!(!definition.has_event("any_event"));
    }

    #[test]
    fn initial_declares_an_init_rule() {
        let definition = traffic_light().initial("green").build().unwrap();

        assert!(definition.has_event("init"));
        assert!(definition.has_state("none"));
        let init = definition
            .rules()
            .iter()
            .find(|rule| rule.event == EventMatch::Named(EventName::init()))
            .unwrap();
        assert_eq!(init.to, Target::State(StateName::from("green")));
    }

    #[test]
    fn from_each_expands_to_one_rule_per_state() {
        let definition = Definition::builder()
            .rule(Rule::on("go").from_each(["yellow", "red"]).to("green"))
            .build()
            .unwrap();
        assert_eq!(definition.rules().len(), 2);
    }

    #[test]
    fn omitted_from_means_any_and_omitted_to_means_stay() {
        let definition = Definition::builder()
            .rule(Rule::on("tick"))
            .build()
            .unwrap();
        let rule = &definition.rules()[0];
        assert_eq!(rule.from, StateMatch::Any);
        assert_eq!(rule.to, Target::Stay);
    }

    #[test]
    fn declared_event_without_rules_fails() {
        let err = traffic_light().event("missing").build().unwrap_err();
        assert_eq!(
            err,
            DefinitionError::NotEnoughTransitions(EventName::from("missing"))
        );
    }

    #[test]
    fn duplicate_rule_fails() {
        let err = traffic_light()
            .rule(Rule::on("slow").from("green").to("red"))
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::AlreadyDefined(_)));
    }

    #[test]
    fn duplicate_initial_fails() {
        let err = traffic_light()
            .initial("green")
            .initial("red")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::AlreadyDefined("the initial state".to_string())
        );
    }

    #[test]
    fn terminal_must_name_a_declared_state() {
        let err = traffic_light().terminal("blue").build().unwrap_err();
        assert_eq!(err, DefinitionError::InvalidState(StateName::from("blue")));
    }

    #[test]
    fn callback_must_name_a_declared_event() {
        let err = traffic_light()
            .before("warp", |_| Ok(()))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::InvalidCallbackName {
                kind: HookKind::Before,
                ..
            }
        ));
    }

    #[test]
    fn callback_kind_and_target_must_agree() {
        let err = traffic_light()
            .callback(
                HookKind::Enter,
                HookTarget::Event(EventName::from("slow")),
                |_| Ok(()),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidCallbackName { .. }));
    }

    #[test]
    fn wildcard_callback_targets_are_always_valid() {
        let definition = traffic_light()
            .before_any(|_| Ok(()))
            .on_enter_any(|_| Ok(()))
            .on_transition(|_| Ok(()))
            .build()
            .unwrap();
        assert!(!definition.hooks().is_empty());
    }

    #[test]
    fn finalize_resolves_deferred_initial_from_the_caller() {
        let definition = traffic_light()
            .initial_with(InitialState::at_spawn())
            .build()
            .unwrap();

        let err = definition.clone().finalize_initial(None).unwrap_err();
        assert_eq!(err, SpawnError::MissingInitialState);

        let (definition, plan) = definition
            .finalize_initial(Some(StateName::from("red")))
            .unwrap();
        assert_eq!(plan.start, "red");
        assert!(plan.auto_fire.is_none());
        assert!(definition.has_event("init"));
    }

    #[test]
    fn finalize_rejects_unknown_override_without_initial_declaration() {
        let definition = traffic_light().build().unwrap();
        let err = definition
            .finalize_initial(Some(StateName::from("blue")))
            .unwrap_err();
        assert_eq!(err, SpawnError::InvalidState(StateName::from("blue")));
    }
}
