//! State and event identifiers.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Name of the unset state a machine occupies before its first transition.
pub const NONE_STATE: &str = "none";

/// Wildcard matching any source state in a transition rule.
pub const ANY_STATE: &str = "any";

/// Event fired automatically when a machine with a declared initial state
/// starts.
pub const INIT_EVENT: &str = "init";

/// Wildcard matching any fired event name in a transition rule.
pub const ANY_EVENT: &str = "any_event";

/// Opaque, comparable state identifier.
///
/// Cloning is cheap: the name is a shared `Arc<str>`.
///
/// # Example
///
/// ```rust
/// use tokio_machine::StateName;
///
/// let state = StateName::from("green");
/// assert_eq!(state, "green");
/// assert_eq!(state.to_string(), "green");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateName(Arc<str>);

impl StateName {
    /// The reserved unset state.
    pub fn none() -> Self {
        Self::from(NONE_STATE)
    }

    /// The state's name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the reserved unset state.
    #[must_use]
    pub fn is_none_state(&self) -> bool {
        &*self.0 == NONE_STATE
    }
}

impl From<&str> for StateName {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for StateName {
    fn from(name: String) -> Self {
        Self(Arc::from(name.as_str()))
    }
}

impl From<&StateName> for StateName {
    fn from(name: &StateName) -> Self {
        name.clone()
    }
}

impl Borrow<str> for StateName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StateName {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for StateName {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque, comparable event identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventName(Arc<str>);

impl EventName {
    /// The reserved initial event.
    pub fn init() -> Self {
        Self::from(INIT_EVENT)
    }

    /// The event's name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for EventName {
    fn from(name: String) -> Self {
        Self(Arc::from(name.as_str()))
    }
}

impl From<&EventName> for EventName {
    fn from(name: &EventName) -> Self {
        name.clone()
    }
}

impl Borrow<str> for EventName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for EventName {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for EventName {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_compare_by_value() {
        let a = StateName::from("green");
        let b = StateName::from(String::from("green"));
        assert_eq!(a, b);
        assert_eq!(a, "green");
        assert_ne!(a, StateName::from("red"));
    }

    #[test]
    fn reserved_names() {
        assert!(StateName::none().is_none_state());
        assert_eq!(StateName::none(), NONE_STATE);
        assert_eq!(EventName::init(), INIT_EVENT);
        assert!(!StateName::from("green").is_none_state());
    }

    #[test]
    fn cloning_shares_the_name() {
        let a = StateName::from("green");
        let b = a.clone();
        assert_eq!(a.as_str().as_ptr(), b.as_str().as_ptr());
    }
}
