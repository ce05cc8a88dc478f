//! Access gate: allow-list check on the acting chat user.

use std::collections::HashSet;

use thiserror::Error;
use tracing::warn;

/// Chat user id as delivered by the transport.
pub type ActorId = i64;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("access denied for user {actor}")]
pub struct AccessDenied {
    pub actor: ActorId,
}

/// Static allow-list, loaded once at startup.
///
/// An empty list admits everyone.
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    allowed: HashSet<ActorId>,
}

impl AccessGate {
    pub fn new(ids: impl IntoIterator<Item = ActorId>) -> Self {
        let allowed: HashSet<ActorId> = ids.into_iter().collect();
        if allowed.is_empty() {
            warn!("Allow-list is empty, every chat user can control the runtime");
        }
        Self { allowed }
    }

    pub fn is_allowed(&self, actor: ActorId) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&actor)
    }

    pub fn check(&self, actor: ActorId) -> Result<(), AccessDenied> {
        if self.is_allowed(actor) {
            Ok(())
        } else {
            Err(AccessDenied { actor })
        }
    }

    pub fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        let gate = AccessGate::new([42]);
        assert!(gate.is_allowed(42));
        assert!(!gate.is_allowed(7));
        assert_eq!(gate.check(7), Err(AccessDenied { actor: 7 }));
        assert!(gate.check(42).is_ok());
    }

    #[test]
    fn test_empty_list_admits_everyone() {
        let gate = AccessGate::new(Vec::new());
        assert!(gate.is_open());
        assert!(gate.is_allowed(42));
        assert!(gate.is_allowed(7));
    }

    #[test]
    fn test_denied_message() {
        assert_eq!(AccessDenied { actor: 7 }.to_string(), "access denied for user 7");
    }
}
