//! Single-use authorization for entering gated routes.
//!
//! `issue` stores a pending token for a route. The first `try_consume` binds it to a
//! navigation identifier; repeating the same navigation within the idempotence window
//! succeeds again, anything else fails. Tokens live in session storage so a reload
//! between issue and entry still honours them until they expire.

use serde::{Deserialize, Serialize};

use crate::proctoring::model::SafeRoute;
use crate::proctoring::persisted::PersistedState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum TokenRecord {
    Issued { issued_at_ms: i64, expires_at_ms: i64 },
    Consumed { navigation_id: String, valid_until_ms: i64 },
}

#[derive(Clone)]
pub(crate) struct NavigationTokens {
    state: PersistedState,
    ttl_ms: i64,
    window_ms: i64,
}

impl NavigationTokens {
    pub(crate) fn new(state: PersistedState, ttl_ms: u64, window_ms: u64) -> Self {
        Self { state, ttl_ms: ttl_ms as i64, window_ms: window_ms as i64 }
    }

    pub(crate) fn issue(&self, route: SafeRoute, now_ms: i64) {
        let record =
            TokenRecord::Issued { issued_at_ms: now_ms, expires_at_ms: now_ms + self.ttl_ms };
        self.write(route, &record);
        tracing::debug!(route = route.path(), "Navigation token issued");
    }

    pub(crate) fn revoke(&self, route: SafeRoute) {
        self.state.remove_token_record(route);
    }

    pub(crate) fn try_consume(&self, route: SafeRoute, navigation_id: &str, now_ms: i64) -> bool {
        let Some(record) = self.read(route) else {
            return false;
        };

        match record {
            TokenRecord::Issued { expires_at_ms, .. } if now_ms <= expires_at_ms => {
                let consumed = TokenRecord::Consumed {
                    navigation_id: navigation_id.to_string(),
                    valid_until_ms: now_ms + self.window_ms,
                };
                self.write(route, &consumed);
                tracing::debug!(route = route.path(), navigation_id, "Navigation token consumed");
                true
            }
            TokenRecord::Consumed { navigation_id: bound, valid_until_ms }
                if now_ms <= valid_until_ms =>
            {
                bound == navigation_id
            }
            _ => {
                self.revoke(route);
                false
            }
        }
    }

    fn read(&self, route: SafeRoute) -> Option<TokenRecord> {
        let raw = self.state.token_record(route)?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(route = route.path(), error = %err, "Discarding unreadable navigation token");
                self.revoke(route);
                None
            }
        }
    }

    fn write(&self, route: SafeRoute, record: &TokenRecord) {
        match serde_json::to_string(record) {
            Ok(raw) => self.state.set_token_record(route, &raw),
            Err(err) => tracing::error!(error = %err, "Failed to encode navigation token"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_state;

    fn tokens() -> NavigationTokens {
        NavigationTokens::new(memory_state(), 5_000, 150)
    }

    #[test]
    fn token_is_single_use() {
        let tokens = tokens();
        tokens.issue(SafeRoute::Sections, 0);

        assert!(tokens.try_consume(SafeRoute::Sections, "nav-1", 10));
        assert!(!tokens.try_consume(SafeRoute::Sections, "nav-2", 20));
    }

    #[test]
    fn same_navigation_is_idempotent_within_window() {
        let tokens = tokens();
        tokens.issue(SafeRoute::Exam, 0);

        assert!(tokens.try_consume(SafeRoute::Exam, "nav-1", 100));
        assert!(tokens.try_consume(SafeRoute::Exam, "nav-1", 250));
        assert!(!tokens.try_consume(SafeRoute::Exam, "nav-1", 251));
        assert!(!tokens.try_consume(SafeRoute::Exam, "nav-1", 252));
    }

    #[test]
    fn missing_or_expired_tokens_are_refused() {
        let tokens = tokens();
        assert!(!tokens.try_consume(SafeRoute::Final, "nav-1", 0));

        tokens.issue(SafeRoute::Final, 0);
        assert!(!tokens.try_consume(SafeRoute::Final, "nav-1", 5_001));
        assert!(!tokens.try_consume(SafeRoute::Final, "nav-1", 5_002));
    }

    #[test]
    fn tokens_are_scoped_per_route() {
        let tokens = tokens();
        tokens.issue(SafeRoute::Sections, 0);

        assert!(!tokens.try_consume(SafeRoute::Final, "nav-1", 1));
        assert!(tokens.try_consume(SafeRoute::Sections, "nav-1", 1));
    }

    #[test]
    fn reissuing_replaces_a_consumed_token() {
        let tokens = tokens();
        tokens.issue(SafeRoute::Sections, 0);
        assert!(tokens.try_consume(SafeRoute::Sections, "nav-1", 1));

        tokens.issue(SafeRoute::Sections, 1_000);
        assert!(tokens.try_consume(SafeRoute::Sections, "nav-2", 1_001));
    }
}
