use crate::proctoring::detector::KeyStroke;
use crate::proctoring::model::{Location, SafeRoute};
use crate::proctoring::tokens::NavigationTokens;

const BACK_MOUSE_BUTTON: u8 = 3;
const FORWARD_MOUSE_BUTTON: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GateDecision {
    Accept,
    /// Inside a grace window; the next drift poll re-evaluates.
    Defer,
    /// Put the canonical location back into the address bar.
    Revert { to: Location },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryDecision {
    Render,
    RedirectHome,
    /// A gated flow is in progress; send the shell back to its canonical location.
    Restore { to: Location },
}

/// Pins the visible URL to the canonical location.
///
/// Event-driven corrections and drift polling both go through [`NavigationGate::correct`].
pub(crate) struct NavigationGate {
    tokens: NavigationTokens,
    canonical: Location,
    observed: Location,
    observed_navigation: String,
    grace_until_ms: i64,
    window_ms: i64,
    entry_grace_ms: i64,
}

impl NavigationGate {
    pub(crate) fn new(tokens: NavigationTokens, window_ms: u64, entry_grace_ms: u64) -> Self {
        Self {
            tokens,
            canonical: Location::home(),
            observed: Location::home(),
            observed_navigation: String::new(),
            grace_until_ms: i64::MIN,
            window_ms: window_ms as i64,
            entry_grace_ms: entry_grace_ms as i64,
        }
    }

    /// A fresh page load: nothing is canonical until a route is entered.
    pub(crate) fn reset(&mut self) {
        self.canonical = Location::home();
        self.observed = Location::home();
        self.observed_navigation.clear();
        self.grace_until_ms = i64::MIN;
    }

    pub(crate) fn canonical(&self) -> &Location {
        &self.canonical
    }

    pub(crate) fn authorize(&self, route: SafeRoute, now_ms: i64) {
        self.tokens.issue(route, now_ms);
    }

    /// Programmatic navigation: the caller is about to move the visible URL here.
    pub(crate) fn commit(&mut self, location: Location, now_ms: i64) {
        tracing::debug!(from = %self.canonical, to = %location, "Canonical location updated");
        self.observed = location.clone();
        self.canonical = location;
        self.grace_until_ms = now_ms + self.window_ms;
    }

    /// Single path corrector, fed by URL change events and by [`Self::poll_drift`].
    pub(crate) fn correct(
        &mut self,
        observed: Location,
        navigation_id: &str,
        now_ms: i64,
    ) -> GateDecision {
        self.observed = observed;
        self.observed_navigation = navigation_id.to_string();

        if self.observed == self.canonical {
            return GateDecision::Accept;
        }

        if now_ms <= self.grace_until_ms {
            return GateDecision::Defer;
        }

        if self.observed.is_public() && self.canonical.is_public() {
            self.canonical = self.observed.clone();
            return GateDecision::Accept;
        }

        if let Some(route) = self.observed.safe_route() {
            if self.tokens.try_consume(route, navigation_id, now_ms) {
                self.canonical = self.observed.clone();
                self.grace_until_ms = now_ms + self.window_ms;
                return GateDecision::Accept;
            }
        }

        tracing::warn!(
            observed = %self.observed,
            canonical = %self.canonical,
            "Unauthorized navigation reverted"
        );
        metrics::counter!(crate::core::metrics::GATE_CORRECTIONS_TOTAL).increment(1);
        self.observed = self.canonical.clone();
        GateDecision::Revert { to: self.canonical.clone() }
    }

    /// Re-checks the last observed location once any grace window has passed.
    pub(crate) fn poll_drift(&mut self, now_ms: i64) -> GateDecision {
        if self.observed == self.canonical {
            return GateDecision::Accept;
        }
        let observed = self.observed.clone();
        let navigation_id = self.observed_navigation.clone();
        self.correct(observed, &navigation_id, now_ms)
    }

    /// A route was mounted, by in-app navigation or by a direct load.
    ///
    /// While a gated route is canonical, only a token-carrying entry may replace it.
    pub(crate) fn on_route_enter(
        &mut self,
        location: Location,
        navigation_id: &str,
        now_ms: i64,
    ) -> EntryDecision {
        let in_gated_flow = self.canonical.safe_route().is_some();

        if location.is_public() && !in_gated_flow {
            self.enter(location, now_ms);
            return EntryDecision::Render;
        }

        if let Some(route) = location.safe_route() {
            if self.tokens.try_consume(route, navigation_id, now_ms) {
                self.enter(location, now_ms);
                return EntryDecision::Render;
            }
        }

        if in_gated_flow {
            tracing::warn!(
                location = %location,
                canonical = %self.canonical,
                "Route entered outside the gated flow; restoring canonical location"
            );
            metrics::counter!(crate::core::metrics::GATE_CORRECTIONS_TOTAL).increment(1);
            self.observed = self.canonical.clone();
            return EntryDecision::Restore { to: self.canonical.clone() };
        }

        if location.safe_route().is_some() {
            tracing::warn!(location = %location, "Direct access to gated route blocked");
        } else {
            tracing::warn!(location = %location, "Unknown route entered; redirecting home");
        }
        self.enter(Location::home(), now_ms);
        EntryDecision::RedirectHome
    }

    /// Back/forward traversal: the canonical location to push and replace.
    pub(crate) fn on_history_traversal(&mut self) -> Location {
        tracing::warn!(canonical = %self.canonical, "History traversal neutralized");
        self.observed = self.canonical.clone();
        self.canonical.clone()
    }

    /// Back/forward accelerators and address-bar focus shortcuts.
    pub(crate) fn intercept_key(&self, stroke: &KeyStroke) -> bool {
        let key = stroke.key.as_str();
        let history = stroke.alt && matches!(key, "ArrowLeft" | "ArrowRight");
        let hardware = matches!(key, "BrowserBack" | "BrowserForward");
        let address_bar = key == "F6"
            || (stroke.ctrl && key.eq_ignore_ascii_case("l"))
            || (stroke.alt && key.eq_ignore_ascii_case("d"));
        history || hardware || address_bar
    }

    pub(crate) fn intercept_mouse(&self, button: u8) -> bool {
        matches!(button, BACK_MOUSE_BUTTON | FORWARD_MOUSE_BUTTON)
    }

    fn enter(&mut self, location: Location, now_ms: i64) {
        self.observed = location.clone();
        self.canonical = location;
        self.grace_until_ms = now_ms + self.entry_grace_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proctoring::model::SectionId;
    use crate::test_support::memory_state;

    fn gate() -> NavigationGate {
        let tokens = NavigationTokens::new(memory_state(), 5_000, 150);
        NavigationGate::new(tokens, 150, 100)
    }

    fn exam(section: &str) -> Location {
        Location::exam(&SectionId::new(section))
    }

    #[test]
    fn tampering_is_reverted_within_one_cycle() {
        let mut gate = gate();
        gate.commit(exam("A"), 0);

        let decision = gate.correct(Location::parse("/final"), "nav-x", 1_000);

        assert_eq!(decision, GateDecision::Revert { to: exam("A") });
        assert_eq!(gate.poll_drift(1_025), GateDecision::Accept);
    }

    #[test]
    fn changes_inside_grace_are_rechecked_by_polling() {
        let mut gate = gate();
        gate.commit(exam("A"), 0);

        assert_eq!(gate.correct(exam("C"), "nav-x", 100), GateDecision::Defer);
        assert_eq!(gate.poll_drift(125), GateDecision::Defer);
        assert_eq!(gate.poll_drift(175), GateDecision::Revert { to: exam("A") });
    }

    #[test]
    fn authorized_forward_navigation_is_accepted_once() {
        let mut gate = gate();
        gate.on_route_enter(Location::parse("/rules"), "nav-0", 0);

        gate.authorize(SafeRoute::Sections, 1_000);
        assert_eq!(gate.correct(Location::parse("/sections"), "nav-1", 1_010), GateDecision::Accept);
        assert_eq!(gate.canonical(), &Location::parse("/sections"));

        gate.commit(Location::parse("/rules"), 2_000);
        assert_eq!(
            gate.correct(Location::parse("/sections"), "nav-2", 3_000),
            GateDecision::Revert { to: Location::parse("/rules") }
        );
    }

    #[test]
    fn public_routes_are_free_until_the_flow_starts() {
        let mut gate = gate();
        gate.on_route_enter(Location::home(), "nav-0", 0);

        assert_eq!(gate.correct(Location::parse("/login"), "nav-1", 500), GateDecision::Accept);

        gate.commit(Location::parse("/sections"), 1_000);
        assert_eq!(
            gate.correct(Location::parse("/rules"), "nav-2", 2_000),
            GateDecision::Revert { to: Location::parse("/sections") }
        );
    }

    #[test]
    fn direct_entry_without_token_redirects_home() {
        let mut gate = gate();

        assert_eq!(
            gate.on_route_enter(Location::parse("/exam?section=B"), "nav-1", 0),
            EntryDecision::RedirectHome
        );
        assert_eq!(gate.canonical(), &Location::home());

        gate.authorize(SafeRoute::Exam, 10);
        assert_eq!(
            gate.on_route_enter(Location::parse("/exam?section=B"), "nav-2", 20),
            EntryDecision::Render
        );
        assert_eq!(
            gate.on_route_enter(Location::parse("/exam?section=B"), "nav-2", 30),
            EntryDecision::Render
        );
        assert_eq!(
            gate.on_route_enter(Location::parse("/sections"), "nav-3", 40),
            EntryDecision::Restore { to: Location::parse("/exam?section=B") }
        );

        gate.reset();
        assert_eq!(
            gate.on_route_enter(Location::parse("/exam?section=B"), "nav-4", 50),
            EntryDecision::RedirectHome
        );
    }

    #[test]
    fn unknown_routes_redirect_home() {
        let mut gate = gate();
        assert_eq!(
            gate.on_route_enter(Location::parse("/admin/exams"), "nav-1", 0),
            EntryDecision::RedirectHome
        );
    }

    #[test]
    fn hash_change_is_reverted() {
        let mut gate = gate();
        gate.commit(exam("A"), 0);

        assert_eq!(
            gate.correct(Location::parse("/exam?section=A#tampered"), "nav-x", 1_000),
            GateDecision::Revert { to: exam("A") }
        );

        gate.commit(exam("A"), 2_000);
        assert_eq!(
            gate.correct(Location::parse("/exam?section=A#top"), "nav-y", 2_050),
            GateDecision::Defer
        );
        assert_eq!(gate.poll_drift(2_200), GateDecision::Revert { to: exam("A") });
    }

    #[test]
    fn public_mount_cannot_replace_a_gated_location() {
        let mut gate = gate();
        gate.commit(exam("A"), 0);

        assert_eq!(
            gate.on_route_enter(Location::parse("/login"), "nav-1", 5_000),
            EntryDecision::Restore { to: exam("A") }
        );
        assert_eq!(gate.canonical(), &exam("A"));

        assert_eq!(
            gate.on_route_enter(Location::parse("/sections"), "nav-2", 5_100),
            EntryDecision::Restore { to: exam("A") }
        );

        gate.commit(Location::home(), 6_000);
        assert_eq!(
            gate.on_route_enter(Location::parse("/login"), "nav-3", 6_010),
            EntryDecision::Render
        );
        assert_eq!(gate.canonical(), &Location::parse("/login"));
    }

    #[test]
    fn history_traversal_reasserts_canonical() {
        let mut gate = gate();
        gate.commit(Location::parse("/sections"), 0);

        assert_eq!(gate.on_history_traversal(), Location::parse("/sections"));
    }

    #[test]
    fn navigation_accelerators_are_intercepted() {
        let gate = gate();

        assert!(gate.intercept_key(&KeyStroke::alt("ArrowLeft")));
        assert!(gate.intercept_key(&KeyStroke::alt("ArrowRight")));
        assert!(gate.intercept_key(&KeyStroke::plain("F6")));
        assert!(gate.intercept_key(&KeyStroke::ctrl("l")));
        assert!(gate.intercept_key(&KeyStroke::ctrl("L")));
        assert!(!gate.intercept_key(&KeyStroke::plain("ArrowLeft")));
        assert!(!gate.intercept_key(&KeyStroke::ctrl("c")));

        assert!(gate.intercept_mouse(3));
        assert!(gate.intercept_mouse(4));
        assert!(!gate.intercept_mouse(0));
    }
}
