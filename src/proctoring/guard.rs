use crate::proctoring::model::{routes, Location};
use crate::proctoring::persisted::PersistedState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RouteDecision {
    Render,
    Redirect(Location),
}

/// Protected-route check run before the navigation gate sees the entry.
///
/// The disqualified flag is read from storage on every call so a reload lands on the
/// terminal screen no matter what the in-memory state says.
pub(crate) fn check_route(location: &Location, state: &PersistedState) -> RouteDecision {
    if location.is_public() {
        return RouteDecision::Render;
    }

    if state.is_disqualified() {
        if location.path == routes::FINAL {
            return RouteDecision::Render;
        }
        return RouteDecision::Redirect(Location::at(routes::FINAL));
    }

    if location.safe_route().is_none() {
        return RouteDecision::Redirect(Location::home());
    }

    if state.candidate().is_none() {
        return RouteDecision::Redirect(Location::at(routes::LOGIN));
    }

    RouteDecision::Render
}
