pub(crate) mod detector;
pub(crate) mod disqualification;
pub(crate) mod effects;
pub(crate) mod gate;
pub(crate) mod guard;
pub(crate) mod model;
pub(crate) mod persisted;
pub(crate) mod ports;
pub(crate) mod runtime;
pub(crate) mod scoring;
pub(crate) mod sequencer;
pub(crate) mod session;
pub(crate) mod store;
pub(crate) mod timers;
pub(crate) mod tokens;
