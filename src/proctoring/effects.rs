use serde::Serialize;

use crate::proctoring::model::{Location, SectionId};
use crate::proctoring::scoring::CodeAttempt;
use crate::proctoring::sequencer::SectionView;
use crate::schemas::exam::TestCaseDefinition;
use crate::schemas::result::SubmitRequest;

/// Instruction for the browser shell, written as one JSON line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub(crate) enum Directive {
    /// Cancel the default action of the event being handled.
    Suppress,
    /// Replace the address bar without a navigation.
    ReplaceUrl { href: String },
    /// Push a duplicate history entry so back/forward has nowhere to go.
    PushHistory { href: String },
    Navigate { href: String, replace: bool },
    Warning { count: u32, max: u32, reason: String },
    Disqualified { reason: String, redirect_in_ms: u64 },
    SectionExpired { section: SectionId },
    Notice { message: String },
    Timers { sections: Vec<SectionView> },
    Output { question_id: String, text: String, attempt: Option<CodeAttempt> },
    Screen { screen: Screen },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub(crate) enum Screen {
    Sections { sections: Vec<SectionView>, all_completed: bool },
    Exam { section: SectionId, remaining_seconds: u64 },
    Final { disqualified: bool },
}

/// Work the session hands to the runtime.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    Shell(Directive),
    /// Fire-and-forget progress upload.
    Submit { access_token: Option<String>, payload: SubmitRequest },
    /// Wait for outstanding submissions, then navigate.
    AwaitSubmissions { then: Location },
    Authenticate { candidate_id: String, password: String },
    RunTests {
        question_id: String,
        code: String,
        language: String,
        cases: Vec<TestCaseDefinition>,
    },
    NavigateAfter { location: Location, delay_ms: u64 },
}

impl Effect {
    pub(crate) fn navigate(location: &Location, replace: bool) -> Self {
        Effect::Shell(Directive::Navigate { href: location.href(), replace })
    }

    pub(crate) fn notice(message: impl Into<String>) -> Self {
        Effect::Shell(Directive::Notice { message: message.into() })
    }
}
