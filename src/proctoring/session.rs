//! One candidate's proctoring state machine.
//!
//! [`ProctoringSession`] owns the gate, the disqualification controller and the section
//! sequencer. Shell events, ticks, drift polls and finished async work all come in
//! through its methods; everything it wants done comes back out as [`Effect`]s. It never
//! awaits, so the whole flow is testable without a browser or a network.

use std::sync::Arc;

use serde::Deserialize;

use crate::core::config::ProctoringSettings;
use crate::core::metrics::{DISQUALIFICATIONS_TOTAL, VIOLATIONS_TOTAL};
use crate::core::time::Clock;
use crate::proctoring::detector::{classify, BrowserSignal, Violation};
use crate::proctoring::disqualification::{DisqualificationController, Escalation};
use crate::proctoring::effects::{Directive, Effect, Screen};
use crate::proctoring::gate::{EntryDecision, GateDecision, NavigationGate};
use crate::proctoring::guard::{check_route, RouteDecision};
use crate::proctoring::model::{routes, ExamPlan, Location, SafeRoute, SectionId, SectionPlan};
use crate::proctoring::persisted::{CandidateIdentity, CodeDraft, PersistedState};
use crate::proctoring::scoring::{self, CodeAttempt, TestOutcome};
use crate::proctoring::sequencer::{AdvanceOutcome, EnterOutcome, SectionSequencer};
use crate::proctoring::timers::TimerStore;
use crate::proctoring::tokens::NavigationTokens;
use crate::schemas::auth::LoginResponse;
use crate::schemas::result::SubmitRequest;

pub(crate) const RULES_NOT_ACCEPTED: &str = "Please agree to the rules before starting the test.";
pub(crate) const NO_ACTIVE_EXAM: &str = "No active exam found.";
pub(crate) const INVALID_CREDENTIALS: &str = "Invalid Candidate ID or password.";
pub(crate) const LOGIN_FAILED: &str = "Login failed. Please try again.";
pub(crate) const MISSING_CREDENTIALS: &str = "Please enter Candidate ID and password.";
pub(crate) const SECTIONS_INCOMPLETE: &str = "Please complete all sections before submitting.";
pub(crate) const DISQUALIFIED_MESSAGE: &str =
    "You have been disqualified for repeated violations of the test rules.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ProctorPolicy {
    pub(crate) max_warnings: u32,
    pub(crate) disqualify_redirect_ms: u64,
    pub(crate) token_ttl_ms: u64,
    pub(crate) token_window_ms: u64,
    pub(crate) entry_grace_ms: u64,
}

impl ProctorPolicy {
    pub(crate) fn from_settings(settings: &ProctoringSettings) -> Self {
        Self {
            max_warnings: settings.max_warnings,
            disqualify_redirect_ms: settings.disqualify_redirect_ms,
            token_ttl_ms: settings.token_ttl_ms,
            token_window_ms: settings.token_window_ms,
            entry_grace_ms: settings.entry_grace_ms,
        }
    }
}

impl Default for ProctorPolicy {
    fn default() -> Self {
        Self {
            max_warnings: 3,
            disqualify_redirect_ms: 1_500,
            token_ttl_ms: 5_000,
            token_window_ms: 150,
            entry_grace_ms: 100,
        }
    }
}

/// Events reported by the browser shell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum ShellEvent {
    /// First event after a page load or reload.
    AppLoaded {
        href: String,
        #[serde(default)]
        navigation_id: String,
    },
    /// A route component mounted after a path change.
    RouteEntered {
        href: String,
        #[serde(default)]
        navigation_id: String,
    },
    /// The visible URL changed (popstate, hashchange, pushState, replaceState).
    UrlChanged {
        href: String,
        #[serde(default)]
        navigation_id: String,
    },
    HistoryTraversal,
    Browser(BrowserSignal),
    MouseButton {
        button: u8,
    },
    Login {
        #[serde(alias = "candidateId")]
        candidate_id: String,
        password: String,
    },
    StartExam {
        agreed: bool,
    },
    SelectSection {
        section: SectionId,
    },
    SelectAnswer {
        question_id: String,
        choice: u32,
    },
    ClearAnswer {
        question_id: String,
    },
    Review {
        question_id: String,
        text: String,
    },
    UpdateCode {
        question_id: String,
        code: String,
        language: String,
    },
    RunCode {
        question_id: String,
    },
    NextSection,
    LeaveSection,
    FinishExam,
    ReturnHome,
}

pub(crate) struct ProctoringSession {
    state: PersistedState,
    clock: Arc<dyn Clock>,
    policy: ProctorPolicy,
    controller: DisqualificationController,
    gate: NavigationGate,
    sequencer: Option<SectionSequencer>,
    last_section: Option<SectionId>,
    last_code_question: Option<String>,
}

impl ProctoringSession {
    pub(crate) fn new(state: PersistedState, clock: Arc<dyn Clock>, policy: ProctorPolicy) -> Self {
        let tokens = NavigationTokens::new(state.clone(), policy.token_ttl_ms, policy.token_window_ms);
        let gate = NavigationGate::new(tokens, policy.token_window_ms, policy.entry_grace_ms);
        let controller = DisqualificationController::restore(state.clone(), policy.max_warnings);

        Self {
            state,
            clock,
            policy,
            controller,
            gate,
            sequencer: None,
            last_section: None,
            last_code_question: None,
        }
    }

    /// Fixes the exam for the rest of the session. Later calls are ignored.
    pub(crate) fn install_plan(&mut self, plan: ExamPlan) {
        if self.sequencer.is_some() {
            return;
        }
        tracing::info!(title = plan.title(), sections = plan.sections().len(), "Exam plan installed");
        let timers = TimerStore::new(self.state.clone(), self.clock.clone());
        let mut sequencer = SectionSequencer::new(plan, timers, self.state.clone());
        if self.controller.is_disqualified() {
            sequencer.halt();
        }
        self.sequencer = Some(sequencer);
    }

    pub(crate) fn has_plan(&self) -> bool {
        self.sequencer.is_some()
    }

    pub(crate) fn state(&self) -> &PersistedState {
        &self.state
    }

    pub(crate) fn controller(&self) -> &DisqualificationController {
        &self.controller
    }

    pub(crate) fn handle(&mut self, event: ShellEvent) -> Vec<Effect> {
        match event {
            ShellEvent::AppLoaded { href, navigation_id } => {
                self.state.clear_completed();
                self.gate.reset();
                if let Some(sequencer) = self.sequencer.as_mut() {
                    sequencer.reset();
                    if self.controller.is_disqualified() {
                        sequencer.halt();
                    }
                }
                self.enter_route(&href, &navigation_id)
            }
            ShellEvent::RouteEntered { href, navigation_id } => {
                self.enter_route(&href, &navigation_id)
            }
            ShellEvent::UrlChanged { href, navigation_id } => {
                let now = self.now();
                revert_effects(self.gate.correct(Location::parse(&href), &navigation_id, now))
            }
            ShellEvent::HistoryTraversal => self.on_history_traversal(),
            ShellEvent::Browser(signal) => self.on_browser_signal(&signal),
            ShellEvent::MouseButton { button } => {
                if self.is_gated() && self.gate.intercept_mouse(button) {
                    vec![Effect::Shell(Directive::Suppress)]
                } else {
                    Vec::new()
                }
            }
            ShellEvent::Login { candidate_id, password } => {
                let candidate_id = candidate_id.trim().to_string();
                if candidate_id.is_empty() || password.is_empty() {
                    return vec![Effect::notice(MISSING_CREDENTIALS)];
                }
                vec![Effect::Authenticate { candidate_id, password }]
            }
            ShellEvent::StartExam { agreed } => self.start_exam(agreed),
            ShellEvent::SelectSection { section } => self.select_section(&section),
            ShellEvent::SelectAnswer { question_id, choice } => {
                if let Some(section) = self.current_section() {
                    self.state.set_answer(&section, &question_id, serde_json::Value::from(choice));
                }
                Vec::new()
            }
            ShellEvent::ClearAnswer { question_id } => {
                if let Some(section) = self.current_section() {
                    self.state.clear_answer(&section, &question_id);
                }
                Vec::new()
            }
            ShellEvent::Review { question_id, text } => {
                if let Some(section) = self.current_section() {
                    self.state.set_review(&section, &question_id, &text);
                }
                Vec::new()
            }
            ShellEvent::UpdateCode { question_id, code, language } => {
                if self.current_section().is_some() {
                    self.state.set_code_draft(&question_id, &CodeDraft { code, language });
                    self.last_code_question = Some(question_id);
                }
                Vec::new()
            }
            ShellEvent::RunCode { question_id } => self.run_code(&question_id),
            ShellEvent::NextSection => match self.current_section() {
                Some(section) => self.advance_from(&section, None),
                None => Vec::new(),
            },
            ShellEvent::LeaveSection => self.leave_section(),
            ShellEvent::FinishExam => self.finish_exam(),
            ShellEvent::ReturnHome => self.return_home(),
        }
    }

    /// Timer tick: broadcasts countdowns and auto-advances an expired section.
    pub(crate) fn tick(&mut self) -> Vec<Effect> {
        if !self.is_monitoring() {
            return Vec::new();
        }
        let Some(sequencer) = self.sequencer.as_mut() else {
            return Vec::new();
        };

        let mut effects =
            vec![Effect::Shell(Directive::Timers { sections: sequencer.views() })];
        if let Some(expired) = sequencer.tick() {
            effects.push(Effect::Shell(Directive::SectionExpired { section: expired.clone() }));
            effects.extend(self.advance_from(&expired, None));
        }
        effects
    }

    /// Drift poll: the same correction path as URL change events.
    pub(crate) fn poll(&mut self) -> Vec<Effect> {
        let now = self.now();
        revert_effects(self.gate.poll_drift(now))
    }

    pub(crate) fn on_login(
        &mut self,
        candidate_id: &str,
        result: anyhow::Result<Option<LoginResponse>>,
    ) -> Vec<Effect> {
        let response = match result {
            Ok(Some(response)) => response,
            Ok(None) => {
                tracing::info!(candidate_id, "Login rejected");
                return vec![Effect::notice(INVALID_CREDENTIALS)];
            }
            Err(err) => {
                tracing::warn!(candidate_id, error = ?err, "Login request failed");
                return vec![Effect::notice(LOGIN_FAILED)];
            }
        };

        let candidate = response.candidate;
        if self.state.is_disqualified() {
            self.state.set_candidate(&CandidateIdentity { id: candidate.id.clone(), name: candidate.name });
            self.state.set_access_token(&response.access_token);
            self.halt();
            tracing::warn!(candidate_id = %candidate.id, "Disqualified candidate logged in again");
            return self.go(Location::at(routes::FINAL), true);
        }

        if self.state.timer_owner().as_deref() != Some(candidate.id.as_str()) {
            if let Some(sequencer) = self.sequencer.as_ref() {
                for section in sequencer.plan().ids() {
                    self.state.clear_section_start(section);
                }
            }
            self.state.set_timer_owner(&candidate.id);
        }

        self.state.clear_candidate_session();
        self.controller.reset();
        if let Some(sequencer) = self.sequencer.as_mut() {
            sequencer.reset();
        }
        self.last_section = None;
        self.last_code_question = None;

        self.state.set_candidate(&CandidateIdentity { id: candidate.id.clone(), name: candidate.name });
        self.state.set_access_token(&response.access_token);
        tracing::info!(candidate_id = %candidate.id, "Candidate logged in");

        self.go(Location::at(routes::RULES), true)
    }

    pub(crate) fn on_tests_finished(
        &mut self,
        question_id: &str,
        code: &str,
        language: &str,
        results: Vec<TestOutcome>,
    ) -> Vec<Effect> {
        let attempt = CodeAttempt::new(code, language, results, self.now());
        let summary = attempt.summary();
        let mut effects = vec![Effect::Shell(Directive::Output {
            question_id: question_id.to_string(),
            text: summary,
            attempt: Some(attempt.clone()),
        })];

        let Some(section) = self.section_of_question(question_id) else {
            return effects;
        };
        match serde_json::to_value(&attempt) {
            Ok(value) => self.state.set_answer(&section, question_id, value),
            Err(err) => tracing::error!(error = %err, "Failed to encode code attempt"),
        }
        self.last_code_question = Some(question_id.to_string());

        if self.controller.is_disqualified() {
            return effects;
        }
        let report = scoring::run_report(&attempt.results);
        effects.extend(self.submission(&section, Some(report)));
        effects
    }

    /// Performs a navigation the runtime deferred (grace delay or awaited submissions).
    pub(crate) fn navigate_now(&mut self, location: Location) -> Vec<Effect> {
        self.go(location, true)
    }

    fn enter_route(&mut self, href: &str, navigation_id: &str) -> Vec<Effect> {
        let location = Location::parse(href);

        match check_route(&location, &self.state) {
            RouteDecision::Redirect(target) if target.path != routes::FINAL && self.is_gated() => {
                tracing::warn!(from = %location, "Protected route entered mid-flow; restoring");
                return self.restore_canonical();
            }
            RouteDecision::Redirect(target) => {
                tracing::info!(from = %location, to = %target, "Protected route redirected");
                return self.go(target, true);
            }
            RouteDecision::Render if location.path == routes::FINAL && self.state.is_disqualified() => {
                let now = self.now();
                self.halt();
                self.gate.commit(location, now);
                return vec![Effect::Shell(Directive::Screen { screen: Screen::Final { disqualified: true } })];
            }
            RouteDecision::Render => {}
        }

        let now = self.now();
        match self.gate.on_route_enter(location.clone(), navigation_id, now) {
            EntryDecision::RedirectHome => vec![Effect::navigate(&Location::home(), true)],
            EntryDecision::Restore { .. } => self.restore_canonical(),
            EntryDecision::Render => self.render(&location),
        }
    }

    fn render(&mut self, location: &Location) -> Vec<Effect> {
        match location.safe_route() {
            None => Vec::new(),
            Some(SafeRoute::Sections) => {
                let Some(sequencer) = self.sequencer.as_mut() else {
                    return self.no_exam();
                };
                sequencer.leave_to_selection();
                vec![self.sections_screen()]
            }
            Some(SafeRoute::Exam) => {
                let Some(section) = location.section() else {
                    return self.go(Location::at(routes::SECTIONS), true);
                };
                let Some(sequencer) = self.sequencer.as_mut() else {
                    return self.no_exam();
                };
                if sequencer.current().is_some_and(|current| current.id == section) {
                    let remaining_seconds = sequencer
                        .views()
                        .into_iter()
                        .find(|view| view.id == section)
                        .map(|view| view.remaining_seconds)
                        .unwrap_or_default();
                    self.last_section = Some(section.clone());
                    return vec![exam_screen(section, remaining_seconds)];
                }
                match sequencer.enter(&section) {
                    EnterOutcome::Entered { section, remaining_seconds } => {
                        self.last_section = Some(section.clone());
                        vec![exam_screen(section, remaining_seconds)]
                    }
                    refused => {
                        let mut effects = refusal_notice(&section, &refused);
                        effects.extend(self.go(Location::at(routes::SECTIONS), true));
                        effects
                    }
                }
            }
            Some(SafeRoute::Final) => {
                let disqualified = self.controller.is_disqualified();
                vec![Effect::Shell(Directive::Screen { screen: Screen::Final { disqualified } })]
            }
        }
    }

    fn on_history_traversal(&mut self) -> Vec<Effect> {
        if !self.is_gated() {
            return Vec::new();
        }
        let href = self.gate.on_history_traversal().href();
        vec![
            Effect::Shell(Directive::PushHistory { href: href.clone() }),
            Effect::Shell(Directive::ReplaceUrl { href }),
        ]
    }

    fn on_browser_signal(&mut self, signal: &BrowserSignal) -> Vec<Effect> {
        if !self.is_gated() {
            return Vec::new();
        }

        let detection = classify(signal);
        let intercepted = match signal {
            BrowserSignal::KeyDown(stroke) => self.gate.intercept_key(stroke),
            _ => false,
        };
        if detection.focus_regained {
            self.controller.focus_regained();
        }

        let mut effects = Vec::new();
        if detection.prevent || intercepted {
            effects.push(Effect::Shell(Directive::Suppress));
        }
        if let Some(violation) = detection.violation {
            if self.is_monitoring() {
                effects.extend(self.escalate(&violation));
            }
        }
        effects
    }

    fn escalate(&mut self, violation: &Violation) -> Vec<Effect> {
        metrics::counter!(VIOLATIONS_TOTAL, "kind" => violation.kind.as_str()).increment(1);

        match self.controller.record(violation) {
            Escalation::Ignored => Vec::new(),
            Escalation::Warned { count, .. } => {
                let mut effects = vec![Effect::Shell(Directive::Warning {
                    count,
                    max: self.controller.max_warnings(),
                    reason: violation.reason.clone(),
                })];
                if let Some(section) = self.active_section() {
                    effects.extend(self.submission(&section, None));
                }
                effects
            }
            Escalation::Disqualified { count } => {
                metrics::counter!(DISQUALIFICATIONS_TOTAL).increment(1);
                tracing::warn!(warnings = count, section = ?self.active_section(), "Forcing terminal transition");
                self.halt();
                let final_location = Location::at(routes::FINAL);
                let now = self.now();
                self.gate.authorize(SafeRoute::Final, now);

                let mut effects = vec![Effect::Shell(Directive::Disqualified {
                    reason: DISQUALIFIED_MESSAGE.to_string(),
                    redirect_in_ms: self.policy.disqualify_redirect_ms,
                })];
                if let Some(section) = self.active_section() {
                    effects.extend(self.submission(&section, None));
                }
                effects.push(Effect::NavigateAfter {
                    location: final_location,
                    delay_ms: self.policy.disqualify_redirect_ms,
                });
                effects
            }
        }
    }

    fn start_exam(&mut self, agreed: bool) -> Vec<Effect> {
        if self.state.candidate().is_none() {
            return self.go(Location::at(routes::LOGIN), true);
        }
        if !agreed {
            return vec![Effect::notice(RULES_NOT_ACCEPTED)];
        }
        if self.sequencer.is_none() {
            return self.no_exam();
        }
        tracing::info!("Rules accepted; opening section selection");
        self.go(Location::at(routes::SECTIONS), true)
    }

    fn select_section(&mut self, section: &SectionId) -> Vec<Effect> {
        if self.gate.canonical().path != routes::SECTIONS {
            return Vec::new();
        }
        let Some(sequencer) = self.sequencer.as_mut() else {
            return self.no_exam();
        };

        match sequencer.enter(section) {
            EnterOutcome::Entered { section, .. } => {
                self.last_section = Some(section.clone());
                self.go(Location::exam(&section), false)
            }
            refused => {
                let mut effects = refusal_notice(section, &refused);
                effects.push(self.sections_screen());
                effects
            }
        }
    }

    fn run_code(&mut self, question_id: &str) -> Vec<Effect> {
        let output = |text: &str| {
            Effect::Shell(Directive::Output {
                question_id: question_id.to_string(),
                text: text.to_string(),
                attempt: None,
            })
        };

        let Some(question) = self.current_plan_section().and_then(|section| {
            section.questions.iter().find(|question| question.id.as_str() == question_id).cloned()
        }) else {
            return Vec::new();
        };

        let draft = self.state.code_draft(question_id).filter(|draft| !draft.code.trim().is_empty());
        let Some(draft) = draft else {
            return vec![output(scoring::EMPTY_CODE_MESSAGE)];
        };
        if question.test_cases.is_empty() {
            return vec![output(scoring::NO_CASES_MESSAGE)];
        }

        self.last_code_question = Some(question_id.to_string());
        vec![
            output(scoring::RUNNING_MESSAGE),
            Effect::RunTests {
                question_id: question_id.to_string(),
                code: draft.code,
                language: draft.language,
                cases: question.test_cases,
            },
        ]
    }

    /// Shared by the manual "next" action and timer expiry.
    fn advance_from(&mut self, section: &SectionId, output: Option<String>) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self.submission(section, output).into_iter().collect();
        let Some(sequencer) = self.sequencer.as_mut() else {
            return effects;
        };

        match sequencer.advance() {
            AdvanceOutcome::Entered { to, remaining_seconds, .. } => {
                self.last_section = Some(to.clone());
                effects.extend(self.go(Location::exam(&to), true));
                effects.push(exam_screen(to, remaining_seconds));
            }
            AdvanceOutcome::ToSelection { .. } => {
                effects.extend(self.go(Location::at(routes::SECTIONS), true));
            }
            AdvanceOutcome::NotInSection => {}
        }
        effects
    }

    fn leave_section(&mut self) -> Vec<Effect> {
        let Some(section) = self.current_section() else {
            return Vec::new();
        };
        let mut effects: Vec<Effect> = self.submission(&section, None).into_iter().collect();
        if let Some(sequencer) = self.sequencer.as_mut() {
            sequencer.leave_to_selection();
        }
        effects.extend(self.go(Location::at(routes::SECTIONS), true));
        effects
    }

    fn finish_exam(&mut self) -> Vec<Effect> {
        let Some(sequencer) = self.sequencer.as_mut() else {
            return Vec::new();
        };
        if !sequencer.finish() {
            return vec![Effect::notice(SECTIONS_INCOMPLETE)];
        }
        tracing::info!("All sections completed; waiting for submissions before finishing");
        vec![Effect::AwaitSubmissions { then: Location::at(routes::FINAL) }]
    }

    fn return_home(&mut self) -> Vec<Effect> {
        if self.gate.canonical().path != routes::FINAL {
            return Vec::new();
        }
        tracing::info!(candidate = ?self.state.candidate().map(|c| c.id), "Candidate session ended");
        self.state.clear_candidate_session();
        self.controller.reset();
        if let Some(sequencer) = self.sequencer.as_mut() {
            sequencer.reset();
        }
        self.last_section = None;
        self.last_code_question = None;
        self.go(Location::home(), true)
    }

    /// Moves the canonical location and tells the shell to follow. Entering a different
    /// gated path issues its single-use token first; query-only changes inside the exam
    /// screen do not remount the route and need none.
    fn go(&mut self, location: Location, replace: bool) -> Vec<Effect> {
        let now = self.now();
        if let Some(route) = location.safe_route() {
            if self.gate.canonical().path != location.path {
                self.gate.authorize(route, now);
            }
        }
        self.gate.commit(location.clone(), now);
        vec![Effect::navigate(&location, replace)]
    }

    /// Sends the shell back to the canonical gated location with a fresh entry token,
    /// since the remount has to pass the gate again.
    fn restore_canonical(&mut self) -> Vec<Effect> {
        let now = self.now();
        let location = self.gate.canonical().clone();
        if let Some(route) = location.safe_route() {
            self.gate.authorize(route, now);
        }
        self.gate.commit(location.clone(), now);
        vec![Effect::navigate(&location, true)]
    }

    fn submission(&self, section: &SectionId, output: Option<String>) -> Option<Effect> {
        let candidate = self.state.candidate()?;
        let plan = self.sequencer.as_ref()?.plan().section(section)?;
        let answers = self.state.section_answers(section);
        let score = scoring::section_score(plan, &answers);

        let draft = self
            .last_code_question
            .as_deref()
            .filter(|question_id| plan.questions.iter().any(|q| q.id.as_str() == *question_id))
            .and_then(|question_id| self.state.code_draft(question_id));

        Some(Effect::Submit {
            access_token: self.state.access_token(),
            payload: SubmitRequest {
                candidate_id: candidate.id,
                section: section.to_string(),
                disqualified: self.controller.is_disqualified(),
                warning_count: self.controller.warnings(),
                answers,
                reviews: self.state.section_reviews(section),
                code: draft.as_ref().map(|draft| draft.code.clone()),
                language: draft.map(|draft| draft.language),
                score: Some(score),
                output,
            },
        })
    }

    fn section_of_question(&self, question_id: &str) -> Option<SectionId> {
        self.sequencer.as_ref()?.plan().sections().iter().find_map(|section| {
            section
                .questions
                .iter()
                .any(|question| question.id.as_str() == question_id)
                .then(|| section.id.clone())
        })
    }

    fn current_section(&self) -> Option<SectionId> {
        self.sequencer.as_ref()?.current().map(|section| section.id.clone())
    }

    fn current_plan_section(&self) -> Option<&SectionPlan> {
        self.sequencer.as_ref()?.current()
    }

    fn active_section(&self) -> Option<SectionId> {
        self.current_section().or_else(|| self.last_section.clone())
    }

    fn sections_screen(&self) -> Effect {
        let (sections, all_completed) = match self.sequencer.as_ref() {
            Some(sequencer) => (sequencer.views(), sequencer.all_completed()),
            None => (Vec::new(), false),
        };
        Effect::Shell(Directive::Screen { screen: Screen::Sections { sections, all_completed } })
    }

    fn no_exam(&mut self) -> Vec<Effect> {
        tracing::warn!("No exam plan available; returning home");
        let mut effects = vec![Effect::notice(NO_ACTIVE_EXAM)];
        effects.extend(self.go(Location::home(), true));
        effects
    }

    fn halt(&mut self) {
        if let Some(sequencer) = self.sequencer.as_mut() {
            sequencer.halt();
        }
    }

    /// The gate only acts while a gated route is canonical.
    fn is_gated(&self) -> bool {
        self.gate.canonical().safe_route().is_some()
    }

    /// Violations count on the selection and exam screens for a logged-in, clean candidate.
    fn is_monitoring(&self) -> bool {
        matches!(self.gate.canonical().safe_route(), Some(SafeRoute::Sections | SafeRoute::Exam))
            && !self.controller.is_disqualified()
            && self.state.candidate().is_some()
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }
}

fn revert_effects(decision: GateDecision) -> Vec<Effect> {
    match decision {
        GateDecision::Revert { to } => vec![Effect::Shell(Directive::ReplaceUrl { href: to.href() })],
        GateDecision::Accept | GateDecision::Defer => Vec::new(),
    }
}

fn exam_screen(section: SectionId, remaining_seconds: u64) -> Effect {
    Effect::Shell(Directive::Screen { screen: Screen::Exam { section, remaining_seconds } })
}

fn refusal_notice(section: &SectionId, outcome: &EnterOutcome) -> Vec<Effect> {
    let message = match outcome {
        EnterOutcome::Expired => format!("Section {section} has expired."),
        EnterOutcome::AlreadyCompleted => format!("Section {section} is already completed."),
        EnterOutcome::Unknown => format!("Section {section} does not exist."),
        EnterOutcome::Halted | EnterOutcome::Entered { .. } => return Vec::new(),
    };
    vec![Effect::notice(message)]
}
