//! Event loop around one [`ProctoringSession`].
//!
//! A single task owns the session, so every state transition happens in order on one
//! logical thread. Network work runs in spawned tasks that report back through an
//! internal channel; submissions are fire-and-forget until a final submission waits for
//! them.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

use crate::core::metrics::SUBMISSIONS_FAILED_TOTAL;
use crate::proctoring::effects::{Directive, Effect};
use crate::proctoring::model::{ExamPlan, Location};
use crate::proctoring::ports::{CandidateAuth, CodeRunner, ExamSource, SubmissionApi};
use crate::proctoring::scoring::{evaluate_case, TestOutcome};
use crate::proctoring::session::{ProctoringSession, ShellEvent};
use crate::schemas::auth::LoginResponse;

#[derive(Clone)]
pub(crate) struct Collaborators {
    pub(crate) submissions: Arc<dyn SubmissionApi>,
    pub(crate) exams: Arc<dyn ExamSource>,
    pub(crate) runner: Arc<dyn CodeRunner>,
    pub(crate) auth: Arc<dyn CandidateAuth>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Cadence {
    pub(crate) tick: Duration,
    pub(crate) poll: Duration,
}

impl Cadence {
    pub(crate) fn from_millis(tick_ms: u64, poll_ms: u64) -> Self {
        Self { tick: Duration::from_millis(tick_ms), poll: Duration::from_millis(poll_ms) }
    }
}

enum Completion {
    LoggedIn { candidate_id: String, result: Result<Option<LoginResponse>> },
    TestsFinished { question_id: String, code: String, language: String, results: Vec<TestOutcome> },
    Navigate(Location),
}

struct Runtime {
    session: ProctoringSession,
    ports: Collaborators,
    directives: mpsc::Sender<Directive>,
    completions: mpsc::UnboundedSender<Completion>,
    pending: Vec<JoinHandle<()>>,
}

pub(crate) async fn run(
    session: ProctoringSession,
    ports: Collaborators,
    cadence: Cadence,
    mut events: mpsc::Receiver<ShellEvent>,
    directives: mpsc::Sender<Directive>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (completions, mut completed) = mpsc::unbounded_channel();
    let mut runtime = Runtime { session, ports, directives, completions, pending: Vec::new() };
    runtime.load_exam().await;

    let mut tick = interval(cadence.tick);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut poll = interval(cadence.poll);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let effects = tokio::select! {
            _ = shutdown.changed() => break,
            event = events.recv() => match event {
                Some(event) => runtime.session.handle(event),
                None => {
                    tracing::info!("Shell input closed");
                    break;
                }
            },
            Some(done) = completed.recv() => runtime.complete(done).await,
            _ = tick.tick() => runtime.session.tick(),
            _ = poll.tick() => runtime.session.poll(),
        };

        if !runtime.dispatch(effects).await {
            tracing::info!("Shell output closed");
            break;
        }
    }

    for handle in runtime.pending.drain(..) {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Submission task join failed");
        }
    }

    tracing::info!(
        candidate = ?runtime.session.state().candidate().map(|candidate| candidate.id),
        warnings = runtime.session.controller().warnings(),
        disqualified = runtime.session.controller().is_disqualified(),
        "Proctoring runtime stopped"
    );
    Ok(())
}

impl Runtime {
    async fn load_exam(&mut self) {
        if self.session.has_plan() {
            return;
        }
        match self.ports.exams.active_exam().await {
            Ok(Some(definition)) => match ExamPlan::from_definition(&definition) {
                Ok(plan) => self.session.install_plan(plan),
                Err(err) => tracing::error!(error = %err, "Active exam is not usable"),
            },
            Ok(None) => tracing::warn!("No active exam published"),
            Err(err) => tracing::warn!(error = ?err, "Failed to fetch active exam"),
        }
    }

    async fn complete(&mut self, done: Completion) -> Vec<Effect> {
        match done {
            Completion::LoggedIn { candidate_id, result } => {
                if matches!(result, Ok(Some(_))) {
                    self.load_exam().await;
                }
                self.session.on_login(&candidate_id, result)
            }
            Completion::TestsFinished { question_id, code, language, results } => {
                self.session.on_tests_finished(&question_id, &code, &language, results)
            }
            Completion::Navigate(location) => self.session.navigate_now(location),
        }
    }

    /// Returns false once the shell stopped reading directives.
    async fn dispatch(&mut self, effects: Vec<Effect>) -> bool {
        for effect in effects {
            match effect {
                Effect::Shell(directive) => {
                    if self.directives.send(directive).await.is_err() {
                        return false;
                    }
                }
                Effect::Submit { access_token, payload } => {
                    let submissions = self.ports.submissions.clone();
                    self.pending.retain(|handle| !handle.is_finished());
                    self.pending.push(tokio::spawn(async move {
                        match submissions.submit(access_token.as_deref(), &payload).await {
                            Ok(response) => tracing::info!(
                                section = %payload.section,
                                total_score = response.total_score,
                                "Progress submitted"
                            ),
                            Err(err) => {
                                metrics::counter!(SUBMISSIONS_FAILED_TOTAL).increment(1);
                                tracing::warn!(
                                    section = %payload.section,
                                    error = ?err,
                                    "Progress submission failed"
                                );
                            }
                        }
                    }));
                }
                Effect::AwaitSubmissions { then } => {
                    let pending = std::mem::take(&mut self.pending);
                    let completions = self.completions.clone();
                    tokio::spawn(async move {
                        for handle in pending {
                            if let Err(err) = handle.await {
                                tracing::error!(error = %err, "Submission task join failed");
                            }
                        }
                        let _ = completions.send(Completion::Navigate(then));
                    });
                }
                Effect::NavigateAfter { location, delay_ms } => {
                    let completions = self.completions.clone();
                    tokio::spawn(async move {
                        sleep(Duration::from_millis(delay_ms)).await;
                        let _ = completions.send(Completion::Navigate(location));
                    });
                }
                Effect::Authenticate { candidate_id, password } => {
                    let auth = self.ports.auth.clone();
                    let completions = self.completions.clone();
                    tokio::spawn(async move {
                        let result = auth.login(&candidate_id, &password).await;
                        let _ = completions.send(Completion::LoggedIn { candidate_id, result });
                    });
                }
                Effect::RunTests { question_id, code, language, cases } => {
                    let runner = self.ports.runner.clone();
                    let completions = self.completions.clone();
                    tokio::spawn(async move {
                        let mut results = Vec::with_capacity(cases.len());
                        for (index, case) in cases.iter().enumerate() {
                            let run = runner.execute(&language, &code, &case.input).await;
                            results.push(evaluate_case(index, case, &run));
                        }
                        tracing::info!(
                            question_id = %question_id,
                            passed = results.iter().filter(|r| r.passed).count(),
                            total = results.len(),
                            "Test cases executed"
                        );
                        let _ = completions.send(Completion::TestsFinished {
                            question_id,
                            code,
                            language,
                            results,
                        });
                    });
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proctoring::detector::BrowserSignal;
    use crate::proctoring::session::ProctorPolicy;
    use crate::test_support::{fake_collaborators, memory_state, sample_exam, FakePorts, ManualClock};

    struct Shell {
        events: mpsc::Sender<ShellEvent>,
        directives: mpsc::Receiver<Directive>,
        nav: u32,
    }

    impl Shell {
        async fn send(&self, event: ShellEvent) {
            self.events.send(event).await.expect("runtime alive");
        }

        /// Next navigation directive, skipping everything else.
        async fn navigation(&mut self) -> String {
            loop {
                match self.directives.recv().await.expect("directive") {
                    Directive::Navigate { href, .. } => return href,
                    _ => continue,
                }
            }
        }

        async fn wait_for(&mut self, wanted: impl Fn(&Directive) -> bool) -> Directive {
            loop {
                let directive = self.directives.recv().await.expect("directive");
                if wanted(&directive) {
                    return directive;
                }
            }
        }

        /// Follows a navigation the way a router would: URL first, then the mount.
        async fn arrive(&mut self, href: &str) {
            self.nav += 1;
            let navigation_id = format!("nav-{}", self.nav);
            self.send(ShellEvent::UrlChanged { href: href.into(), navigation_id: navigation_id.clone() })
                .await;
            self.send(ShellEvent::RouteEntered { href: href.into(), navigation_id }).await;
        }
    }

    fn start(ports: &FakePorts) -> (Shell, watch::Sender<bool>, JoinHandle<Result<()>>) {
        let clock = ManualClock::new(5_000_000);
        let session = ProctoringSession::new(memory_state(), clock, ProctorPolicy::default());
        let (event_tx, event_rx) = mpsc::channel(64);
        let (directive_tx, directive_rx) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(
            session,
            fake_collaborators(ports),
            Cadence::from_millis(1_000, 25),
            event_rx,
            directive_tx,
            shutdown_rx,
        ));
        (Shell { events: event_tx, directives: directive_rx, nav: 0 }, shutdown_tx, handle)
    }

    async fn enter_section_a(shell: &mut Shell) {
        shell.send(ShellEvent::AppLoaded { href: "/".into(), navigation_id: "nav-0".into() }).await;
        shell
            .send(ShellEvent::Login { candidate_id: "CAND-1".into(), password: "secret".into() })
            .await;
        let rules = shell.navigation().await;
        assert_eq!(rules, "/rules");
        shell.arrive(&rules).await;

        shell.send(ShellEvent::StartExam { agreed: true }).await;
        let sections = shell.navigation().await;
        assert_eq!(sections, "/sections");
        shell.arrive(&sections).await;

        shell.send(ShellEvent::SelectSection { section: "A".into() }).await;
        let exam = shell.navigation().await;
        assert_eq!(exam, "/exam?section=A");
        shell.arrive(&exam).await;
    }

    #[tokio::test(start_paused = true)]
    async fn disqualification_submits_and_redirects_after_grace_delay() {
        let ports = FakePorts::new(Some(sample_exam()));
        let (mut shell, shutdown, handle) = start(&ports);
        enter_section_a(&mut shell).await;

        for _ in 0..3 {
            shell.send(ShellEvent::Browser(BrowserSignal::VisibilityChange { hidden: true })).await;
            shell.send(ShellEvent::Browser(BrowserSignal::VisibilityChange { hidden: false })).await;
        }

        shell.wait_for(|d| matches!(d, Directive::Disqualified { .. })).await;
        let before = tokio::time::Instant::now();
        assert_eq!(shell.navigation().await, "/final");
        assert!(before.elapsed() >= Duration::from_millis(1_400));

        shutdown.send(true).expect("shutdown");
        handle.await.expect("join").expect("runtime");

        let sent = ports.submitted();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|payload| payload.section == "A"));
        assert_eq!(sent.iter().filter(|payload| payload.disqualified).count(), 1);
        assert_eq!(sent.iter().map(|payload| payload.warning_count).max(), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submissions_do_not_block_progress() {
        let ports = FakePorts::new(Some(sample_exam()));
        ports.fail_submissions();
        let (mut shell, shutdown, handle) = start(&ports);
        enter_section_a(&mut shell).await;

        shell.send(ShellEvent::NextSection).await;
        assert_eq!(shell.navigation().await, "/exam?section=B");

        shutdown.send(true).expect("shutdown");
        handle.await.expect("join").expect("runtime");
        assert_eq!(ports.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn code_runs_report_results_and_submit() {
        let ports = FakePorts::new(Some(sample_exam()));
        let (mut shell, shutdown, handle) = start(&ports);
        enter_section_a(&mut shell).await;
        shell.send(ShellEvent::LeaveSection).await;
        let sections = shell.navigation().await;
        shell.arrive(&sections).await;
        shell.send(ShellEvent::SelectSection { section: "C".into() }).await;
        let exam = shell.navigation().await;
        shell.arrive(&exam).await;

        shell
            .send(ShellEvent::UpdateCode {
                question_id: "c1".into(),
                code: "print(sum(map(int, input().split())))".into(),
                language: "Python".into(),
            })
            .await;
        shell.send(ShellEvent::RunCode { question_id: "c1".into() }).await;

        let output = shell
            .wait_for(|d| matches!(d, Directive::Output { attempt: Some(_), .. }))
            .await;
        let Directive::Output { text, .. } = output else { unreachable!() };
        assert_eq!(text, crate::proctoring::scoring::ALL_PASSED_MESSAGE);

        shutdown.send(true).expect("shutdown");
        handle.await.expect("join").expect("runtime");
        let coding = ports.submitted().into_iter().find(|payload| payload.section == "C");
        assert_eq!(
            coding.and_then(|payload| payload.output),
            Some("Task 1: PASS\nTask 2: PASS".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_exam_sends_the_candidate_home() {
        let ports = FakePorts::new(None);
        let (mut shell, shutdown, handle) = start(&ports);

        shell.send(ShellEvent::AppLoaded { href: "/".into(), navigation_id: "nav-0".into() }).await;
        shell
            .send(ShellEvent::Login { candidate_id: "CAND-1".into(), password: "secret".into() })
            .await;
        let rules = shell.navigation().await;
        shell.arrive(&rules).await;
        shell.send(ShellEvent::StartExam { agreed: true }).await;

        let notice = shell.wait_for(|d| matches!(d, Directive::Notice { .. })).await;
        assert_eq!(
            notice,
            Directive::Notice { message: crate::proctoring::session::NO_ACTIVE_EXAM.into() }
        );
        assert_eq!(shell.navigation().await, "/");

        shutdown.send(true).expect("shutdown");
        handle.await.expect("join").expect("runtime");
    }
}
