//! Line-delimited JSON transport between the browser shell and the proctoring runtime.
//! Each input line is one `ShellEvent`; each output line is one `Directive`.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};

use crate::proctoring::effects::Directive;
use crate::proctoring::runtime::{self, Cadence, Collaborators};
use crate::proctoring::session::{ProctoringSession, ShellEvent};

const EVENT_BUFFER: usize = 256;
const DIRECTIVE_BUFFER: usize = 256;

pub(crate) async fn serve<R, W>(
    input: R,
    output: W,
    session: ProctoringSession,
    ports: Collaborators,
    cadence: Cadence,
    shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let (directive_tx, directive_rx) = mpsc::channel(DIRECTIVE_BUFFER);

    let reader = tokio::spawn(read_events(input, event_tx));
    let writer = tokio::spawn(write_directives(output, directive_rx));

    let result = runtime::run(session, ports, cadence, event_rx, directive_tx, shutdown).await;

    reader.abort();
    match writer.await {
        Ok(Err(err)) => tracing::warn!(error = %format!("{err:#}"), "Directive writer failed"),
        Err(err) if !err.is_cancelled() => {
            tracing::error!(error = %err, "Directive writer task failed")
        }
        _ => {}
    }

    result
}

async fn read_events<R>(input: R, events: mpsc::Sender<ShellEvent>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read shell input")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ShellEvent>(line) {
            Ok(event) => {
                if events.send(event).await.is_err() {
                    break;
                }
            }
            Err(err) => tracing::warn!(error = %err, "Ignoring malformed shell event"),
        }
    }

    Ok(())
}

async fn write_directives<W>(mut output: W, mut directives: mpsc::Receiver<Directive>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(directive) = directives.recv().await {
        let mut line = serde_json::to_vec(&directive).context("Failed to encode directive")?;
        line.push(b'\n');
        output.write_all(&line).await.context("Failed to write directive")?;
        output.flush().await.context("Failed to flush directive")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proctoring::session::ProctorPolicy;
    use crate::test_support::{fake_collaborators, memory_state, sample_exam, FakePorts, ManualClock};
    use serde_json::Value;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

    async fn next_navigation(
        lines: &mut tokio::io::Lines<BufReader<tokio::io::DuplexStream>>,
    ) -> Value {
        loop {
            let line = lines.next_line().await.expect("read").expect("line");
            let value: Value = serde_json::from_str(&line).expect("directive json");
            if value["directive"] == "navigate" {
                return value;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn login_line_produces_navigation_line() {
        let ports = FakePorts::new(Some(sample_exam()));
        let session = ProctoringSession::new(
            memory_state(),
            ManualClock::new(1_000_000),
            ProctorPolicy::default(),
        );
        let (mut shell_in, bridge_in) = duplex(4096);
        let (bridge_out, shell_out) = duplex(64 * 1024);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(serve(
            bridge_in,
            bridge_out,
            session,
            fake_collaborators(&ports),
            Cadence::from_millis(1_000, 25),
            shutdown_rx,
        ));

        shell_in
            .write_all(
                b"{\"event\":\"app_loaded\",\"href\":\"/\"}\nnot json\n\n\
                  {\"event\":\"login\",\"candidateId\":\"CAND-1\",\"password\":\"secret\"}\n",
            )
            .await
            .expect("write");

        let mut lines = BufReader::new(shell_out).lines();
        let navigation = next_navigation(&mut lines).await;
        assert_eq!(navigation["href"], "/rules");

        shutdown_tx.send(true).expect("shutdown");
        handle.await.expect("join").expect("bridge");
    }

    #[tokio::test(start_paused = true)]
    async fn closed_input_stops_the_bridge() {
        let ports = FakePorts::new(None);
        let session =
            ProctoringSession::new(memory_state(), ManualClock::new(0), ProctorPolicy::default());
        let (shell_in, bridge_in) = duplex(1024);
        let (bridge_out, _shell_out) = duplex(64 * 1024);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        drop(shell_in);
        serve(
            bridge_in,
            bridge_out,
            session,
            fake_collaborators(&ports),
            Cadence::from_millis(1_000, 25),
            shutdown_rx,
        )
        .await
        .expect("bridge");
    }
}
