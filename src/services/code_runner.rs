use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;
use crate::proctoring::ports::CodeRunner;
use crate::proctoring::scoring::{piston_language, Execution};

const NO_OUTPUT: &str = "No output returned";
const TRANSPORT_FAILURE: &str = "Execution failed (Network/API)";

/// Piston sandbox client. Every failure is folded into `Execution::error`.
#[derive(Debug, Clone)]
pub(crate) struct PistonRunner {
    client: Client,
    url: String,
}

impl PistonRunner {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(settings.execution().timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, url: settings.execution().piston_url.clone() })
    }

    async fn post(&self, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .context("Failed to call code sandbox")?;

        response.json::<Value>().await.context("Failed to parse sandbox response")
    }
}

#[async_trait]
impl CodeRunner for PistonRunner {
    async fn execute(&self, language: &str, code: &str, stdin: &str) -> Execution {
        let body = request_body(language, code, stdin);

        match self.post(&body).await {
            Ok(payload) => parse_response(&payload),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), language, "Code execution failed");
                Execution { stdout: String::new(), error: Some(TRANSPORT_FAILURE.to_string()) }
            }
        }
    }
}

fn request_body(label: &str, code: &str, stdin: &str) -> Value {
    let (language, version) = piston_language(label);
    json!({
        "language": language,
        "version": version,
        "files": [{"content": code}],
        "stdin": stdin,
    })
}

fn parse_response(payload: &Value) -> Execution {
    let Some(run) = payload.get("run").filter(|run| run.is_object()) else {
        return Execution { stdout: String::new(), error: Some(NO_OUTPUT.to_string()) };
    };

    let stdout = run.get("stdout").and_then(Value::as_str).unwrap_or_default().trim().to_string();
    let error = run
        .get("stderr")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|stderr| !stderr.is_empty())
        .map(str::to_string);

    Execution { stdout, error }
}
