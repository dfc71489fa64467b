use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::core::config::Settings;
use crate::proctoring::ports::{CandidateAuth, ExamSource, SubmissionApi};
use crate::schemas::auth::LoginResponse;
use crate::schemas::exam::ExamDefinition;
use crate::schemas::result::{SubmitRequest, SubmitResponse};

/// HTTP client for the results backend, used by the candidate runtime.
#[derive(Debug, Clone)]
pub(crate) struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: api_base(
                &settings.proctoring().api_base_url,
                &settings.api().api_v1_str,
            ),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn api_base(base_url: &str, api_v1: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), api_v1.trim_matches('/'))
}

async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    let detail = body.get("detail").and_then(Value::as_str).unwrap_or("no detail");
    format!("{status}: {detail}")
}

#[async_trait]
impl SubmissionApi for BackendClient {
    async fn submit(
        &self,
        access_token: Option<&str>,
        payload: &SubmitRequest,
    ) -> Result<SubmitResponse> {
        let mut request = self.client.post(self.url("/submit")).json(payload);
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("Failed to reach results backend")?;
        if !response.status().is_success() {
            anyhow::bail!("Submission rejected ({})", error_detail(response).await);
        }

        response.json::<SubmitResponse>().await.context("Failed to parse submission response")
    }
}

#[async_trait]
impl ExamSource for BackendClient {
    async fn active_exam(&self) -> Result<Option<ExamDefinition>> {
        let response = self
            .client
            .get(self.url("/exam/active"))
            .send()
            .await
            .context("Failed to reach results backend")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Active exam request failed ({})", error_detail(response).await);
        }

        let exam =
            response.json::<ExamDefinition>().await.context("Failed to parse exam definition")?;
        Ok(Some(exam))
    }
}

#[async_trait]
impl CandidateAuth for BackendClient {
    async fn login(&self, candidate_id: &str, password: &str) -> Result<Option<LoginResponse>> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({"candidate_id": candidate_id, "password": password}))
            .send()
            .await
            .context("Failed to reach results backend")?;

        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST) {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Login request failed ({})", error_detail(response).await);
        }

        let login = response.json::<LoginResponse>().await.context("Failed to parse login")?;
        Ok(Some(login))
    }
}
