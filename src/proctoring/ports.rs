//! Collaborators the candidate runtime reaches over the network.

use async_trait::async_trait;

use crate::proctoring::scoring::Execution;
use crate::schemas::auth::LoginResponse;
use crate::schemas::exam::ExamDefinition;
use crate::schemas::result::{SubmitRequest, SubmitResponse};

#[async_trait]
pub(crate) trait SubmissionApi: Send + Sync {
    async fn submit(
        &self,
        access_token: Option<&str>,
        payload: &SubmitRequest,
    ) -> anyhow::Result<SubmitResponse>;
}

#[async_trait]
pub(crate) trait ExamSource: Send + Sync {
    /// `None` when no exam is active.
    async fn active_exam(&self) -> anyhow::Result<Option<ExamDefinition>>;
}

#[async_trait]
pub(crate) trait CodeRunner: Send + Sync {
    async fn execute(&self, language: &str, code: &str, stdin: &str) -> Execution;
}

#[async_trait]
pub(crate) trait CandidateAuth: Send + Sync {
    /// `None` for rejected credentials.
    async fn login(&self, candidate_id: &str, password: &str)
        -> anyhow::Result<Option<LoginResponse>>;
}
