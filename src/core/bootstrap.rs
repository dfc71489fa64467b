use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::exam::ACTIVE_EXAM_CACHE_KEY;
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::CandidateRole;
use crate::repositories;
use crate::repositories::candidates::CreateCandidate;
use crate::repositories::exams::CreateExam;
use crate::schemas::exam::ExamDefinition;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CandidateSeed {
    #[serde(alias = "candidateId")]
    pub(crate) candidate_id: String,
    pub(crate) password: String,
    #[serde(default)]
    pub(crate) name: String,
}

pub(crate) async fn run(state: &AppState) {
    if let Err(err) = ensure_admin(state).await {
        tracing::error!(error = %format!("{err:#}"), "Failed to ensure admin account");
    }
    if let Err(err) = seed_candidates(state).await {
        tracing::error!(error = %format!("{err:#}"), "Failed to seed candidates");
    }
    if let Err(err) = seed_exam(state).await {
        tracing::error!(error = %format!("{err:#}"), "Failed to seed exam");
    }
}

pub(crate) async fn ensure_admin(state: &AppState) -> anyhow::Result<()> {
    let bootstrap = state.settings().bootstrap();
    if bootstrap.admin_password.is_empty() {
        tracing::warn!("ADMIN_PASSWORD not configured; skipping admin creation");
        return Ok(());
    }

    let admin_id = bootstrap.admin_candidate_id.as_str();
    let now = primitive_now_utc();

    match repositories::candidates::find_by_id(state.db(), admin_id).await? {
        Some(existing) => {
            let password_matches =
                security::verify_password(&bootstrap.admin_password, &existing.hashed_password)
                    .unwrap_or(false);
            if password_matches && existing.role == CandidateRole::Admin {
                tracing::info!(admin_id, "Admin account already up to date");
                return Ok(());
            }

            let hashed_password = if password_matches {
                existing.hashed_password.clone()
            } else {
                security::hash_password(&bootstrap.admin_password)?
            };
            repositories::candidates::update_credentials(
                state.db(),
                admin_id,
                &hashed_password,
                CandidateRole::Admin,
                now,
            )
            .await?;
            tracing::info!(admin_id, "Updated admin account");
        }
        None => {
            repositories::candidates::create_if_absent(
                state.db(),
                CreateCandidate {
                    candidate_id: admin_id,
                    name: "Administrator",
                    hashed_password: security::hash_password(&bootstrap.admin_password)?,
                    role: CandidateRole::Admin,
                    now,
                },
            )
            .await?;
            tracing::info!(admin_id, "Created admin account");
        }
    }

    Ok(())
}

async fn seed_candidates(state: &AppState) -> anyhow::Result<()> {
    let Some(path) = state.settings().bootstrap().candidates_file.as_deref() else {
        return Ok(());
    };

    let existing =
        repositories::candidates::count_by_role(state.db(), CandidateRole::Candidate).await?;
    if existing > 0 {
        tracing::info!(existing, "Candidates already present; skipping seed");
        return Ok(());
    }

    let seeds = load_candidate_seeds(path)?;
    let now = primitive_now_utc();
    let mut created = 0usize;
    for seed in &seeds {
        let inserted = repositories::candidates::create_if_absent(
            state.db(),
            CreateCandidate {
                candidate_id: &seed.candidate_id,
                name: &seed.name,
                hashed_password: security::hash_password(&seed.password)?,
                role: CandidateRole::Candidate,
                now,
            },
        )
        .await?;
        if inserted {
            created += 1;
        }
    }

    tracing::info!(created, path = %path.display(), "Seeded candidates");
    Ok(())
}

async fn seed_exam(state: &AppState) -> anyhow::Result<()> {
    let Some(path) = state.settings().bootstrap().exam_definition_file.as_deref() else {
        return Ok(());
    };

    if repositories::exams::count(state.db()).await? > 0 {
        tracing::info!("Exam already present; skipping seed");
        return Ok(());
    }

    let definition = load_exam_definition(path)?;
    let record = repositories::exams::create(
        state.db(),
        CreateExam {
            id: &Uuid::new_v4().to_string(),
            title: &definition.title,
            definition: serde_json::to_value(&definition)?,
            is_active: definition.is_active,
            now: primitive_now_utc(),
        },
    )
    .await?;

    if let Err(err) = state.redis().invalidate(ACTIVE_EXAM_CACHE_KEY).await {
        tracing::warn!(error = %err, "Failed to invalidate active exam cache");
    }
    tracing::info!(exam_id = %record.id, title = %record.title, "Seeded exam");
    Ok(())
}

/// Reads a JSON array of candidates; entries with a blank id or password are skipped.
pub(crate) fn load_candidate_seeds(path: &Path) -> anyhow::Result<Vec<CandidateSeed>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let seeds: Vec<CandidateSeed> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(seeds
        .into_iter()
        .map(|mut seed| {
            seed.candidate_id = seed.candidate_id.trim().to_string();
            seed
        })
        .filter(|seed| !seed.candidate_id.is_empty() && !seed.password.is_empty())
        .collect())
}

pub(crate) fn load_exam_definition(path: &Path) -> anyhow::Result<ExamDefinition> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let definition: ExamDefinition = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    definition.validate().with_context(|| format!("Invalid exam in {}", path.display()))?;
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::test_support::sample_exam;

    #[test]
    fn candidate_seeds_skip_blank_entries() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("candidates.json");
        std::fs::write(
            &path,
            r#"[
                {"candidate_id": " CAND-1 ", "password": "pw", "name": "Ada"},
                {"candidateId": "CAND-2", "password": "pw"},
                {"candidate_id": "", "password": "pw"},
                {"candidate_id": "CAND-3", "password": ""}
            ]"#,
        )
        .expect("write");

        let seeds = load_candidate_seeds(&path).expect("seeds");

        let ids: Vec<&str> = seeds.iter().map(|seed| seed.candidate_id.as_str()).collect();
        assert_eq!(ids, vec!["CAND-1", "CAND-2"]);
        assert_eq!(seeds[0].name, "Ada");
    }

    #[test]
    fn exam_definition_is_validated() {
        let dir = TempDir::new().expect("temp dir");

        let good = dir.path().join("exam.json");
        std::fs::write(&good, serde_json::to_string(&sample_exam()).expect("json")).expect("write");
        let definition = load_exam_definition(&good).expect("definition");
        assert_eq!(definition.sections.len(), 3);

        let bad = dir.path().join("empty.json");
        std::fs::write(&bad, r#"{"title": "Empty", "sections": []}"#).expect("write");
        assert!(load_exam_definition(&bad).is_err());
    }
}
