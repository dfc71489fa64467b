use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schemas::exam::{ExamDefinition, QuestionDefinition, QuestionKind};

pub(crate) mod routes {
    pub(crate) const HOME: &str = "/";
    pub(crate) const RULES: &str = "/rules";
    pub(crate) const LOGIN: &str = "/login";
    pub(crate) const ADMIN_LOGIN: &str = "/admin-login";
    pub(crate) const RESULTS: &str = "/admin/results";
    pub(crate) const SECTIONS: &str = "/sections";
    pub(crate) const EXAM: &str = "/exam";
    pub(crate) const FINAL: &str = "/final";

    pub(crate) const PUBLIC: &[&str] = &[HOME, RULES, LOGIN, ADMIN_LOGIN, RESULTS];
}

/// Section identifier, normalized to upper case ("a" and "A" are the same section).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub(crate) struct SectionId(String);

impl SectionId {
    pub(crate) fn new(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SectionId {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for SectionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<SectionId> for String {
    fn from(value: SectionId) -> Self {
        value.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Routes that may only be entered with a single-use navigation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SafeRoute {
    Sections,
    Exam,
    Final,
}

impl SafeRoute {
    pub(crate) const ALL: [SafeRoute; 3] = [SafeRoute::Sections, SafeRoute::Exam, SafeRoute::Final];

    pub(crate) fn path(self) -> &'static str {
        match self {
            SafeRoute::Sections => routes::SECTIONS,
            SafeRoute::Exam => routes::EXAM,
            SafeRoute::Final => routes::FINAL,
        }
    }

    pub(crate) fn storage_key(self) -> &'static str {
        match self {
            SafeRoute::Sections => "allow_sections_entry",
            SafeRoute::Exam => "allow_exam_entry",
            SafeRoute::Final => "allow_final_entry",
        }
    }

    pub(crate) fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|route| route.path() == path)
    }
}

/// A visible URL reduced to what the gate compares: path, query string and fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Location {
    pub(crate) path: String,
    #[serde(default)]
    pub(crate) query: String,
    #[serde(default)]
    pub(crate) fragment: String,
}

impl Location {
    /// Parses an href such as `/exam?section=B#top`. A missing leading slash is added and
    /// trailing slashes are trimmed except for the root. The fragment is kept, so a hash
    /// change is a different location.
    pub(crate) fn parse(href: &str) -> Self {
        let (without_fragment, fragment) = href.split_once('#').unwrap_or((href, ""));
        let (path, query) = without_fragment.split_once('?').unwrap_or((without_fragment, ""));

        let mut path = path.trim().to_string();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        while path.len() > 1 && path.ends_with('/') {
            path.pop();
        }

        Self { path, query: query.to_string(), fragment: fragment.to_string() }
    }

    pub(crate) fn at(path: &str) -> Self {
        Self { path: path.to_string(), query: String::new(), fragment: String::new() }
    }

    pub(crate) fn home() -> Self {
        Self::at(routes::HOME)
    }

    pub(crate) fn exam(section: &SectionId) -> Self {
        Self {
            path: routes::EXAM.to_string(),
            query: format!("section={section}"),
            fragment: String::new(),
        }
    }

    pub(crate) fn href(&self) -> String {
        let mut href = self.path.clone();
        if !self.query.is_empty() {
            href.push('?');
            href.push_str(&self.query);
        }
        if !self.fragment.is_empty() {
            href.push('#');
            href.push_str(&self.fragment);
        }
        href
    }

    pub(crate) fn is_public(&self) -> bool {
        routes::PUBLIC.contains(&self.path.as_str())
    }

    pub(crate) fn safe_route(&self) -> Option<SafeRoute> {
        SafeRoute::from_path(&self.path)
    }

    /// `section` query parameter of an exam location.
    pub(crate) fn section(&self) -> Option<SectionId> {
        self.query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "section")
            .map(|(_, value)| SectionId::new(value))
            .filter(|section| !section.as_str().is_empty())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SectionKind {
    MultipleChoice,
    Coding,
}

#[derive(Debug, Clone)]
pub(crate) struct SectionPlan {
    pub(crate) id: SectionId,
    pub(crate) name: String,
    pub(crate) duration_seconds: u64,
    pub(crate) kind: SectionKind,
    pub(crate) questions: Vec<QuestionDefinition>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum PlanError {
    #[error("exam has no sections")]
    Empty,
    #[error("section {0} is declared more than once")]
    DuplicateSection(String),
    #[error("section {0} has an empty identifier")]
    BlankSection(usize),
    #[error("section {0} has no duration")]
    ZeroDuration(String),
}

/// Ordered sections of the active exam, fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub(crate) struct ExamPlan {
    title: String,
    sections: Vec<SectionPlan>,
}

impl ExamPlan {
    pub(crate) fn from_definition(definition: &ExamDefinition) -> Result<Self, PlanError> {
        if definition.sections.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut sections: Vec<SectionPlan> = Vec::with_capacity(definition.sections.len());
        for (index, section) in definition.sections.iter().enumerate() {
            let id = SectionId::new(&section.id);
            if id.as_str().is_empty() {
                return Err(PlanError::BlankSection(index));
            }
            if sections.iter().any(|existing| existing.id == id) {
                return Err(PlanError::DuplicateSection(id.to_string()));
            }
            if section.duration == 0 {
                return Err(PlanError::ZeroDuration(id.to_string()));
            }

            let has_coding =
                section.questions.iter().any(|question| question.kind == QuestionKind::Coding);
            let kind = if has_coding { SectionKind::Coding } else { SectionKind::MultipleChoice };

            sections.push(SectionPlan {
                name: if section.name.is_empty() {
                    format!("Section {id}")
                } else {
                    section.name.clone()
                },
                id,
                duration_seconds: section.duration,
                kind,
                questions: section.questions.clone(),
            });
        }

        Ok(Self { title: definition.title.clone(), sections })
    }

    pub(crate) fn title(&self) -> &str {
        &self.title
    }

    pub(crate) fn sections(&self) -> &[SectionPlan] {
        &self.sections
    }

    pub(crate) fn section(&self, id: &SectionId) -> Option<&SectionPlan> {
        self.sections.iter().find(|section| &section.id == id)
    }

    pub(crate) fn position(&self, id: &SectionId) -> Option<usize> {
        self.sections.iter().position(|section| &section.id == id)
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = &SectionId> {
        self.sections.iter().map(|section| &section.id)
    }
}
