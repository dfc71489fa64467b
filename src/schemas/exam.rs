use serde::{Deserialize, Serialize};
use validator::Validate;

/// Active exam as served by `GET /exam/active` and seeded from `EXAM_DEFINITION_FILE`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub(crate) struct ExamDefinition {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: String,
    #[validate(length(min = 1, message = "exam must contain at least one section"), nested)]
    pub(crate) sections: Vec<SectionDefinition>,
    #[serde(default = "default_active", alias = "isActive")]
    pub(crate) is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub(crate) struct SectionDefinition {
    #[validate(length(min = 1, message = "section id must not be empty"))]
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) name: String,
    /// Seconds.
    #[validate(range(min = 1, message = "section duration must be positive"))]
    pub(crate) duration: u64,
    #[serde(default)]
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) questions: Vec<QuestionDefinition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum QuestionKind {
    #[default]
    #[serde(rename = "MCQ", alias = "mcq")]
    Mcq,
    #[serde(rename = "CODING", alias = "coding")]
    Coding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QuestionDefinition {
    pub(crate) id: QuestionId,
    #[serde(default, rename = "type")]
    pub(crate) kind: QuestionKind,
    #[serde(default)]
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) choices: Vec<String>,
    /// Index of the correct choice.
    #[serde(default)]
    pub(crate) answer: Option<u32>,
    #[serde(default)]
    pub(crate) marks: Option<u32>,
    #[serde(default, alias = "problemStatement")]
    pub(crate) problem_statement: Option<String>,
    #[serde(default, alias = "supportedLanguages")]
    pub(crate) supported_languages: Vec<String>,
    #[serde(default, alias = "testCases")]
    pub(crate) test_cases: Vec<TestCaseDefinition>,
}

impl QuestionDefinition {
    /// Zero or missing marks count as one.
    pub(crate) fn marks(&self) -> u32 {
        self.marks.filter(|marks| *marks > 0).unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TestCaseDefinition {
    #[serde(default)]
    pub(crate) input: String,
    #[serde(alias = "expectedOutput")]
    pub(crate) expected_output: String,
    #[serde(default = "default_active", alias = "isVisible")]
    pub(crate) is_visible: bool,
}

/// Question identifiers arrive as strings or numbers; both are compared as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawQuestionId", into = "String")]
pub(crate) struct QuestionId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuestionId {
    Text(String),
    Number(i64),
}

impl From<RawQuestionId> for QuestionId {
    fn from(value: RawQuestionId) -> Self {
        match value {
            RawQuestionId::Text(text) => Self(text),
            RawQuestionId::Number(number) => Self(number.to_string()),
        }
    }
}

impl From<QuestionId> for String {
    fn from(value: QuestionId) -> Self {
        value.0
    }
}

impl QuestionId {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use validator::Validate;

    #[test]
    fn parses_camel_case_definition_with_numeric_ids() {
        let raw = json!({
            "title": "Code-a-thon",
            "isActive": true,
            "sections": [
                {
                    "id": "A",
                    "name": "Aptitude",
                    "duration": 1800,
                    "questions": [
                        {"id": 1, "text": "2+2?", "choices": ["3", "4"], "answer": 1},
                        {"id": "q2", "text": "?", "choices": ["x"], "answer": 0, "marks": 2}
                    ]
                },
                {
                    "id": "C",
                    "duration": 3600,
                    "questions": [
                        {
                            "id": 7,
                            "type": "CODING",
                            "problemStatement": "echo",
                            "supportedLanguages": ["Python"],
                            "testCases": [{"input": "1", "expectedOutput": "1", "isVisible": false}]
                        }
                    ]
                }
            ]
        });

        let exam: ExamDefinition = serde_json::from_value(raw).expect("exam definition");
        exam.validate().expect("valid");

        let first = &exam.sections[0].questions[0];
        assert_eq!(first.id.as_str(), "1");
        assert_eq!(first.kind, QuestionKind::Mcq);
        assert_eq!(first.marks(), 1);
        assert_eq!(exam.sections[0].questions[1].marks(), 2);

        let coding = &exam.sections[1].questions[0];
        assert_eq!(coding.kind, QuestionKind::Coding);
        assert_eq!(coding.test_cases[0].expected_output, "1");
        assert!(!coding.test_cases[0].is_visible);
    }

    #[test]
    fn empty_sections_fail_validation() {
        let exam = ExamDefinition {
            title: "Empty".to_string(),
            description: String::new(),
            sections: Vec::new(),
            is_active: true,
        };

        assert!(exam.validate().is_err());
    }

    #[test]
    fn zero_duration_section_fails_validation() {
        let raw = json!({
            "title": "Broken",
            "sections": [{"id": "A", "duration": 0}]
        });
        let exam: ExamDefinition = serde_json::from_value(raw).expect("exam definition");

        assert!(exam.validate().is_err());
    }
}
