use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::proctoring::model::SectionPlan;
use crate::schemas::exam::{QuestionDefinition, QuestionKind, TestCaseDefinition};

pub(crate) const EMPTY_CODE_MESSAGE: &str = "Please write some code first!";
pub(crate) const NO_CASES_MESSAGE: &str = "No automated test cases available for this question.";
pub(crate) const RUNNING_MESSAGE: &str = "Running code against test cases...";
pub(crate) const ALL_PASSED_MESSAGE: &str = "All test cases passed!";

/// What the sandbox returned for one stdin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Execution {
    pub(crate) stdout: String,
    pub(crate) error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TestOutcome {
    pub(crate) id: usize,
    pub(crate) input: String,
    #[serde(alias = "expectedOutput")]
    pub(crate) expected_output: String,
    #[serde(alias = "actualOutput")]
    pub(crate) actual_output: String,
    pub(crate) passed: bool,
}

/// Latest run of one coding question, stored as that question's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CodeAttempt {
    pub(crate) code: String,
    pub(crate) language: String,
    #[serde(default, alias = "testResults")]
    pub(crate) results: Vec<TestOutcome>,
    #[serde(default)]
    pub(crate) passed: usize,
    #[serde(default)]
    pub(crate) attempted_at_ms: i64,
}

impl CodeAttempt {
    pub(crate) fn new(code: &str, language: &str, results: Vec<TestOutcome>, now_ms: i64) -> Self {
        let passed = results.iter().filter(|outcome| outcome.passed).count();
        Self {
            code: code.to_string(),
            language: language.to_string(),
            results,
            passed,
            attempted_at_ms: now_ms,
        }
    }

    pub(crate) fn total(&self) -> usize {
        self.results.len()
    }

    pub(crate) fn summary(&self) -> String {
        if self.passed == self.total() {
            ALL_PASSED_MESSAGE.to_string()
        } else {
            format!("{}/{} test cases passed.", self.passed, self.total())
        }
    }
}

/// A case passes only when the run produced no error and the trimmed output matches.
pub(crate) fn evaluate_case(index: usize, case: &TestCaseDefinition, run: &Execution) -> TestOutcome {
    let actual = run.stdout.trim();
    let error = run.error.as_deref().map(str::trim).filter(|error| !error.is_empty());
    let passed = error.is_none() && actual == case.expected_output.trim();

    TestOutcome {
        id: index + 1,
        input: case.input.clone(),
        expected_output: case.expected_output.clone(),
        actual_output: match error {
            Some(error) => format!("Error: {error}"),
            None => actual.to_string(),
        },
        passed,
    }
}

/// Sum of marks for questions whose recorded choice equals the correct index.
pub(crate) fn score_multiple_choice(
    questions: &[QuestionDefinition],
    answers: &Map<String, Value>,
) -> i64 {
    questions
        .iter()
        .filter(|question| question.kind == QuestionKind::Mcq)
        .filter_map(|question| {
            let correct = question.answer?;
            let chosen = answers.get(question.id.as_str()).and_then(choice_index)?;
            (chosen == u64::from(correct)).then_some(i64::from(question.marks()))
        })
        .sum()
}

/// Count of passing test cases across the latest attempt of every coding question.
pub(crate) fn score_coding(questions: &[QuestionDefinition], answers: &Map<String, Value>) -> i64 {
    questions
        .iter()
        .filter(|question| question.kind == QuestionKind::Coding)
        .filter_map(|question| attempt_for(answers, question.id.as_str()))
        .map(|attempt| attempt.results.iter().filter(|outcome| outcome.passed).count() as i64)
        .sum()
}

/// Multiple-choice marks plus passing test cases, so mixed sections lose neither.
pub(crate) fn section_score(section: &SectionPlan, answers: &Map<String, Value>) -> i64 {
    score_multiple_choice(&section.questions, answers) + score_coding(&section.questions, answers)
}

pub(crate) fn attempt_for(answers: &Map<String, Value>, question_id: &str) -> Option<CodeAttempt> {
    let raw = answers.get(question_id)?;
    serde_json::from_value(raw.clone()).ok()
}

/// One `Task n: PASS|FAIL` line per test case of a run, numbered from 1.
pub(crate) fn run_report(results: &[TestOutcome]) -> String {
    results
        .iter()
        .map(|outcome| {
            let verdict = if outcome.passed { "PASS" } else { "FAIL" };
            format!("Task {}: {verdict}", outcome.id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sandbox language and version for an editor language label.
pub(crate) fn piston_language(label: &str) -> (&'static str, &'static str) {
    match label.trim().to_ascii_lowercase().as_str() {
        "java" => ("java", "*"),
        "c" => ("c", "*"),
        "c++" | "cpp" => ("c++", "*"),
        _ => ("python", "3.10.0"),
    }
}

fn choice_index(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proctoring::model::ExamPlan;
    use crate::test_support::{sample_exam, sample_plan};
    use serde_json::json;

    fn answers(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn case(input: &str, expected: &str) -> TestCaseDefinition {
        TestCaseDefinition {
            input: input.to_string(),
            expected_output: expected.to_string(),
            is_visible: true,
        }
    }

    #[test]
    fn multiple_choice_scores_exact_matches_only() {
        let exam = sample_exam();
        let questions = &exam.sections[0].questions;

        assert_eq!(score_multiple_choice(questions, &answers(json!({"1": 2, "2": 1}))), 1);
        assert_eq!(score_multiple_choice(questions, &answers(json!({"1": 2, "2": 0}))), 3);
        assert_eq!(score_multiple_choice(questions, &answers(json!({}))), 0);
        assert_eq!(score_multiple_choice(questions, &answers(json!({"1": "2"}))), 1);
        assert_eq!(score_multiple_choice(questions, &answers(json!({"1": null}))), 0);
    }

    #[test]
    fn case_evaluation_trims_and_reports_errors() {
        let passing = evaluate_case(0, &case("2 3", "5\n"), &Execution {
            stdout: "5\n".into(),
            error: None,
        });
        assert!(passing.passed);
        assert_eq!(passing.id, 1);
        assert_eq!(passing.actual_output, "5");

        let failing = evaluate_case(1, &case("2 3", "5"), &Execution {
            stdout: "5".into(),
            error: Some("Traceback\n".into()),
        });
        assert!(!failing.passed);
        assert_eq!(failing.actual_output, "Error: Traceback");

        let blank_error = evaluate_case(2, &case("", "ok"), &Execution {
            stdout: "ok".into(),
            error: Some("   ".into()),
        });
        assert!(blank_error.passed);
    }

    #[test]
    fn coding_score_sums_latest_attempts() {
        let plan = sample_plan();
        let section = plan.section(&"C".into()).expect("coding section");
        let question = &section.questions[0];
        let results = question
            .test_cases
            .iter()
            .enumerate()
            .map(|(index, case)| {
                evaluate_case(index, case, &Execution {
                    stdout: if index == 0 { case.expected_output.clone() } else { "nope".into() },
                    error: None,
                })
            })
            .collect();
        let attempt = CodeAttempt::new("print(1)", "Python", results, 10);
        let mut book = Map::new();
        book.insert(question.id.as_str().to_string(), serde_json::to_value(&attempt).expect("json"));

        assert_eq!(section_score(section, &book), 1);
        assert_eq!(attempt.summary(), format!("1/{} test cases passed.", attempt.total()));
        assert_eq!(run_report(&attempt.results), "Task 1: PASS\nTask 2: FAIL");
    }

    #[test]
    fn mixed_section_counts_choices_and_test_cases() {
        let mut exam = sample_exam();
        let coding = exam.sections[2].questions[0].clone();
        exam.sections[0].questions.push(coding);
        let plan = ExamPlan::from_definition(&exam).expect("plan");
        let section = plan.section(&"A".into()).expect("mixed section");

        let results = vec![TestOutcome {
            id: 1,
            input: "2 3".into(),
            expected_output: "5".into(),
            actual_output: "5".into(),
            passed: true,
        }];
        let attempt = CodeAttempt::new("print(5)", "Python", results, 10);
        let mut book = answers(json!({"1": 2, "2": 0}));
        book.insert("c1".to_string(), serde_json::to_value(&attempt).expect("json"));

        assert_eq!(section_score(section, &book), 4);
    }

    #[test]
    fn legacy_attempt_shape_is_readable() {
        let book = answers(json!({
            "q1": {
                "code": "print(5)",
                "language": "Python",
                "testResults": [
                    {"id": 1, "input": "", "expectedOutput": "5", "actualOutput": "5", "passed": true}
                ],
                "passed": 1
            }
        }));

        let attempt = attempt_for(&book, "q1").expect("attempt");
        assert_eq!(attempt.passed, 1);
        assert_eq!(attempt.summary(), ALL_PASSED_MESSAGE);
    }

    #[test]
    fn language_labels_map_to_sandbox_runtimes() {
        assert_eq!(piston_language("Python"), ("python", "3.10.0"));
        assert_eq!(piston_language("Java"), ("java", "*"));
        assert_eq!(piston_language("C"), ("c", "*"));
        assert_eq!(piston_language("C++"), ("c++", "*"));
        assert_eq!(piston_language("Brainfuck"), ("python", "3.10.0"));
    }
}
