use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use validator::{Validate, ValidationErrors};

use crate::{
    config::{AppConfig, Category},
    dto::validation::{validate_answer_texts, validate_not_blank},
    state::trivia::Question,
};

/// Failures loading a category's question bank. All of them prevent the
/// session from starting.
#[derive(Debug, Error)]
pub enum QuestionBankError {
    #[error("failed to read question bank `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse question bank `{}`", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("question {index} of `{}` is malformed: {errors}", path.display())]
    Invalid {
        path: PathBuf,
        index: usize,
        errors: ValidationErrors,
    },
    #[error("question bank `{}` holds no questions", path.display())]
    Empty { path: PathBuf },
}

/// One record of a question file: `answers[0]` is correct, the rest are distractors.
#[derive(Debug, Deserialize, Validate)]
struct RawQuestion {
    #[validate(custom(function = "validate_not_blank"))]
    question: String,
    #[validate(custom(function = "validate_answer_texts"))]
    answers: Vec<String>,
    #[validate(custom(function = "validate_not_blank"))]
    source: String,
}

impl From<RawQuestion> for Question {
    fn from(value: RawQuestion) -> Self {
        let mut answers = value.answers.into_iter();
        let correct = answers.next().unwrap_or_default();
        let first = answers.next().unwrap_or_default();
        let second = answers.next().unwrap_or_default();
        Self {
            prompt: value.question,
            correct,
            distractors: [first, second],
            source: value.source,
        }
    }
}

/// Load and validate every question of `category`.
pub async fn load_category(
    config: &AppConfig,
    category: &Category,
) -> Result<Vec<Question>, QuestionBankError> {
    let path = config.question_dir().join(&category.question_file);
    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| QuestionBankError::Read {
            path: path.clone(),
            source,
        })?;

    let questions = parse_questions(&path, &contents).inspect_err(|err| {
        warn!(category = %category.key, error = %err, "question bank rejected");
    })?;
    debug!(
        category = %category.key,
        questions = questions.len(),
        "question bank loaded"
    );
    Ok(questions)
}

/// Parse a question file, rejecting it as a whole when any record is malformed.
pub fn parse_questions(path: &Path, contents: &str) -> Result<Vec<Question>, QuestionBankError> {
    let raw: Vec<RawQuestion> =
        serde_json::from_str(contents).map_err(|source| QuestionBankError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if raw.is_empty() {
        return Err(QuestionBankError::Empty {
            path: path.to_path_buf(),
        });
    }

    raw.into_iter()
        .enumerate()
        .map(|(index, question)| {
            question
                .validate()
                .map_err(|errors| QuestionBankError::Invalid {
                    path: path.to_path_buf(),
                    index,
                    errors,
                })?;
            Ok(question.into())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> PathBuf {
        PathBuf::from("simpsons.json")
    }

    #[test]
    fn parses_questions_with_the_correct_answer_first() {
        let questions = parse_questions(
            &path(),
            r#"[
                {"question": "Who owns the Kwik-E-Mart?", "answers": ["Apu", "Moe", "Barney"], "source": "https://simpsons.fandom.com/wiki/Apu"},
                {"question": "What is Bart's middle name?", "answers": ["Jojo", "Jay", "Jeremy"], "source": "Season 2"}
            ]"#,
        )
        .unwrap();

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].prompt, "Who owns the Kwik-E-Mart?");
        assert_eq!(questions[0].correct, "Apu");
        assert_eq!(questions[0].distractors, ["Moe".to_string(), "Barney".to_string()]);
        assert_eq!(questions[1].source, "Season 2");
    }

    #[test]
    fn missing_fields_fail_parsing() {
        let err = parse_questions(
            &path(),
            r#"[{"question": "Who?", "answers": ["a", "b", "c"]}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, QuestionBankError::Parse { .. }));
    }

    #[test]
    fn wrong_answer_count_is_rejected_with_its_index() {
        let err = parse_questions(
            &path(),
            r#"[
                {"question": "Ok?", "answers": ["a", "b", "c"], "source": "s"},
                {"question": "Broken?", "answers": ["a", "b"], "source": "s"}
            ]"#,
        )
        .unwrap_err();
        match err {
            QuestionBankError::Invalid { index, errors, .. } => {
                assert_eq!(index, 1);
                assert!(errors.field_errors().contains_key("answers"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn repeated_answer_texts_are_rejected() {
        let err = parse_questions(
            &path(),
            r#"[{"question": "Who owns the Kwik-E-Mart?", "answers": ["Apu", "Moe", "Apu"], "source": "s"}]"#,
        )
        .unwrap_err();
        match err {
            QuestionBankError::Invalid { index, errors, .. } => {
                assert_eq!(index, 0);
                let field_errors = errors.field_errors();
                let answers = field_errors.get("answers").unwrap();
                assert_eq!(answers[0].code, "answer_duplicate");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let err = parse_questions(
            &path(),
            r#"[{"question": "  ", "answers": ["a", "b", "c"], "source": "s"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, QuestionBankError::Invalid { index: 0, .. }));
    }

    #[test]
    fn empty_bank_is_rejected() {
        let err = parse_questions(&path(), "[]").unwrap_err();
        assert!(matches!(err, QuestionBankError::Empty { .. }));
    }

    #[tokio::test]
    async fn missing_file_reports_a_read_error() {
        let config = AppConfig::default().with_question_dir(
            std::env::temp_dir().join(format!("trivia-missing-{}", uuid::Uuid::new_v4())),
        );
        let category = config.category("simpsons").unwrap().clone();

        let err = load_category(&config, &category).await.unwrap_err();
        assert!(matches!(err, QuestionBankError::Read { .. }));
    }
}
