//! Validation helpers for DTOs and question bank records.

use validator::ValidationError;

/// Number of options every question carries (one correct, two distractors).
pub const OPTION_COUNT: usize = 3;

/// Validates that a question lists exactly three distinct, non-blank answers.
///
/// # Examples
///
/// ```ignore
/// validate_answer_texts(&["Homer".into(), "Bart".into(), "Lisa".into()]) // Ok
/// validate_answer_texts(&["Homer".into(), "Bart".into()])                // Err - too few
/// validate_answer_texts(&["Homer".into(), " ".into(), "Lisa".into()])    // Err - blank
/// validate_answer_texts(&["Homer".into(), "Bart".into(), "Homer ".into()]) // Err - duplicate
/// ```
pub fn validate_answer_texts(answers: &[String]) -> Result<(), ValidationError> {
    if answers.len() != OPTION_COUNT {
        let mut err = ValidationError::new("answer_count");
        err.message = Some(
            format!(
                "Question must list exactly {OPTION_COUNT} answers (got {})",
                answers.len()
            )
            .into(),
        );
        return Err(err);
    }

    if answers.iter().any(|answer| answer.trim().is_empty()) {
        let mut err = ValidationError::new("answer_blank");
        err.message = Some("Answers must not be blank".into());
        return Err(err);
    }

    let duplicated = answers.iter().enumerate().any(|(index, answer)| {
        answers[..index]
            .iter()
            .any(|earlier| earlier.trim() == answer.trim())
    });
    if duplicated {
        let mut err = ValidationError::new("answer_duplicate");
        err.message = Some("Answers must be distinct".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a text field carries at least one visible character.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_validate_answer_texts_valid() {
        assert!(validate_answer_texts(&answers(&["Homer", "Bart", "Lisa"])).is_ok());
    }

    #[test]
    fn test_validate_answer_texts_invalid_count() {
        assert!(validate_answer_texts(&answers(&["Homer", "Bart"])).is_err());
        assert!(validate_answer_texts(&answers(&["Homer", "Bart", "Lisa", "Maggie"])).is_err());
        assert!(validate_answer_texts(&[]).is_err());
    }

    #[test]
    fn test_validate_answer_texts_blank() {
        assert!(validate_answer_texts(&answers(&["Homer", "  ", "Lisa"])).is_err());
        assert!(validate_answer_texts(&answers(&["", "Bart", "Lisa"])).is_err());
    }

    #[test]
    fn test_validate_answer_texts_duplicate() {
        let err = validate_answer_texts(&answers(&["Apu", "Moe", "Apu"])).unwrap_err();
        assert_eq!(err.code, "answer_duplicate");
        assert!(validate_answer_texts(&answers(&["Apu", "Moe", " Moe "])).is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Who?").is_ok());
        assert!(validate_not_blank(" \t").is_err());
    }
}
