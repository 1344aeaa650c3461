//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects answers made only of whitespace.
pub fn validate_answer_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        let mut err = ValidationError::new("answer_blank");
        err.message = Some("answer must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;
    use crate::dto::team::SubmitAnswerRequest;

    #[test]
    fn blank_answers_are_rejected() {
        assert!(validate_answer_text("  \t").is_err());
        assert!(validate_answer_text("").is_err());
        assert!(validate_answer_text(" Everest ").is_ok());
    }

    #[test]
    fn long_answers_are_rejected() {
        let request = SubmitAnswerRequest {
            text: "x".repeat(281),
        };
        assert!(request.validate().is_err());
    }
}
