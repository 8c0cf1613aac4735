//! Validation helpers for the registration form.

use serde::Deserialize;
use validator::{Validate, ValidationError};

/// Input collected on the landing screen.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    /// Display name, at most 64 characters.
    #[validate(length(max = 64), custom(function = "validate_not_blank"))]
    pub name: String,
    /// One of the configured teams.
    #[validate(custom(function = "validate_not_blank"))]
    pub team: String,
    /// One of the configured roles.
    #[validate(custom(function = "validate_not_blank"))]
    pub role: String,
    /// Register as the session admin.
    #[serde(default)]
    pub is_admin: bool,
    /// Question offered to the group; blank counts as none.
    #[serde(default)]
    pub question: Option<String>,
}

impl RegistrationForm {
    /// Regular player with no question.
    pub fn new(name: &str, team: &str, role: &str) -> Self {
        Self {
            name: name.into(),
            team: team.into(),
            role: role.into(),
            ..Self::default()
        }
    }

    /// Mark the form as an admin registration.
    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    /// Attach a question.
    pub fn with_question(mut self, question: &str) -> Self {
        self.question = Some(question.into());
        self
    }

    /// Trimmed question, or `None` when left blank.
    pub fn normalized_question(&self) -> Option<String> {
        self.question
            .as_deref()
            .map(str::trim)
            .filter(|question| !question.is_empty())
            .map(String::from)
    }
}

/// Validates that a field contains something other than whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Field must not be blank".into());
        return Err(err);
    }

    Ok(())
}
