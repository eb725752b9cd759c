use std::fmt::{Display, Formatter};

use crate::model::{normalize_name, Call, Node, User};

/// A single violated structural constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub field: &'static str,
    pub message: String,
}

impl ConstraintViolation {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ConstraintViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Structural and semantic validation of an entity before it is admitted
/// for replication.
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<ConstraintViolation>>;
}

const MAX_NAME_LEN: usize = 64;

fn check_name(field: &'static str, value: &str, out: &mut Vec<ConstraintViolation>) {
    let normalized = normalize_name(value);
    if normalized.is_empty() {
        out.push(ConstraintViolation::new(field, "must not be empty"));
        return;
    }

    if normalized.len() > MAX_NAME_LEN {
        out.push(ConstraintViolation::new(
            field,
            format!("must not be longer than {MAX_NAME_LEN} characters"),
        ));
    }

    if !normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        out.push(ConstraintViolation::new(
            field,
            "may only contain alphanumeric characters, `-`, `_` and `.`",
        ));
    }
}

impl Validate for User {
    fn validate(&self) -> Result<(), Vec<ConstraintViolation>> {
        let mut violations = Vec::new();

        check_name("name", &self.name, &mut violations);

        if self.hash.trim().is_empty() {
            violations.push(ConstraintViolation::new("hash", "must not be empty"));
        }

        if self.mail.trim().is_empty() || !self.mail.contains('@') {
            violations.push(ConstraintViolation::new(
                "mail",
                "must be a valid mail address",
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

impl Validate for Node {
    fn validate(&self) -> Result<(), Vec<ConstraintViolation>> {
        let mut violations = Vec::new();

        check_name("name", &self.name, &mut violations);

        if self.version.trim().is_empty() {
            violations.push(ConstraintViolation::new("version", "must not be empty"));
        }

        if self.config_version.trim().is_empty() {
            violations.push(ConstraintViolation::new(
                "config_version",
                "must not be empty",
            ));
        }

        if self.owner_names.is_empty() {
            violations.push(ConstraintViolation::new(
                "owner_names",
                "must contain at least one owner",
            ));
        }
        for owner in &self.owner_names {
            check_name("owner_names", owner, &mut violations);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

impl Validate for Call {
    fn validate(&self) -> Result<(), Vec<ConstraintViolation>> {
        let mut violations = Vec::new();

        check_name("owner_name", &self.owner_name, &mut violations);

        if self.text.is_empty() {
            violations.push(ConstraintViolation::new("text", "must not be empty"));
        } else if self.text.len() > Call::MAX_TEXT_LEN {
            violations.push(ConstraintViolation::new(
                "text",
                format!(
                    "must not be longer than {} characters",
                    Call::MAX_TEXT_LEN
                ),
            ));
        }

        if self.timestamp_ms == 0 {
            violations.push(ConstraintViolation::new("timestamp_ms", "must be set"));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
