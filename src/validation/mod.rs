use std::fmt;

pub const NAME_MAX_LEN: usize = 100;
pub const BREED_MAX_LEN: usize = 100;
pub const NOTES_MAX_LEN: usize = 1000;
pub const ADDRESS_MAX_LEN: usize = 300;
pub const EMAIL_MAX_LEN: usize = 254;
pub const MOBILE_MAX_LEN: usize = 20;
pub const ACCOUNT_NUMBER_MAX_LEN: usize = 20;
pub const BRANCH_CODE_MAX_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Sanitises a required text field and checks its length.
pub fn required_text(field: &'static str, value: &str, max_len: usize) -> Result<String, ValidationError> {
    let value = sanitize_string(value);
    validate_required(field, &value)?;
    validate_max_len(field, &value, max_len)?;
    Ok(value)
}

/// Sanitises an optional text field and checks its length.
pub fn optional_text(field: &'static str, value: &str, max_len: usize) -> Result<String, ValidationError> {
    let value = sanitize_string(value);
    validate_max_len(field, &value, max_len)?;
    Ok(value)
}

pub fn validate_email(email: &str) -> ValidationResult {
    validate_required("email", email)?;
    validate_max_len("email", email, EMAIL_MAX_LEN)?;

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::new("email", "must be a valid email address")),
    }
}

pub fn validate_digits(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    validate_required(field, value)?;
    validate_max_len(field, value, max_len)?;

    if !value.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new(field, "must contain only digits"));
    }

    Ok(())
}

pub fn validate_mobile(mobile: &str) -> ValidationResult {
    validate_required("mobile", mobile)?;
    validate_max_len("mobile", mobile, MOBILE_MAX_LEN)?;

    let digits = mobile.strip_prefix('+').unwrap_or(mobile);
    if !digits
        .chars()
        .all(|ch| ch.is_ascii_digit() || ch == ' ' || ch == '-')
    {
        return Err(ValidationError::new(
            "mobile",
            "must contain only digits, spaces or dashes",
        ));
    }

    Ok(())
}
