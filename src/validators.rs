/// Input validators for signup, login and reservas.
///
/// Every validator trims its input and returns the normalized value so
/// handlers store exactly what was checked.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 256;
pub const MIN_PASSWORD_LENGTH: usize = 6;
/// bcrypt only reads the first 72 bytes of its input.
pub const MAX_PASSWORD_LENGTH: usize = 72;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).expect("email regex is valid");
}

/// Validates and normalizes an email address (trimmed, lowercased).
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    if has_suspicious_email_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("email".to_string()));
    }

    Ok(trimmed.to_lowercase())
}

/// Validates an optional display name. Blank names are treated as absent.
pub fn is_valid_display_name(name: Option<&str>) -> Result<Option<String>, ValidationError> {
    match name.map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) => validate_text("name", trimmed).map(Some),
    }
}

/// Validates the holder name of a reserva (required).
pub fn is_valid_holder_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("nombreUsuario".to_string()));
    }
    validate_text("nombreUsuario", trimmed)
}

/// Validates an optional free-form description.
pub fn is_valid_description(description: Option<&str>) -> Result<Option<String>, ValidationError> {
    match description.map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) => {
            if trimmed.contains('\0') {
                return Err(ValidationError::SuspiciousContent("description".to_string()));
            }
            if trimmed.len() > 2 * MAX_NAME_LENGTH {
                return Err(ValidationError::TooLong(
                    "description".to_string(),
                    2 * MAX_NAME_LENGTH,
                ));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

/// Checks password length bounds. Content rules are left to the user.
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }

    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        ));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        ));
    }

    Ok(())
}

/// Clamp `skip`/`take` query parameters to sane bounds.
pub fn page_bounds(skip: Option<i64>, take: Option<i64>) -> (i64, i64) {
    let skip = skip.unwrap_or(0).max(0);
    let take = take.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (skip, take)
}

fn validate_text(field: &str, trimmed: &str) -> Result<String, ValidationError> {
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_NAME_LENGTH));
    }

    if has_suspicious_name_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent(field.to_string()));
    }

    Ok(trimmed.to_string())
}

fn has_suspicious_email_patterns(email: &str) -> bool {
    if let Some(at_pos) = email.find('@') {
        if at_pos > 64 {
            return true;
        }
    }

    email.matches('@').count() != 1 || email.contains('\0')
}

fn has_suspicious_name_patterns(name: &str) -> bool {
    if name.chars().any(|c| c.is_control()) {
        return true;
    }

    let special_char_count = name
        .chars()
        .filter(|c| {
            !c.is_alphanumeric() && !c.is_whitespace() && !matches!(c, '-' | '.' | '_' | '\'')
        })
        .count();

    special_char_count > 5
}
