//! Request validation.
//!
//! Each request type declares an ordered list of [`Rule`]s. Every rule looks at one
//! field and reports at most one [`FieldError`]; [`validate`] runs all of them and
//! rejects the request with a single 422 listing every failing field.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ApiError, FieldError};

pub type Rule<T> = fn(&T) -> Option<FieldError>;

pub fn validate<T>(input: &T, rules: &[Rule<T>]) -> Result<(), ApiError> {
    let errors: Vec<FieldError> = rules.iter().filter_map(|rule| rule(input)).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

/// At least one lowercase letter, one uppercase letter and one digit.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Length in characters, not bytes.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Shared username rule: 3-50 chars of letters, digits and underscores.
pub fn username_error(username: &str) -> Option<FieldError> {
    let username = username.trim();
    if username.is_empty() {
        return Some(FieldError::new("username", "Username is required"));
    }
    if !(3..=50).contains(&char_len(username)) {
        return Some(FieldError::new(
            "username",
            "Username must be between 3-50 characters",
        ));
    }
    if !is_valid_username(username) {
        return Some(FieldError::new(
            "username",
            "Username can only contain letters, numbers, and underscores",
        ));
    }
    None
}

/// Width of `users.email`.
pub const MAX_EMAIL_LEN: usize = 100;

pub fn email_error(email: &str) -> Option<FieldError> {
    let email = email.trim();
    if email.is_empty() {
        return Some(FieldError::new("email", "Email is required"));
    }
    if !is_valid_email(email) {
        return Some(FieldError::new("email", "Invalid email format"));
    }
    if char_len(email) > MAX_EMAIL_LEN {
        return Some(FieldError::new("email", "Email cannot exceed 100 characters"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pair {
        a: &'static str,
        b: &'static str,
    }

    fn a_rule(p: &Pair) -> Option<FieldError> {
        p.a.is_empty().then(|| FieldError::new("a", "a is required"))
    }

    fn b_rule(p: &Pair) -> Option<FieldError> {
        p.b.is_empty().then(|| FieldError::new("b", "b is required"))
    }

    #[test]
    fn collects_every_failing_field_in_rule_order() {
        let err = validate(&Pair { a: "", b: "" }, &[a_rule, b_rule]).unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn passes_when_no_rule_fails() {
        assert!(validate(&Pair { a: "x", b: "y" }, &[a_rule, b_rule]).is_ok());
    }

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("user example@x.io"));
    }

    #[test]
    fn email_length_is_capped() {
        let local = "a".repeat(MAX_EMAIL_LEN);
        assert!(email_error(&format!("{local}@example.com")).is_some());
        assert!(email_error("jane@example.com").is_none());
    }

    #[test]
    fn username_rules() {
        assert!(username_error("jane_doe42").is_none());
        assert!(username_error("ab").is_some());
        assert!(username_error("has space").is_some());
        assert!(username_error(&"x".repeat(51)).is_some());
    }

    #[test]
    fn password_strength() {
        assert!(is_strong_password("Secret1"));
        assert!(!is_strong_password("secret1"));
        assert!(!is_strong_password("SECRET1"));
        assert!(!is_strong_password("Secrets"));
    }
}
