//! Account field validation
//!
//! Rules applied whenever a user row is written: registration, password
//! changes and password resets all go through here.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$")
        .expect("email pattern is valid")
});

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]{3,50}$").expect("username pattern is valid"));

/// Normalize and check an email address, returning the lowercased form.
pub fn normalize_email(email: &str) -> Result<String, String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 255 || !EMAIL_RE.is_match(&email) {
        return Err("Invalid email format".to_string());
    }
    Ok(email)
}

/// Usernames are 3-50 characters of letters, digits, `_` or `-`.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("Username is required".to_string());
    }
    if !USERNAME_RE.is_match(username) {
        return Err(
            "Username must be 3-50 characters of letters, digits, '_' or '-'".to_string(),
        );
    }
    Ok(())
}

/// Passwords need `min_length` characters, at least one letter and one digit.
pub fn validate_password(password: &str, min_length: usize) -> Result<(), String> {
    if password.chars().count() < min_length {
        return Err(format!(
            "Password must be at least {} characters long",
            min_length
        ));
    }
    if !password.chars().any(char::is_alphabetic) {
        return Err("Password must contain at least one letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
        assert!(normalize_email("").is_err());
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("a@b").is_err());
        assert!(normalize_email("a@@b.com").is_err());
        assert!(normalize_email("a b@c.com").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("bob_the-builder").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("abcdefg1", 8).is_ok());
        assert!(validate_password("abc1", 8).is_err());
        assert!(validate_password("abcdefgh", 8).is_err());
        assert!(validate_password("12345678", 8).is_err());
    }

    proptest! {
        #[test]
        fn prop_short_passwords_rejected(pw in "[a-z0-9]{0,7}") {
            prop_assert!(validate_password(&pw, 8).is_err());
        }

        #[test]
        fn prop_letter_and_digit_passwords_accepted(
            letters in "[a-zA-Z]{4,20}",
            digits in "[0-9]{4,20}",
        ) {
            let pw = format!("{}{}", letters, digits);
            prop_assert!(validate_password(&pw, 8).is_ok());
        }

        #[test]
        fn prop_valid_usernames_accepted(name in "[A-Za-z0-9_-]{3,50}") {
            prop_assert!(validate_username(&name).is_ok());
        }
    }
}
