//! Local credential validation
//!
//! Always runs before any network call. Sign-in surfaces at most one
//! message per attempt (short-circuit); sign-up reports both field
//! errors independently.

use regex_lite::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Symbols accepted by the registration password policy
const PASSWORD_SYMBOLS: &str = "@$!%*?&";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

/// Check the standard `local@domain.tld` shape
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Password strength for registration: at least 8 characters with one
/// lowercase, one uppercase, one digit, and one symbol from the fixed
/// set; characters outside that combined set are rejected.
pub fn is_strong_password(password: &str) -> bool {
    if password.chars().count() < 8 {
        return false;
    }
    let mut lower = false;
    let mut upper = false;
    let mut digit = false;
    let mut symbol = false;
    for c in password.chars() {
        match c {
            'a'..='z' => lower = true,
            'A'..='Z' => upper = true,
            '0'..='9' => digit = true,
            c if PASSWORD_SYMBOLS.contains(c) => symbol = true,
            _ => return false,
        }
    }
    lower && upper && digit && symbol
}

/// Validate sign-in input, short-circuiting on the first failure.
///
/// Password strength is intentionally not enforced here: existing
/// accounts may predate the registration policy.
pub fn validate_sign_in(email: &str, password: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Please enter your email".to_string());
    }
    if !is_valid_email(email) {
        return Err("Please enter a valid email address".to_string());
    }
    if password.is_empty() {
        return Err("Please enter your password".to_string());
    }
    Ok(())
}

/// Field-specific sign-up validation errors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpFieldErrors {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl SignUpFieldErrors {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none()
    }
}

impl fmt::Display for SignUpFieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => write!(f, "{}; {}", email, password),
            (Some(email), None) => write!(f, "{}", email),
            (None, Some(password)) => write!(f, "{}", password),
            (None, None) => Ok(()),
        }
    }
}

/// Validate sign-up input; both fields are checked independently.
pub fn validate_sign_up(email: &str, password: &str) -> Result<(), SignUpFieldErrors> {
    let mut errors = SignUpFieldErrors::default();
    if !is_valid_email(email) {
        errors.email = Some("Invalid email format".to_string());
    }
    if !is_strong_password(password) {
        errors.password = Some(
            "Password must be at least 8 characters, include uppercase, lowercase, \
             number, and special character"
                .to_string(),
        );
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails_pass() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("user.name@example.co.uk"));
        assert!(is_valid_email("x+tag@sub.domain.io"));
    }

    #[test]
    fn test_invalid_emails_fail() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("plainaddress"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("@no-local.com"));
        assert!(!is_valid_email("spaces in@address.com"));
        assert!(!is_valid_email("double@@at.com"));
    }

    #[test]
    fn test_strong_password_accepted() {
        assert!(is_strong_password("Abcdef1!"));
        assert!(is_strong_password("Xy9@aaaa"));
        assert!(is_strong_password("LongerPassw0rd&"));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(!is_strong_password("Ab1!abc"));
    }

    #[test]
    fn test_missing_character_classes_rejected() {
        assert!(!is_strong_password("abcdef1!")); // no uppercase
        assert!(!is_strong_password("ABCDEF1!")); // no lowercase
        assert!(!is_strong_password("Abcdefg!")); // no digit
        assert!(!is_strong_password("Abcdefg1")); // no symbol
    }

    #[test]
    fn test_characters_outside_the_set_rejected() {
        assert!(!is_strong_password("Abcdef1#"));
        assert!(!is_strong_password("Abcdef1! "));
    }

    #[test]
    fn test_sign_in_short_circuits_on_email_first() {
        // Both fields bad: only the email message is surfaced
        assert_eq!(
            validate_sign_in("", ""),
            Err("Please enter your email".to_string())
        );
        assert_eq!(
            validate_sign_in("not-an-email", ""),
            Err("Please enter a valid email address".to_string())
        );
    }

    #[test]
    fn test_sign_in_requires_password() {
        assert_eq!(
            validate_sign_in("a@b.com", ""),
            Err("Please enter your password".to_string())
        );
    }

    #[test]
    fn test_sign_in_does_not_enforce_password_strength() {
        // Returning users may have passwords that predate the policy
        assert_eq!(validate_sign_in("a@b.com", "weak"), Ok(()));
    }

    #[test]
    fn test_sign_up_reports_both_field_errors() {
        let errors = validate_sign_up("not-an-email", "weak").unwrap_err();
        assert!(errors.email.is_some());
        assert!(errors.password.is_some());
        let message = errors.to_string();
        assert!(message.contains("Invalid email format"));
        assert!(message.contains("at least 8 characters"));
    }

    #[test]
    fn test_sign_up_reports_single_field_error() {
        let errors = validate_sign_up("a@b.com", "weak").unwrap_err();
        assert!(errors.email.is_none());
        assert!(errors.password.is_some());

        let errors = validate_sign_up("bad", "Abcdef1!").unwrap_err();
        assert!(errors.email.is_some());
        assert!(errors.password.is_none());
    }

    #[test]
    fn test_sign_up_accepts_valid_input() {
        assert_eq!(validate_sign_up("a@b.com", "Abcdef1!"), Ok(()));
    }
}
