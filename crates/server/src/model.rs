//! User records and the request DTOs that mutate them.

use std::collections::BTreeMap;
use std::net::IpAddr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

const MAX_SUBJECT_LEN: usize = 128;
const MAX_EMAIL_LEN: usize = 255;
const MAX_NAME_LEN: usize = 100;
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;

/// Local record mirroring an externally-managed identity.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct User {
    pub id: u64,
    /// Stable key assigned by the identity provider. Unique.
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub provider: Option<String>,
    pub provider_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub login_count: u64,
    pub last_login_at: Option<Timestamp>,
    pub last_login_ip: Option<String>,
    pub last_login_device: Option<String>,
    pub disabled: bool,
    pub status: UserStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum UserStatus {
    Active,
    Inactive,
    Pending,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateUserRequest {
    pub subject: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub status: Option<UserStatus>,
    #[serde(default)]
    pub disabled: Option<bool>,
}

/// Login metadata attached to a user record on a successful sign-in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LoginInfoRequest {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
}

impl CreateUserRequest {
    pub(crate) fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.subject.is_empty() {
            problems.push("subject is required".to_owned());
        } else if self.subject.len() > MAX_SUBJECT_LEN {
            problems.push(format!("subject must be at most {MAX_SUBJECT_LEN} characters"));
        }

        if let Some(problem) = validate_email(&self.email) {
            problems.push(problem);
        }

        if let Some(problem) = validate_username(&self.username) {
            problems.push(problem);
        }

        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if let Some(value) = value
                && value.len() > MAX_NAME_LEN
            {
                problems.push(format!("{field} must be at most {MAX_NAME_LEN} characters"));
            }
        }

        if problems.is_empty() { Ok(()) } else { Err(problems) }
    }
}

impl UpdateUserRequest {
    pub(crate) fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if let Some(email) = &self.email
            && let Some(problem) = validate_email(email)
        {
            problems.push(problem);
        }

        if let Some(username) = &self.username
            && let Some(problem) = validate_username(username)
        {
            problems.push(problem);
        }

        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if let Some(value) = value
                && value.len() > MAX_NAME_LEN
            {
                problems.push(format!("{field} must be at most {MAX_NAME_LEN} characters"));
            }
        }

        if problems.is_empty() { Ok(()) } else { Err(problems) }
    }
}

impl LoginInfoRequest {
    pub(crate) fn validate(&self) -> Result<(), Vec<String>> {
        if let Some(ip) = &self.ip
            && ip.parse::<IpAddr>().is_err()
        {
            return Err(vec!["ip must be a valid IP address".to_owned()]);
        }

        Ok(())
    }
}

fn validate_email(email: &str) -> Option<String> {
    if email.is_empty() {
        return Some("email is required".to_owned());
    }
    if email.len() > MAX_EMAIL_LEN {
        return Some(format!("email must be at most {MAX_EMAIL_LEN} characters"));
    }

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Some("email must contain exactly one @".to_owned());
    };

    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return Some("email is not a valid address".to_owned());
    }

    None
}

fn validate_username(username: &str) -> Option<String> {
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Some("username must be between 3 and 50 characters".to_owned());
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Some("username may only contain letters, digits and underscores".to_owned());
    }

    None
}

/// Outcome of scoring a candidate password against the static policy.
#[derive(Debug, Serialize)]
pub(crate) struct PasswordStrength {
    /// 0 to 5, one point per satisfied requirement.
    pub score: u8,
    /// Whether the password meets the mandatory requirements (everything
    /// except the symbol, which only adds strength).
    pub valid: bool,
    pub requirements: BTreeMap<&'static str, bool>,
    pub feedback: Vec<&'static str>,
}

/// Score a candidate password: length, upper, lower, digit, symbol.
pub(crate) fn score_password(password: &str) -> PasswordStrength {
    let long_enough = password.chars().count() >= 8;
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_alphanumeric());

    let checks = [
        (long_enough, "min_length", "use at least 8 characters"),
        (has_upper, "uppercase", "add an uppercase letter"),
        (has_lower, "lowercase", "add a lowercase letter"),
        (has_digit, "digit", "add a digit"),
        (has_symbol, "symbol", "add a symbol for extra strength"),
    ];

    let mut requirements = BTreeMap::new();
    let mut feedback = Vec::new();
    let mut score = 0;

    for (passed, name, advice) in checks {
        requirements.insert(name, passed);
        if passed {
            score += 1;
        } else {
            feedback.push(advice);
        }
    }

    PasswordStrength {
        score,
        valid: long_enough && has_upper && has_lower && has_digit,
        requirements,
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> CreateUserRequest {
        CreateUserRequest {
            subject: "auth0|u1".to_owned(),
            email: "u1@example.com".to_owned(),
            username: "user_one".to_owned(),
            email_verified: true,
            first_name: None,
            last_name: None,
            provider: None,
            provider_id: None,
            status: None,
        }
    }

    #[test]
    fn valid_create_request_passes() {
        create_request().validate().unwrap();
    }

    #[test]
    fn empty_subject_is_rejected() {
        let mut request = create_request();
        request.subject = String::new();

        let problems = request.validate().unwrap_err();
        assert_eq!(problems, vec!["subject is required"]);
    }

    #[test]
    fn bad_emails_are_rejected() {
        for email in ["", "no-at.example.com", "two@@example.com", "a@nodot", "a b@example.com"] {
            let mut request = create_request();
            request.email = email.to_owned();
            assert!(request.validate().is_err(), "{email:?}");
        }
    }

    #[test]
    fn username_charset_and_length() {
        for username in ["ab", "has space", "dash-ed", &"x".repeat(51)] {
            let mut request = create_request();
            request.username = username.to_owned();
            assert!(request.validate().is_err(), "{username:?}");
        }

        let mut request = create_request();
        request.username = "User_123".to_owned();
        request.validate().unwrap();
    }

    #[test]
    fn update_with_no_fields_is_valid() {
        UpdateUserRequest::default().validate().unwrap();
    }

    #[test]
    fn login_info_rejects_garbage_ip() {
        let request = LoginInfoRequest {
            ip: Some("not-an-ip".to_owned()),
            device: None,
        };
        assert!(request.validate().is_err());

        let request = LoginInfoRequest {
            ip: Some("203.0.113.9".to_owned()),
            device: Some("cli".to_owned()),
        };
        request.validate().unwrap();
    }

    #[test]
    fn password_scoring() {
        let weak = score_password("abc");
        assert_eq!(weak.score, 1);
        assert!(!weak.valid);
        assert!(weak.requirements["lowercase"]);

        let strong = score_password("Str0ng-enough");
        assert_eq!(strong.score, 5);
        assert!(strong.valid);
        assert!(strong.feedback.is_empty());

        // Symbol is optional for validity, only adds strength.
        let no_symbol = score_password("Str0ngenough");
        assert_eq!(no_symbol.score, 4);
        assert!(no_symbol.valid);
    }
}
