//! Request payloads and the enumerations shared with the frontend.
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    counter::LogCategory,
    documents::{Collection, Document},
    error::AppError,
    log_number::parse_log_number,
};

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Picking,
    Putaway,
    Replenishment,
    CycleCount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionType {
    Damage,
    Shortage,
    Overage,
    Mislocation,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Zone {
    A,
    B,
    C,
    D,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// At least six characters with a digit, a lowercase and an uppercase letter.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_uppercase())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    pub name: String,
    pub department: String,
    pub title: String,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
}

fn filled(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl SignupRequest {
    /// Checks mandatory fields and password strength. The returned password is still plain text.
    pub fn validate(self) -> Result<NewEmployee, AppError> {
        let (Some(name), Some(department), Some(title), Some(email), Some(password)) = (
            filled(self.name),
            filled(self.department),
            filled(self.title),
            filled(self.email),
            self.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::malformed("Please fill all mandatory fields."));
        };

        if !is_valid_email(&email) {
            return Err(AppError::malformed("Please provide a valid email address."));
        }

        if !is_strong_password(&password) {
            return Err(AppError::malformed(
                "Password is not strong enough, choose a stronger one.",
            ));
        }

        Ok(NewEmployee {
            name,
            department,
            title,
            email: email.to_lowercase(),
            password,
            is_admin: self.is_admin,
        })
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, PartialEq)]
pub struct NewRootCause {
    pub task: TaskType,
    #[serde(rename = "type")]
    pub kind: ExceptionType,
    pub title: String,
}

/// Sanity checks for documents loaded from mock data files.
pub fn check_document(collection: Collection, document: &Document) -> Result<(), String> {
    let text = |field: &str| document.get(field).and_then(Value::as_str);
    let parses = |field: &str, check: fn(Value) -> bool| {
        document.get(field).cloned().is_some_and(check)
    };

    match collection {
        Collection::Skus => {
            if text("no").is_none() || text("name").is_none() {
                return Err("SKU requires no and name".to_string());
            }
            if !parses("zone", |v| serde_json::from_value::<Zone>(v).is_ok()) {
                return Err("SKU zone must be one of A, B, C, D".to_string());
            }
            if !document.get("price").is_some_and(Value::is_number) {
                return Err("SKU price must be a number".to_string());
            }
        }
        Collection::RootCauses => {
            if !parses("task", |v| serde_json::from_value::<TaskType>(v).is_ok())
                || !parses("type", |v| serde_json::from_value::<ExceptionType>(v).is_ok())
            {
                return Err("Root cause requires a valid task and type".to_string());
            }
            if text("title").is_none() {
                return Err("Root cause requires a title".to_string());
            }
        }
        Collection::Employees => {
            if !text("email").is_some_and(is_valid_email) {
                return Err("Employee requires a valid email".to_string());
            }
        }
        Collection::Exceptions => {
            let issued = text("no").and_then(parse_log_number);
            if !matches!(issued, Some((LogCategory::Exception, _))) {
                return Err("Exception log requires a no such as EXC-000001".to_string());
            }
        }
        _ => {}
    }

    Ok(())
}
