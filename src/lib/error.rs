//! Error taxonomy and response shape for vpn-admin
//!
//! Orchestrators return [`AdminResult`]; the front end turns it into an
//! [`ApiResponse`] so callers only ever see `{success, data, message}`.

use serde::Serialize;
use thiserror::Error;

use crate::runner::{CommandResult, FailureKind};

/// Message shown when a privileged command needs a password
pub const AUTH_REQUIRED_MESSAGE: &str =
    "Sudo password required. Please configure passwordless sudo (NOPASSWD) for the VPN management commands.";

/// Message shown when the external tool is missing
pub const COMMAND_NOT_FOUND_MESSAGE: &str =
    "Required command not found. Ensure the VPN management tool is installed and on PATH.";

/// Failure classes surfaced by every administrative operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    /// Bad or missing input, rejected before any external call
    #[error("{0}")]
    InvalidInput(String),

    /// Privileged command lacks passwordless rights
    #[error("{0}")]
    AuthRequired(String),

    /// User or artifact absent
    #[error("{0}")]
    NotFound(String),

    /// User or artifact already present
    #[error("{0}")]
    AlreadyExists(String),

    /// External command exceeded its time budget
    #[error("{0}")]
    Timeout(String),

    /// External command failed; carries its sanitized error text
    #[error("{0}")]
    ExternalToolFailure(String),

    /// The tool reported one thing, verification showed another
    #[error("{0}")]
    PartialSuccess(String),

    /// Unexpected internal state
    #[error("{0}")]
    Internal(String),
}

/// Serializable tag for [`AdminError`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidInput,
    AuthRequired,
    NotFound,
    AlreadyExists,
    Timeout,
    ExternalToolFailure,
    PartialSuccess,
    Internal,
}

pub type AdminResult<T> = Result<T, AdminError>;

impl AdminError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdminError::InvalidInput(_) => ErrorKind::InvalidInput,
            AdminError::AuthRequired(_) => ErrorKind::AuthRequired,
            AdminError::NotFound(_) => ErrorKind::NotFound,
            AdminError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            AdminError::Timeout(_) => ErrorKind::Timeout,
            AdminError::ExternalToolFailure(_) => ErrorKind::ExternalToolFailure,
            AdminError::PartialSuccess(_) => ErrorKind::PartialSuccess,
            AdminError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable message carried by the error
    pub fn message(&self) -> &str {
        match self {
            AdminError::InvalidInput(m)
            | AdminError::AuthRequired(m)
            | AdminError::NotFound(m)
            | AdminError::AlreadyExists(m)
            | AdminError::Timeout(m)
            | AdminError::ExternalToolFailure(m)
            | AdminError::PartialSuccess(m)
            | AdminError::Internal(m) => m,
        }
    }

    /// Translate a failed command result into an error.
    ///
    /// `fallback` is used when the command produced no error text at all.
    pub fn from_command(result: &CommandResult, fallback: &str) -> Self {
        match result.failure_kind {
            FailureKind::Timeout => AdminError::Timeout(format!(
                "Command timed out after {} ms",
                result.duration.as_millis()
            )),
            FailureKind::AuthRequired => AdminError::AuthRequired(AUTH_REQUIRED_MESSAGE.to_string()),
            FailureKind::CommandNotFound => {
                AdminError::ExternalToolFailure(COMMAND_NOT_FOUND_MESSAGE.to_string())
            }
            FailureKind::NonZeroExit if result.truncated => AdminError::ExternalToolFailure(
                "Command output exceeded the size limit and was cut off".to_string(),
            ),
            FailureKind::NonZeroExit | FailureKind::None => {
                let text = result.error_text();
                AdminError::ExternalToolFailure(if text.is_empty() {
                    fallback.to_string()
                } else {
                    text
                })
            }
        }
    }
}

impl From<crate::runner::RunnerError> for AdminError {
    fn from(err: crate::runner::RunnerError) -> Self {
        AdminError::Internal(err.to_string())
    }
}

/// Uniform result shape handed to the outer interface
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error_kind: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            error_kind: None,
        }
    }

    pub fn failure(err: &AdminError) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(err.message().to_string()),
            error_kind: Some(err.kind()),
        }
    }

    /// Build a response from an operation result, deriving the success message from the data
    pub fn from_result<F>(result: AdminResult<T>, message: F) -> Self
    where
        F: FnOnce(&T) -> Option<String>,
    {
        match result {
            Ok(data) => {
                let msg = message(&data);
                Self {
                    success: true,
                    data: Some(data),
                    message: msg,
                    error_kind: None,
                }
            }
            Err(err) => Self::failure(&err),
        }
    }
}

impl<T: Serialize> From<AdminResult<T>> for ApiResponse<T> {
    fn from(result: AdminResult<T>) -> Self {
        Self::from_result(result, |_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn failed(kind: FailureKind, stderr: &str) -> CommandResult {
        CommandResult {
            success: false,
            stderr: stderr.to_string(),
            failure_kind: kind,
            exit_code: Some(1),
            duration: Duration::from_millis(1500),
            ..CommandResult::default()
        }
    }

    #[test]
    fn test_from_command_timeout() {
        let err = AdminError::from_command(&failed(FailureKind::Timeout, ""), "x");
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.message().contains("1500"));
    }

    #[test]
    fn test_from_command_auth() {
        let err = AdminError::from_command(
            &failed(FailureKind::AuthRequired, "sudo: a password is required"),
            "x",
        );
        assert_eq!(err, AdminError::AuthRequired(AUTH_REQUIRED_MESSAGE.to_string()));
    }

    #[test]
    fn test_from_command_uses_stderr_then_fallback() {
        let err = AdminError::from_command(&failed(FailureKind::NonZeroExit, "boom\n"), "fallback");
        assert_eq!(err, AdminError::ExternalToolFailure("boom".to_string()));

        let err = AdminError::from_command(&failed(FailureKind::NonZeroExit, "  "), "fallback");
        assert_eq!(err, AdminError::ExternalToolFailure("fallback".to_string()));
    }

    #[test]
    fn test_from_command_truncated_output() {
        let mut result = failed(FailureKind::NonZeroExit, "");
        result.stdout = "partial listing".to_string();
        result.truncated = true;
        let err = AdminError::from_command(&result, "fallback");
        assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
        assert!(err.message().contains("size limit"));
    }

    #[test]
    fn test_response_serialization() {
        let ok: ApiResponse<Vec<u32>> = ApiResponse::ok(vec![1, 2]);
        assert_eq!(
            serde_json::to_string(&ok).unwrap(),
            r#"{"success":true,"data":[1,2]}"#
        );

        let err: ApiResponse<()> =
            Err::<(), _>(AdminError::NotFound("User \"x\" does not exist".into())).into();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errorKind"], "notFound");
        assert_eq!(json["message"], "User \"x\" does not exist");
        assert!(json.get("data").is_none());
    }
}
