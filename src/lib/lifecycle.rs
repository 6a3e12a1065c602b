//! User lifecycle for vpn-admin
//!
//! A user moves `NotExists -> Active -> Revoked`, but that state lives in
//! the management tool, not here. Every operation re-reads what it needs
//! from the tool's listing or the artifact directory, drives the tool
//! non-interactively, and verifies the result before reporting success.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::AdminConfig;
use crate::error::{AdminError, AdminResult};
use crate::locks::KeyedLocks;
use crate::logging::Logger;
use crate::runner::{CommandOptions, CommandResult, CommandRunner, FailureKind};
use crate::user_list::{UserListParser, UserRecord};
use crate::username::{artifact_path, validate_username};

/// Longest certificate validity the tool accepts
pub const MAX_VALIDITY_DAYS: u32 = 3650;

/// Tool messages that mean the name is taken
const DUPLICATE_MARKERS: [&str; 2] = ["already exists", "name is already in use"];

/// A user that was created and whose artifact was found afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    pub username: String,
    pub artifact_path: PathBuf,
}

/// Result of a revoke
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokedUser {
    pub username: String,
    /// The local artifact was deleted by this call
    pub artifact_removed: bool,
    /// The revoke command failed but a fresh listing shows the user gone or revoked
    pub confirmed_by_listing: bool,
}

/// A user's artifact on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    pub username: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Lists, creates and revokes users through the management tool
pub struct UserLifecycle {
    runner: Arc<dyn CommandRunner>,
    config: AdminConfig,
    parser: UserListParser,
    locks: KeyedLocks,
    logger: Logger,
}

impl UserLifecycle {
    pub fn new(runner: Arc<dyn CommandRunner>, config: AdminConfig, logger: &Logger) -> Self {
        let parser = UserListParser::new(config.dialect.program.clone());
        Self {
            runner,
            config,
            parser,
            locks: KeyedLocks::new(),
            logger: logger.child("lifecycle"),
        }
    }

    /// Current users as the tool reports them.
    ///
    /// The structured listing is tried first when enabled; text parsing is
    /// the fallback when it fails or does not parse.
    pub fn list_users(&self) -> AdminResult<Vec<UserRecord>> {
        if self.config.structured_listing {
            if let Some(command) = self.config.dialect.structured_list_command() {
                let result = self.run(&command)?;
                if result.failure_kind == FailureKind::AuthRequired {
                    return Err(AdminError::from_command(&result, "Failed to list users"));
                }
                if result.success {
                    if let Some(users) = self.parser.parse_structured(&result.stdout) {
                        self.logger
                            .debug(format!("Structured listing returned {} user(s)", users.len()));
                        return Ok(users);
                    }
                }
                self.logger
                    .debug("Structured listing unavailable, parsing text output");
            }
        }

        let result = self.run(&self.config.dialect.list_command())?;
        if !result.success {
            return Err(AdminError::from_command(&result, "Failed to list users"));
        }

        let users = self.parser.parse(&result.stdout);
        self.logger.debug(format!("Parsed {} user(s)", users.len()));
        Ok(users)
    }

    /// Create a user with the configured validity
    pub fn create(&self, username: &str) -> AdminResult<CreatedUser> {
        self.create_with_validity(username, self.config.validity_days)
    }

    /// Create a user; `validity_days` of `None` means the tool's passwordless default.
    ///
    /// Success is reported only once the artifact exists: the tool has been
    /// seen to exit zero without producing one.
    pub fn create_with_validity(
        &self,
        username: &str,
        validity_days: Option<u32>,
    ) -> AdminResult<CreatedUser> {
        let username = validate_username(username)?;
        if let Some(days) = validity_days {
            if !(1..=MAX_VALIDITY_DAYS).contains(&days) {
                return Err(AdminError::InvalidInput(format!(
                    "Validity must be between 1 and {} days",
                    MAX_VALIDITY_DAYS
                )));
            }
        }
        let path = self.artifact_path(username)?;

        let _guard = self.locks.acquire(username);

        if path.exists() {
            return Err(already_exists(username));
        }
        match self.list_users() {
            Ok(users) if has_active(&users, username) => return Err(already_exists(username)),
            Ok(_) => {}
            Err(err @ AdminError::AuthRequired(_)) => return Err(err),
            Err(err) => {
                self.logger
                    .warn(format!("Could not check existing users: {}", err));
            }
        }

        self.logger.info(format!("Creating user {}", username));
        let result = self.run(&self.config.dialect.add_command(username, validity_days))?;

        if reports_duplicate(&result) {
            return Err(already_exists(username));
        }
        if !result.success {
            return Err(AdminError::from_command(&result, "Failed to create user"));
        }

        if !path.is_file() {
            self.logger.error(format!(
                "User {} created but {} is missing",
                username,
                path.display()
            ));
            return Err(AdminError::PartialSuccess(format!(
                "User {} was created but the configuration file {} was not found",
                username,
                path.display()
            )));
        }

        self.logger.info(format!("User {} created", username));
        Ok(CreatedUser {
            username: username.to_string(),
            artifact_path: path,
        })
    }

    /// Revoke a user and delete their artifact.
    ///
    /// The artifact is deleted whatever the revoke command reports. A
    /// non-zero exit is checked against a fresh listing before it counts
    /// as a failure.
    pub fn revoke(&self, username: &str) -> AdminResult<RevokedUser> {
        let username = validate_username(username)?;
        let path = self.artifact_path(username)?;

        let _guard = self.locks.acquire(username);

        if !path.exists() {
            let users = self.list_users()?;
            if !has_active(&users, username) {
                return Err(AdminError::NotFound(format!("User {} not found", username)));
            }
        }

        self.logger.info(format!("Revoking user {}", username));
        let outcome = self.run(&self.config.dialect.revoke_command(username));
        let artifact_removed = self.remove_artifact(&path);
        let result = outcome?;

        if result.success {
            self.logger.info(format!("User {} revoked", username));
            return Ok(RevokedUser {
                username: username.to_string(),
                artifact_removed,
                confirmed_by_listing: false,
            });
        }

        if result.failure_kind != FailureKind::NonZeroExit {
            return Err(AdminError::from_command(&result, "Failed to revoke user"));
        }

        let reason = AdminError::from_command(&result, "Failed to revoke user");
        match self.list_users() {
            Ok(users) if !has_active(&users, username) => {
                self.logger.warn(format!(
                    "Revoke command for {} failed but the listing no longer shows it active",
                    username
                ));
                Ok(RevokedUser {
                    username: username.to_string(),
                    artifact_removed,
                    confirmed_by_listing: true,
                })
            }
            _ => Err(AdminError::PartialSuccess(format!(
                "Revoke of {} failed ({}); configuration file {}",
                username,
                reason.message(),
                if artifact_removed { "removed" } else { "not removed" }
            ))),
        }
    }

    /// Locate a user's artifact for download
    pub fn artifact(&self, username: &str) -> AdminResult<ArtifactInfo> {
        let username = validate_username(username)?;
        let path = self.artifact_path(username)?;

        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(ArtifactInfo {
                username: username.to_string(),
                path,
                size_bytes: meta.len(),
            }),
            Ok(_) => Err(artifact_not_found(username)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(artifact_not_found(username)),
            Err(e) => Err(AdminError::Internal(format!(
                "Cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Artifact contents
    pub fn read_artifact(&self, username: &str) -> AdminResult<Vec<u8>> {
        let info = self.artifact(username)?;
        fs::read(&info.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => artifact_not_found(&info.username),
            _ => AdminError::Internal(format!("Cannot read {}: {}", info.path.display(), e)),
        })
    }

    fn artifact_path(&self, username: &str) -> AdminResult<PathBuf> {
        artifact_path(
            &self.config.artifact_dir,
            username,
            &self.config.artifact_extension,
        )
    }

    /// Delete the artifact; a missing file or a failed delete is not an error
    fn remove_artifact(&self, path: &std::path::Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => {
                self.logger.debug(format!("Removed {}", path.display()));
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                self.logger
                    .warn(format!("Could not remove {}: {}", path.display(), e));
                false
            }
        }
    }

    fn run(&self, command: &str) -> AdminResult<CommandResult> {
        Ok(self
            .runner
            .execute(command, &CommandOptions::from_config(&self.config))?)
    }
}

fn has_active(users: &[UserRecord], username: &str) -> bool {
    users.iter().any(|u| u.username == username && u.is_active())
}

fn reports_duplicate(result: &CommandResult) -> bool {
    let output = format!("{}\n{}", result.stdout, result.stderr).to_lowercase();
    DUPLICATE_MARKERS.iter().any(|m| output.contains(m))
}

fn already_exists(username: &str) -> AdminError {
    AdminError::AlreadyExists(format!("User {} already exists", username))
}

fn artifact_not_found(username: &str) -> AdminError {
    AdminError::NotFound(format!("Configuration file for {} not found", username))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_list::UserStatus;

    fn record(name: &str, status: UserStatus) -> UserRecord {
        UserRecord {
            username: name.to_string(),
            status,
            created_at: None,
            expires_at: None,
            raw_line: name.to_string(),
        }
    }

    #[test]
    fn test_has_active_ignores_revoked() {
        let users = vec![
            record("alice", UserStatus::Active),
            record("bob", UserStatus::Revoked),
        ];
        assert!(has_active(&users, "alice"));
        assert!(!has_active(&users, "bob"));
        assert!(!has_active(&users, "carol"));
    }

    #[test]
    fn test_reports_duplicate() {
        let mut result = CommandResult::failed(1, "::: A client with this name already exists");
        assert!(reports_duplicate(&result));
        result.stderr = "Name is already in use".to_string();
        assert!(reports_duplicate(&result));
        result.stderr = "something else".to_string();
        assert!(!reports_duplicate(&result));
    }
}
