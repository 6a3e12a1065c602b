//! Username validation for vpn-admin
//!
//! One grammar, `^[A-Za-z0-9_-]{2,32}$`, applies at every boundary: input
//! from the operator, names parsed out of command output, and artifact
//! file names.

use std::path::{Path, PathBuf};

use crate::error::{AdminError, AdminResult};

/// Shortest accepted username
pub const MIN_USERNAME_LEN: usize = 2;
/// Longest accepted username
pub const MAX_USERNAME_LEN: usize = 32;

/// Check a candidate against the identifier grammar
pub fn is_valid_username(candidate: &str) -> bool {
    (MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&candidate.len())
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Validate operator-supplied input, returning the trimmed username.
///
/// Produces a distinct message for each way the input can be wrong.
pub fn validate_username(input: &str) -> AdminResult<&str> {
    let username = input.trim();

    if username.is_empty() {
        return Err(AdminError::InvalidInput("Username is required".to_string()));
    }

    if !username
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(AdminError::InvalidInput(
            "Username must contain only letters, numbers, hyphens, and underscores".to_string(),
        ));
    }

    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&username.len()) {
        return Err(AdminError::InvalidInput(format!(
            "Username must be between {} and {} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }

    Ok(username)
}

/// Build `<dir>/<username>.<extension>` without ever leaving `dir`.
///
/// Anything that looks like a path component (`..`, `/`, `\`) is refused
/// before concatenation, and the grammar check runs on top of that.
pub fn artifact_path(dir: &Path, username: &str, extension: &str) -> AdminResult<PathBuf> {
    if username.contains("..") || username.contains('/') || username.contains('\\') {
        return Err(AdminError::InvalidInput("Invalid username".to_string()));
    }

    let username = validate_username(username)?;

    let extension = extension.trim_start_matches('.');
    if extension.is_empty()
        || extension.contains("..")
        || extension.contains('/')
        || extension.contains('\\')
    {
        return Err(AdminError::Internal(format!(
            "Invalid artifact extension: \"{}\"",
            extension
        )));
    }

    Ok(dir.join(format!("{}.{}", username, extension)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        let longest = "x".repeat(32);
        for name in ["ab", "alice", "Bob_2", "user-name", "A1", longest.as_str()] {
            assert!(is_valid_username(name), "{} should be valid", name);
        }
    }

    #[test]
    fn test_invalid_usernames() {
        let too_long = "x".repeat(33);
        for name in [
            "",
            "a",
            too_long.as_str(),
            "a b",
            "../etc",
            "alice/bob",
            "name.ovpn",
            "ünï",
            "semi;colon",
            "$(id)",
            "::",
        ] {
            assert!(!is_valid_username(name), "{:?} should be invalid", name);
        }
    }

    #[test]
    fn test_validate_username_messages() {
        assert_eq!(validate_username("  alice "), Ok("alice"));
        assert_eq!(
            validate_username("   "),
            Err(AdminError::InvalidInput("Username is required".into()))
        );
        assert!(matches!(
            validate_username("a b"),
            Err(AdminError::InvalidInput(m)) if m.contains("only letters")
        ));
        assert!(matches!(
            validate_username("a"),
            Err(AdminError::InvalidInput(m)) if m.contains("between 2 and 32")
        ));
    }

    #[test]
    fn test_artifact_path() {
        let dir = Path::new("/home/pi/ovpns");
        assert_eq!(
            artifact_path(dir, "alice", "ovpn").unwrap(),
            PathBuf::from("/home/pi/ovpns/alice.ovpn")
        );
        assert_eq!(
            artifact_path(dir, "alice", ".conf").unwrap(),
            PathBuf::from("/home/pi/ovpns/alice.conf")
        );
    }

    #[test]
    fn test_artifact_path_rejects_traversal() {
        let dir = Path::new("/home/pi/ovpns");
        for name in ["../etc/passwd", "..", "a/b", "a\\b", "a b"] {
            assert!(matches!(
                artifact_path(dir, name, "ovpn"),
                Err(AdminError::InvalidInput(_))
            ));
        }
        assert!(artifact_path(dir, "alice", "../x").is_err());
    }
}
