//! Dependency checks before a session starts.
//!
//! rtlog drives two external programs: `script` for the transcript and timing
//! capture, and `zsh` whose hooks report each command. Both ship with macOS and
//! most Linux distributions, but a missing one must abort `start` before any
//! session directory is created.

use std::path::Path;
use std::process::Command;

use crate::error::{Result, RtlogError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyStatus {
    pub name: String,
    pub required: bool,
    pub found: bool,
    pub path: Option<String>,
    pub install_hint: Option<String>,
}

pub fn check_all_dependencies() -> Vec<DependencyStatus> {
    vec![check_script(), check_zsh()]
}

/// Fails with `MissingDependency` for the first required program not found.
pub fn require_dependencies() -> Result<Vec<DependencyStatus>> {
    let dependencies = check_all_dependencies();
    if let Some(missing) = dependencies.iter().find(|d| d.required && !d.found) {
        return Err(RtlogError::MissingDependency {
            name: missing.name.clone(),
            hint: missing
                .install_hint
                .clone()
                .unwrap_or_else(|| "install it and retry".to_string()),
        });
    }
    Ok(dependencies)
}

/// Warns when the user's own `.zshrc` is missing; the session rc sources it.
pub fn check_user_zshrc(home: &Path) -> bool {
    let found = home.join(".zshrc").exists();
    if !found {
        tracing::warn!(home = %home.display(), "~/.zshrc not found; the session shell starts without it");
    }
    found
}

fn check_script() -> DependencyStatus {
    let path = which_with_fallback("script", &["/usr/bin/script", "/bin/script"]);
    DependencyStatus {
        name: "script".to_string(),
        required: true,
        found: path.is_some(),
        path,
        install_hint: Some("install util-linux (Linux) or use the macOS builtin".to_string()),
    }
}

fn check_zsh() -> DependencyStatus {
    let path = which_with_fallback(
        "zsh",
        &["/bin/zsh", "/usr/bin/zsh", "/opt/homebrew/bin/zsh", "/usr/local/bin/zsh"],
    );
    DependencyStatus {
        name: "zsh".to_string(),
        required: true,
        found: path.is_some(),
        path,
        install_hint: Some("brew install zsh / apt install zsh".to_string()),
    }
}

fn which(binary: &str) -> Option<String> {
    let output = Command::new("which").arg(binary).output().ok()?;

    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !path.is_empty() {
            return Some(path);
        }
    }
    None
}

fn which_with_fallback(binary: &str, fallback_paths: &[&str]) -> Option<String> {
    if let Some(path) = which(binary) {
        return Some(path);
    }

    fallback_paths
        .iter()
        .map(Path::new)
        .find(|p| p.is_file())
        .map(|p| p.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn all_dependencies_are_reported() {
        let names: Vec<_> = check_all_dependencies()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["script", "zsh"]);
    }

    #[test]
    fn unknown_binary_is_not_found() {
        assert_eq!(
            which_with_fallback("rtlog-definitely-not-installed", &["/nonexistent/x"]),
            None
        );
    }

    #[test]
    fn fallback_path_is_used() {
        let temp = tempdir().unwrap();
        let fake = temp.path().join("fake-bin");
        std::fs::write(&fake, "").unwrap();
        let fake_str = fake.to_string_lossy().to_string();
        assert_eq!(
            which_with_fallback("rtlog-definitely-not-installed", &[fake_str.as_str()]),
            Some(fake_str.clone())
        );
    }

    #[test]
    fn zshrc_presence() {
        let temp = tempdir().unwrap();
        assert!(!check_user_zshrc(temp.path()));
        std::fs::write(temp.path().join(".zshrc"), "").unwrap();
        assert!(check_user_zshrc(temp.path()));
    }
}
