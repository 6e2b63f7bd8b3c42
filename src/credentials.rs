//! API key handling.
//!
//! [`Credentials`] is a cheap, cloneable handle to the current key.  Sources
//! read it on every call, so a key supplied while the dashboard is running
//! takes effect on the next fetch.
//!
//! The key is looked up in the env file first and then in the process
//! environment.  The env file is re-read on every [`Credentials::reload`]
//! and never copied into the environment, so editing it while the
//! dashboard runs and reloading picks up the new value.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Shared, late-bindable API key.
#[derive(Clone)]
pub struct Credentials {
    env_var: String,
    env_file: PathBuf,
    key: Arc<RwLock<Option<String>>>,
}

impl Credentials {
    /// A handle with no key yet, reading `env_var` from `env_file` (usually
    /// `.env`) or the environment on each [`reload`](Self::reload).
    pub fn new(env_var: impl Into<String>, env_file: impl Into<PathBuf>) -> Self {
        Self {
            env_var: env_var.into(),
            env_file: env_file.into(),
            key: Arc::new(RwLock::new(None)),
        }
    }

    /// Name of the environment variable the key is read from.
    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    pub fn env_file(&self) -> &Path {
        &self.env_file
    }

    /// Re-read the env file and the environment.
    ///
    /// Idempotent.  A missing or blank variable leaves any existing key in
    /// place.  Returns whether a key is configured afterwards.
    pub fn reload(&self) -> bool {
        match self.lookup() {
            Some(value) => {
                self.set(value);
                tracing::info!(env_var = %self.env_var, "API key loaded");
            }
            None => tracing::debug!(env_var = %self.env_var, "no API key found"),
        }
        self.is_configured()
    }

    fn lookup(&self) -> Option<String> {
        let non_blank = |v: String| Some(v.trim().to_string()).filter(|v| !v.is_empty());
        self.read_env_file()
            .and_then(non_blank)
            .or_else(|| std::env::var(&self.env_var).ok().and_then(non_blank))
    }

    /// Last assignment of `env_var` in the env file, if any.
    fn read_env_file(&self) -> Option<String> {
        let entries = match dotenvy::from_path_iter(&self.env_file) {
            Ok(entries) => entries,
            Err(err) => {
                if !err.not_found() {
                    tracing::warn!(
                        path = %self.env_file.display(),
                        error = %err,
                        "could not read env file"
                    );
                }
                return None;
            }
        };
        entries
            .filter_map(Result::ok)
            .filter(|(name, _)| *name == self.env_var)
            .map(|(_, value)| value)
            .last()
    }

    /// Install a key directly.
    pub fn set(&self, key: impl Into<String>) {
        let mut guard = self.key.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(key.into());
    }

    /// The current key, if any.
    pub fn get(&self) -> Option<String> {
        self.key.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_configured(&self) -> bool {
        self.key
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("env_var", &self.env_var)
            .field("env_file", &self.env_file)
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn no_file() -> PathBuf {
        PathBuf::from("/nonexistent/trend-pulse/.env")
    }

    #[test]
    fn new_handle_has_no_key() {
        let creds = Credentials::new("TREND_PULSE_TEST_UNSET_KEY", no_file());
        assert!(!creds.is_configured());
        assert_eq!(creds.get(), None);
    }

    #[test]
    fn set_is_visible_through_clones() {
        let creds = Credentials::new("TREND_PULSE_TEST_UNUSED", no_file());
        let clone = creds.clone();
        creds.set("secret");
        assert_eq!(clone.get().as_deref(), Some("secret"));
    }

    #[test]
    fn reload_without_variable_keeps_existing_key() {
        let creds = Credentials::new("TREND_PULSE_TEST_DEFINITELY_UNSET", no_file());
        creds.set("kept");
        assert!(creds.reload());
        assert!(creds.reload(), "reload is idempotent");
        assert_eq!(creds.get().as_deref(), Some("kept"));
    }

    #[test]
    fn reload_picks_up_edited_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        fs::write(&env_file, "TREND_PULSE_TEST_FILE_KEY=old-invalid\n").unwrap();

        let creds = Credentials::new("TREND_PULSE_TEST_FILE_KEY", &env_file);
        assert!(creds.reload());
        assert_eq!(creds.get().as_deref(), Some("old-invalid"));

        fs::write(&env_file, "OTHER=1\nTREND_PULSE_TEST_FILE_KEY=fixed\n").unwrap();
        assert!(creds.reload());
        assert_eq!(creds.get().as_deref(), Some("fixed"));
        assert!(
            std::env::var("TREND_PULSE_TEST_FILE_KEY").is_err(),
            "the process environment is left untouched"
        );
    }

    #[test]
    fn blank_value_in_env_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        fs::write(&env_file, "TREND_PULSE_TEST_BLANK_KEY=\n").unwrap();

        let creds = Credentials::new("TREND_PULSE_TEST_BLANK_KEY", &env_file);
        assert!(!creds.reload());
    }

    #[test]
    fn debug_output_never_contains_the_key() {
        let creds = Credentials::new("TREND_PULSE_TEST_UNUSED", no_file());
        creds.set("hunter2");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("configured: true"));
    }
}
