//! Provider credential bootstrap.
//!
//! The completion key is taken from the environment first. When it is absent
//! and an operator is at the terminal, they are asked for it once. The key is
//! never written anywhere.

use std::io::{BufRead, IsTerminal, Write};

use crate::error::StartupError;

pub const COMPLETION_KEY_VAR: &str = "OPENAI_API_KEY";
pub const MIN_KEY_LEN: usize = 20;

/// Source of a credential the environment did not provide.
pub trait CredentialPrompt: Send {
    /// `None` when nobody can be asked.
    fn ask(&mut self, name: &str) -> std::io::Result<Option<String>>;
}

/// Prompts on stdin/stderr, only when stdin is an interactive terminal.
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn ask(&mut self, name: &str) -> std::io::Result<Option<String>> {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return Ok(None);
        }

        let mut stderr = std::io::stderr();
        write!(stderr, "{name} is not set. Enter it now: ")?;
        stderr.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

pub fn validate_key(name: &'static str, raw: &str) -> Result<String, StartupError> {
    let key = raw.trim();
    if key.chars().count() < MIN_KEY_LEN {
        return Err(StartupError::InvalidCredential {
            name,
            reason: format!("expected at least {MIN_KEY_LEN} characters"),
        });
    }
    Ok(key.to_string())
}

/// Resolve a required key: configured value first, then the prompt.
pub fn resolve_required(
    name: &'static str,
    configured: Option<&str>,
    prompt: &mut dyn CredentialPrompt,
) -> Result<String, StartupError> {
    if let Some(value) = configured.filter(|v| !v.trim().is_empty()) {
        return validate_key(name, value);
    }

    tracing::warn!(credential = name, "credential not found in environment");
    let answer = prompt
        .ask(name)
        .map_err(|e| StartupError::InvalidCredential {
            name,
            reason: format!("prompt failed: {e}"),
        })?;

    match answer {
        Some(value) if !value.trim().is_empty() => {
            let key = validate_key(name, &value)?;
            tracing::info!(credential = name, "credential provided interactively");
            Ok(key)
        }
        _ => Err(StartupError::MissingCredential(name)),
    }
}

/// Completion key, prompting on the terminal off the async runtime if needed.
pub async fn bootstrap_completion_key(configured: Option<String>) -> Result<String, StartupError> {
    tokio::task::spawn_blocking(move || {
        resolve_required(COMPLETION_KEY_VAR, configured.as_deref(), &mut TerminalPrompt)
    })
    .await
    .map_err(|e| StartupError::InvalidCredential {
        name: COMPLETION_KEY_VAR,
        reason: format!("prompt task failed: {e}"),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Option<&'static str>, usize);

    impl CredentialPrompt for Scripted {
        fn ask(&mut self, _name: &str) -> std::io::Result<Option<String>> {
            self.1 += 1;
            Ok(self.0.map(ToString::to_string))
        }
    }

    const GOOD: &str = "sk-test-0123456789abcdef";

    #[test]
    fn test_configured_key_skips_prompt() {
        let mut prompt = Scripted(Some("unused"), 0);
        let key = resolve_required(COMPLETION_KEY_VAR, Some(GOOD), &mut prompt).unwrap();
        assert_eq!(key, GOOD);
        assert_eq!(prompt.1, 0);
    }

    #[test]
    fn test_prompted_key_is_trimmed() {
        let mut prompt = Scripted(Some("  sk-test-0123456789abcdef\n"), 0);
        let key = resolve_required(COMPLETION_KEY_VAR, None, &mut prompt).unwrap();
        assert_eq!(key, GOOD);
        assert_eq!(prompt.1, 1);
    }

    #[test]
    fn test_short_keys_rejected() {
        let mut prompt = Scripted(None, 0);
        assert!(matches!(
            resolve_required(COMPLETION_KEY_VAR, Some("short"), &mut prompt),
            Err(StartupError::InvalidCredential { .. })
        ));
    }

    #[test]
    fn test_missing_key_without_terminal_is_fatal() {
        let mut prompt = Scripted(None, 0);
        assert!(matches!(
            resolve_required(COMPLETION_KEY_VAR, Some("   "), &mut prompt),
            Err(StartupError::MissingCredential(COMPLETION_KEY_VAR))
        ));
    }
}
