//! Terminal-backed [`SecretPrompt`].

use dialoguer::{theme::ColorfulTheme, Input, Password};
use storepub_core::{PublishError, PublishResult, SecretPrompt};
use zeroize::Zeroizing;

#[derive(Default)]
pub struct TerminalPrompt {
    theme: ColorfulTheme,
}

impl SecretPrompt for TerminalPrompt {
    fn ask(&self, label: &str) -> PublishResult<String> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(label)
            .interact_text()
            .map_err(|e| prompt_failed(label, e))
    }

    fn ask_secret(&self, label: &str) -> PublishResult<Zeroizing<String>> {
        Password::with_theme(&self.theme)
            .with_prompt(label)
            .interact()
            .map(Zeroizing::new)
            .map_err(|e| prompt_failed(label, e))
    }
}

fn prompt_failed(label: &str, e: dialoguer::Error) -> PublishError {
    PublishError::Prompt {
        message: format!("could not read {}: {}", label.to_lowercase(), e),
    }
}
