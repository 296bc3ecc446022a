//! Interactive input capability.
//!
//! Login secrets only ever come through a [`SecretPrompt`]; the CLI backs
//! it with a terminal, tests with [`ScriptedPrompt`].

use std::collections::VecDeque;
use std::sync::Mutex;

use zeroize::Zeroizing;

use crate::error::{PublishError, PublishResult};

pub trait SecretPrompt: Send + Sync {
    /// Read a non-secret value (echoed).
    fn ask(&self, label: &str) -> PublishResult<String>;

    /// Read a secret value (not echoed, zeroized on drop).
    fn ask_secret(&self, label: &str) -> PublishResult<Zeroizing<String>>;
}

/// Canned answers, handed out in order; records every label asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Labels asked so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn next(&self, label: &str) -> PublishResult<String> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(label.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut a| a.pop_front())
            .ok_or_else(|| PublishError::Prompt {
                message: format!("no scripted answer for {:?}", label),
            })
    }
}

impl SecretPrompt for ScriptedPrompt {
    fn ask(&self, label: &str) -> PublishResult<String> {
        self.next(label)
    }

    fn ask_secret(&self, label: &str) -> PublishResult<Zeroizing<String>> {
        self.next(label).map(Zeroizing::new)
    }
}
