//! Scripted operator prompt.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::ports::prompt::Prompt;

#[derive(Debug, Default)]
struct Inner {
    answers: VecDeque<usize>,
    questions: Vec<(String, Vec<String>)>,
    shown: Vec<String>,
}

/// Prompt double answering from a queue of choice indices.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedPrompt {
    /// Creates a prompt with no answers queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a prompt that will answer with `answers`, in order.
    #[must_use]
    pub fn answering(answers: &[usize]) -> Self {
        let prompt = Self::new();
        prompt.lock().answers.extend(answers.iter().copied());
        prompt
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Every question asked so far with the choices offered.
    #[must_use]
    pub fn questions(&self) -> Vec<(String, Vec<String>)> {
        self.lock().questions.clone()
    }

    /// Everything shown so far.
    #[must_use]
    pub fn shown(&self) -> Vec<String> {
        self.lock().shown.clone()
    }
}

impl Prompt for ScriptedPrompt {
    fn show(&self, text: &str) {
        self.lock().shown.push(text.to_string());
    }

    fn select(
        &self,
        question: &str,
        choices: &[&str],
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.lock();
        inner
            .questions
            .push((question.to_string(), choices.iter().map(|c| (*c).to_string()).collect()));
        let answer = inner.answers.pop_front().ok_or("no scripted answer left")?;
        if answer >= choices.len() {
            return Err(format!("scripted answer {answer} out of range").into());
        }
        Ok(answer)
    }
}
