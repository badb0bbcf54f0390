//! Scripted shell executor.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::ports::shell::{ShellExecutor, ShellOutput};

#[derive(Debug, Default)]
struct Inner {
    outputs: VecDeque<ShellOutput>,
    calls: Vec<(String, Vec<String>)>,
}

/// Shell double that returns queued outputs in order and records calls.
#[derive(Debug, Clone, Default)]
pub struct ScriptedShell {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedShell {
    /// Creates a shell with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queues a successful run printing `stdout`.
    pub fn push_stdout(&self, stdout: &str) {
        self.push(ShellOutput { exit_code: 0, stdout: stdout.to_string(), stderr: String::new() });
    }

    /// Queues an arbitrary output.
    pub fn push(&self, output: ShellOutput) {
        self.lock().outputs.push_back(output);
    }

    /// Every `(program, args)` run so far.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.lock().calls.clone()
    }
}

impl ShellExecutor for ScriptedShell {
    fn run(
        &self,
        program: &str,
        args: &[String],
    ) -> Result<ShellOutput, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self.lock();
        inner.calls.push((program.to_string(), args.to_vec()));
        inner.outputs.pop_front().ok_or_else(|| format!("no scripted output for {program}").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_outputs_in_order_then_errors() {
        let shell = ScriptedShell::new();
        shell.push_stdout("first");
        let out = shell.run("gh", &["issue".to_string()]).unwrap();
        assert_eq!(out.stdout, "first");
        assert!(shell.run("gh", &[]).is_err());
        assert_eq!(shell.calls().len(), 2);
    }
}
