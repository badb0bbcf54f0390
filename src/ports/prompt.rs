//! Operator prompt port.

/// Interacts with the human operator.
///
/// Every call blocks until answered. The conflict resolver and the orphan
/// cleanup flow are the only callers.
pub trait Prompt: Send + Sync {
    /// Shows informational text (diffs, headings) to the operator.
    fn show(&self, text: &str);

    /// Asks the operator to pick one of `choices`, returning its index.
    ///
    /// # Errors
    ///
    /// Returns an error if input cannot be read (closed stdin, etc.).
    fn select(
        &self,
        question: &str,
        choices: &[&str],
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;
}
