//! Terminal prompt reading answers from stdin.

use std::io::{self, BufRead, Write};

use crate::ports::prompt::Prompt;

/// Prompt that prints to stdout and reads a line per answer from stdin.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn show(&self, text: &str) {
        println!("{text}");
    }

    fn select(
        &self,
        question: &str,
        choices: &[&str],
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let stdin = io::stdin();
        loop {
            println!("{question}");
            for (i, choice) in choices.iter().enumerate() {
                println!("  {}) {choice}", i + 1);
            }
            print!("> ");
            io::stdout().flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Err("input closed before an answer was given".into());
            }
            if let Some(index) = parse_choice(&line, choices) {
                return Ok(index);
            }
            println!("Please enter a number between 1 and {}.", choices.len());
        }
    }
}

/// Accepts a 1-based index or a case-insensitive prefix of a choice.
fn parse_choice(line: &str, choices: &[&str]) -> Option<usize> {
    let answer = line.trim();
    if answer.is_empty() {
        return None;
    }
    if let Ok(n) = answer.parse::<usize>() {
        return (1..=choices.len()).contains(&n).then(|| n - 1);
    }
    let answer = answer.to_ascii_lowercase();
    let matches: Vec<usize> = choices
        .iter()
        .enumerate()
        .filter(|(_, c)| c.to_ascii_lowercase().starts_with(&answer))
        .map(|(i, _)| i)
        .collect();
    match matches.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHOICES: [&str; 3] = ["Use local", "Use remote", "Skip"];

    #[test]
    fn accepts_one_based_numbers() {
        assert_eq!(parse_choice("2\n", &CHOICES), Some(1));
        assert_eq!(parse_choice("4", &CHOICES), None);
        assert_eq!(parse_choice("0", &CHOICES), None);
    }

    #[test]
    fn accepts_unambiguous_prefixes() {
        assert_eq!(parse_choice("sk", &CHOICES), Some(2));
        assert_eq!(parse_choice("use", &CHOICES), None);
    }
}
