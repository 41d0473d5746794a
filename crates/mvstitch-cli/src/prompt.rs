//! Yes/no and free-text questions on the terminal.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;

/// Asks the user questions.
pub trait Prompter {
    /// Ask a yes/no question. Only an explicit "y" counts as yes.
    fn confirm(&self, question: &str) -> bool;

    /// Ask for a line of text, returned trimmed. EOF answers "".
    fn ask(&self, question: &str) -> String;
}

/// Whether an answer to a `(y/n)` question means yes.
pub fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Prompter on stdin/stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl StdinPrompter {
    fn read_line(&self, question: &str) -> String {
        let mut stdout = io::stdout();
        // A failed prompt write still lets the user answer
        let _ = write!(stdout, "{question}");
        let _ = stdout.flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => line.trim().to_string(),
            Err(e) => {
                tracing::warn!("Failed to read answer: {}", e);
                String::new()
            }
        }
    }
}

impl Prompter for StdinPrompter {
    fn confirm(&self, question: &str) -> bool {
        is_yes(&self.read_line(question))
    }

    fn ask(&self, question: &str) -> String {
        self.read_line(question)
    }
}

/// Prompter that replays queued answers.
///
/// Questions past the end of the queue get an empty answer.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    questions: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            questions: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far.
    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn next(&self, question: &str) -> String {
        if let Ok(mut questions) = self.questions.lock() {
            questions.push(question.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .map(|a| a.trim().to_string())
            .unwrap_or_default()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str) -> bool {
        is_yes(&self.next(question))
    }

    fn ask(&self, question: &str) -> String {
        self.next(question)
    }
}
