//! Obtaining ordered file selections from the user.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Source of file selections.
///
/// An empty selection means the user cancelled.
pub trait FileSelector {
    /// Pick any number of files; order is the user's order.
    fn select_many(&self, prompt: &str) -> Vec<PathBuf>;

    /// Pick a single file.
    fn select_one(&self, prompt: &str) -> Option<PathBuf>;
}

/// Native open-file dialogs.
///
/// Dialogs are modal and block the calling thread until the user answers.
#[derive(Debug, Clone)]
pub struct DialogSelector {
    start_dir: PathBuf,
}

impl DialogSelector {
    pub fn new(start_dir: impl AsRef<Path>) -> Self {
        Self {
            start_dir: start_dir.as_ref().to_path_buf(),
        }
    }

    fn dialog(&self, prompt: &str) -> rfd::FileDialog {
        let dialog = rfd::FileDialog::new().set_title(prompt);
        if self.start_dir.is_dir() {
            dialog.set_directory(&self.start_dir)
        } else {
            dialog
        }
    }
}

impl FileSelector for DialogSelector {
    fn select_many(&self, prompt: &str) -> Vec<PathBuf> {
        self.dialog(prompt).pick_files().unwrap_or_default()
    }

    fn select_one(&self, prompt: &str) -> Option<PathBuf> {
        self.dialog(prompt).pick_file()
    }
}

/// Selector that replays queued answers, one per call.
///
/// Calls past the end of the queue behave like a cancelled dialog.
#[derive(Debug, Default)]
pub struct ScriptedSelector {
    answers: Mutex<VecDeque<Vec<PathBuf>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer for the next dialog.
    pub fn then<I, P>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(paths.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Queue a cancelled dialog.
    pub fn then_cancel(self) -> Self {
        self.then(Vec::<PathBuf>::new())
    }

    /// Prompts shown so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next(&self, prompt: &str) -> Vec<PathBuf> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or_default()
    }
}

impl FileSelector for ScriptedSelector {
    fn select_many(&self, prompt: &str) -> Vec<PathBuf> {
        self.next(prompt)
    }

    fn select_one(&self, prompt: &str) -> Option<PathBuf> {
        self.next(prompt).into_iter().next()
    }
}
