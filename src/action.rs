//! Editor integration: a "preview point cloud" action offered for Python sources.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;

use crate::preview::{extract_expression, Notifier, Previewer, Range};
use crate::session::DebugSession;
use crate::weak_error;

/// A source document as an editor sees it.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    /// Editor language identifier, derived from the extension if absent.
    pub language_id: Option<String>,
    pub text: String,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language_id: None,
            text: text.into(),
        }
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Ok(Self::new(path, text))
    }

    pub fn is_python(&self) -> bool {
        match self.language_id.as_deref() {
            Some(id) => id == "python",
            None => matches!(
                self.path.extension().and_then(|ext| ext.to_str()),
                Some("py" | "pyi")
            ),
        }
    }
}

/// Something able to show a produced file, usually side by side with the source.
pub trait Viewer {
    fn open(&self, path: &Path) -> anyhow::Result<()>;
}

/// Runs `<command> <path>` in the background.
#[derive(Debug, Clone)]
pub struct CommandViewer {
    program: PathBuf,
}

impl CommandViewer {
    pub fn new(command: &str) -> anyhow::Result<Self> {
        let program = which::which(command).with_context(|| format!("viewer `{command}`"))?;
        Ok(Self { program })
    }
}

impl Viewer for CommandViewer {
    fn open(&self, path: &Path) -> anyhow::Result<()> {
        Command::new(&self.program)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("start {}", self.program.display()))?;
        Ok(())
    }
}

/// Preview of one expression, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewAction {
    pub title: String,
    pub expression: String,
}

impl PreviewAction {
    /// Save the expression and, on success, open the result in `viewer`.
    pub fn run<N: Notifier>(
        &self,
        previewer: &Previewer<N>,
        session: &dyn DebugSession,
        viewer: Option<&dyn Viewer>,
    ) -> Option<PathBuf> {
        let path = previewer.preview(session, &self.expression)?;
        if let Some(viewer) = viewer {
            weak_error!(viewer.open(&path), "open viewer:");
        }
        Some(path)
    }
}

#[derive(Debug, Default)]
pub struct ActionProvider;

impl ActionProvider {
    /// Zero or one action for `range` of `document`.
    pub fn provide(&self, document: &Document, range: Range) -> Option<PreviewAction> {
        if !document.is_python() {
            return None;
        }
        let expression = extract_expression(&document.text, range)?;
        Some(PreviewAction {
            title: format!("Preview point cloud `{expression}`"),
            expression,
        })
    }
}
