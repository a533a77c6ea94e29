//! Point cloud snapshots of expressions in a paused debuggee.
//!
//! A preview runs as one sequential chain of remote round trips:
//! expression -> evaluation context -> matching [`TypeHandler`] -> save program -> file.

pub mod context;
pub mod dispatch;
mod error;
pub mod extract;
pub mod handler;
pub mod program;
pub mod save;
pub mod storage;

use std::path::PathBuf;
use std::sync::Arc;

pub use context::{EvaluationContext, Strategy};
pub use error::PreviewError;
pub use extract::{extract_expression, Position, Range};
pub use handler::{ArrayWriter, TypeHandler, REGISTRY};
pub use storage::{release_on_termination, Release, SessionEnd, SessionStorage};

use crate::session::DebugSession;

/// User facing messages of the previewer.
pub trait Notifier {
    fn warn(&self, message: &str);

    fn error(&self, message: &str);

    /// A python module the save needs is not installed in the debuggee.
    fn missing_library(&self, module: &str, guidance: &str);
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PreviewOptions {
    pub strategy: Strategy,
    pub array_writer: ArrayWriter,
}

/// Entry point: turns an expression of a paused debuggee into a PLY file.
pub struct Previewer<N: Notifier> {
    options: PreviewOptions,
    storage: Arc<SessionStorage>,
    notifier: N,
    handlers: &'static [TypeHandler],
}

impl<N: Notifier> Previewer<N> {
    pub fn new(options: PreviewOptions, storage: Arc<SessionStorage>, notifier: N) -> Self {
        Self {
            options,
            storage,
            notifier,
            handlers: REGISTRY,
        }
    }

    pub fn storage(&self) -> &Arc<SessionStorage> {
        &self.storage
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Save the value of `expression` and return the written file.
    ///
    /// Never fails: problems are logged and, when the user can act on them, reported
    /// through the notifier.
    pub fn preview(&self, session: &dyn DebugSession, expression: &str) -> Option<PathBuf> {
        let expression = expression.trim();
        if expression.is_empty() {
            return None;
        }

        let mut reported_type = None;
        let result = context::resolve(self.options.strategy, session, expression)
            .ok_or(PreviewError::NoContext)
            .and_then(|resolution| {
                reported_type = resolution.type_name;
                let handler = dispatch::dispatch(
                    session,
                    resolution.context,
                    &resolution.expression,
                    self.handlers,
                )?;
                log::debug!(
                    target: "plysnap::preview",
                    "`{expression}` handled by {} (reported type: {})",
                    handler.name,
                    reported_type.as_deref().unwrap_or("unknown")
                );
                save::save(
                    session,
                    &self.storage,
                    resolution.context,
                    handler,
                    &resolution.expression,
                    self.options.array_writer,
                )
            });

        match result {
            Ok(path) => {
                log::info!(
                    target: "plysnap::preview",
                    "`{expression}` saved to {}",
                    path.display()
                );
                Some(path)
            }
            Err(e) => {
                self.report(session.id(), expression, reported_type.as_deref(), e);
                None
            }
        }
    }

    /// Like [`Previewer::preview`] for the expression found at `range` of a document.
    pub fn preview_at(
        &self,
        session: &dyn DebugSession,
        text: &str,
        range: Range,
    ) -> Option<PathBuf> {
        let Some(expression) = extract_expression(text, range) else {
            log::debug!(target: "plysnap::preview", "no expression at {range:?}");
            return None;
        };
        self.preview(session, &expression)
    }

    fn report(
        &self,
        session_id: &str,
        expression: &str,
        reported_type: Option<&str>,
        err: PreviewError,
    ) {
        match err {
            PreviewError::NoContext | PreviewError::InvalidExpression(_) => {
                log::info!(
                    target: "plysnap::preview",
                    "`{expression}` in session {}: {err}",
                    session_id
                );
            }
            PreviewError::Unsupported(_) => {
                log::warn!(target: "plysnap::preview", "{err}");
                let reported = reported_type
                    .map(|ty| format!(", reported type `{ty}`"))
                    .unwrap_or_default();
                self.notifier.warn(&format!(
                    "`{expression}` is not a supported point cloud \
                     (open3d PointCloud, numpy or torch array of shape (N, 3) or (N, 6)){reported}"
                ));
            }
            PreviewError::MissingLibrary {
                ref module,
                ref message,
            } => {
                log::warn!(target: "plysnap::preview", "save `{expression}`: {err}");
                log::debug!(target: "plysnap::preview", "{message}");
                self.notifier
                    .missing_library(module, &handler::install_guidance(module));
            }
            PreviewError::Remote(_) | PreviewError::Storage(_) => {
                log::error!(target: "plysnap::preview", "save `{expression}`: {err}");
                self.notifier.error(&format!(
                    "could not save `{expression}`, see the log for details"
                ));
            }
        }
    }
}
