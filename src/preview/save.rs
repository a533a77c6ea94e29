use std::path::PathBuf;

use super::context::EvaluationContext;
use super::handler::{ArrayWriter, TypeHandler};
use super::program::{MISSING_MODULE_SENTINEL, SAVED_SENTINEL};
use super::storage::SessionStorage;
use super::PreviewError;
use crate::session::{DebugSession, EvaluateContext};

/// Save the value of `expression` with `handler` into a fresh artifact of the session.
pub fn save(
    session: &dyn DebugSession,
    storage: &SessionStorage,
    ctx: EvaluationContext,
    handler: &TypeHandler,
    expression: &str,
    writer: ArrayWriter,
) -> Result<PathBuf, PreviewError> {
    let destination = storage.artifact_path(session.id(), expression)?;
    let program = handler.save_program(expression, &destination.to_string_lossy(), writer)?;
    log::debug!(
        target: "plysnap::preview",
        "save `{expression}` as {} into {}:\n{}",
        handler.name,
        destination.display(),
        program.source
    );

    match session.evaluate(&program.source, ctx.frame_id, EvaluateContext::Repl) {
        Ok(output) => {
            if !output.contains(SAVED_SENTINEL) {
                // some adapters swallow stdout of repl evaluations
                log::debug!(target: "plysnap::preview", "no save confirmation in `{output}`");
            }
            Ok(destination)
        }
        Err(e) => Err(classify(&e.to_string(), program.module)),
    }
}

/// Split a remote failure into "library missing" and everything else.
pub fn classify(message: &str, module: &str) -> PreviewError {
    if let Some(pos) = message.find(MISSING_MODULE_SENTINEL) {
        let rest = &message[pos + MISSING_MODULE_SENTINEL.len()..];
        let rest = rest.strip_prefix(':').unwrap_or(rest);
        let (missing, details) = match rest.split_once(':') {
            Some((missing, details)) if !missing.trim().is_empty() => {
                (missing.trim(), details.trim())
            }
            _ => (module, rest.trim()),
        };
        return PreviewError::MissingLibrary {
            module: top_level(missing).to_string(),
            message: details.to_string(),
        };
    }

    if message.contains("ModuleNotFoundError") || message.contains("No module named") {
        let missing = no_module_named(message).unwrap_or(module);
        return PreviewError::MissingLibrary {
            module: top_level(missing).to_string(),
            message: message.to_string(),
        };
    }

    PreviewError::Remote(message.to_string())
}

/// `open3d` for `open3d.cpu.pybind`.
fn top_level(module: &str) -> &str {
    module.split('.').next().unwrap_or(module)
}

/// Module name from `No module named 'x'`.
fn no_module_named(message: &str) -> Option<&str> {
    let rest = &message[message.find("No module named")? + "No module named".len()..];
    let rest = rest.trim_start().strip_prefix(['\'', '"'])?;
    let end = rest.find(['\'', '"'])?;
    Some(&rest[..end])
}
