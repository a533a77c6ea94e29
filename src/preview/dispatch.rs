use super::context::EvaluationContext;
use super::handler::TypeHandler;
use super::PreviewError;
use crate::muted_error;
use crate::session::{DebugSession, EvaluateContext};

/// Find the first handler whose predicate holds for `expression`.
///
/// Predicates run one after another in registry order. A predicate that fails remotely
/// (typically a library not imported in the debuggee) does not stop the search.
pub fn dispatch<'h>(
    session: &dyn DebugSession,
    ctx: EvaluationContext,
    expression: &str,
    handlers: &'h [TypeHandler],
) -> Result<&'h TypeHandler, PreviewError> {
    for handler in handlers {
        let predicate = handler.predicate(expression)?;
        let Some(result) = muted_error!(
            session.evaluate(&predicate, ctx.frame_id, EvaluateContext::Watch),
            "predicate failed:"
        ) else {
            continue;
        };

        log::debug!(
            target: "plysnap::preview",
            "{} check for `{expression}`: {result}",
            handler.name
        );
        if result.trim() == "True" {
            return Ok(handler);
        }
    }
    Err(PreviewError::Unsupported(expression.to_string()))
}
