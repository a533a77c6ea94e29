//! Where in the debuggee expressions are evaluated.

use serde::Deserialize;
use strum_macros::{Display, EnumString};

use crate::session::DebugSession;
use crate::weak_error;

/// Thread and frame a remote expression runs in. Stale as soon as the debuggee resumes.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct EvaluationContext {
    pub thread_id: i64,
    pub frame_id: i64,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Strategy {
    /// Top frame of the first thread.
    #[default]
    Shallow,
    /// Walk threads, frames, scopes and variables looking for the expression by name.
    Deep,
}

/// Outcome of context resolution.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Resolution {
    pub context: EvaluationContext,
    /// Expression to evaluate, the variable's evaluate-name when found by the deep walk.
    pub expression: String,
    /// Type reported by the adapter (deep walk only).
    pub type_name: Option<String>,
}

/// Resolve the evaluation context for `expression`.
///
/// The deep walk only finds plain variable names; when it finds nothing the shallow
/// strategy is used.
pub fn resolve(
    strategy: Strategy,
    session: &dyn DebugSession,
    expression: &str,
) -> Option<Resolution> {
    if strategy == Strategy::Deep {
        if let Some(found) = resolve_deep(session, expression) {
            return Some(found);
        }
        log::debug!(
            target: "plysnap::preview",
            "`{expression}` not found by name, fall back to the top frame"
        );
    }

    resolve_shallow(session).map(|context| Resolution {
        context,
        expression: expression.to_string(),
        type_name: None,
    })
}

/// Top frame of the first thread.
pub fn resolve_shallow(session: &dyn DebugSession) -> Option<EvaluationContext> {
    let threads = weak_error!(session.threads(), "threads:")?;
    let Some(thread) = threads.first() else {
        log::info!(target: "plysnap::preview", "debuggee has no threads");
        return None;
    };

    let frames = weak_error!(session.stack_trace(thread.id, Some(1)), "stack trace:")?;
    let Some(frame) = frames.first() else {
        log::info!(target: "plysnap::preview", "thread {} has no frames", thread.id);
        return None;
    };

    Some(EvaluationContext {
        thread_id: thread.id,
        frame_id: frame.id,
    })
}

/// Search every thread, frame (outermost call site first), scope and variable for a
/// variable named `name`. One round trip per frame and scope.
pub fn resolve_deep(session: &dyn DebugSession, name: &str) -> Option<Resolution> {
    let threads = weak_error!(session.threads(), "threads:")?;
    for thread in threads {
        let Some(frames) = weak_error!(session.stack_trace(thread.id, None), "stack trace:")
        else {
            continue;
        };

        for frame in frames.iter().rev() {
            let Some(scopes) = weak_error!(session.scopes(frame.id), "scopes:") else {
                continue;
            };

            for scope in scopes {
                let Some(variables) =
                    weak_error!(session.variables(scope.variables_reference), "variables:")
                else {
                    continue;
                };

                if let Some(var) = variables.into_iter().find(|v| v.name == name) {
                    log::debug!(
                        target: "plysnap::preview",
                        "`{name}` found in frame {} ({}), type {:?}",
                        frame.id,
                        frame.name,
                        var.type_name
                    );
                    return Some(Resolution {
                        context: EvaluationContext {
                            thread_id: thread.id,
                            frame_id: frame.id,
                        },
                        expression: var.evaluate_name.unwrap_or(var.name),
                        type_name: var.type_name,
                    });
                }
            }
        }
    }
    None
}
