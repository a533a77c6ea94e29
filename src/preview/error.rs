use super::program::ProgramError;

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("no thread or frame to evaluate in, is the debuggee paused?")]
    NoContext,
    #[error("invalid expression: {0}")]
    InvalidExpression(#[from] ProgramError),
    #[error("`{0}` is not a point cloud, numpy array or torch tensor")]
    Unsupported(String),
    #[error("python module `{module}` is missing in the debuggee: {message}")]
    MissingLibrary { module: String, message: String },
    #[error("save failed: {0}")]
    Remote(String),
    #[error("artifact storage: {0}")]
    Storage(#[from] std::io::Error),
}
