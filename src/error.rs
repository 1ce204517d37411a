use thiserror::Error;

/// Errors raised by the model-construction core.
///
/// Filtered-out elements are not errors; they are logged and excluded.
/// I/O and JSON decode errors belong to the collaborator layer and surface
/// there through `anyhow`.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The caller's cancellation probe returned true. The partially built
    /// model is left in place; the run reports incomplete instead of failing.
    #[error("run cancelled")]
    Cancelled,

    /// A declared member type could not be resolved into the model. The run
    /// must not silently emit a member with a missing type.
    #[error("no type found for {class}::{member} ({signature})")]
    UnresolvedType {
        class: String,
        member: String,
        signature: String,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;
