//! Error types for the workflow engine

use crate::{ActionKind, ActorId};

/// Errors a transition attempt can produce.
///
/// On any error the input entity is left untouched: the engine only
/// produces a new entity on success.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("actor '{actor}' is not authorized to {action} from status '{status}'")]
    Unauthorized {
        actor: ActorId,
        action: ActionKind,
        status: String,
    },

    #[error("no transition for action '{action}' from status '{status}'")]
    InvalidTransition { action: ActionKind, status: String },

    #[error("action '{0}' requires a non-empty comment")]
    CommentRequired(ActionKind),

    #[error("action '{0}' requires a payload")]
    MissingPayload(ActionKind),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
