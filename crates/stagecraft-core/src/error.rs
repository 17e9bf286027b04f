use thiserror::Error;

/// Errors that can end a presentation.
///
/// Every error travels through the same completion channel the caller used
/// to request the presentation; there is no out-of-band error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PresentError {
    /// The presentation ended through its dismiss affordance or was
    /// cancelled, rather than producing a business value.
    #[error("presentation was dismissed")]
    Dismissed,

    /// A queued presentation was cancelled before its turn arrived.
    #[error("presentation is not possible")]
    NotPossible,

    /// The same content cannot be attached to a container twice.
    #[error("content is already presented")]
    AlreadyPresented,

    /// The presenting screen was busy and the caller opted out of queuing.
    #[error("presentation is blocked by another presentation")]
    Blocked,
}

pub type PresentResult<T> = Result<T, PresentError>;
