//! Core result and error types shared across the crate.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RegistrarError>;

/// Typed outcomes for every operation the core exposes.
///
/// Expected business conditions (duplicate email, missing application,
/// ownership mismatch) are values of this enum, never panics. Callers
/// match on the variant to decide what to surface.
#[derive(Debug, Error)]
pub enum RegistrarError {
    /// A required field is missing or malformed. Raised before any write.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("an account with this email already exists")]
    DuplicateEmail,

    #[error("no identity matches the given id or email")]
    UserNotFound,

    #[error("business application not found")]
    ApplicationNotFound,

    #[error("manager application not found")]
    ManagerApplicationNotFound,

    /// The acting identity does not hold the business owner role.
    #[error("identity is not authorized for the business step")]
    NotAuthorizedForBusinessStep,

    /// The linked application belongs to a different owner.
    #[error("application does not belong to the claimed owner")]
    OwnershipMismatch,

    #[error("operation requires an administrator identity")]
    AdminRequired,

    /// The application already left the pending state.
    #[error("application has already been decided")]
    AlreadyDecided,

    #[error("a rejection requires a non-empty reason")]
    MissingReason,

    /// Manager links can only finalize once the business is approved.
    #[error("linked business application is not approved")]
    ApplicationNotApproved,

    /// The identity exists but has not passed administrator review.
    #[error("account is awaiting approval")]
    PendingApproval,

    #[error("invalid credentials")]
    InvalidCredential,

    /// A dependent write inside a multi-row step failed. The step was
    /// aborted and rows already written were compensated away.
    #[error("dependent write failed during {step}: {detail}")]
    DependencyWriteFailed { step: &'static str, detail: String },

    /// Store-level failure: connectivity, serialization, index application.
    #[error("store error: {0}")]
    Store(String),

    /// Credential hashing or session token failure.
    #[error("credential processing error: {0}")]
    Credential(String),
}

impl RegistrarError {
    pub fn validation(msg: impl Into<String>) -> Self {
        RegistrarError::Validation(msg.into())
    }
}
