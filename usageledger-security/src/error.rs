use thiserror::Error;

/// Authentication/authorization failures, mirroring the 400-vs-401 split at
/// the HTTP boundary: header problems are 400 (the caller sent something
/// malformed), membership problems are 401 (the caller is who they say but
/// isn't allowed in).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Authorization header missing")]
    MissingHeader,

    #[error("Invalid Authorization header format")]
    MalformedHeader,

    #[error("Must be workspace owner")]
    NotWorkspaceOwner,

    #[error("Access to this workspace is not allowed")]
    WorkspaceNotAllowed,

    #[error("Must be account owner")]
    NotAccountOwner,
}

impl AuthzError {
    /// True for the two header-decoding failures, which map to HTTP 400;
    /// false for the three membership failures, which map to HTTP 401.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, AuthzError::MissingHeader | AuthzError::MalformedHeader)
    }
}

pub type AuthzResult<T> = Result<T, AuthzError>;
