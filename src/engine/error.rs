use thiserror::Error;

/// Failure kinds produced by the decision pipeline.
///
/// Every variant normalizes to the same deny response at the HTTP boundary;
/// the detail carried here is for server-side logs only and must never reach
/// the wire.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("expected authorization header to be present but it was not found")]
    AuthorizationHeaderMissing,

    #[error("authorization header does not declare the headers used to sign the request")]
    SigningHeadersMissing,

    #[error(
        "headers required for authentication were not provided \
         (required: {required:?}, provided: {provided:?}, missing: {missing:?})"
    )]
    MissingRequiredHeaders {
        required: Vec<String>,
        provided: Vec<String>,
        missing: Vec<String>,
    },

    #[error("no candidate method produced a valid signature match")]
    NotAuthenticated,

    #[error("subject {subject_id} is not a member of any allowed group (allowed: {allowed_groups:?})")]
    Forbidden {
        subject_id: String,
        allowed_groups: Vec<String>,
    },

    #[error(transparent)]
    IdentityService(#[from] anyhow::Error),
}
