//! SDK error mapping

use aws_sdk_ecs::error::{DisplayErrorContext, ProvideErrorMetadata};
use flecs_cloud::CloudError;

/// Error codes that mean the caller's credentials were rejected
const AUTH_ERROR_CODES: &[&str] = &[
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    "AuthFailure",
    "AccessDenied",
    "AccessDeniedException",
];

/// Error codes for a cluster or service that is gone
const NOT_FOUND_CODES: &[&str] = &[
    "ClusterNotFoundException",
    "ServiceNotFoundException",
    "ServiceNotActiveException",
];

/// Error codes for a create that found the name taken
const ALREADY_EXISTS_CODES: &[&str] = &[
    "InvalidGroup.Duplicate",
    "RepositoryAlreadyExistsException",
    "EntityAlreadyExists",
    "ResourceAlreadyExistsException",
];

/// Map an SDK call failure to a [`CloudError`]
pub(crate) fn api_error<E>(operation: &str, err: E) -> CloudError
where
    E: std::error::Error + ProvideErrorMetadata,
{
    let message = format!("{}: {}", operation, DisplayErrorContext(&err));
    classify(err.code(), message)
}

fn classify(code: Option<&str>, message: String) -> CloudError {
    match code {
        Some(code) if AUTH_ERROR_CODES.contains(&code) => CloudError::AuthenticationFailed(message),
        Some(code) if NOT_FOUND_CODES.contains(&code) => CloudError::ResourceNotFound(message),
        Some(code) if ALREADY_EXISTS_CODES.contains(&code) => CloudError::AlreadyExists(message),
        _ => CloudError::ApiError(message),
    }
}

/// Map a request builder failure to a [`CloudError`]
pub(crate) fn build_error(what: &str, err: impl std::fmt::Display) -> CloudError {
    CloudError::InvalidRequest(format!("{}: {}", what, err))
}

/// A response field the API documents as always present was missing
pub(crate) fn missing(operation: &str, field: &str) -> CloudError {
    CloudError::UnexpectedResponse(format!("{} returned no {}", operation, field))
}
