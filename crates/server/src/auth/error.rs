use thiserror::Error;

/// Why a credential could not be extracted from the request.
///
/// Internal diagnostics only. The HTTP surface never distinguishes these
/// from one another or from a verification failure.
#[derive(Debug, Error)]
pub(crate) enum ExtractError {
    #[error("authorization header missing")]
    MissingHeader,
    #[error("authorization header is not valid UTF-8")]
    NotUtf8,
    #[error("authorization header malformed")]
    Malformed,
    #[error("unsupported authorization scheme")]
    WrongScheme,
}
