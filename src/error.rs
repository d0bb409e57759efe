#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("OIDC {operation} failed: {detail}")]
    OAuth {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[cfg(feature = "http-client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token error: {0}")]
    Token(String),
    #[error("State mismatch between callback and login request")]
    StateMismatch,
    #[error("Provider discovery error: {0}")]
    Discovery(String),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}
