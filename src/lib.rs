#![doc = include_str!("../README.md")]

pub mod csrf;
pub mod discovery;
pub mod error;
pub mod middleware;
pub mod provider;
pub mod token;
pub mod types;

// Re-exports for convenient access
pub use discovery::ProviderMetadata;
pub use error::Error;
#[cfg(feature = "http-client")]
pub use provider::ProviderClient;
pub use provider::OidcConfig;
pub use token::{Claims, TokenSet};
pub use types::{
    AuthorizationParams, CallbackChecks, CallbackParams, ClientMetadata, EndSessionParams,
};
