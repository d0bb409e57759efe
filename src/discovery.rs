use serde::{Deserialize, Serialize};
use url::Url;

/// Subset of the OpenID Provider metadata document this crate relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    #[serde(default)]
    pub userinfo_endpoint: Option<Url>,
    #[serde(default)]
    pub end_session_endpoint: Option<Url>,
    #[serde(default)]
    pub jwks_uri: Option<Url>,
    #[serde(default)]
    pub scopes_supported: Option<Vec<String>>,
}

impl ProviderMetadata {
    /// Metadata with explicit endpoints, for providers without discovery.
    #[must_use]
    pub fn new(issuer: impl Into<String>, authorization_endpoint: Url, token_endpoint: Url) -> Self {
        Self {
            issuer: issuer.into(),
            authorization_endpoint,
            token_endpoint,
            userinfo_endpoint: None,
            end_session_endpoint: None,
            jwks_uri: None,
            scopes_supported: None,
        }
    }

    #[must_use]
    pub fn with_end_session_endpoint(mut self, url: Url) -> Self {
        self.end_session_endpoint = Some(url);
        self
    }

    /// Location of the discovery document for `issuer`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Url`] if the joined URL is invalid.
    pub fn discovery_url(issuer: &Url) -> Result<Url, crate::Error> {
        let base = issuer.as_str().trim_end_matches('/');
        Ok(format!("{base}/.well-known/openid-configuration").parse()?)
    }

    /// Fetch and parse the provider's discovery document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Http`] on network failure and
    /// [`crate::Error::Discovery`] if the document is unusable or its
    /// `issuer` does not match.
    #[cfg(feature = "http-client")]
    pub async fn discover(http: &reqwest::Client, issuer: &Url) -> Result<Self, crate::Error> {
        let url = Self::discovery_url(issuer)?;
        tracing::debug!(%url, "Fetching OIDC discovery document");

        let response = http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(crate::Error::Discovery(format!(
                "discovery endpoint returned {}",
                response.status()
            )));
        }

        let metadata: Self = response
            .json()
            .await
            .map_err(|e| crate::Error::Discovery(e.to_string()))?;

        if metadata.issuer.trim_end_matches('/') != issuer.as_str().trim_end_matches('/') {
            return Err(crate::Error::Discovery(format!(
                "issuer mismatch: expected '{issuer}', got '{}'",
                metadata.issuer
            )));
        }

        Ok(metadata)
    }
}
