//! Blocking JSON client shared by the provider implementations.

use super::ProviderError;
use crate::config::SecretToken;
use reqwest::Method;
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("bootup/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Error bodies are cut to this many characters before they reach an error.
const MAX_ERROR_BODY: usize = 512;

/// How the token is presented to the API.
#[derive(Debug, Clone)]
pub(crate) enum Auth {
    /// `Authorization: Bearer <token>` (GitHub)
    Bearer(SecretToken),
    /// `PRIVATE-TOKEN: <token>` (GitLab)
    PrivateToken(SecretToken),
}

#[derive(Debug, Clone)]
pub(crate) struct ApiClient {
    client: Client,
    base: String,
    auth: Auth,
}

impl ApiClient {
    pub(crate) fn new(base: String, auth: Auth) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ProviderError::Http {
                url: base.clone(),
                source,
            })?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub(crate) fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ProviderError> {
        let raw = format!("{}{}", self.base, path);
        let parsed = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        parsed.map_err(|e| ProviderError::Api {
            url: raw,
            status: 0,
            body: format!("invalid API URL: {}", e),
        })
    }

    fn authorise(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.bearer_auth(token.expose()),
            Auth::PrivateToken(token) => request.header("PRIVATE-TOKEN", token.expose()),
        }
    }

    pub(crate) fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = self.url(path, query)?;
        debug!(method = "GET", %url, "provider request");
        let request = self.authorise(self.client.get(url.clone()));
        decode(url.as_str(), request.send())
    }

    pub(crate) fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ProviderError> {
        let url = self.url(path, &[])?;
        debug!(method = %method, %url, "provider request");
        let request = self.authorise(self.client.request(method, url.clone()).json(body));
        decode(url.as_str(), request.send())
    }
}

fn decode<T: DeserializeOwned>(
    url: &str,
    sent: Result<Response, reqwest::Error>,
) -> Result<T, ProviderError> {
    let response = sent.map_err(|source| ProviderError::Http {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ProviderError::Api {
            url: url.to_string(),
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        });
    }

    response.json::<T>().map_err(|source| ProviderError::Http {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_urls_with_encoded_query() {
        let client = ApiClient::new(
            "https://gitlab.example.com/api/v4/".to_string(),
            Auth::PrivateToken(SecretToken::new("t")),
        )
        .unwrap();
        assert_eq!(client.base(), "https://gitlab.example.com/api/v4");

        let url = client
            .url(
                "/projects/acme%2Fenv/merge_requests",
                &[("state", "opened"), ("labels", "boot-upgrade,x y")],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://gitlab.example.com/api/v4/projects/acme%2Fenv/merge_requests?state=opened&labels=boot-upgrade%2Cx+y"
        );
    }

    #[test]
    fn auth_debug_does_not_leak_token() {
        let auth = Auth::Bearer(SecretToken::new("ghp_secret"));
        assert!(!format!("{:?}", auth).contains("ghp_secret"));
    }
}
