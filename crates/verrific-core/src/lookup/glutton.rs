//! biblio-glutton lookup client.

use std::time::Duration;

use super::{LookupError, LookupQuery, LookupResult, LookupService};

/// Queries `GET <base_url>/service/lookup` on a biblio-glutton instance.
#[derive(Debug, Clone)]
pub struct GluttonClient {
    base_url: String,
    client: reqwest::Client,
}

impl GluttonClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("verrific/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Reuse an existing client (shared connection pool).
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn lookup_url(&self) -> String {
        format!("{}/service/lookup", self.base_url.trim_end_matches('/'))
    }
}

impl LookupService for GluttonClient {
    fn name(&self) -> &str {
        "biblio-glutton"
    }

    fn lookup<'a>(&'a self, query: &'a LookupQuery, timeout: Duration) -> LookupResult<'a> {
        Box::pin(async move {
            let resp = self
                .client
                .get(self.lookup_url())
                .query(&query.params())
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| LookupError::Transport(e.to_string()))?;

            let status = resp.status();
            if status != reqwest::StatusCode::OK {
                return Err(LookupError::Status(status.as_u16()));
            }

            let body = resp
                .bytes()
                .await
                .map_err(|e| LookupError::Transport(e.to_string()))?;
            serde_json::from_slice(&body).map_err(|_| LookupError::InvalidJson)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_url_ignores_trailing_slash() {
        let a = GluttonClient::with_client("http://glutton:8080/", reqwest::Client::new());
        let b = GluttonClient::with_client("http://glutton:8080", reqwest::Client::new());
        assert_eq!(a.lookup_url(), "http://glutton:8080/service/lookup");
        assert_eq!(a.lookup_url(), b.lookup_url());
    }
}
