// Marketplace review sources.
//
// Each marketplace adapter implements `ReviewSource` and owns its endpoint
// paths, authentication headers and payload shapes. The processor only ever
// sees this trait.

pub mod ozon;
pub mod wildberries;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use autoresponder_core::account::{Account, Marketplace};
use autoresponder_core::config::Config;
use autoresponder_core::review::Review;

pub use ozon::OzonSource;
pub use wildberries::WildberriesSource;

/// Longest error body kept in a `SourceError::Status`.
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{marketplace} API returned status {status}: {body}")]
    Status {
        marketplace: Marketplace,
        status: u16,
        body: String,
    },

    #[error("malformed {marketplace} payload: {source}")]
    Malformed {
        marketplace: Marketplace,
        source: serde_json::Error,
    },

    #[error("account {account} cannot be used with {marketplace}")]
    UnsupportedAccount {
        marketplace: Marketplace,
        account: String,
    },
}

/// Fetch-and-reply access to one marketplace.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    fn marketplace(&self) -> Marketplace;

    /// Reviews the marketplace still reports as unanswered for `account`.
    async fn fetch_unanswered(&self, account: &Account) -> Result<Vec<Review>, SourceError>;

    /// Post `text` as the reply to `review_id`. `Ok` only on a success status.
    async fn submit_reply(
        &self,
        account: &Account,
        review_id: &str,
        text: &str,
    ) -> Result<(), SourceError>;
}

/// Shared HTTP client for marketplaces and the responder.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// One source per supported marketplace, configured from `config`.
pub fn default_sources(config: &Config, http: &reqwest::Client) -> Vec<Arc<dyn ReviewSource>> {
    vec![
        Arc::new(WildberriesSource::new(http.clone(), &config.wildberries)),
        Arc::new(OzonSource::new(http.clone(), &config.ozon)),
    ]
}

// ---------------------------------------------------------------------------
// Response helpers shared by the adapters
// ---------------------------------------------------------------------------

/// Fail with `SourceError::Status` unless the response has a 2xx status.
pub(crate) async fn ensure_success(
    marketplace: Marketplace,
    response: reqwest::Response,
) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SourceError::Status {
        marketplace,
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

/// Check the status, then decode the body as `T`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    marketplace: Marketplace,
    response: reqwest::Response,
) -> Result<T, SourceError> {
    let response = ensure_success(marketplace, response).await?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|source| SourceError::Malformed {
        marketplace,
        source,
    })
}

/// Parse an RFC 3339 timestamp, ignoring anything unparseable.
pub(crate) fn parse_timestamp(raw: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
    raw.and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_rfc3339_timestamps() {
        let ts = parse_timestamp(Some("2024-03-01T10:15:00+03:00")).unwrap();
        assert_eq!(ts.day(), 1);
        assert_eq!(ts.hour(), 7);
    }

    #[test]
    fn ignores_unparseable_timestamps() {
        assert!(parse_timestamp(Some("yesterday")).is_none());
        assert!(parse_timestamp(None).is_none());
    }

    #[test]
    fn status_error_names_marketplace() {
        let err = SourceError::Status {
            marketplace: Marketplace::Ozon,
            status: 403,
            body: "forbidden".into(),
        };
        assert_eq!(err.to_string(), "ozon API returned status 403: forbidden");
    }
}
