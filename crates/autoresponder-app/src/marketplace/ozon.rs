// Ozon seller API review adapter.
//
// Ozon sellers commonly run several cabinets, so credentials travel with each
// request as `Client-Id` / `Api-Key` headers instead of living on the client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use autoresponder_core::account::{Account, Credentials, Marketplace};
use autoresponder_core::config::EndpointConfig;
use autoresponder_core::review::Review;

use super::{ensure_success, parse_timestamp, read_json, ReviewSource, SourceError};

const LIST_PATH: &str = "/v1/review/list";
const COMMENT_PATH: &str = "/v1/review/comment/create";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ReviewListRequest {
    filter: ReviewFilter,
    limit: u32,
    sort_dir: &'static str,
}

#[derive(Debug, Serialize)]
struct ReviewFilter {
    interaction_status: &'static str,
}

/// The review page is accepted both bare and wrapped in `result`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReviewListResponse {
    Wrapped { result: ReviewPage },
    Flat(ReviewPage),
}

impl ReviewListResponse {
    fn into_reviews(self) -> Vec<OzonReview> {
        match self {
            ReviewListResponse::Wrapped { result } => result.reviews,
            ReviewListResponse::Flat(page) => page.reviews,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReviewPage {
    reviews: Vec<OzonReview>,
}

#[derive(Debug, Deserialize)]
struct OzonReview {
    #[serde(alias = "uuid")]
    id: String,
    #[serde(default)]
    text: Option<ReviewText>,
    #[serde(default)]
    product: Option<ProductInfo>,
    #[serde(default)]
    published_at: Option<String>,
}

/// Review text is either one string or split into comment/positive/negative.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReviewText {
    Plain(String),
    Parts {
        #[serde(default)]
        comment: Option<String>,
        #[serde(default)]
        positive_comment: Option<String>,
        #[serde(default)]
        negative_comment: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct ProductInfo {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    review_uuid: &'a str,
    text: &'a str,
}

impl From<OzonReview> for Review {
    fn from(raw: OzonReview) -> Self {
        let (body, pros, cons) = match raw.text {
            Some(ReviewText::Plain(text)) => (text, String::new(), String::new()),
            Some(ReviewText::Parts {
                comment,
                positive_comment,
                negative_comment,
            }) => (
                comment.unwrap_or_default(),
                positive_comment.unwrap_or_default(),
                negative_comment.unwrap_or_default(),
            ),
            None => Default::default(),
        };
        Review {
            id: raw.id,
            body,
            pros,
            cons,
            product: raw.product.and_then(|p| p.title),
            created_at: parse_timestamp(raw.published_at.as_deref()),
        }
    }
}

// ---------------------------------------------------------------------------
// OzonSource
// ---------------------------------------------------------------------------

pub struct OzonSource {
    http: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl OzonSource {
    pub fn new(http: reqwest::Client, config: &EndpointConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        }
    }

    /// POST `body` to `path` with the account's own auth headers.
    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        account: &Account,
        body: &B,
    ) -> Result<reqwest::Response, SourceError> {
        let Credentials::ClientKey { client_id, api_key } = account.credentials() else {
            return Err(self.unsupported(account));
        };
        if account.marketplace() != Marketplace::Ozon {
            return Err(self.unsupported(account));
        }

        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("Client-Id", client_id)
            .header("Api-Key", api_key)
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    fn unsupported(&self, account: &Account) -> SourceError {
        SourceError::UnsupportedAccount {
            marketplace: Marketplace::Ozon,
            account: account.id().to_string(),
        }
    }
}

#[async_trait]
impl ReviewSource for OzonSource {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Ozon
    }

    async fn fetch_unanswered(&self, account: &Account) -> Result<Vec<Review>, SourceError> {
        let request = ReviewListRequest {
            filter: ReviewFilter {
                interaction_status: "NOT_REPLIED",
            },
            limit: self.page_size,
            sort_dir: "DESC",
        };
        let response = self.post(LIST_PATH, account, &request).await?;

        let list: ReviewListResponse = read_json(Marketplace::Ozon, response).await?;
        let reviews: Vec<Review> = list.into_reviews().into_iter().map(Review::from).collect();
        debug!(client_id = account.id(), count = reviews.len(), "Ozon reviews fetched");
        Ok(reviews)
    }

    async fn submit_reply(
        &self,
        account: &Account,
        review_id: &str,
        text: &str,
    ) -> Result<(), SourceError> {
        info!(client_id = account.id(), review_id, "Sending reply to Ozon");
        let request = CommentRequest {
            review_uuid: review_id,
            text,
        };
        let response = self.post(COMMENT_PATH, account, &request).await?;
        ensure_success(Marketplace::Ozon, response).await?;
        Ok(())
    }
}
