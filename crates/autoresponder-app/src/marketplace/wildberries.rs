// Wildberries feedbacks API adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use autoresponder_core::account::{Account, Credentials, Marketplace};
use autoresponder_core::config::EndpointConfig;
use autoresponder_core::review::Review;

use super::{ensure_success, parse_timestamp, read_json, ReviewSource, SourceError};

const FEEDBACKS_PATH: &str = "/api/v1/feedbacks";
const ANSWER_PATH: &str = "/api/v1/feedbacks/answer";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FeedbackListResponse {
    data: FeedbackData,
}

#[derive(Debug, Deserialize)]
struct FeedbackData {
    #[serde(default)]
    feedbacks: Vec<Feedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Feedback {
    id: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    pros: Option<String>,
    #[serde(default)]
    cons: Option<String>,
    #[serde(default)]
    product_details: Option<ProductDetails>,
    #[serde(default)]
    created_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDetails {
    #[serde(default)]
    product_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnswerRequest<'a> {
    id: &'a str,
    text: &'a str,
}

impl From<Feedback> for Review {
    fn from(feedback: Feedback) -> Self {
        Review {
            id: feedback.id,
            body: feedback.text.unwrap_or_default(),
            pros: feedback.pros.unwrap_or_default(),
            cons: feedback.cons.unwrap_or_default(),
            product: feedback.product_details.and_then(|p| p.product_name),
            created_at: parse_timestamp(feedback.created_date.as_deref()),
        }
    }
}

// ---------------------------------------------------------------------------
// WildberriesSource
// ---------------------------------------------------------------------------

/// Reviews come from `GET /api/v1/feedbacks?isAnswered=false`, replies go to
/// `POST /api/v1/feedbacks/answer`. The account token is sent verbatim in the
/// `Authorization` header.
pub struct WildberriesSource {
    http: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl WildberriesSource {
    pub fn new(http: reqwest::Client, config: &EndpointConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        }
    }

    fn token<'a>(&self, account: &'a Account) -> Result<&'a str, SourceError> {
        match (account.marketplace(), account.credentials()) {
            (Marketplace::Wildberries, Credentials::ApiKey(token)) => Ok(token.as_str()),
            _ => Err(SourceError::UnsupportedAccount {
                marketplace: Marketplace::Wildberries,
                account: account.id().to_string(),
            }),
        }
    }
}

#[async_trait]
impl ReviewSource for WildberriesSource {
    fn marketplace(&self) -> Marketplace {
        Marketplace::Wildberries
    }

    async fn fetch_unanswered(&self, account: &Account) -> Result<Vec<Review>, SourceError> {
        let token = self.token(account)?;
        let take = self.page_size.to_string();

        let response = self
            .http
            .get(format!("{}{FEEDBACKS_PATH}", self.base_url))
            .header("Authorization", token)
            .query(&[("isAnswered", "false"), ("take", take.as_str()), ("skip", "0")])
            .send()
            .await?;

        let list: FeedbackListResponse = read_json(Marketplace::Wildberries, response).await?;
        let reviews: Vec<Review> = list.data.feedbacks.into_iter().map(Review::from).collect();
        debug!(account = account.id(), count = reviews.len(), "Wildberries feedbacks fetched");
        Ok(reviews)
    }

    async fn submit_reply(
        &self,
        account: &Account,
        review_id: &str,
        text: &str,
    ) -> Result<(), SourceError> {
        let token = self.token(account)?;

        info!(account = account.id(), review_id, "Sending reply to Wildberries");
        let response = self
            .http
            .post(format!("{}{ANSWER_PATH}", self.base_url))
            .header("Authorization", token)
            .json(&AnswerRequest { id: review_id, text })
            .send()
            .await?;

        ensure_success(Marketplace::Wildberries, response).await?;
        Ok(())
    }
}
