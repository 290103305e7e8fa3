// In-process stand-ins for marketplaces and the responder, used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use autoresponder_core::account::{Account, Credentials, Marketplace};
use autoresponder_core::review::Review;
use autoresponder_llm::{Responder, ResponderError};

use crate::marketplace::{ReviewSource, SourceError};

pub fn wb_account(id: &str) -> Account {
    Account::new(id, Marketplace::Wildberries, Credentials::ApiKey(format!("{id}-token")))
}

pub fn ozon_account(client_id: &str) -> Account {
    Account::new(
        client_id,
        Marketplace::Ozon,
        Credentials::ClientKey {
            client_id: client_id.into(),
            api_key: format!("{client_id}-key"),
        },
    )
}

// ---------------------------------------------------------------------------
// FakeSource
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SourceState {
    reviews: HashMap<String, Vec<Review>>,
    failing_fetch: HashSet<String>,
    failing_submit: HashSet<String>,
    fetches: Vec<String>,
    submissions: Vec<(String, String, String)>,
}

/// Serves canned reviews per account id and records every call.
pub struct FakeSource {
    marketplace: Marketplace,
    fetch_delay: Option<Duration>,
    state: Mutex<SourceState>,
}

impl FakeSource {
    pub fn new(marketplace: Marketplace) -> Self {
        Self {
            marketplace,
            fetch_delay: None,
            state: Mutex::new(SourceState::default()),
        }
    }

    /// Sleep this long inside every fetch.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn with_reviews(self, account_id: &str, reviews: Vec<Review>) -> Self {
        self.state
            .lock()
            .unwrap()
            .reviews
            .insert(account_id.to_string(), reviews);
        self
    }

    pub fn failing_fetch_for(self, account_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_fetch
            .insert(account_id.to_string());
        self
    }

    pub fn failing_submit_for(self, review_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_submit
            .insert(review_id.to_string());
        self
    }

    /// Let submissions for `review_id` succeed from now on.
    pub fn heal_submit(&self, review_id: &str) {
        self.state.lock().unwrap().failing_submit.remove(review_id);
    }

    /// Account ids fetched so far, in call order.
    pub fn fetches(&self) -> Vec<String> {
        self.state.lock().unwrap().fetches.clone()
    }

    /// `(account, review, text)` for every successful submission.
    pub fn submissions(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn submitted_ids(&self) -> Vec<String> {
        self.submissions().into_iter().map(|(_, id, _)| id).collect()
    }
}

#[async_trait]
impl ReviewSource for FakeSource {
    fn marketplace(&self) -> Marketplace {
        self.marketplace
    }

    async fn fetch_unanswered(&self, account: &Account) -> Result<Vec<Review>, SourceError> {
        self.state.lock().unwrap().fetches.push(account.id().to_string());
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        if state.failing_fetch.contains(account.id()) {
            return Err(SourceError::Status {
                marketplace: self.marketplace,
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(state.reviews.get(account.id()).cloned().unwrap_or_default())
    }

    async fn submit_reply(
        &self,
        account: &Account,
        review_id: &str,
        text: &str,
    ) -> Result<(), SourceError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_submit.contains(review_id) {
            return Err(SourceError::Status {
                marketplace: self.marketplace,
                status: 500,
                body: "rejected".into(),
            });
        }
        state.submissions.push((
            account.id().to_string(),
            review_id.to_string(),
            text.to_string(),
        ));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeResponder
// ---------------------------------------------------------------------------

/// Replies `Reply to: <text>`, except for texts configured to fail.
#[derive(Default)]
pub struct FakeResponder {
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl FakeResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Responder for FakeResponder {
    async fn generate(&self, review_text: &str) -> Result<String, ResponderError> {
        self.calls.lock().unwrap().push(review_text.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(review_text) {
            return Err(ResponderError::Empty);
        }
        Ok(format!("Reply to: {review_text}"))
    }
}
