// Per-account review pipeline: ledger check, text assembly, reply generation,
// submission and ledger mark.

use std::sync::Arc;

use tracing::{debug, info, warn};

use autoresponder_core::account::Account;
use autoresponder_core::ledger::Ledger;
use autoresponder_core::review::{Review, ReviewKey};
use autoresponder_llm::Responder;

use crate::marketplace::{ReviewSource, SourceError};
use crate::shutdown::Shutdown;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to a single review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// The ledger already holds the review; nothing was called.
    AlreadyProcessed,
    /// A generated reply was submitted and the review marked.
    Answered,
    /// The review had no text; the fallback reply was submitted and marked.
    AnsweredWithFallback,
    /// The responder failed or returned nothing. Retried next cycle.
    ResponderFailed,
    /// The marketplace rejected the reply. Retried next cycle.
    SubmitFailed,
    /// Shutdown fired while a call was in flight.
    Cancelled,
}

/// Tally of review outcomes for one batch (or several, after `merge`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub skipped: usize,
    pub answered: usize,
    pub fallback: usize,
    pub responder_failures: usize,
    pub submit_failures: usize,
    /// Processing stopped early because of shutdown.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn record(&mut self, outcome: ReviewOutcome) {
        match outcome {
            ReviewOutcome::AlreadyProcessed => self.skipped += 1,
            ReviewOutcome::Answered => self.answered += 1,
            ReviewOutcome::AnsweredWithFallback => self.fallback += 1,
            ReviewOutcome::ResponderFailed => self.responder_failures += 1,
            ReviewOutcome::SubmitFailed => self.submit_failures += 1,
            ReviewOutcome::Cancelled => self.cancelled = true,
        }
    }

    pub fn merge(&mut self, other: &BatchReport) {
        self.fetched += other.fetched;
        self.skipped += other.skipped;
        self.answered += other.answered;
        self.fallback += other.fallback;
        self.responder_failures += other.responder_failures;
        self.submit_failures += other.submit_failures;
        self.cancelled |= other.cancelled;
    }

    /// Replies that reached the marketplace, generated or fallback.
    pub fn submitted(&self) -> usize {
        self.answered + self.fallback
    }

    pub fn failures(&self) -> usize {
        self.responder_failures + self.submit_failures
    }
}

// ---------------------------------------------------------------------------
// ReviewProcessor
// ---------------------------------------------------------------------------

/// Runs the reply pipeline for one account's batch of reviews.
///
/// The ledger mark is the only thing that stops a review from being handled
/// again, and it is written only after the marketplace accepted the reply.
/// Every other failure leaves the review for the next poll cycle.
pub struct ReviewProcessor {
    ledger: Arc<Ledger>,
    responder: Arc<dyn Responder>,
    fallback_reply: String,
    shutdown: Shutdown,
}

impl ReviewProcessor {
    pub fn new(
        ledger: Arc<Ledger>,
        responder: Arc<dyn Responder>,
        fallback_reply: impl Into<String>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            ledger,
            responder,
            fallback_reply: fallback_reply.into(),
            shutdown,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Fetch the account's unanswered reviews and process them.
    ///
    /// A failed fetch is returned to the caller; per-review failures are
    /// only counted in the report.
    pub async fn process_account(
        &self,
        source: &dyn ReviewSource,
        account: &Account,
    ) -> Result<BatchReport, SourceError> {
        info!(
            marketplace = %account.marketplace(),
            account = account.id(),
            "Checking for new reviews"
        );

        let Some(fetched) = self
            .shutdown
            .run_until(source.fetch_unanswered(account))
            .await
        else {
            debug!(account = account.id(), "fetch abandoned on shutdown");
            return Ok(BatchReport {
                cancelled: true,
                ..BatchReport::default()
            });
        };
        let reviews = fetched?;

        if reviews.is_empty() {
            info!(
                marketplace = %account.marketplace(),
                account = account.id(),
                "No new reviews"
            );
        }
        Ok(self.process_batch(source, account, &reviews).await)
    }

    /// Process `reviews` in order. Stops early only on shutdown.
    pub async fn process_batch(
        &self,
        source: &dyn ReviewSource,
        account: &Account,
        reviews: &[Review],
    ) -> BatchReport {
        let mut report = BatchReport {
            fetched: reviews.len(),
            ..BatchReport::default()
        };

        for review in reviews {
            if self.shutdown.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let outcome = self.process_review(source, account, review).await;
            report.record(outcome);
            if outcome == ReviewOutcome::Cancelled {
                break;
            }
        }
        report
    }

    pub async fn process_review(
        &self,
        source: &dyn ReviewSource,
        account: &Account,
        review: &Review,
    ) -> ReviewOutcome {
        let key = ReviewKey::for_review(account, review);
        if self.ledger.contains(&key) {
            debug!(key = %key, "already answered, skipping");
            return ReviewOutcome::AlreadyProcessed;
        }

        let text = review.assembled_text();
        let used_fallback = text.is_empty();
        let reply = if used_fallback {
            info!(
                account = account.id(),
                review_id = %review.id,
                "Review has no text, using fallback reply"
            );
            self.fallback_reply.clone()
        } else {
            match self.shutdown.run_until(self.responder.generate(&text)).await {
                None => return ReviewOutcome::Cancelled,
                Some(Ok(reply)) if !reply.trim().is_empty() => reply,
                Some(Ok(_)) => {
                    warn!(
                        account = account.id(),
                        review_id = %review.id,
                        "Responder returned an empty reply"
                    );
                    return ReviewOutcome::ResponderFailed;
                }
                Some(Err(e)) => {
                    warn!(
                        account = account.id(),
                        review_id = %review.id,
                        "Failed to generate reply: {}",
                        e
                    );
                    return ReviewOutcome::ResponderFailed;
                }
            }
        };

        if !used_fallback {
            info!(
                account = account.id(),
                review_id = %review.id,
                "Generated reply for \"{}\": {}",
                flatten(&text),
                reply
            );
        }

        match self
            .shutdown
            .run_until(source.submit_reply(account, &review.id, &reply))
            .await
        {
            None => ReviewOutcome::Cancelled,
            Some(Ok(())) => {
                self.ledger.mark_processed(&key);
                info!(key = %key, "Reply submitted");
                if used_fallback {
                    ReviewOutcome::AnsweredWithFallback
                } else {
                    ReviewOutcome::Answered
                }
            }
            Some(Err(e)) => {
                warn!(key = %key, "Failed to submit reply: {}", e);
                ReviewOutcome::SubmitFailed
            }
        }
    }
}

/// Review text on a single log line.
fn flatten(text: &str) -> String {
    text.lines().collect::<Vec<_>>().join(" | ")
}
