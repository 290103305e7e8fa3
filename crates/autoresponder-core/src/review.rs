// Review representation, text assembly and ledger key namespacing.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::account::{Account, Marketplace};

/// Label prefixed to the "pros" sub-field in assembled text.
pub const PROS_LABEL: &str = "Pros: ";
/// Label prefixed to the "cons" sub-field in assembled text.
pub const CONS_LABEL: &str = "Cons: ";

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

/// A customer review the marketplace still reports as unanswered.
///
/// Marketplaces that deliver a single combined text put it in `body` and
/// leave `pros`/`cons` empty. `product` and `created_at` are informational
/// only and never influence processing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Review {
    pub id: String,
    pub body: String,
    pub pros: String,
    pub cons: String,
    pub product: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_pros(mut self, pros: impl Into<String>) -> Self {
        self.pros = pros.into();
        self
    }

    pub fn with_cons(mut self, cons: impl Into<String>) -> Self {
        self.cons = cons.into();
        self
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// The text handed to the responder. Empty when the review has no content.
    pub fn assembled_text(&self) -> String {
        assemble_text(&self.body, &self.pros, &self.cons)
    }
}

/// Join the non-empty sub-fields of a review, one per line, in fixed order:
/// body, then `Pros: ...`, then `Cons: ...`.
///
/// Sub-fields are trimmed first, so whitespace-only input contributes nothing
/// and no stray separators are produced.
pub fn assemble_text(body: &str, pros: &str, cons: &str) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(3);

    let body = body.trim();
    if !body.is_empty() {
        parts.push(body.to_string());
    }
    let pros = pros.trim();
    if !pros.is_empty() {
        parts.push(format!("{PROS_LABEL}{pros}"));
    }
    let cons = cons.trim();
    if !cons.is_empty() {
        parts.push(format!("{CONS_LABEL}{cons}"));
    }

    parts.join("\n")
}

// ---------------------------------------------------------------------------
// ReviewKey
// ---------------------------------------------------------------------------

/// A review identifier namespaced by marketplace and account.
///
/// Review ids are only unique within one marketplace account, so the ledger
/// never stores a bare id. The textual form (`marketplace:account:review`) is
/// also the on-disk ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReviewKey(String);

impl ReviewKey {
    pub fn new(marketplace: Marketplace, account_id: &str, review_id: &str) -> Self {
        Self(format!("{}:{}:{}", marketplace.as_str(), account_id, review_id))
    }

    pub fn for_review(account: &Account, review: &Review) -> Self {
        Self::new(account.marketplace(), account.id(), &review.id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReviewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Credentials;

    #[test]
    fn assembles_all_fields_in_fixed_order() {
        assert_eq!(assemble_text("B", "P", "C"), "B\nPros: P\nCons: C");
    }

    #[test]
    fn omits_empty_fields_without_stray_separators() {
        assert_eq!(assemble_text("", "P", "C"), "Pros: P\nCons: C");
        assert_eq!(assemble_text("B", "", "C"), "B\nCons: C");
        assert_eq!(assemble_text("B", "P", ""), "B\nPros: P");
        assert_eq!(assemble_text("", "", "C"), "Cons: C");
        assert_eq!(assemble_text("B", "", ""), "B");
    }

    #[test]
    fn whitespace_only_fields_count_as_empty() {
        assert_eq!(assemble_text("  ", "\n", "\t"), "");
        assert_eq!(assemble_text(" great product ", " ", ""), "great product");
    }

    #[test]
    fn review_without_content_assembles_to_empty_text() {
        let review = Review::new("1").with_product("Sneakers");
        assert!(review.assembled_text().is_empty());
    }

    #[test]
    fn key_is_namespaced_by_marketplace_and_account() {
        let wb = ReviewKey::new(Marketplace::Wildberries, "main", "42");
        let ozon = ReviewKey::new(Marketplace::Ozon, "main", "42");
        assert_eq!(wb.as_str(), "wildberries:main:42");
        assert_eq!(ozon.as_str(), "ozon:main:42");
        assert_ne!(wb, ozon);
    }

    #[test]
    fn key_for_review_uses_account_identity() {
        let account = Account::new(
            "123456",
            Marketplace::Ozon,
            Credentials::ClientKey {
                client_id: "123456".into(),
                api_key: "key".into(),
            },
        );
        let key = ReviewKey::for_review(&account, &Review::new("uuid-1"));
        assert_eq!(key.to_string(), "ozon:123456:uuid-1");
    }
}
