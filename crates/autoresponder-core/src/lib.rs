// Shared building blocks: configuration, accounts, the review model and the
// processed-review ledger.

pub mod account;
pub mod config;
pub mod ledger;
pub mod review;
