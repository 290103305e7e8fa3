// Marketplace accounts and the registry built from credentials.toml.

use std::collections::HashSet;
use std::fmt;

use tracing::{info, warn};

use crate::config::{CredentialsConfig, WildberriesCredentials};

/// Marketplaces the responder knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marketplace {
    Wildberries,
    Ozon,
}

impl Marketplace {
    /// Stable lowercase tag, used in ledger keys and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Marketplace::Wildberries => "wildberries",
            Marketplace::Ozon => "ozon",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential material for one account.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A single API token (Wildberries).
    ApiKey(String),
    /// A client id plus API key pair (Ozon).
    ClientKey { client_id: String, api_key: String },
}

// Keys stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("ApiKey(***)"),
            Credentials::ClientKey { client_id, .. } => f
                .debug_struct("ClientKey")
                .field("client_id", client_id)
                .field("api_key", &"***")
                .finish(),
        }
    }
}

/// A configured marketplace account. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    id: String,
    marketplace: Marketplace,
    credentials: Credentials,
}

impl Account {
    pub fn new(id: impl Into<String>, marketplace: Marketplace, credentials: Credentials) -> Self {
        Self {
            id: id.into(),
            marketplace,
            credentials,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn marketplace(&self) -> Marketplace {
        self.marketplace
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

// ---------------------------------------------------------------------------
// AccountRegistry
// ---------------------------------------------------------------------------

/// All usable accounts, Wildberries first, then Ozon, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: Vec<Account>,
}

/// Ledger-visible id of a Wildberries account, and whether that id depends on
/// the entry's position in the list.
///
/// A lone unnamed account is always `wildberries`. With several accounts an
/// unnamed entry becomes `wildberries-N`, which shifts if the list changes.
fn wildberries_account_id(
    entry: &WildberriesCredentials,
    index: usize,
    count: usize,
) -> (String, bool) {
    match entry.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => (name.to_string(), false),
        _ if count == 1 => ("wildberries".to_string(), false),
        _ => (format!("wildberries-{}", index + 1), true),
    }
}

impl AccountRegistry {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    /// Build the registry from the credentials file.
    ///
    /// Entries with blank credentials and duplicate (marketplace, id) pairs are
    /// skipped with a warning; the remaining accounts are unaffected.
    pub fn from_credentials(credentials: &CredentialsConfig) -> Self {
        let mut accounts = Vec::new();
        let mut seen: HashSet<(Marketplace, String)> = HashSet::new();

        let wb_count = credentials.wildberries.len();
        for (index, entry) in credentials.wildberries.iter().enumerate() {
            let (id, positional) = wildberries_account_id(entry, index, wb_count);
            let api_key = entry.api_key.trim();
            if api_key.is_empty() {
                warn!(account = %id, "Wildberries account has an empty api_key, skipping");
                continue;
            }
            if !seen.insert((Marketplace::Wildberries, id.clone())) {
                warn!(account = %id, "duplicate Wildberries account, skipping");
                continue;
            }
            if positional {
                warn!(
                    account = %id,
                    "Wildberries account has no name; its id follows its position in \
                     credentials.toml, so reordering or adding accounts changes which \
                     reviews count as answered"
                );
            }
            accounts.push(Account::new(
                id,
                Marketplace::Wildberries,
                Credentials::ApiKey(api_key.to_string()),
            ));
        }

        for entry in &credentials.ozon {
            let client_id = entry.client_id.trim();
            let api_key = entry.api_key.trim();
            if client_id.is_empty() || api_key.is_empty() {
                warn!("Ozon account with empty client_id or api_key, skipping");
                continue;
            }
            if !seen.insert((Marketplace::Ozon, client_id.to_string())) {
                warn!(client_id, "duplicate Ozon account, skipping");
                continue;
            }
            accounts.push(Account::new(
                client_id,
                Marketplace::Ozon,
                Credentials::ClientKey {
                    client_id: client_id.to_string(),
                    api_key: api_key.to_string(),
                },
            ));
        }

        info!("{} marketplace account(s) registered", accounts.len());
        Self { accounts }
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Account> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
