//! Account domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, CustomerId};

/// Lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Account accepts postings.
    #[default]
    Open,
    /// Account is closed; only its status and closed-at may change.
    Closed,
}

impl AccountStatus {
    /// Returns the stored form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown account status {other:?}")),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An account with its derived balance.
///
/// `balance` is never stored; it is the sum of every non-deleted line that
/// references the account at the time the account was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account ID.
    pub id: AccountId,
    /// Owning customer.
    pub customer_id: CustomerId,
    /// Display name.
    pub name: String,
    /// Account number, unique together with the routing number.
    pub account_number: String,
    /// ABA routing number.
    pub routing_number: String,
    /// Lifecycle state.
    pub status: AccountStatus,
    /// Free-form type such as `Checking` or `Savings`.
    #[serde(rename = "type")]
    pub account_type: String,
    /// Derived balance in minor units.
    pub balance: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Closing time, if closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}
