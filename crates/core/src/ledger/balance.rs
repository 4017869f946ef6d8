//! Account balance calculations.
//!
//! Balances are derived, never stored: an account's balance is the sum of
//! every non-deleted line that references it. The store runs the same sum in
//! SQL; this module holds the in-memory form used by the funds checker and
//! by tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;

/// A persisted line as seen by the balance calculator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerLine {
    /// Referenced account.
    pub account_id: AccountId,
    /// Signed amount in minor units.
    pub amount: i64,
    /// Soft-deletion time, if deleted.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Sums the non-deleted lines of `account_id`.
///
/// Returns 0 when the account has no lines. The sum is widened so a long
/// history can never overflow.
#[must_use]
pub fn balance_of<'a, I>(account_id: &AccountId, lines: I) -> i128
where
    I: IntoIterator<Item = &'a LedgerLine>,
{
    lines
        .into_iter()
        .filter(|l| l.deleted_at.is_none() && &l.account_id == account_id)
        .map(|l| i128::from(l.amount))
        .sum()
}

/// Current balance of one account, read before a posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    /// The account ID.
    pub account_id: AccountId,
    /// Balance in minor units.
    pub balance: i64,
}

impl AccountBalance {
    /// Creates a new account balance.
    #[must_use]
    pub fn new(account_id: impl Into<AccountId>, balance: i64) -> Self {
        Self {
            account_id: account_id.into(),
            balance,
        }
    }

    /// Balance after applying a net change.
    #[must_use]
    pub fn after(&self, net: i128) -> i128 {
        i128::from(self.balance) + net
    }
}
