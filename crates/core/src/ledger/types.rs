//! Ledger domain types for transaction posting.
//!
//! A caller hands in a [`ProposedTransaction`] with raw line fields. The
//! validators turn it into a [`Transaction`] whose lines carry a typed
//! [`Purpose`], so nothing downstream has to re-check a purpose string.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, TransactionId};

use super::error::LineError;

/// Why money moves on a transaction line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    /// ACH credit.
    #[serde(alias = "credit")]
    AchCredit,
    /// ACH debit.
    #[serde(alias = "debit")]
    AchDebit,
    /// Fee charged to an account.
    Fee,
    /// Interest paid to an account.
    Interest,
    /// Book transfer between accounts.
    Transfer,
    /// Wire transfer.
    Wire,
}

impl Purpose {
    /// Every purpose, in canonical order.
    pub const ALL: [Self; 6] = [
        Self::AchCredit,
        Self::AchDebit,
        Self::Fee,
        Self::Interest,
        Self::Transfer,
        Self::Wire,
    ];

    /// Returns the canonical wire and storage form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AchCredit => "achcredit",
            Self::AchDebit => "achdebit",
            Self::Fee => "fee",
            Self::Interest => "interest",
            Self::Transfer => "transfer",
            Self::Wire => "wire",
        }
    }
}

impl FromStr for Purpose {
    type Err = LineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "achcredit" | "credit" => Ok(Self::AchCredit),
            "achdebit" | "debit" => Ok(Self::AchDebit),
            "fee" => Ok(Self::Fee),
            "interest" => Ok(Self::Interest),
            "transfer" => Ok(Self::Transfer),
            "wire" => Ok(Self::Wire),
            other => Err(LineError::InvalidPurpose(other.to_string())),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line as submitted by a caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedLine {
    /// Account the amount is posted to.
    #[serde(default)]
    pub account_id: String,
    /// Raw purpose string.
    #[serde(default)]
    pub purpose: String,
    /// Signed amount in minor units.
    pub amount: i64,
}

impl ProposedLine {
    /// Convenience constructor.
    pub fn new(account_id: impl Into<String>, purpose: impl Into<String>, amount: i64) -> Self {
        Self {
            account_id: account_id.into(),
            purpose: purpose.into(),
            amount,
        }
    }
}

/// A transaction as submitted by a caller, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedTransaction {
    /// Caller-asserted ID. Generated when absent or blank.
    #[serde(default)]
    pub id: Option<TransactionId>,
    /// Business time. Defaults to the validation time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Lines in order.
    #[serde(default)]
    pub lines: Vec<ProposedLine>,
}

impl ProposedTransaction {
    /// Creates a proposal with no ID or timestamp.
    #[must_use]
    pub fn with_lines(lines: Vec<ProposedLine>) -> Self {
        Self {
            id: None,
            timestamp: None,
            lines,
        }
    }

    /// Sets the caller-asserted transaction ID.
    #[must_use]
    pub fn id(mut self, id: impl Into<TransactionId>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A validated transaction line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLine {
    /// Account the amount is posted to.
    pub account_id: AccountId,
    /// Why the money moves.
    pub purpose: Purpose,
    /// Signed, non-zero amount in minor units.
    pub amount: i64,
}

/// A validated transaction whose line amounts sum to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction ID.
    pub id: TransactionId,
    /// Business time.
    pub timestamp: DateTime<Utc>,
    /// Lines in posting order.
    pub lines: Vec<TransactionLine>,
}

impl Transaction {
    /// Signed sum of every line amount.
    #[must_use]
    pub fn total(&self) -> i128 {
        self.lines.iter().map(|l| i128::from(l.amount)).sum()
    }

    /// Distinct accounts referenced by the lines, in ascending order.
    #[must_use]
    pub fn account_ids(&self) -> BTreeSet<AccountId> {
        self.lines.iter().map(|l| l.account_id.clone()).collect()
    }

    /// Net amount each account moves by in this transaction.
    #[must_use]
    pub fn net_changes(&self) -> BTreeMap<AccountId, i128> {
        let mut nets = BTreeMap::new();
        for line in &self.lines {
            *nets.entry(line.account_id.clone()).or_insert(0) += i128::from(line.amount);
        }
        nets
    }

    /// Returns true if any line references the account.
    #[must_use]
    pub fn touches(&self, account_id: &AccountId) -> bool {
        self.lines.iter().any(|l| &l.account_id == account_id)
    }
}

/// A committed transaction as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostedTransaction {
    /// The transaction itself.
    #[serde(flatten)]
    pub transaction: Transaction,
    /// System time the store recorded the header.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("achcredit", Purpose::AchCredit)]
    #[case("credit", Purpose::AchCredit)]
    #[case("achdebit", Purpose::AchDebit)]
    #[case("debit", Purpose::AchDebit)]
    #[case("fee", Purpose::Fee)]
    #[case("interest", Purpose::Interest)]
    #[case("transfer", Purpose::Transfer)]
    #[case("wire", Purpose::Wire)]
    fn test_purpose_parses(#[case] raw: &str, #[case] expected: Purpose) {
        assert_eq!(raw.parse::<Purpose>(), Ok(expected));
    }

    #[rstest]
    #[case("refund")]
    #[case("")]
    #[case("WIRE")]
    fn test_unknown_purpose_rejected(#[case] raw: &str) {
        assert_eq!(
            raw.parse::<Purpose>(),
            Err(LineError::InvalidPurpose(raw.to_string()))
        );
    }

    #[test]
    fn test_purpose_canonical_form_round_trips() {
        for purpose in Purpose::ALL {
            assert_eq!(purpose.as_str().parse::<Purpose>(), Ok(purpose));
            assert_eq!(
                serde_json::to_string(&purpose).unwrap(),
                format!("\"{}\"", purpose.as_str())
            );
        }
        let aliased: Purpose = serde_json::from_str("\"debit\"").unwrap();
        assert_eq!(aliased, Purpose::AchDebit);
    }

    #[test]
    fn test_proposed_transaction_json_is_camel_case() {
        let proposal: ProposedTransaction = serde_json::from_str(
            r#"{"lines":[{"accountId":"a","purpose":"wire","amount":-5},{"accountId":"b","purpose":"wire","amount":5}]}"#,
        )
        .unwrap();
        assert_eq!(proposal.id, None);
        assert_eq!(proposal.lines[0], ProposedLine::new("a", "wire", -5));
    }

    #[test]
    fn test_net_changes_merge_lines_of_same_account() {
        let tx = Transaction {
            id: TransactionId::from("t"),
            timestamp: Utc::now(),
            lines: vec![
                TransactionLine { account_id: "a".into(), purpose: Purpose::Fee, amount: -30 },
                TransactionLine { account_id: "b".into(), purpose: Purpose::Fee, amount: 50 },
                TransactionLine { account_id: "a".into(), purpose: Purpose::Fee, amount: -20 },
            ],
        };
        let nets = tx.net_changes();
        assert_eq!(nets[&AccountId::from("a")], -50);
        assert_eq!(nets[&AccountId::from("b")], 50);
        assert_eq!(tx.total(), 0);
        assert_eq!(tx.account_ids().len(), 2);
        assert!(tx.touches(&AccountId::from("b")));
        assert!(!tx.touches(&AccountId::from("c")));
    }
}
