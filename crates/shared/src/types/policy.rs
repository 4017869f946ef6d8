//! Funds policy applied by the posting engine.

use serde::{Deserialize, Serialize};

/// Which accounts the funds check protects from going below zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundsPolicy {
    /// Only accounts whose balance is positive before the transaction are
    /// checked. Accounts at or below zero keep accepting debits, which is
    /// what lets funding and clearing accounts run negative.
    #[default]
    PositiveBalancesOnly,
    /// Every account debited by the transaction must end at or above zero.
    NonNegative,
}

impl FundsPolicy {
    /// Returns true if an account with this pre-transaction balance is checked.
    #[must_use]
    pub const fn applies_to(self, balance: i64) -> bool {
        match self {
            Self::PositiveBalancesOnly => balance > 0,
            Self::NonNegative => true,
        }
    }
}
