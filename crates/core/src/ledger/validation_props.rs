//! Property-based tests for transaction validation.
//!
//! - Zero-sum: a transaction validates only if its amounts sum to zero
//! - Zero amounts are rejected wherever they appear
//! - Unknown purposes are rejected

use chrono::Utc;
use proptest::prelude::*;

use super::error::{LedgerError, LineError};
use super::types::{ProposedLine, ProposedTransaction, Purpose};
use super::validation::validate_transaction;

/// Strategy to generate a non-zero amount.
fn non_zero_amount() -> impl Strategy<Value = i64> {
    prop_oneof![-1_000_000_000i64..=-1, 1i64..=1_000_000_000]
}

/// Strategy to generate a canonical purpose string.
fn purpose_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(Purpose::ALL.to_vec()).prop_map(|p| p.as_str().to_string())
}

/// Builds lines for the given amounts plus a final line that zeroes the sum.
fn balanced_lines(amounts: &[i64], purpose: &str) -> Vec<ProposedLine> {
    let mut lines: Vec<ProposedLine> = amounts
        .iter()
        .enumerate()
        .map(|(i, &amount)| ProposedLine::new(format!("acct-{i}"), purpose, amount))
        .collect();
    let sum: i64 = amounts.iter().sum();
    lines.push(ProposedLine::new("offset", purpose, -sum));
    lines
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any set of non-zero lines with an offsetting line validates.
    #[test]
    fn prop_balanced_transactions_accepted(
        amounts in prop::collection::vec(non_zero_amount(), 1..8),
        purpose in purpose_strategy(),
    ) {
        let sum: i64 = amounts.iter().sum();
        prop_assume!(sum != 0);

        let tx = validate_transaction(
            ProposedTransaction::with_lines(balanced_lines(&amounts, &purpose)),
            Utc::now(),
        );
        prop_assert!(tx.is_ok());
        let tx = tx.unwrap();
        prop_assert_eq!(tx.total(), 0);
        prop_assert_eq!(tx.lines.len(), amounts.len() + 1);
    }

    /// Skewing one line of a balanced transaction makes it unbalanced by
    /// exactly the skew.
    #[test]
    fn prop_unbalanced_transactions_rejected(
        amounts in prop::collection::vec(non_zero_amount(), 1..8),
        skew in non_zero_amount(),
    ) {
        let sum: i64 = amounts.iter().sum();
        prop_assume!(sum != 0);

        let mut lines = balanced_lines(&amounts, "transfer");
        let last = lines.len() - 1;
        lines[last].amount += skew;
        prop_assume!(lines[last].amount != 0);

        let err = validate_transaction(ProposedTransaction::with_lines(lines), Utc::now())
            .unwrap_err();
        match err {
            LedgerError::UnbalancedTransaction { sum, .. } => {
                prop_assert_eq!(sum, i128::from(skew));
            }
            other => prop_assert!(false, "unexpected error: {other:?}"),
        }
    }

    /// A zero amount anywhere is reported at its index.
    #[test]
    fn prop_zero_amount_rejected(
        amounts in prop::collection::vec(non_zero_amount(), 2..8),
        position in any::<prop::sample::Index>(),
    ) {
        let mut lines = balanced_lines(&amounts, "wire");
        let index = position.index(lines.len());
        lines[index].amount = 0;

        let err = validate_transaction(ProposedTransaction::with_lines(lines), Utc::now())
            .unwrap_err();
        match err {
            LedgerError::InvalidLine { index: reported, reason, .. } => {
                prop_assert_eq!(reported, index);
                prop_assert_eq!(reason, LineError::ZeroAmount);
            }
            other => prop_assert!(false, "unexpected error: {other:?}"),
        }
    }

    /// Purposes outside the closed set never validate.
    #[test]
    fn prop_unknown_purpose_rejected(purpose in "[a-z]{1,12}") {
        prop_assume!(purpose.parse::<Purpose>().is_err());

        let err = validate_transaction(
            ProposedTransaction::with_lines(vec![
                ProposedLine::new("a", purpose.clone(), -10),
                ProposedLine::new("b", "wire", 10),
            ]),
            Utc::now(),
        )
        .unwrap_err();
        prop_assert!(matches!(
            err,
            LedgerError::InvalidLine { index: 0, reason: LineError::InvalidPurpose(p), .. } if p == purpose
        ), "expected InvalidLine at index 0 with InvalidPurpose");
    }
}
