//! Property-based tests for LedgerService funds checking.
//!
//! - Accepted postings never take a protected account below zero
//! - Rejections always name an account that would have gone below zero
//! - `NonNegative` is never more permissive than `PositiveBalancesOnly`

use chrono::Utc;
use proptest::prelude::*;
use tally_shared::types::{AccountId, FundsPolicy, TransactionId};

use super::balance::AccountBalance;
use super::error::LedgerError;
use super::service::LedgerService;
use super::types::{Purpose, Transaction, TransactionLine};

/// Strategy to generate a balance in minor units, negative ones included.
fn balance_strategy() -> impl Strategy<Value = i64> {
    -100_000i64..100_000i64
}

/// Strategy for a two-account transfer: (A balance, B balance, amount moved A -> B).
fn transfer_strategy() -> impl Strategy<Value = (i64, i64, i64)> {
    (balance_strategy(), balance_strategy(), 1i64..200_000i64)
}

fn transfer(amount: i64) -> Transaction {
    Transaction {
        id: TransactionId::new(),
        timestamp: Utc::now(),
        lines: vec![
            TransactionLine {
                account_id: AccountId::from("A"),
                purpose: Purpose::Transfer,
                amount: -amount,
            },
            TransactionLine {
                account_id: AccountId::from("B"),
                purpose: Purpose::Transfer,
                amount,
            },
        ],
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// An accepted posting leaves every protected account at or above zero.
    #[test]
    fn prop_accepted_postings_keep_protected_accounts_solvent(
        (a, b, amount) in transfer_strategy(),
        non_negative in any::<bool>(),
    ) {
        let policy = if non_negative { FundsPolicy::NonNegative } else { FundsPolicy::PositiveBalancesOnly };
        let balances = vec![AccountBalance::new("A", a), AccountBalance::new("B", b)];
        let tx = transfer(amount);

        if LedgerService::check_funds(&balances, &tx, policy).is_ok() {
            let nets = tx.net_changes();
            for account in &balances {
                let net = nets[&account.account_id];
                if policy.applies_to(account.balance) && net < 0 {
                    prop_assert!(account.after(net) >= 0);
                }
            }
        }
    }

    /// A rejection names the debited account with its real figures.
    #[test]
    fn prop_rejection_names_overdrawn_account(
        (a, b, amount) in transfer_strategy(),
    ) {
        let balances = vec![AccountBalance::new("A", a), AccountBalance::new("B", b)];

        match LedgerService::check_funds(&balances, &transfer(amount), FundsPolicy::NonNegative) {
            Ok(()) => prop_assert!(a >= amount),
            Err(LedgerError::InsufficientFunds { account_id, balance, debit }) => {
                prop_assert_eq!(account_id.as_str(), "A");
                prop_assert_eq!(balance, a);
                prop_assert_eq!(debit, i128::from(amount));
                prop_assert!(a < amount);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
        }
    }

    /// Whatever `NonNegative` accepts, the default policy accepts too.
    #[test]
    fn prop_non_negative_is_stricter(
        (a, b, amount) in transfer_strategy(),
    ) {
        let balances = vec![AccountBalance::new("A", a), AccountBalance::new("B", b)];
        let tx = transfer(amount);

        if LedgerService::check_funds(&balances, &tx, FundsPolicy::NonNegative).is_ok() {
            prop_assert!(
                LedgerService::check_funds(&balances, &tx, FundsPolicy::PositiveBalancesOnly).is_ok()
            );
        }
    }
}
