//! Ledger service for transaction validation and funds checking.
//!
//! This module holds the decisions the posting engine makes before it writes
//! anything. It has no database dependencies: the store reads balances under
//! row locks and hands them in.

use chrono::{DateTime, Utc};
use tally_shared::types::FundsPolicy;

use super::balance::AccountBalance;
use super::error::LedgerError;
use super::types::{ProposedTransaction, Transaction};
use super::validation::validate_transaction;

/// Ledger service for transaction validation and funds checking.
///
/// This service contains pure business logic with no database dependencies.
pub struct LedgerService;

impl LedgerService {
    /// Validates a proposal, stamping `now` where the caller left gaps.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the line or zero-sum validation fails.
    pub fn validate(
        proposal: ProposedTransaction,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        validate_transaction(proposal, now)
    }

    /// Decides whether every protected account keeps a permitted balance.
    ///
    /// Each account is judged on its net change across all of its lines in
    /// the transaction. Which accounts are protected depends on `policy`:
    /// with [`FundsPolicy::PositiveBalancesOnly`] an account whose balance is
    /// zero or negative before the transaction is never blocked.
    ///
    /// # Errors
    ///
    /// - `InvalidCheckInput` if fewer than two balances are given or the
    ///   transaction has no lines
    /// - `NoMatchingLine` if a protected account has no line
    /// - `InsufficientFunds` if a protected account would end below zero
    pub fn check_funds(
        balances: &[AccountBalance],
        tx: &Transaction,
        policy: FundsPolicy,
    ) -> Result<(), LedgerError> {
        if balances.len() < 2 || tx.lines.is_empty() {
            return Err(LedgerError::InvalidCheckInput {
                accounts: balances.len(),
                lines: tx.lines.len(),
            });
        }

        let nets = tx.net_changes();

        for account in balances {
            if !policy.applies_to(account.balance) {
                continue;
            }

            let Some(&net) = nets.get(&account.account_id) else {
                return Err(LedgerError::NoMatchingLine {
                    account_id: account.account_id.clone(),
                });
            };

            if net < 0 && account.after(net) < 0 {
                return Err(LedgerError::InsufficientFunds {
                    account_id: account.account_id.clone(),
                    balance: account.balance,
                    debit: -net,
                });
            }
        }

        Ok(())
    }
}
