//! Business rule validation for proposed transactions.
//!
//! Nothing here touches storage: a transaction that fails validation never
//! opens a database transaction.

use chrono::{DateTime, Utc};
use tally_shared::types::AccountId;

use super::error::{LedgerError, LineError};
use super::types::{ProposedLine, ProposedTransaction, Purpose, Transaction, TransactionLine};

/// Validates a single line and returns its typed form.
///
/// Checks run in order: account reference, purpose, amount.
///
/// # Errors
///
/// Returns the first [`LineError`] the line violates.
pub fn validate_line(line: &ProposedLine) -> Result<TransactionLine, LineError> {
    if line.account_id.trim().is_empty() {
        return Err(LineError::MissingAccountReference);
    }

    let purpose: Purpose = line.purpose.parse()?;

    if line.amount == 0 {
        return Err(LineError::ZeroAmount);
    }

    Ok(TransactionLine {
        account_id: AccountId::from(line.account_id.as_str()),
        purpose,
        amount: line.amount,
    })
}

/// Validates a proposed transaction.
///
/// Assigns a fresh ID when the caller gave none (or a blank one) and stamps
/// `now` as the business time when the caller gave none.
///
/// # Errors
///
/// - `EmptyTransaction` if there are no lines
/// - `InvalidLine` for the first line that fails [`validate_line`]
/// - `UnbalancedTransaction` if the amounts do not sum to zero
pub fn validate_transaction(
    proposal: ProposedTransaction,
    now: DateTime<Utc>,
) -> Result<Transaction, LedgerError> {
    let transaction_id = proposal
        .id
        .filter(|id| !id.is_blank())
        .unwrap_or_default();
    let timestamp = proposal.timestamp.unwrap_or(now);

    if proposal.lines.is_empty() {
        return Err(LedgerError::EmptyTransaction { transaction_id });
    }

    let mut lines = Vec::with_capacity(proposal.lines.len());
    for (index, line) in proposal.lines.iter().enumerate() {
        match validate_line(line) {
            Ok(valid) => lines.push(valid),
            Err(reason) => {
                return Err(LedgerError::InvalidLine {
                    transaction_id,
                    index,
                    account_id: line.account_id.clone(),
                    reason,
                });
            }
        }
    }

    let transaction = Transaction {
        id: transaction_id,
        timestamp,
        lines,
    };

    let sum = transaction.total();
    if sum != 0 {
        return Err(LedgerError::UnbalancedTransaction {
            lines: transaction.lines.len(),
            sum,
            transaction_id: transaction.id,
        });
    }

    Ok(transaction)
}
