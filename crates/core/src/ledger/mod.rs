//! Double-entry ledger logic.
//!
//! This module implements the pure side of transaction posting:
//! - Domain types for proposed and validated transactions
//! - Line and zero-sum validation
//! - Balance calculation over ledger lines
//! - Funds checking against pre-transaction balances
//! - Error types for ledger operations

pub mod account;
pub mod balance;
pub mod error;
pub mod service;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod validation_props;

pub use account::{Account, AccountStatus};
pub use balance::{AccountBalance, LedgerLine, balance_of};
pub use error::{LedgerError, LineError, PersistStep, RollbackOutcome};
pub use service::LedgerService;
pub use types::{
    PostedTransaction, ProposedLine, ProposedTransaction, Purpose, Transaction, TransactionLine,
};
pub use validation::{validate_line, validate_transaction};
