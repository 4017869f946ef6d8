//! Ledger error types for validation, funds and persistence errors.
//!
//! Every error that can stop a posting lives here so callers see one
//! taxonomy regardless of which layer detected the problem. Validation
//! errors are raised before any database work, funds errors before the write
//! phase, and persistence errors always come with the outcome of the
//! rollback that followed them.

use std::fmt;

use tally_shared::AppError;
use tally_shared::types::{AccountId, TransactionId};
use thiserror::Error;

/// Reasons a single transaction line is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    /// Purpose is outside the closed set.
    #[error("unknown purpose {0:?}")]
    InvalidPurpose(String),

    /// Account identifier is empty.
    #[error("missing account reference")]
    MissingAccountReference,

    /// A zero amount line has no ledger effect.
    #[error("amount cannot be zero")]
    ZeroAmount,
}

impl LineError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPurpose(_) => "INVALID_PURPOSE",
            Self::MissingAccountReference => "MISSING_ACCOUNT_REFERENCE",
            Self::ZeroAmount => "ZERO_AMOUNT",
        }
    }
}

/// The step of a posting (or read) that failed against the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStep {
    /// Opening the database transaction.
    Begin,
    /// Applying the statement timeout.
    Configure,
    /// Locking the involved account rows.
    LockAccounts,
    /// Reading an account balance.
    ReadBalance,
    /// Inserting the transaction header.
    InsertHeader,
    /// Inserting a transaction line.
    InsertLine,
    /// Committing.
    Commit,
    /// Reading transactions back.
    Read,
    /// Stamping deletion timestamps.
    SoftDelete,
}

impl fmt::Display for PersistStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            Self::Begin => "begin",
            Self::Configure => "configure",
            Self::LockAccounts => "lock accounts",
            Self::ReadBalance => "read balance",
            Self::InsertHeader => "insert header",
            Self::InsertLine => "insert line",
            Self::Commit => "commit",
            Self::Read => "read",
            Self::SoftDelete => "soft delete",
        };
        f.write_str(step)
    }
}

/// What happened to the in-flight database transaction after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// No transaction was open, or the failure happened before one existed.
    NotAttempted,
    /// The transaction was rolled back.
    RolledBack,
    /// The database aborted the transaction on its own (failed commit).
    Aborted,
    /// Rolling back failed too.
    Failed(String),
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAttempted => f.write_str("not attempted"),
            Self::RolledBack => f.write_str("rolled back"),
            Self::Aborted => f.write_str("aborted by database"),
            Self::Failed(cause) => write!(f, "failed: {cause}"),
        }
    }
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// A line failed validation.
    #[error("Transaction {transaction_id} line {index} (account {account_id:?}) is invalid: {reason}")]
    InvalidLine {
        /// The transaction being validated.
        transaction_id: TransactionId,
        /// Zero-based position of the offending line.
        index: usize,
        /// Account referenced by the offending line, possibly empty.
        account_id: String,
        /// Why the line was rejected.
        #[source]
        reason: LineError,
    },

    /// Transaction has no lines.
    #[error("Transaction {transaction_id} has no lines")]
    EmptyTransaction {
        /// The transaction being validated.
        transaction_id: TransactionId,
    },

    /// Line amounts do not sum to zero.
    #[error("Transaction {transaction_id} has {lines} lines that sum to {sum}")]
    UnbalancedTransaction {
        /// The transaction being validated.
        transaction_id: TransactionId,
        /// Number of lines.
        lines: usize,
        /// Signed sum of the line amounts.
        sum: i128,
    },

    // ========== Funds Errors ==========
    /// Funds check called with too few accounts or no lines.
    #[error("Invalid funds check input: {accounts} accounts, {lines} lines")]
    InvalidCheckInput {
        /// Number of resolved accounts.
        accounts: usize,
        /// Number of transaction lines.
        lines: usize,
    },

    /// Posting would take a protected account below zero.
    #[error("Account {account_id} has insufficient funds: balance {balance}, debit {debit}")]
    InsufficientFunds {
        /// The account.
        account_id: AccountId,
        /// Balance before the transaction.
        balance: i64,
        /// Net amount the transaction takes out of the account.
        debit: i128,
    },

    /// A checked account has no line in the transaction.
    #[error("No transaction lines found for account {account_id}")]
    NoMatchingLine {
        /// The account.
        account_id: AccountId,
    },

    // ========== Lookup Errors ==========
    /// Account not found or deleted.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Transaction not found or deleted.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// A transaction with this ID already exists.
    #[error("Transaction {0} already exists")]
    DuplicateTransaction(TransactionId),

    // ========== Concurrency Errors ==========
    /// The database aborted the posting because of a conflicting one.
    #[error("Concurrent modification while posting {transaction_id}, please retry")]
    ConcurrentModification {
        /// The transaction being posted.
        transaction_id: TransactionId,
    },

    /// The caller's deadline expired; nothing was persisted.
    #[error("Posting {transaction_id} did not finish within {timeout_ms}ms")]
    DeadlineExceeded {
        /// The transaction being posted.
        transaction_id: TransactionId,
        /// The deadline in milliseconds.
        timeout_ms: u128,
    },

    // ========== Database Errors ==========
    /// A database step failed; the in-flight transaction was rolled back.
    #[error(
        "Persistence failure during {step}{}{}: {cause} (rollback: {rollback})",
        transaction_id.as_ref().map(|t| format!(" of transaction {t}")).unwrap_or_default(),
        account_id.as_ref().map(|a| format!(" account {a}")).unwrap_or_default()
    )]
    Persistence {
        /// The failing step.
        step: PersistStep,
        /// The transaction being written or read, if any.
        transaction_id: Option<TransactionId>,
        /// The line account, for line-level failures.
        account_id: Option<AccountId>,
        /// The underlying database error.
        cause: String,
        /// Outcome of the rollback that followed.
        rollback: RollbackOutcome,
    },
}

impl LedgerError {
    /// Builds a persistence error whose rollback has not happened yet.
    pub fn persistence(
        step: PersistStep,
        transaction_id: Option<&TransactionId>,
        account_id: Option<&AccountId>,
        cause: impl fmt::Display,
    ) -> Self {
        Self::Persistence {
            step,
            transaction_id: transaction_id.cloned(),
            account_id: account_id.cloned(),
            cause: cause.to_string(),
            rollback: RollbackOutcome::NotAttempted,
        }
    }

    /// Records the rollback outcome on persistence errors.
    ///
    /// Other errors are returned unchanged.
    #[must_use]
    pub fn with_rollback(self, outcome: RollbackOutcome) -> Self {
        match self {
            Self::Persistence {
                step,
                transaction_id,
                account_id,
                cause,
                ..
            } => Self::Persistence {
                step,
                transaction_id,
                account_id,
                cause,
                rollback: outcome,
            },
            other => other,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidLine { reason, .. } => reason.error_code(),
            Self::EmptyTransaction { .. } => "EMPTY_TRANSACTION",
            Self::UnbalancedTransaction { .. } => "UNBALANCED_TRANSACTION",
            Self::InvalidCheckInput { .. } => "INVALID_CHECK_INPUT",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::NoMatchingLine { .. } => "NO_MATCHING_LINE",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::DuplicateTransaction(_) => "DUPLICATE_TRANSACTION",
            Self::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            Self::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            Self::Persistence { .. } => "PERSISTENCE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::InvalidLine { .. }
            | Self::EmptyTransaction { .. }
            | Self::UnbalancedTransaction { .. }
            | Self::InvalidCheckInput { .. } => 400,

            // 404 Not Found
            Self::AccountNotFound(_) | Self::TransactionNotFound(_) => 404,

            // 409 Conflict
            Self::DuplicateTransaction(_) | Self::ConcurrentModification { .. } => 409,

            // 422 Unprocessable - business rules
            Self::InsufficientFunds { .. } => 422,

            // 504 Gateway Timeout
            Self::DeadlineExceeded { .. } => 504,

            // 500 Internal Server Error
            Self::NoMatchingLine { .. } | Self::Persistence { .. } => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification { .. } | Self::DeadlineExceeded { .. }
        )
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let code = err.error_code();
        let message = err.to_string();
        match err.http_status_code() {
            400 => Self::Validation { code, message },
            404 => Self::NotFound { code, message },
            409 => Self::Conflict { code, message },
            422 => Self::BusinessRule { code, message },
            504 => Self::Timeout(message),
            _ => match err {
                LedgerError::Persistence { .. } => Self::Database(message),
                _ => Self::Internal(message),
            },
        }
    }
}
