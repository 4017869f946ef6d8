//! Repository layer for database operations.

pub mod account;
pub mod balance;
pub mod transaction;

pub use account::{AccountError, AccountRepository, CreateAccountInput};
pub use transaction::TransactionRepository;

use sea_orm::{DbErr, RuntimeErr};

/// Unique violation.
pub(crate) const UNIQUE_VIOLATION: &str = "23505";
/// Serialization failure under concurrent updates.
pub(crate) const SERIALIZATION_FAILURE: &str = "40001";
/// Deadlock detected.
pub(crate) const DEADLOCK_DETECTED: &str = "40P01";
/// Statement cancelled, including by `statement_timeout`.
pub(crate) const QUERY_CANCELED: &str = "57014";

/// Extracts the Postgres SQLSTATE from a database error, if there is one.
pub(crate) fn sqlstate(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Conn(RuntimeErr::SqlxError(e))
        | DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e)) => e,
        _ => return None,
    };

    match runtime {
        sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
        _ => None,
    }
}
