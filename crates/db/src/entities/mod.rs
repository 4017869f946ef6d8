//! `SeaORM` entities for the ledger tables.

pub mod accounts;
pub mod transaction_lines;
pub mod transactions;
