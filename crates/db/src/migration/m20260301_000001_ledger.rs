//! Ledger schema: accounts, transaction headers and transaction lines.
//!
//! Balances are not stored anywhere; they are summed from `transaction_lines`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(LEDGER_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS transaction_lines CASCADE;
             DROP TABLE IF EXISTS transactions CASCADE;
             DROP TABLE IF EXISTS accounts CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const LEDGER_SQL: &str = r"
-- Accounts. The balance is derived from transaction_lines.
CREATE TABLE accounts (
    account_id TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL,
    name TEXT NOT NULL,
    account_number TEXT NOT NULL,
    routing_number TEXT NOT NULL,
    status TEXT NOT NULL,
    type TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    closed_at TIMESTAMPTZ,
    last_modified TIMESTAMPTZ NOT NULL DEFAULT now(),
    deleted_at TIMESTAMPTZ,
    CONSTRAINT uq_accounts_number_routing UNIQUE (account_number, routing_number)
);

CREATE INDEX idx_accounts_customer ON accounts(customer_id) WHERE deleted_at IS NULL;

-- Transaction headers
CREATE TABLE transactions (
    transaction_id TEXT PRIMARY KEY,
    timestamp TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    deleted_at TIMESTAMPTZ
);

-- Transaction lines, ordered by line_number within a transaction
CREATE TABLE transaction_lines (
    transaction_id TEXT NOT NULL REFERENCES transactions(transaction_id),
    line_number INTEGER NOT NULL,
    account_id TEXT NOT NULL REFERENCES accounts(account_id),
    purpose TEXT NOT NULL,
    amount BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    deleted_at TIMESTAMPTZ,
    PRIMARY KEY (transaction_id, line_number),
    CONSTRAINT chk_transaction_lines_amount CHECK (amount <> 0)
);

-- Balance sums and account history scan this index
CREATE INDEX idx_transaction_lines_account ON transaction_lines(account_id, created_at DESC)
    WHERE deleted_at IS NULL;
";
