//! Account repository: creation, resolution with balances, and search.
//!
//! Accounts are soft-deleted only; every read here skips rows with a
//! `deleted_at`.

use chrono::{DateTime, FixedOffset, Utc};
use rand::Rng;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    AccessMode, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    IsolationLevel, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tally_core::ledger::{Account, AccountStatus};
use tally_shared::AppError;
use tally_shared::types::{AccountId, CustomerId};
use tracing::{debug, info};

use super::balance::balances_of;
use super::{UNIQUE_VIOLATION, sqlstate};
use crate::entities::accounts;

/// Attempts at drawing an unused account number before giving up.
const ACCOUNT_NUMBER_ATTEMPTS: usize = 5;

/// Error types for account operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Account number already used with this routing number.
    #[error("Account number {account_number} already exists for routing number {routing_number}")]
    DuplicateAccountNumber {
        /// The account number.
        account_number: String,
        /// The routing number.
        routing_number: String,
    },

    /// A required field is empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::DuplicateAccountNumber { .. } => Self::Conflict {
                code: "DUPLICATE_ACCOUNT_NUMBER",
                message: err.to_string(),
            },
            AccountError::MissingField(_) => Self::validation("MISSING_FIELD", err.to_string()),
            AccountError::Database(e) => Self::Database(e.to_string()),
        }
    }
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    /// Owning customer.
    pub customer_id: CustomerId,
    /// Display name.
    pub name: String,
    /// Free-form account type, e.g. `Checking`.
    pub account_type: String,
    /// Routing number the account number is unique under.
    pub routing_number: String,
}

/// Account repository for account operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an open account with a generated ID and 10-digit number.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - name, type or routing number is blank
    /// - no unused account number was found
    /// - the database operation fails
    pub async fn create_account(&self, input: CreateAccountInput) -> Result<Account, AccountError> {
        if input.customer_id.is_blank() {
            return Err(AccountError::MissingField("customer ID"));
        }
        if input.name.trim().is_empty() {
            return Err(AccountError::MissingField("name"));
        }
        if input.account_type.trim().is_empty() {
            return Err(AccountError::MissingField("type"));
        }
        if input.routing_number.trim().is_empty() {
            return Err(AccountError::MissingField("routing number"));
        }

        let account_number = self.unused_account_number(&input.routing_number).await?;

        let now: DateTime<FixedOffset> = Utc::now().into();
        let account = accounts::ActiveModel {
            account_id: Set(AccountId::new().into_inner()),
            customer_id: Set(input.customer_id.into_inner()),
            name: Set(input.name),
            account_number: Set(account_number.clone()),
            routing_number: Set(input.routing_number.clone()),
            status: Set(AccountStatus::Open.as_str().to_string()),
            account_type: Set(input.account_type),
            created_at: Set(now),
            closed_at: Set(None),
            last_modified: Set(now),
            deleted_at: Set(None),
        };

        let model = account.insert(&self.db).await.map_err(|e| {
            if sqlstate(&e).as_deref() == Some(UNIQUE_VIOLATION) {
                AccountError::DuplicateAccountNumber {
                    account_number,
                    routing_number: input.routing_number,
                }
            } else {
                AccountError::Database(e)
            }
        })?;

        info!(account_id = %model.account_id, customer_id = %model.customer_id, "account created");
        to_account(model, 0)
    }

    /// Draws random account numbers until one is free under `routing_number`.
    async fn unused_account_number(&self, routing_number: &str) -> Result<String, AccountError> {
        let mut candidate = String::new();
        for _ in 0..ACCOUNT_NUMBER_ATTEMPTS {
            candidate = random_account_number();
            let existing = accounts::Entity::find()
                .filter(accounts::Column::AccountNumber.eq(&candidate))
                .filter(accounts::Column::RoutingNumber.eq(routing_number))
                .one(&self.db)
                .await?;
            if existing.is_none() {
                return Ok(candidate);
            }
            debug!(routing_number, "account number collision, drawing again");
        }
        Err(AccountError::DuplicateAccountNumber {
            account_number: candidate,
            routing_number: routing_number.to_string(),
        })
    }

    /// Resolves accounts by ID together with their current balances.
    ///
    /// Deleted and unknown IDs are left out. Accounts and balances are read
    /// in one repeatable-read transaction so they reflect one snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_accounts(&self, account_ids: &[AccountId]) -> Result<Vec<Account>, AccountError> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::RepeatableRead), Some(AccessMode::ReadOnly))
            .await?;

        let models = accounts::Entity::find()
            .filter(accounts::Column::AccountId.is_in(account_ids.iter().map(AccountId::as_str)))
            .filter(accounts::Column::DeletedAt.is_null())
            .order_by_asc(accounts::Column::AccountId)
            .all(&txn)
            .await?;

        let found: Vec<AccountId> = models
            .iter()
            .map(|m| AccountId::from(m.account_id.as_str()))
            .collect();
        let balances = balances_of(&txn, &found).await?;

        txn.commit().await?;

        models
            .into_iter()
            .map(|model| {
                let balance = balances
                    .get(&AccountId::from(model.account_id.as_str()))
                    .copied()
                    .unwrap_or(0);
                to_account(model, balance)
            })
            .collect()
    }

    /// Finds the account with this number, routing number and type.
    ///
    /// The type is compared case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn search_by_routing_number(
        &self,
        account_number: &str,
        routing_number: &str,
        account_type: &str,
    ) -> Result<Option<Account>, AccountError> {
        let model = accounts::Entity::find()
            .filter(accounts::Column::AccountNumber.eq(account_number))
            .filter(accounts::Column::RoutingNumber.eq(routing_number))
            .filter(
                Expr::expr(Func::lower(Expr::col(accounts::Column::AccountType)))
                    .eq(Func::lower(Expr::val(account_type))),
            )
            .filter(accounts::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?;

        match model {
            Some(m) => {
                let id = AccountId::from(m.account_id);
                Ok(self.get_accounts(&[id]).await?.into_iter().next())
            }
            None => Ok(None),
        }
    }

    /// Lists a customer's accounts with balances, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn search_by_customer_id(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Account>, AccountError> {
        let ids: Vec<AccountId> = accounts::Entity::find()
            .filter(accounts::Column::CustomerId.eq(customer_id.as_str()))
            .filter(accounts::Column::DeletedAt.is_null())
            .order_by_asc(accounts::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| AccountId::from(m.account_id))
            .collect();

        let mut accounts = self.get_accounts(&ids).await?;
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(accounts)
    }
}

fn random_account_number() -> String {
    rand::rng()
        .random_range(1_000_000_000u64..10_000_000_000u64)
        .to_string()
}

fn to_account(model: accounts::Model, balance: i64) -> Result<Account, AccountError> {
    let status = model
        .status
        .parse::<AccountStatus>()
        .map_err(|e| AccountError::Database(DbErr::Type(e)))?;

    Ok(Account {
        id: AccountId::from(model.account_id),
        customer_id: CustomerId::from(model.customer_id),
        name: model.name,
        account_number: model.account_number,
        routing_number: model.routing_number,
        status,
        account_type: model.account_type,
        balance,
        created_at: model.created_at.with_timezone(&Utc),
        closed_at: model.closed_at.map(|t| t.with_timezone(&Utc)),
        last_modified: model.last_modified.with_timezone(&Utc),
    })
}
