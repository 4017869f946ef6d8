//! Transaction repository: the ledger store and posting engine.
//!
//! A posting runs in one READ COMMITTED database transaction:
//!
//! 1. optional `SET LOCAL statement_timeout`
//! 2. lock every involved account row (`FOR UPDATE`, ascending ID order)
//! 3. read the locked accounts' balances
//! 4. run the funds check
//! 5. insert the header, then every line in order
//! 6. commit
//!
//! Holding the row locks from step 2 through commit serializes postings that
//! touch the same account, so a balance read in step 3 always includes every
//! posting committed before the locks were granted. Any failure rolls the
//! whole unit back.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    AccessMode, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, IsolationLevel, QueryFilter, QueryOrder, QuerySelect,
    Set, TransactionTrait,
};
use tally_core::ledger::{
    AccountBalance, LedgerError, LedgerService, PersistStep, PostedTransaction, ProposedTransaction,
    Purpose, RollbackOutcome, Transaction, TransactionLine,
};
use tally_shared::types::{AccountId, FundsPolicy, TransactionId};
use tracing::{debug, info, warn};

use super::balance::{balance_of, balances_of};
use super::{DEADLOCK_DETECTED, QUERY_CANCELED, SERIALIZATION_FAILURE, UNIQUE_VIOLATION, sqlstate};
use crate::entities::{accounts, transaction_lines, transactions};

/// Transaction repository for posting and reading ledger transactions.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    db: DatabaseConnection,
    policy: FundsPolicy,
    deadline: Option<Duration>,
}

impl TransactionRepository {
    /// Creates a new transaction repository without a posting deadline.
    #[must_use]
    pub const fn new(db: DatabaseConnection, policy: FundsPolicy) -> Self {
        Self {
            db,
            policy,
            deadline: None,
        }
    }

    /// Applies `deadline` to every [`post_transaction`](Self::post_transaction).
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Validates and atomically posts a transaction.
    ///
    /// Uses the repository's default deadline, if one was configured.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if validation, the funds check, or any
    /// persistence step fails. Nothing of the transaction is visible after
    /// an error.
    pub async fn post_transaction(
        &self,
        proposal: ProposedTransaction,
    ) -> Result<PostedTransaction, LedgerError> {
        match self.deadline {
            Some(deadline) => self.post_transaction_within(proposal, deadline).await,
            None => {
                let tx = LedgerService::validate(proposal, Utc::now())?;
                self.persist(tx, None).await
            }
        }
    }

    /// Like [`post_transaction`](Self::post_transaction) with an explicit deadline.
    ///
    /// The deadline bounds both each statement (`statement_timeout`) and the
    /// whole posting. When it expires the in-flight database transaction is
    /// dropped uncommitted.
    ///
    /// # Errors
    ///
    /// Returns `DeadlineExceeded` when the deadline expires, otherwise the
    /// same errors as [`post_transaction`](Self::post_transaction).
    pub async fn post_transaction_within(
        &self,
        proposal: ProposedTransaction,
        deadline: Duration,
    ) -> Result<PostedTransaction, LedgerError> {
        let tx = LedgerService::validate(proposal, Utc::now())?;
        let transaction_id = tx.id.clone();

        match tokio::time::timeout(deadline, self.persist(tx, Some(deadline))).await {
            Ok(result) => result,
            Err(_) => {
                warn!(transaction_id = %transaction_id, deadline = ?deadline, "posting deadline exceeded");
                Err(LedgerError::DeadlineExceeded {
                    transaction_id,
                    timeout_ms: deadline.as_millis(),
                })
            }
        }
    }

    /// Runs the database part of a posting and settles the transaction.
    async fn persist(
        &self,
        mut tx: Transaction,
        deadline: Option<Duration>,
    ) -> Result<PostedTransaction, LedgerError> {
        // Postgres keeps microseconds; truncate so reads return what was posted.
        tx.timestamp = tx.timestamp.trunc_subsecs(6);
        let created_at = Utc::now().trunc_subsecs(6);
        let scope = PostingScope {
            transaction_id: &tx.id,
            deadline,
        };

        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::ReadCommitted), None)
            .await
            .map_err(|e| scope.fail(PersistStep::Begin, None, &e))?;

        match self.write(&txn, &tx, created_at, &scope).await {
            Ok(()) => {
                txn.commit().await.map_err(|e| {
                    scope
                        .fail(PersistStep::Commit, None, &e)
                        .with_rollback(RollbackOutcome::Aborted)
                })?;
                info!(
                    transaction_id = %tx.id,
                    lines = tx.lines.len(),
                    "transaction posted"
                );
                Ok(PostedTransaction {
                    transaction: tx,
                    created_at,
                })
            }
            Err(err) => {
                let outcome = match txn.rollback().await {
                    Ok(()) => RollbackOutcome::RolledBack,
                    Err(e) => RollbackOutcome::Failed(e.to_string()),
                };
                warn!(
                    transaction_id = %tx.id,
                    error = %err,
                    rollback = %outcome,
                    "posting failed"
                );
                Err(err.with_rollback(outcome))
            }
        }
    }

    /// Everything between BEGIN and COMMIT.
    async fn write(
        &self,
        txn: &DatabaseTransaction,
        tx: &Transaction,
        created_at: DateTime<Utc>,
        scope: &PostingScope<'_>,
    ) -> Result<(), LedgerError> {
        if let Some(deadline) = scope.deadline {
            txn.execute_unprepared(&format!(
                "SET LOCAL statement_timeout = {}",
                deadline.as_millis()
            ))
            .await
            .map_err(|e| scope.fail(PersistStep::Configure, None, &e))?;
        }

        let balances = lock_accounts(txn, tx, scope).await?;
        LedgerService::check_funds(&balances, tx, self.policy)?;

        let created_at: DateTime<FixedOffset> = created_at.into();
        let header = transactions::ActiveModel {
            transaction_id: Set(tx.id.as_str().to_string()),
            timestamp: Set(tx.timestamp.into()),
            created_at: Set(created_at),
            deleted_at: Set(None),
        };
        header.insert(txn).await.map_err(|e| {
            if sqlstate(&e).as_deref() == Some(UNIQUE_VIOLATION) {
                LedgerError::DuplicateTransaction(tx.id.clone())
            } else {
                scope.fail(PersistStep::InsertHeader, None, &e)
            }
        })?;

        for (index, line) in tx.lines.iter().enumerate() {
            let line_number = i32::try_from(index).map_err(|e| {
                LedgerError::persistence(PersistStep::InsertLine, Some(&tx.id), Some(&line.account_id), e)
            })?;
            transaction_lines::ActiveModel {
                transaction_id: Set(tx.id.as_str().to_string()),
                line_number: Set(line_number),
                account_id: Set(line.account_id.as_str().to_string()),
                purpose: Set(line.purpose.as_str().to_string()),
                amount: Set(line.amount),
                created_at: Set(created_at),
                deleted_at: Set(None),
            }
            .insert(txn)
            .await
            .map_err(|e| scope.fail(PersistStep::InsertLine, Some(&line.account_id), &e))?;
        }

        Ok(())
    }

    /// Lists the transactions touching an account, newest first.
    ///
    /// Transactions are ordered by the latest creation time of the account's
    /// lines in them. Reads run in one repeatable-read transaction.
    ///
    /// # Errors
    ///
    /// Returns a `Persistence` error if a read fails.
    pub async fn transactions_for_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<PostedTransaction>, LedgerError> {
        let read_err = |e: DbErr| {
            LedgerError::persistence(PersistStep::Read, None, Some(account_id), e)
        };

        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::RepeatableRead), Some(AccessMode::ReadOnly))
            .await
            .map_err(read_err)?;

        let ids: Vec<String> = transaction_lines::Entity::find()
            .select_only()
            .column(transaction_lines::Column::TransactionId)
            .filter(transaction_lines::Column::AccountId.eq(account_id.as_str()))
            .filter(transaction_lines::Column::DeletedAt.is_null())
            .group_by(transaction_lines::Column::TransactionId)
            .order_by_desc(Expr::col(transaction_lines::Column::CreatedAt).max())
            .order_by_desc(transaction_lines::Column::TransactionId)
            .into_tuple::<String>()
            .all(&txn)
            .await
            .map_err(read_err)?;

        let posted = load_posted(&txn, &ids).await;
        // Read-only: committing only releases the snapshot.
        txn.commit().await.map_err(read_err)?;

        let posted = posted?;
        debug!(account_id = %account_id, count = posted.len(), "loaded account transactions");
        Ok(posted)
    }

    /// Reads one transaction with all of its lines.
    ///
    /// Header and lines are read in one repeatable-read snapshot.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` if it does not exist or was deleted.
    pub async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<PostedTransaction, LedgerError> {
        let read_err = |e: DbErr| {
            LedgerError::persistence(PersistStep::Read, Some(transaction_id), None, e)
        };

        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::RepeatableRead), Some(AccessMode::ReadOnly))
            .await
            .map_err(read_err)?;

        let ids = [transaction_id.as_str().to_string()];
        let posted = load_posted(&txn, &ids).await;
        txn.commit().await.map_err(read_err)?;

        posted?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.clone()))
    }

    /// Soft-deletes a transaction and all of its lines.
    ///
    /// Deleting a transaction reverses its effect on balances, so the
    /// reversal takes the same account locks and funds check as a posting.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound` if it does not exist or was already
    /// deleted, `InsufficientFunds` if the reversal would overdraw an account
    /// under the repository's policy, or a `Persistence` error if an update
    /// fails.
    pub async fn soft_delete_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<(), LedgerError> {
        let scope = PostingScope {
            transaction_id,
            deadline: None,
        };

        let txn = self
            .db
            .begin_with_config(Some(IsolationLevel::ReadCommitted), None)
            .await
            .map_err(|e| scope.fail(PersistStep::Begin, None, &e))?;

        match self.tombstone(&txn, &scope).await {
            Ok(()) => {
                txn.commit().await.map_err(|e| {
                    scope
                        .fail(PersistStep::Commit, None, &e)
                        .with_rollback(RollbackOutcome::Aborted)
                })?;
                info!(transaction_id = %transaction_id, "transaction soft-deleted");
                Ok(())
            }
            Err(err) => {
                let outcome = match txn.rollback().await {
                    Ok(()) => RollbackOutcome::RolledBack,
                    Err(e) => RollbackOutcome::Failed(e.to_string()),
                };
                warn!(
                    transaction_id = %transaction_id,
                    error = %err,
                    rollback = %outcome,
                    "soft delete failed"
                );
                Err(err.with_rollback(outcome))
            }
        }
    }

    /// Checks the reversal under the account locks, then stamps `deleted_at`.
    async fn tombstone(
        &self,
        txn: &DatabaseTransaction,
        scope: &PostingScope<'_>,
    ) -> Result<(), LedgerError> {
        let transaction_id = scope.transaction_id;
        let ids = [transaction_id.as_str().to_string()];
        let posted = load_posted(txn, &ids)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.clone()))?;

        let reversal = reversal_of(&posted.transaction)?;
        let balances = lock_accounts(txn, &reversal, scope).await?;
        LedgerService::check_funds(&balances, &reversal, self.policy)?;

        let now: DateTime<FixedOffset> = Utc::now().into();
        let header = transactions::Entity::update_many()
            .col_expr(transactions::Column::DeletedAt, Expr::value(now))
            .filter(transactions::Column::TransactionId.eq(transaction_id.as_str()))
            .filter(transactions::Column::DeletedAt.is_null())
            .exec(txn)
            .await
            .map_err(|e| scope.fail(PersistStep::SoftDelete, None, &e))?;
        // Another delete committed after the lines were read.
        if header.rows_affected == 0 {
            return Err(LedgerError::TransactionNotFound(transaction_id.clone()));
        }

        transaction_lines::Entity::update_many()
            .col_expr(transaction_lines::Column::DeletedAt, Expr::value(now))
            .filter(transaction_lines::Column::TransactionId.eq(transaction_id.as_str()))
            .filter(transaction_lines::Column::DeletedAt.is_null())
            .exec(txn)
            .await
            .map_err(|e| scope.fail(PersistStep::SoftDelete, None, &e))?;
        Ok(())
    }

    /// Current balance of an account: the sum of its non-deleted lines.
    ///
    /// # Errors
    ///
    /// Returns a `Persistence` error if the query fails.
    pub async fn balance_of(&self, account_id: &AccountId) -> Result<i64, LedgerError> {
        balance_of(&self.db, account_id)
            .await
            .map_err(|e| LedgerError::persistence(PersistStep::ReadBalance, None, Some(account_id), e))
    }
}

/// Context for turning database errors of one posting into ledger errors.
struct PostingScope<'a> {
    transaction_id: &'a TransactionId,
    deadline: Option<Duration>,
}

impl PostingScope<'_> {
    fn fail(&self, step: PersistStep, account_id: Option<&AccountId>, err: &DbErr) -> LedgerError {
        match sqlstate(err).as_deref() {
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED) => LedgerError::ConcurrentModification {
                transaction_id: self.transaction_id.clone(),
            },
            Some(QUERY_CANCELED) => LedgerError::DeadlineExceeded {
                transaction_id: self.transaction_id.clone(),
                timeout_ms: self.deadline.map_or(0, |d| d.as_millis()),
            },
            _ => LedgerError::persistence(step, Some(self.transaction_id), account_id, err),
        }
    }
}

/// The transaction with every amount negated.
fn reversal_of(tx: &Transaction) -> Result<Transaction, LedgerError> {
    let lines = tx
        .lines
        .iter()
        .map(|line| {
            let amount = line.amount.checked_neg().ok_or_else(|| {
                LedgerError::persistence(
                    PersistStep::SoftDelete,
                    Some(&tx.id),
                    Some(&line.account_id),
                    "amount cannot be negated",
                )
            })?;
            Ok(TransactionLine {
                amount,
                ..line.clone()
            })
        })
        .collect::<Result<Vec<_>, LedgerError>>()?;

    Ok(Transaction {
        id: tx.id.clone(),
        timestamp: tx.timestamp,
        lines,
    })
}

/// Locks the involved account rows and reads their balances.
///
/// Rows are locked in ascending ID order so two postings over the same
/// accounts cannot deadlock each other.
async fn lock_accounts(
    txn: &DatabaseTransaction,
    tx: &Transaction,
    scope: &PostingScope<'_>,
) -> Result<Vec<AccountBalance>, LedgerError> {
    let wanted: BTreeSet<AccountId> = tx.account_ids();

    let locked: Vec<AccountId> = accounts::Entity::find()
        .select_only()
        .column(accounts::Column::AccountId)
        .filter(accounts::Column::AccountId.is_in(wanted.iter().map(AccountId::as_str)))
        .filter(accounts::Column::DeletedAt.is_null())
        .order_by_asc(accounts::Column::AccountId)
        .lock_exclusive()
        .into_tuple::<String>()
        .all(txn)
        .await
        .map_err(|e| scope.fail(PersistStep::LockAccounts, None, &e))?
        .into_iter()
        .map(AccountId::from)
        .collect();

    if let Some(missing) = wanted.iter().find(|id| !locked.contains(id)) {
        return Err(LedgerError::AccountNotFound(missing.clone()));
    }

    let balances = balances_of(txn, &locked)
        .await
        .map_err(|e| scope.fail(PersistStep::ReadBalance, None, &e))?;

    Ok(locked
        .into_iter()
        .map(|id| {
            let balance = balances.get(&id).copied().unwrap_or(0);
            debug!(account_id = %id, balance, "account locked");
            AccountBalance::new(id, balance)
        })
        .collect())
}

/// Loads headers and non-deleted lines for `ids`, keeping the order of `ids`.
///
/// Deleted or missing headers are skipped.
async fn load_posted<C>(conn: &C, ids: &[String]) -> Result<Vec<PostedTransaction>, LedgerError>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let read_err = |e: DbErr| LedgerError::persistence(PersistStep::Read, None, None, e);

    let headers: HashMap<String, transactions::Model> = transactions::Entity::find()
        .filter(transactions::Column::TransactionId.is_in(ids.iter().map(String::as_str)))
        .filter(transactions::Column::DeletedAt.is_null())
        .all(conn)
        .await
        .map_err(read_err)?
        .into_iter()
        .map(|h| (h.transaction_id.clone(), h))
        .collect();

    let mut lines: HashMap<String, Vec<TransactionLine>> = HashMap::new();
    let models = transaction_lines::Entity::find()
        .filter(transaction_lines::Column::TransactionId.is_in(ids.iter().map(String::as_str)))
        .filter(transaction_lines::Column::DeletedAt.is_null())
        .order_by_asc(transaction_lines::Column::TransactionId)
        .order_by_asc(transaction_lines::Column::LineNumber)
        .all(conn)
        .await
        .map_err(read_err)?;
    for model in models {
        let purpose: Purpose = model.purpose.parse().map_err(|e| {
            LedgerError::persistence(
                PersistStep::Read,
                Some(&TransactionId::from(model.transaction_id.as_str())),
                Some(&AccountId::from(model.account_id.as_str())),
                e,
            )
        })?;
        lines.entry(model.transaction_id).or_default().push(TransactionLine {
            account_id: AccountId::from(model.account_id),
            purpose,
            amount: model.amount,
        });
    }

    Ok(ids
        .iter()
        .filter_map(|id| {
            let header = headers.get(id)?;
            Some(PostedTransaction {
                transaction: Transaction {
                    id: TransactionId::from(header.transaction_id.as_str()),
                    timestamp: header.timestamp.with_timezone(&Utc),
                    lines: lines.remove(id).unwrap_or_default(),
                },
                created_at: header.created_at.with_timezone(&Utc),
            })
        })
        .collect())
}
