//! Balance calculator over persisted transaction lines.
//!
//! Every function takes a generic connection so the posting engine can run
//! the same query inside its own database transaction, after the account
//! rows are locked.

use std::collections::HashMap;

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use tally_shared::types::AccountId;

use crate::entities::transaction_lines;

/// `SUM(bigint)` is `numeric` in Postgres; cast back so it decodes as `i64`.
const SUM_AMOUNT: &str = "COALESCE(SUM(amount), 0)::BIGINT";

/// Sums the non-deleted line amounts of one account. Zero when it has none.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn balance_of<C>(conn: &C, account_id: &AccountId) -> Result<i64, DbErr>
where
    C: ConnectionTrait,
{
    let balance = transaction_lines::Entity::find()
        .select_only()
        .column_as(Expr::cust(SUM_AMOUNT), "balance")
        .filter(transaction_lines::Column::AccountId.eq(account_id.as_str()))
        .filter(transaction_lines::Column::DeletedAt.is_null())
        .into_tuple::<i64>()
        .one(conn)
        .await?;

    Ok(balance.unwrap_or(0))
}

/// Sums the non-deleted line amounts of several accounts in one query.
///
/// Accounts without lines are present with a zero balance.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn balances_of<C>(
    conn: &C,
    account_ids: &[AccountId],
) -> Result<HashMap<AccountId, i64>, DbErr>
where
    C: ConnectionTrait,
{
    let mut balances: HashMap<AccountId, i64> =
        account_ids.iter().map(|id| (id.clone(), 0)).collect();
    if account_ids.is_empty() {
        return Ok(balances);
    }

    let rows = transaction_lines::Entity::find()
        .select_only()
        .column(transaction_lines::Column::AccountId)
        .column_as(Expr::cust(SUM_AMOUNT), "balance")
        .filter(transaction_lines::Column::AccountId.is_in(account_ids.iter().map(AccountId::as_str)))
        .filter(transaction_lines::Column::DeletedAt.is_null())
        .group_by(transaction_lines::Column::AccountId)
        .into_tuple::<(String, i64)>()
        .all(conn)
        .await?;

    for (account_id, balance) in rows {
        balances.insert(AccountId::from(account_id), balance);
    }
    Ok(balances)
}
