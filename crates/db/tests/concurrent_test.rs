//! Concurrent posting tests.
//!
//! These tests verify that:
//! - Concurrent postings debiting one account never overdraw it
//! - The final balance equals the sum of the postings that succeeded
//! - A check made outside the posting transaction cannot be trusted

#![allow(clippy::uninlined_format_args)]

mod common;

use std::sync::Arc;

use futures::future::join_all;
use tally_core::ledger::{AccountBalance, LedgerError, LedgerService, Transaction};
use tally_db::TransactionRepository;
use tally_db::repositories::balance::balance_of;
use tally_shared::types::{AccountId, FundsPolicy};
use tokio::sync::Barrier;

use common::{create_account, fund, setup_db, transfer};

#[tokio::test]
async fn test_two_concurrent_overdrafts_at_most_one_succeeds() {
    let Some(db) = setup_db().await else { return };
    let repo = Arc::new(TransactionRepository::new(db.clone(), FundsPolicy::NonNegative));

    let a = create_account(&db, "A").await.id;
    let b = create_account(&db, "B").await.id;
    let c = create_account(&db, "C").await.id;
    fund(&db, &a, 500).await;

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [b.clone(), c.clone()]
        .into_iter()
        .map(|to| {
            let repo = Arc::clone(&repo);
            let barrier = Arc::clone(&barrier);
            let from = a.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                repo.post_transaction(transfer(&from, &to, 400)).await
            })
        })
        .collect();

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "results: {results:?}");
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(err, LedgerError::InsufficientFunds { balance: 100, .. }),
                "unexpected error: {err:?}"
            );
        }
    }

    assert_eq!(repo.balance_of(&a).await.unwrap(), 100);
    let credited = repo.balance_of(&b).await.unwrap() + repo.balance_of(&c).await.unwrap();
    assert_eq!(credited, 400);
}

#[tokio::test]
async fn test_many_concurrent_debits_drain_exactly() {
    let Some(db) = setup_db().await else { return };
    let repo = Arc::new(TransactionRepository::new(db.clone(), FundsPolicy::NonNegative));

    const NUM_TRANSACTIONS: usize = 20;
    let a = create_account(&db, "A").await.id;
    let b = create_account(&db, "B").await.id;
    fund(&db, &a, 1_000).await;

    let barrier = Arc::new(Barrier::new(NUM_TRANSACTIONS));
    let handles: Vec<_> = (0..NUM_TRANSACTIONS)
        .map(|_| {
            let repo = Arc::clone(&repo);
            let barrier = Arc::clone(&barrier);
            let (from, to) = (a.clone(), b.clone());
            tokio::spawn(async move {
                barrier.wait().await;
                repo.post_transaction(transfer(&from, &to, 100)).await
            })
        })
        .collect();

    let mut success_count = 0i64;
    for result in join_all(handles).await {
        match result.expect("task panicked") {
            Ok(_) => success_count += 1,
            Err(LedgerError::InsufficientFunds { balance: 0, debit: 100, .. }) => {}
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }

    assert_eq!(success_count, 10);
    assert_eq!(repo.balance_of(&a).await.unwrap(), 0);
    assert_eq!(repo.balance_of(&b).await.unwrap(), 1_000, "no balance drift");
}

#[tokio::test]
async fn test_check_outside_transaction_is_not_enough() {
    let Some(db) = setup_db().await else { return };
    let repo = TransactionRepository::new(db.clone(), FundsPolicy::NonNegative);

    let a = create_account(&db, "A").await.id;
    let b = create_account(&db, "B").await.id;
    let c = create_account(&db, "C").await.id;
    fund(&db, &a, 500).await;

    // Two callers each read A's balance and run the check on their own.
    let first = LedgerService::validate(transfer(&a, &b, 400), chrono::Utc::now()).unwrap();
    let second = LedgerService::validate(transfer(&a, &c, 400), chrono::Utc::now()).unwrap();
    let seen_by_first = balance_of(&db, &a).await.unwrap();
    let seen_by_second = balance_of(&db, &a).await.unwrap();

    // Both pass: together they would take A to -300.
    assert!(check_alone(&a, seen_by_first, &first).is_ok());
    assert!(check_alone(&a, seen_by_second, &second).is_ok());

    // The posting engine re-checks under the row lock, so only one lands.
    let (r1, r2) = tokio::join!(
        repo.post_transaction(transfer(&a, &b, 400)),
        repo.post_transaction(transfer(&a, &c, 400)),
    );
    assert_eq!(usize::from(r1.is_ok()) + usize::from(r2.is_ok()), 1);
    assert_eq!(repo.balance_of(&a).await.unwrap(), 100);
}

/// Runs the funds check the way a caller would without the posting engine.
fn check_alone(debited: &AccountId, seen: i64, tx: &Transaction) -> Result<(), LedgerError> {
    let balances: Vec<AccountBalance> = tx
        .account_ids()
        .into_iter()
        .map(|id| {
            let balance = if &id == debited { seen } else { 0 };
            AccountBalance::new(id, balance)
        })
        .collect();
    LedgerService::check_funds(&balances, tx, FundsPolicy::NonNegative)
}
