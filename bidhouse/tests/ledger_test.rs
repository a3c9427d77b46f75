//! Point ledger: append-only entries, overdraft protection, hold pairing.

#![allow(clippy::unwrap_used)]

use bidhouse::error::MarketError;
use bidhouse::ledger::Ledger;
use bidhouse::mocks::MockLedgerStore;
use bidhouse::types::{LedgerEntryType, Points, UserId};

fn ledger() -> (Ledger<MockLedgerStore>, MockLedgerStore) {
    let store = MockLedgerStore::new();
    (Ledger::new(store.clone()), store)
}

#[tokio::test]
async fn awards_accumulate_and_balance_matches_the_entry_sum() {
    let (ledger, _) = ledger();
    let user = UserId::new();

    ledger
        .award(user, Points::new(100), LedgerEntryType::SignupBonus, None)
        .await
        .unwrap();
    ledger
        .award(user, Points::new(25), LedgerEntryType::Referral, Some("ref-1"))
        .await
        .unwrap();

    assert_eq!(ledger.balance(user).await.unwrap().value(), 125);

    let history = ledger.history(user).await.unwrap();
    assert_eq!(history.len(), 2);
    let sum: i64 = history.iter().map(|t| t.change.value()).sum();
    assert_eq!(sum, 125);
}

#[tokio::test]
async fn history_is_newest_first() {
    let (ledger, _) = ledger();
    let user = UserId::new();

    ledger
        .award(user, Points::new(10), LedgerEntryType::SignupBonus, None)
        .await
        .unwrap();
    ledger
        .spend(user, Points::new(4), LedgerEntryType::RafflePurchase, Some("p-1"))
        .await
        .unwrap();

    let history = ledger.history(user).await.unwrap();
    assert_eq!(history[0].entry_type, LedgerEntryType::RafflePurchase);
    assert_eq!(history[0].change.value(), -4);
    assert_eq!(history[1].entry_type, LedgerEntryType::SignupBonus);
}

#[tokio::test]
async fn overdrafts_are_rejected_and_write_nothing() {
    let (ledger, _) = ledger();
    let user = UserId::new();

    ledger
        .award(user, Points::new(50), LedgerEntryType::SignupBonus, None)
        .await
        .unwrap();

    let err = ledger
        .spend(user, Points::new(51), LedgerEntryType::RafflePurchase, None)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::InsufficientFunds);

    assert_eq!(ledger.balance(user).await.unwrap().value(), 50);
    assert_eq!(ledger.history(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_accounts_have_a_zero_balance() {
    let (ledger, _) = ledger();
    let user = UserId::new();

    assert_eq!(ledger.balance(user).await.unwrap(), Points::ZERO);
    assert!(ledger.history(user).await.unwrap().is_empty());
    let err = ledger
        .spend(user, Points::new(1), LedgerEntryType::RafflePurchase, None)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::InsufficientFunds);
}

#[tokio::test]
async fn hold_and_release_net_to_zero_and_share_a_reference() {
    let (ledger, _) = ledger();
    let user = UserId::new();

    ledger
        .award(user, Points::new(200), LedgerEntryType::SignupBonus, None)
        .await
        .unwrap();
    ledger.hold(user, Points::new(80), "bid-7").await.unwrap();
    assert_eq!(ledger.balance(user).await.unwrap().value(), 120);

    ledger
        .release_hold(user, Points::new(80), "bid-7")
        .await
        .unwrap();
    assert_eq!(ledger.balance(user).await.unwrap().value(), 200);

    let history = ledger.history(user).await.unwrap();
    let pair: Vec<_> = history
        .iter()
        .filter(|t| t.reference.as_deref() == Some("bid-7"))
        .collect();
    assert_eq!(pair.len(), 2);
    assert_eq!(pair.iter().map(|t| t.change.value()).sum::<i64>(), 0);
    assert!(pair
        .iter()
        .any(|t| t.entry_type == LedgerEntryType::HoldRelease));
}

#[tokio::test]
async fn a_hold_cannot_overdraw_the_balance() {
    let (ledger, store) = ledger();
    let user = UserId::new();
    store.seed_balance(user, 30);

    let err = ledger.hold(user, Points::new(31), "bid-9").await.unwrap_err();
    assert_eq!(err, MarketError::InsufficientFunds);
    assert_eq!(ledger.balance(user).await.unwrap().value(), 30);
}
