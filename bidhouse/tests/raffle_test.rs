//! Raffle ticket sales: clamping, oversell prevention, card confirmation.

#![allow(clippy::unwrap_used)]

use bidhouse::error::MarketError;
use bidhouse::ledger::Ledger;
use bidhouse::mocks::{MockLedgerStore, MockPaymentGateway, MockRaffleStore};
use bidhouse::providers::gateway::PaymentOutcome;
use bidhouse::providers::raffle_store::RaffleStore;
use bidhouse::raffle::{PurchaseFunding, RaffleService};
use bidhouse::types::{Money, PurchaseStatus, RaffleId, UserId};

type Service = RaffleService<MockRaffleStore, MockLedgerStore, MockPaymentGateway>;

struct Fixture {
    raffles: MockRaffleStore,
    ledger: MockLedgerStore,
    gateway: MockPaymentGateway,
    service: Service,
}

fn fixture() -> Fixture {
    let raffles = MockRaffleStore::new();
    let ledger = MockLedgerStore::new();
    let gateway = MockPaymentGateway::new();
    let service = RaffleService::new(
        raffles.clone(),
        Ledger::new(ledger.clone()),
        gateway.clone(),
    );
    Fixture {
        raffles,
        ledger,
        gateway,
        service,
    }
}

async fn open_raffle(fx: &Fixture, ticket_price: i64, max_entries: u32) -> RaffleId {
    fx.service
        .create_raffle(
            "weekly draw".to_string(),
            Money::from_minor(ticket_price),
            max_entries,
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn ledger_purchase_allocates_entries_immediately() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 10, 100).await;
    let buyer = UserId::new();
    fx.ledger.seed_balance(buyer, 500);

    let result = fx
        .service
        .purchase_tickets(raffle_id, buyer, 3, PurchaseFunding::Ledger)
        .await
        .unwrap();

    assert_eq!(result.granted, 3);
    assert_eq!(result.purchase.status, PurchaseStatus::Succeeded);
    assert_eq!(result.purchase.amount.minor(), 30);
    assert!(result.client_secret.is_none());

    let balance = Ledger::new(fx.ledger.clone()).balance(buyer).await.unwrap();
    assert_eq!(balance.value(), 470);
    assert_eq!(fx.raffles.entry_count(raffle_id).await.unwrap(), 3);
}

#[tokio::test]
async fn entries_carry_sequential_ticket_numbers() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 10, 100).await;

    let first = UserId::new();
    let second = UserId::new();
    fx.ledger.seed_balance(first, 100);
    fx.ledger.seed_balance(second, 100);

    let a = fx
        .service
        .purchase_tickets(raffle_id, first, 2, PurchaseFunding::Ledger)
        .await
        .unwrap();
    let b = fx
        .service
        .purchase_tickets(raffle_id, second, 2, PurchaseFunding::Ledger)
        .await
        .unwrap();

    let a_entries = fx.raffles.entries_for_purchase(a.purchase.id).await.unwrap();
    let b_entries = fx.raffles.entries_for_purchase(b.purchase.id).await.unwrap();
    let numbers: Vec<u32> = a_entries
        .iter()
        .chain(b_entries.iter())
        .map(|e| e.ticket_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn requested_quantity_is_clamped_and_only_granted_tickets_are_paid() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 10, 5).await;

    let early = UserId::new();
    fx.ledger.seed_balance(early, 100);
    fx.service
        .purchase_tickets(raffle_id, early, 3, PurchaseFunding::Ledger)
        .await
        .unwrap();

    let late = UserId::new();
    fx.ledger.seed_balance(late, 100);
    let result = fx
        .service
        .purchase_tickets(raffle_id, late, 4, PurchaseFunding::Ledger)
        .await
        .unwrap();

    assert_eq!(result.granted, 2);
    // Charged only for the two granted tickets.
    let balance = Ledger::new(fx.ledger.clone()).balance(late).await.unwrap();
    assert_eq!(balance.value(), 80);
    assert_eq!(fx.raffles.entry_count(raffle_id).await.unwrap(), 5);
}

#[tokio::test]
async fn sold_out_raffles_reject_new_purchases() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 10, 2).await;

    let buyer = UserId::new();
    fx.ledger.seed_balance(buyer, 100);
    fx.service
        .purchase_tickets(raffle_id, buyer, 2, PurchaseFunding::Ledger)
        .await
        .unwrap();

    let next = UserId::new();
    fx.ledger.seed_balance(next, 100);
    let err = fx
        .service
        .purchase_tickets(raffle_id, next, 1, PurchaseFunding::Ledger)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::RaffleSoldOut);

    // The late buyer keeps their money.
    let balance = Ledger::new(fx.ledger.clone()).balance(next).await.unwrap();
    assert_eq!(balance.value(), 100);
}

#[tokio::test]
async fn a_buyer_can_only_enter_once() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 10, 100).await;
    let buyer = UserId::new();
    fx.ledger.seed_balance(buyer, 500);

    fx.service
        .purchase_tickets(raffle_id, buyer, 1, PurchaseFunding::Ledger)
        .await
        .unwrap();
    let err = fx
        .service
        .purchase_tickets(raffle_id, buyer, 1, PurchaseFunding::Ledger)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::AlreadyEntered);
}

#[tokio::test]
async fn a_failed_purchase_frees_the_buyer_slot() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 10, 100).await;
    let buyer = UserId::new();

    // Card purchase whose charge fails.
    let opened = fx
        .service
        .purchase_tickets(raffle_id, buyer, 2, PurchaseFunding::Card)
        .await
        .unwrap();
    let payment_ref = opened.purchase.payment_ref.clone().unwrap();
    fx.service
        .handle_payment_event(&payment_ref, false)
        .await
        .unwrap();

    // The slot is free again; a retry opens a fresh purchase.
    fx.ledger.seed_balance(buyer, 100);
    let retried = fx
        .service
        .purchase_tickets(raffle_id, buyer, 2, PurchaseFunding::Ledger)
        .await
        .unwrap();
    assert_eq!(retried.granted, 2);
}

#[tokio::test]
async fn insufficient_points_fail_the_purchase_without_entries() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 50, 100).await;
    let buyer = UserId::new();
    fx.ledger.seed_balance(buyer, 40);

    let err = fx
        .service
        .purchase_tickets(raffle_id, buyer, 1, PurchaseFunding::Ledger)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::InsufficientFunds);
    assert_eq!(fx.raffles.entry_count(raffle_id).await.unwrap(), 0);
}

#[tokio::test]
async fn card_purchase_waits_for_processor_confirmation() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 10, 100).await;
    let buyer = UserId::new();

    let opened = fx
        .service
        .purchase_tickets(raffle_id, buyer, 4, PurchaseFunding::Card)
        .await
        .unwrap();

    assert_eq!(opened.granted, 0);
    assert_eq!(opened.purchase.status, PurchaseStatus::Pending);
    assert!(opened.client_secret.is_some());
    assert_eq!(fx.raffles.entry_count(raffle_id).await.unwrap(), 0);

    let payment_ref = opened.purchase.payment_ref.clone().unwrap();
    fx.service
        .handle_payment_event(&payment_ref, true)
        .await
        .unwrap();

    assert_eq!(fx.raffles.entry_count(raffle_id).await.unwrap(), 4);
    let purchase = fx.raffles.purchase_snapshot(opened.purchase.id).unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Succeeded);
}

#[tokio::test]
async fn duplicate_payment_events_do_not_duplicate_entries() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 10, 100).await;
    let buyer = UserId::new();

    let opened = fx
        .service
        .purchase_tickets(raffle_id, buyer, 2, PurchaseFunding::Card)
        .await
        .unwrap();
    let payment_ref = opened.purchase.payment_ref.clone().unwrap();

    fx.service.handle_payment_event(&payment_ref, true).await.unwrap();
    fx.service.handle_payment_event(&payment_ref, true).await.unwrap();

    assert_eq!(fx.raffles.entry_count(raffle_id).await.unwrap(), 2);
}

#[tokio::test]
async fn events_for_unknown_payments_are_ignored() {
    let fx = fixture();
    fx.service
        .handle_payment_event("pay_unrelated", true)
        .await
        .unwrap();
}

#[tokio::test]
async fn finalize_verifies_the_charge_with_the_processor() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 10, 100).await;
    let buyer = UserId::new();

    let opened = fx
        .service
        .purchase_tickets(raffle_id, buyer, 3, PurchaseFunding::Card)
        .await
        .unwrap();
    let payment_ref = opened.purchase.payment_ref.clone().unwrap();

    // Still pending at the processor: no entries yet.
    let err = fx
        .service
        .finalize_purchase(raffle_id, &payment_ref)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::PaymentAuthorizationFailed { .. }));
    assert_eq!(fx.raffles.entry_count(raffle_id).await.unwrap(), 0);

    // Processor confirms; finalize allocates.
    fx.gateway
        .set_payment_outcome(&payment_ref, PaymentOutcome::Succeeded);
    let finalized = fx
        .service
        .finalize_purchase(raffle_id, &payment_ref)
        .await
        .unwrap();
    assert_eq!(finalized.entries, 3);

    // Finalizing again is a no-op read.
    let again = fx
        .service
        .finalize_purchase(raffle_id, &payment_ref)
        .await
        .unwrap();
    assert_eq!(again.entries, 3);
}

#[tokio::test]
async fn finalize_marks_processor_failures() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 10, 100).await;
    let buyer = UserId::new();

    let opened = fx
        .service
        .purchase_tickets(raffle_id, buyer, 1, PurchaseFunding::Card)
        .await
        .unwrap();
    let payment_ref = opened.purchase.payment_ref.clone().unwrap();
    fx.gateway
        .set_payment_outcome(&payment_ref, PaymentOutcome::Failed);

    let err = fx
        .service
        .finalize_purchase(raffle_id, &payment_ref)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::PaymentAuthorizationFailed { .. }));

    let purchase = fx.raffles.purchase_snapshot(opened.purchase.id).unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Failed);
}

#[tokio::test]
async fn ledger_purchase_clamped_to_zero_refunds_and_reports_sold_out() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 10, 3).await;

    // Inventory disappears between the pre-check and allocation: another
    // buyer's purchase lands first.
    let buyer = UserId::new();
    fx.ledger.seed_balance(buyer, 100);
    let rival = UserId::new();
    fx.ledger.seed_balance(rival, 100);

    fx.service
        .purchase_tickets(raffle_id, rival, 3, PurchaseFunding::Ledger)
        .await
        .unwrap();

    let err = fx
        .service
        .purchase_tickets(raffle_id, buyer, 2, PurchaseFunding::Ledger)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::RaffleSoldOut);

    // Fully refunded, nothing allocated beyond the cap.
    let balance = Ledger::new(fx.ledger.clone()).balance(buyer).await.unwrap();
    assert_eq!(balance.value(), 100);
    assert_eq!(fx.raffles.entry_count(raffle_id).await.unwrap(), 3);
}

#[tokio::test]
async fn zero_quantity_and_zero_capacity_are_rejected() {
    let fx = fixture();
    let raffle_id = open_raffle(&fx, 10, 5).await;

    let err = fx
        .service
        .purchase_tickets(raffle_id, UserId::new(), 0, PurchaseFunding::Ledger)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::InvalidQuantity);

    let err = fx
        .service
        .create_raffle("empty".to_string(), Money::from_minor(10), 0)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::InvalidQuantity);
}
