//! Races driven through the public services: funds are conserved and
//! inventory caps hold no matter how placements interleave.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]
#![allow(clippy::cast_possible_wrap)]

use bidhouse::bidding::{BidEngine, BidFunding};
use bidhouse::config::FeesConfig;
use bidhouse::error::MarketError;
use bidhouse::ledger::Ledger;
use bidhouse::mocks::{MockLedgerStore, MockMarketStore, MockPaymentGateway, MockRaffleStore};
use bidhouse::providers::market_store::MarketStore;
use bidhouse::providers::raffle_store::RaffleStore;
use bidhouse::raffle::{PurchaseFunding, RaffleService};
use bidhouse::types::{Auction, AuctionId, Money, Raffle, RaffleId, RaffleStatus, UserId};
use chrono::{Duration, Utc};
use futures::future::join_all;

fn fees() -> FeesConfig {
    FeesConfig {
        platform_fee_bps: 500,
        bonus_award_bps: 100,
    }
}

#[tokio::test]
async fn concurrent_bids_leave_one_leader_and_conserve_funds() {
    let market = MockMarketStore::new();
    let ledger = MockLedgerStore::new();
    let gateway = MockPaymentGateway::new();
    let engine = BidEngine::new(
        market.clone(),
        Ledger::new(ledger.clone()),
        gateway,
        fees(),
    );

    let auction_id = AuctionId::new();
    let now = Utc::now();
    market.seed_auction(Auction::new(
        auction_id,
        UserId::new(),
        Money::from_minor(100),
        now + Duration::hours(1),
        now,
    ));

    const SEED: i64 = 1_000;
    let bidders: Vec<UserId> = (0..8).map(|_| UserId::new()).collect();
    for bidder in &bidders {
        ledger.seed_balance(*bidder, SEED);
    }

    // All eight race with distinct amounts; interleaving decides who wins
    // and who hits PriceChanged or BidTooLow.
    let tasks = bidders.iter().enumerate().map(|(i, bidder)| {
        let engine = engine.clone();
        let bidder = *bidder;
        let amount = Money::from_minor(110 + 10 * i as i64);
        tokio::spawn(async move {
            engine
                .place_bid(auction_id, bidder, amount, BidFunding::Ledger)
                .await
        })
    });
    let results: Vec<_> = join_all(tasks).await;

    let mut accepted = Vec::new();
    for result in results {
        match result.unwrap() {
            Ok(placed) => accepted.push(placed),
            Err(
                MarketError::PriceChanged
                | MarketError::BidTooLow { .. }
                | MarketError::InsufficientFunds,
            ) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert!(!accepted.is_empty());

    // Exactly one bid stands, at the final auction price.
    let leader = market.active_bid(auction_id).await.unwrap().unwrap();
    let auction = market.auction_snapshot(auction_id).unwrap();
    assert_eq!(auction.current_price, leader.amount);

    // The leader's funds are held; everyone else is whole again.
    let book = Ledger::new(ledger.clone());
    for bidder in &bidders {
        let balance = book.balance(*bidder).await.unwrap().value();
        if *bidder == leader.bidder_id {
            assert_eq!(balance, SEED - leader.amount.minor());
        } else {
            assert_eq!(balance, SEED);
        }
    }
}

#[tokio::test]
async fn concurrent_debits_never_drive_a_balance_negative() {
    use bidhouse::types::{LedgerEntryType, Points};

    let store = MockLedgerStore::new();
    let book = Ledger::new(store.clone());
    let user = UserId::new();
    store.seed_balance(user, 70);

    // Ten tasks each try to spend 20; at most three can succeed.
    let tasks = (0..10).map(|_| {
        let book = Ledger::new(store.clone());
        tokio::spawn(async move {
            book.spend(user, Points::new(20), LedgerEntryType::RafflePurchase, None)
                .await
        })
    });
    let results: Vec<_> = join_all(tasks).await;

    let mut succeeded = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => succeeded += 1,
            Err(MarketError::InsufficientFunds) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(succeeded, 3);

    let balance = book.balance(user).await.unwrap();
    assert_eq!(balance.value(), 70 - 3 * 20);
    assert!(balance.value() >= 0);
}

#[tokio::test]
async fn last_raffle_ticket_is_never_sold_twice() {
    let raffles = MockRaffleStore::new();
    let ledger = MockLedgerStore::new();
    let gateway = MockPaymentGateway::new();
    let service = RaffleService::new(
        raffles.clone(),
        Ledger::new(ledger.clone()),
        gateway,
    );

    let raffle_id = RaffleId::new();
    raffles.seed_raffle(Raffle {
        id: raffle_id,
        title: "last ticket".to_string(),
        ticket_price: Money::from_minor(10),
        max_entries: 10,
        tickets_sold: 0,
        status: RaffleStatus::Active,
        created_at: Utc::now(),
    });

    // Nine of ten tickets are already gone.
    let early = UserId::new();
    ledger.seed_balance(early, 100);
    service
        .purchase_tickets(raffle_id, early, 9, PurchaseFunding::Ledger)
        .await
        .unwrap();

    const SEED: i64 = 100;
    let buyers: Vec<UserId> = (0..4).map(|_| UserId::new()).collect();
    for buyer in &buyers {
        ledger.seed_balance(*buyer, SEED);
    }

    let tasks = buyers.iter().map(|buyer| {
        let service = service.clone();
        let buyer = *buyer;
        tokio::spawn(async move {
            service
                .purchase_tickets(raffle_id, buyer, 2, PurchaseFunding::Ledger)
                .await
        })
    });
    let results: Vec<_> = join_all(tasks).await;

    let mut granted_total = 0;
    let mut grants_by_buyer = std::collections::HashMap::new();
    for (buyer, result) in buyers.iter().zip(results) {
        match result.unwrap() {
            Ok(purchase) => {
                granted_total += purchase.granted;
                grants_by_buyer.insert(*buyer, i64::from(purchase.granted));
            }
            Err(MarketError::RaffleSoldOut) => {
                grants_by_buyer.insert(*buyer, 0);
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    // The cap held: one ticket granted across the whole race, ten total.
    assert_eq!(granted_total, 1);
    assert_eq!(raffles.entry_count(raffle_id).await.unwrap(), 10);

    // Everyone paid exactly for what they got.
    let book = Ledger::new(ledger.clone());
    for buyer in &buyers {
        let balance = book.balance(*buyer).await.unwrap().value();
        assert_eq!(balance, SEED - 10 * grants_by_buyer[buyer]);
    }
}

#[tokio::test]
async fn interleaved_purchases_never_exceed_capacity() {
    let raffles = MockRaffleStore::new();
    let ledger = MockLedgerStore::new();
    let gateway = MockPaymentGateway::new();
    let service = RaffleService::new(
        raffles.clone(),
        Ledger::new(ledger.clone()),
        gateway,
    );

    let raffle = service
        .create_raffle("stress".to_string(), Money::from_minor(5), 25)
        .await
        .unwrap();

    let buyers: Vec<UserId> = (0..12).map(|_| UserId::new()).collect();
    for buyer in &buyers {
        ledger.seed_balance(*buyer, 500);
    }

    let tasks = buyers.iter().map(|buyer| {
        let service = service.clone();
        let buyer = *buyer;
        let raffle_id = raffle.id;
        tokio::spawn(async move {
            service
                .purchase_tickets(raffle_id, buyer, 4, PurchaseFunding::Ledger)
                .await
        })
    });
    let results: Vec<_> = join_all(tasks).await;

    let mut granted_total = 0u32;
    for result in results {
        match result.unwrap() {
            Ok(purchase) => granted_total += purchase.granted,
            Err(MarketError::RaffleSoldOut) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    let entries = raffles.entry_count(raffle.id).await.unwrap();
    assert_eq!(entries, granted_total);
    assert!(entries <= 25);
    // 12 buyers wanted 48 tickets; the cap wins.
    assert_eq!(entries, 25);
}
