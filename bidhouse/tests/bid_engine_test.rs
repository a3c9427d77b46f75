//! Bid engine behavior: increment rule, funding paths, hold handover.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use bidhouse::bidding::{BidEngine, BidFunding};
use bidhouse::config::FeesConfig;
use bidhouse::error::MarketError;
use bidhouse::ledger::Ledger;
use bidhouse::mocks::{MockLedgerStore, MockMarketStore, MockPaymentGateway};
use bidhouse::providers::market_store::MarketStore;
use bidhouse::types::{
    Auction, AuctionId, AuctionStatus, BidStatus, Money, PaymentMethod, SellerAccount, UserId,
};
use chrono::{Duration, Utc};

type Engine = BidEngine<MockMarketStore, MockLedgerStore, MockPaymentGateway>;

struct Fixture {
    market: MockMarketStore,
    ledger: MockLedgerStore,
    gateway: MockPaymentGateway,
    engine: Engine,
    auction_id: AuctionId,
    seller_id: UserId,
}

fn fees() -> FeesConfig {
    FeesConfig {
        platform_fee_bps: 500,
        bonus_award_bps: 100,
    }
}

fn fixture(starting_price: i64) -> Fixture {
    let market = MockMarketStore::new();
    let ledger = MockLedgerStore::new();
    let gateway = MockPaymentGateway::new();
    let engine = BidEngine::new(
        market.clone(),
        Ledger::new(ledger.clone()),
        gateway.clone(),
        fees(),
    );

    let seller_id = UserId::new();
    let auction_id = AuctionId::new();
    let now = Utc::now();
    market.seed_auction(Auction::new(
        auction_id,
        seller_id,
        Money::from_minor(starting_price),
        now + Duration::hours(1),
        now,
    ));
    market.seed_seller(SellerAccount {
        user_id: seller_id,
        payout_account: "acct_seller".to_string(),
        country: "US".to_string(),
        automatic_transfers: true,
    });

    Fixture {
        market,
        ledger,
        gateway,
        engine,
        auction_id,
        seller_id,
    }
}

#[tokio::test]
async fn ledger_bid_at_minimum_is_accepted_and_debits_the_hold() {
    let fx = fixture(90);
    let bidder = UserId::new();
    fx.ledger.seed_balance(bidder, 1_000);

    // At price 90 the band is +1, so 91 is the exact minimum.
    let placed = fx
        .engine
        .place_bid(fx.auction_id, bidder, Money::from_minor(91), BidFunding::Ledger)
        .await
        .unwrap();

    assert_eq!(placed.new_price.minor(), 91);
    assert_eq!(placed.bid.payment_method, PaymentMethod::Ledger);
    let auction = fx.market.auction_snapshot(fx.auction_id).unwrap();
    assert_eq!(auction.current_price.minor(), 91);

    let balance = Ledger::new(fx.ledger.clone()).balance(bidder).await.unwrap();
    assert_eq!(balance.value(), 1_000 - 91);
}

#[tokio::test]
async fn bid_below_minimum_is_rejected_with_the_required_minimum() {
    let fx = fixture(90);
    let bidder = UserId::new();
    fx.ledger.seed_balance(bidder, 1_000);

    let err = fx
        .engine
        .place_bid(fx.auction_id, bidder, Money::from_minor(90), BidFunding::Ledger)
        .await
        .unwrap_err();

    match err {
        MarketError::BidTooLow {
            current_price,
            minimum,
            increment,
        } => {
            assert_eq!(current_price.minor(), 90);
            assert_eq!(minimum.minor(), 91);
            assert_eq!(increment.minor(), 1);
        }
        other => panic!("expected BidTooLow, got {other:?}"),
    }

    // Rejection has no side effects.
    let balance = Ledger::new(fx.ledger.clone()).balance(bidder).await.unwrap();
    assert_eq!(balance.value(), 1_000);
}

#[tokio::test]
async fn outbidding_releases_the_previous_ledger_hold() {
    let fx = fixture(90);
    let first = UserId::new();
    let second = UserId::new();
    fx.ledger.seed_balance(first, 500);
    fx.ledger.seed_balance(second, 500);

    let placed_first = fx
        .engine
        .place_bid(fx.auction_id, first, Money::from_minor(94), BidFunding::Ledger)
        .await
        .unwrap();

    // After 94 the band is still +1, so 96 clears the minimum of 95.
    fx.engine
        .place_bid(fx.auction_id, second, Money::from_minor(96), BidFunding::Ledger)
        .await
        .unwrap();

    let first_bid = fx.market.bid_snapshot(placed_first.bid.id).unwrap();
    assert_eq!(first_bid.status, BidStatus::Outbid);
    assert!(first_bid.holds_released);

    // First bidder got their 94 back, second still has 96 held.
    let ledger = Ledger::new(fx.ledger.clone());
    assert_eq!(ledger.balance(first).await.unwrap().value(), 500);
    assert_eq!(ledger.balance(second).await.unwrap().value(), 500 - 96);
}

#[tokio::test]
async fn increment_bands_shift_with_the_price() {
    let fx = fixture(995);
    let bidder = UserId::new();
    fx.ledger.seed_balance(bidder, 10_000);

    // Band at 995 is +10: 1004 is short, 1005 clears.
    let err = fx
        .engine
        .place_bid(fx.auction_id, bidder, Money::from_minor(1_004), BidFunding::Ledger)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::BidTooLow { minimum, .. } if minimum.minor() == 1_005));

    fx.engine
        .place_bid(fx.auction_id, bidder, Money::from_minor(1_005), BidFunding::Ledger)
        .await
        .unwrap();

    // Now the band is +25.
    let other = UserId::new();
    fx.ledger.seed_balance(other, 10_000);
    let err = fx
        .engine
        .place_bid(fx.auction_id, other, Money::from_minor(1_029), BidFunding::Ledger)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::BidTooLow { minimum, .. } if minimum.minor() == 1_030));
}

#[tokio::test]
async fn sellers_cannot_bid_on_their_own_auction() {
    let fx = fixture(100);
    fx.ledger.seed_balance(fx.seller_id, 1_000);

    let err = fx
        .engine
        .place_bid(
            fx.auction_id,
            fx.seller_id,
            Money::from_minor(200),
            BidFunding::Ledger,
        )
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::SelfBidNotAllowed);
}

#[tokio::test]
async fn bids_after_the_end_time_are_rejected() {
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
        now - Duration::minutes(1),
        now - Duration::hours(2),
    ));

    let bidder = UserId::new();
    ledger.seed_balance(bidder, 1_000);
    let err = engine
        .place_bid(auction_id, bidder, Money::from_minor(200), BidFunding::Ledger)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::AuctionEnded);
}

#[tokio::test]
async fn insufficient_ledger_balance_rejects_without_committing() {
    let fx = fixture(90);
    let bidder = UserId::new();
    fx.ledger.seed_balance(bidder, 50);

    let err = fx
        .engine
        .place_bid(fx.auction_id, bidder, Money::from_minor(91), BidFunding::Ledger)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::InsufficientFunds);

    assert!(fx.market.auction_snapshot(fx.auction_id).unwrap().current_price.minor() == 90);
    assert!(fx
        .engine
        .place_bid(fx.auction_id, UserId::new(), Money::from_minor(91), BidFunding::Ledger)
        .await
        .is_err()); // fresh bidder with no balance also fails funding
}

#[tokio::test]
async fn card_bid_places_an_authorization_hold() {
    let fx = fixture(100);
    let bidder = UserId::new();

    let placed = fx
        .engine
        .place_bid(
            fx.auction_id,
            bidder,
            Money::from_minor(105),
            BidFunding::Card {
                payment_method_id: "pm_visa".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(placed.bid.authorization_ref.is_some());
    assert_eq!(fx.gateway.open_hold_count(), 1);
}

#[tokio::test]
async fn outbid_card_hold_is_cancelled_at_the_gateway() {
    let fx = fixture(100);
    let first = UserId::new();
    let second = UserId::new();
    fx.ledger.seed_balance(second, 1_000);

    let placed_first = fx
        .engine
        .place_bid(
            fx.auction_id,
            first,
            Money::from_minor(110),
            BidFunding::Card {
                payment_method_id: "pm_visa".to_string(),
            },
        )
        .await
        .unwrap();
    let auth_ref = placed_first.bid.authorization_ref.clone().unwrap();

    fx.engine
        .place_bid(fx.auction_id, second, Money::from_minor(120), BidFunding::Ledger)
        .await
        .unwrap();

    assert!(fx.gateway.is_cancelled(&auth_ref));
    assert_eq!(fx.gateway.open_hold_count(), 0);
}

#[tokio::test]
async fn failed_outbid_cancel_leaves_the_hold_claimable() {
    let fx = fixture(100);
    let first = UserId::new();
    let second = UserId::new();
    fx.ledger.seed_balance(second, 1_000);

    let placed_first = fx
        .engine
        .place_bid(
            fx.auction_id,
            first,
            Money::from_minor(110),
            BidFunding::Card {
                payment_method_id: "pm_visa".to_string(),
            },
        )
        .await
        .unwrap();
    let auth_ref = placed_first.bid.authorization_ref.clone().unwrap();

    fx.gateway.fail_next_cancel();
    fx.engine
        .place_bid(fx.auction_id, second, Money::from_minor(120), BidFunding::Ledger)
        .await
        .unwrap();

    // The gateway rejected the cancel, so the claim is rolled back and
    // the settlement sweep still sees the hold as outstanding.
    assert!(!fx.gateway.is_cancelled(&auth_ref));
    let loser = fx.market.bid_snapshot(placed_first.bid.id).unwrap();
    assert_eq!(loser.status, BidStatus::Outbid);
    assert!(!loser.holds_released);
}

#[tokio::test]
async fn declined_authorization_leaves_the_auction_untouched() {
    let fx = fixture(100);
    fx.gateway.fail_next_authorize();

    let err = fx
        .engine
        .place_bid(
            fx.auction_id,
            UserId::new(),
            Money::from_minor(110),
            BidFunding::Card {
                payment_method_id: "pm_declined".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::PaymentAuthorizationFailed { .. }));

    let auction = fx.market.auction_snapshot(fx.auction_id).unwrap();
    assert_eq!(auction.current_price.minor(), 100);
    assert!(fx.market.active_bid(fx.auction_id).await.unwrap().is_none());
}

#[tokio::test]
async fn card_bid_without_seller_payout_config_is_rejected() {
    let market = MockMarketStore::new();
    let ledger = MockLedgerStore::new();
    let gateway = MockPaymentGateway::new();
    let engine = BidEngine::new(
        market.clone(),
        Ledger::new(ledger),
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

    let err = engine
        .place_bid(
            auction_id,
            UserId::new(),
            Money::from_minor(110),
            BidFunding::Card {
                payment_method_id: "pm_visa".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::SellerPaymentNotConfigured);
}

#[tokio::test]
async fn stale_price_commit_fails_and_returns_the_hold() {
    let fx = fixture(90);
    let racer = UserId::new();
    fx.ledger.seed_balance(racer, 1_000);

    // Another placement lands between validation and commit; simulate by
    // committing directly against the store with the price the engine
    // validated against already stale.
    let winner = UserId::new();
    fx.ledger.seed_balance(winner, 1_000);
    fx.engine
        .place_bid(fx.auction_id, winner, Money::from_minor(95), BidFunding::Ledger)
        .await
        .unwrap();

    let stale = bidhouse::types::Bid {
        id: bidhouse::types::BidId::new(),
        auction_id: fx.auction_id,
        bidder_id: racer,
        amount: Money::from_minor(93),
        payment_method: PaymentMethod::Ledger,
        authorization_status: bidhouse::types::AuthorizationStatus::Authorized,
        status: BidStatus::Active,
        authorization_ref: None,
        ledger_hold: Some(bidhouse::types::Points::new(93)),
        holds_released: false,
        created_at: Utc::now(),
    };
    let err = fx
        .market
        .commit_placement(Money::from_minor(90), &stale)
        .await
        .unwrap_err();
    assert_eq!(err, MarketError::PriceChanged);

    let auction = fx.market.auction_snapshot(fx.auction_id).unwrap();
    assert_eq!(auction.status, AuctionStatus::Active);
    assert_eq!(auction.current_price.minor(), 95);
}
