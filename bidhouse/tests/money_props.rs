//! Property tests for the money arithmetic the engine depends on.

#![allow(clippy::unwrap_used)]

use bidhouse::types::{minimum_increment, required_minimum, Money};
use proptest::prelude::*;

proptest! {
    /// Fee plus remainder always reconstructs the gross amount exactly.
    #[test]
    fn fee_split_is_exact(gross in 0i64..=1_000_000_000, bps in 0u32..=10_000) {
        let gross = Money::from_minor(gross);
        let fee = gross.fee_at_bps(bps);
        let net = gross.checked_sub(fee).unwrap();
        prop_assert_eq!(fee.minor() + net.minor(), gross.minor());
        prop_assert!(fee.minor() >= 0);
        prop_assert!(fee <= gross);
    }

    /// The required minimum always strictly exceeds the current price.
    #[test]
    fn required_minimum_beats_the_price(price in 0i64..=1_000_000_000) {
        let price = Money::from_minor(price);
        let minimum = required_minimum(price);
        prop_assert!(minimum > price);
        prop_assert_eq!(minimum.minor(), price.minor() + minimum_increment(price).minor());
    }

    /// Increments never shrink as the price rises.
    #[test]
    fn increments_are_monotone(a in 0i64..=1_000_000_000, b in 0i64..=1_000_000_000) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            minimum_increment(Money::from_minor(low))
                <= minimum_increment(Money::from_minor(high))
        );
    }

    /// A bid meeting the minimum at one price also meets it at any lower price.
    #[test]
    fn minimums_are_monotone(a in 0i64..=1_000_000_000, b in 0i64..=1_000_000_000) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            required_minimum(Money::from_minor(low))
                <= required_minimum(Money::from_minor(high))
        );
    }
}
