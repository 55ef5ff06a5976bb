//! # Settable Price Feed
//!
//! A [`RateProvider`] whose price is a cell the test owns. Quotes in
//! base-asset terms at the asset's native decimal precision, exactly as
//! the capability contract demands — getting that convention wrong in a
//! fixture is how pricing bugs hide from tests.

use parking_lot::RwLock;

use basin_core::ports::RateProvider;

/// A price feed with a knob.
pub struct StaticPrice {
    price: RwLock<u128>,
}

impl StaticPrice {
    /// Creates a feed answering `price` until told otherwise.
    pub fn new(price: u128) -> Self {
        Self {
            price: RwLock::new(price),
        }
    }

    /// Moves the price. Takes effect on the next read.
    pub fn set(&self, price: u128) {
        *self.price.write() = price;
    }
}

impl RateProvider for StaticPrice {
    fn price(&self) -> u128 {
        *self.price.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_is_settable() {
        let feed = StaticPrice::new(1_000_000);
        assert_eq!(feed.price(), 1_000_000);
        feed.set(2_000_000);
        assert_eq!(feed.price(), 2_000_000);
    }
}
