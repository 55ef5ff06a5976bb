//! # Value Conversion
//!
//! The single source of truth for turning an asset amount into an
//! 18-decimal base value and back. Settlement pricing, fee claims, and
//! the quote-rate queries all route through these two functions; if they
//! ever diverged, a preview could price differently from the execution
//! it previews.
//!
//! Three cases, checked in order: the base asset itself (rescale only),
//! an asset registered as pegged to base (rescale only), anything else
//! (multiply or divide by the external price, which is quoted in base
//! terms at the asset's own native precision). Floor rounding everywhere.

use crate::address::Address;
use crate::config::INTERNAL_DECIMALS;
use crate::math::{mul_div_down, pow10, scale_decimals};

use super::engine::{Accountant, AccountantError};
use super::state::RateProviderEntry;

impl Accountant {
    /// Price of `asset` in base terms at the asset's native decimals, or
    /// `None` when the asset is base/pegged and needs no price.
    fn external_price(&self, asset: Address) -> Result<Option<u128>, AccountantError> {
        if asset == self.base_asset() {
            return Ok(None);
        }
        match self.provider_entry(asset) {
            Some(RateProviderEntry::PeggedToBase) => Ok(None),
            Some(RateProviderEntry::External(provider)) => {
                let price = provider.price();
                if price == 0 {
                    return Err(AccountantError::ZeroPrice { asset });
                }
                Ok(Some(price))
            }
            None => Err(AccountantError::NoRateProvider { asset }),
        }
    }

    /// Converts an amount of `asset` into base value at 18 decimals.
    pub fn asset_to_value18(&self, asset: Address, amount: u128) -> Result<u128, AccountantError> {
        let decimals = self.ledger().decimals(asset)?;
        match self.external_price(asset)? {
            None => Ok(scale_decimals(amount, decimals, INTERNAL_DECIMALS)?),
            Some(price) => {
                let value_native = mul_div_down(amount, price, pow10(decimals)?)?;
                Ok(scale_decimals(value_native, decimals, INTERNAL_DECIMALS)?)
            }
        }
    }

    /// Converts an 18-decimal base value into an amount of `asset`.
    pub fn value18_to_asset(&self, asset: Address, value18: u128) -> Result<u128, AccountantError> {
        let decimals = self.ledger().decimals(asset)?;
        match self.external_price(asset)? {
            None => Ok(scale_decimals(value18, INTERNAL_DECIMALS, decimals)?),
            Some(price) => {
                let value_native = scale_decimals(value18, INTERNAL_DECIMALS, decimals)?;
                Ok(mul_div_down(value_native, pow10(decimals)?, price)?)
            }
        }
    }

    /// Converts a base-denominated amount (at base decimals) into `asset`
    /// terms. Defined through the two functions above so it cannot drift
    /// from them. Used by fee claims and the quote-rate queries.
    pub fn base_to_asset_terms(&self, asset: Address, amount_base: u128) -> Result<u128, AccountantError> {
        if asset == self.base_asset() {
            return Ok(amount_base);
        }
        let value18 = scale_decimals(amount_base, self.base_decimals(), INTERNAL_DECIMALS)?;
        self.value18_to_asset(asset, value18)
    }
}
