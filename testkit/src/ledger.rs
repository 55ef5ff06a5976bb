//! # In-Memory Token & Share Ledger
//!
//! One ledger playing both collaborator roles: [`AssetLedger`] for every
//! registered asset and [`ShareLedger`] for the one asset designated as
//! the vault's share token. Balances, allowances, and supplies live in a
//! single lock so a test observes them consistently.

use std::collections::HashMap;

use parking_lot::RwLock;

use basin_core::ports::{AssetLedger, LedgerError, ShareLedger};
use basin_core::Address;

#[derive(Default)]
struct LedgerInner {
    /// Registered assets and their native decimals.
    decimals: HashMap<Address, u8>,
    /// (asset, owner) -> balance.
    balances: HashMap<(Address, Address), u128>,
    /// (asset, owner, spender) -> allowance. Advisory from the core's
    /// perspective; enforced by nothing here.
    allowances: HashMap<(Address, Address, Address), u128>,
    /// Per-asset total supply, maintained by mint/burn.
    supplies: HashMap<Address, u128>,
}

/// The deterministic ledger double.
pub struct MemoryLedger {
    share_asset: Address,
    inner: RwLock<LedgerInner>,
}

impl MemoryLedger {
    /// Creates a ledger whose [`ShareLedger`] face reports on
    /// `share_asset`, registered immediately at `share_decimals`.
    pub fn new(share_asset: Address, share_decimals: u8) -> Self {
        let ledger = Self {
            share_asset,
            inner: RwLock::new(LedgerInner::default()),
        };
        ledger.register_asset(share_asset, share_decimals);
        ledger
    }

    /// Registers an asset with its native decimals. Re-registering
    /// overwrites the decimals; balances survive.
    pub fn register_asset(&self, asset: Address, decimals: u8) {
        self.inner.write().decimals.insert(asset, decimals);
    }

    /// Creates `amount` of `asset` out of thin air for `owner`.
    pub fn mint(&self, asset: Address, owner: Address, amount: u128) {
        let mut inner = self.inner.write();
        *inner.balances.entry((asset, owner)).or_default() += amount;
        *inner.supplies.entry(asset).or_default() += amount;
    }

    /// Destroys up to `amount` of `owner`'s balance in `asset`.
    pub fn burn(&self, asset: Address, owner: Address, amount: u128) {
        let mut inner = self.inner.write();
        let balance = inner.balances.entry((asset, owner)).or_default();
        let burned = amount.min(*balance);
        *balance -= burned;
        *inner.supplies.entry(asset).or_default() -= burned;
    }

    /// Sets an allowance (absolute, not additive).
    pub fn approve(&self, asset: Address, owner: Address, spender: Address, amount: u128) {
        self.inner
            .write()
            .allowances
            .insert((asset, owner, spender), amount);
    }

    /// Total supply of any registered asset.
    pub fn total_supply(&self, asset: Address) -> u128 {
        self.inner.read().supplies.get(&asset).copied().unwrap_or(0)
    }
}

impl AssetLedger for MemoryLedger {
    fn decimals(&self, asset: Address) -> Result<u8, LedgerError> {
        self.inner
            .read()
            .decimals
            .get(&asset)
            .copied()
            .ok_or(LedgerError::UnknownAsset { asset })
    }

    fn balance_of(&self, asset: Address, owner: Address) -> u128 {
        self.inner
            .read()
            .balances
            .get(&(asset, owner))
            .copied()
            .unwrap_or(0)
    }

    fn allowance(&self, asset: Address, owner: Address, spender: Address) -> u128 {
        self.inner
            .read()
            .allowances
            .get(&(asset, owner, spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer_from(
        &self,
        asset: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();
        if !inner.decimals.contains_key(&asset) {
            return Err(LedgerError::UnknownAsset { asset });
        }
        let from_balance = inner.balances.entry((asset, from)).or_default();
        if *from_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                asset,
                owner: from,
                available: *from_balance,
                requested: amount,
            });
        }
        *from_balance -= amount;
        *inner.balances.entry((asset, to)).or_default() += amount;
        Ok(())
    }
}

impl ShareLedger for MemoryLedger {
    fn total_shares(&self) -> u128 {
        self.total_supply(self.share_asset)
    }

    fn share_decimals(&self) -> u8 {
        self.inner
            .read()
            .decimals
            .get(&self.share_asset)
            .copied()
            .unwrap_or(18)
    }
}
