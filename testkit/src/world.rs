//! # DemoWorld — A Fully Wired Vault Fixture
//!
//! Accountant, queue, ledger, roles, and recording sink assembled into
//! one coherent world with three registered assets:
//!
//! - `base` — 18 decimals, the denomination of every rate and fee.
//! - `shares` — 18 decimals, the vault's own token.
//! - `stable` — 6 decimals, registered as pegged to base.
//!
//! The admin holds every privileged grant, the solver caller holds
//! `Solve`, and the clock starts at `genesis`. Integration tests and the
//! demo binary both start from here and diverge only in what they do
//! next.

use std::sync::Arc;

use basin_core::accountant::{Accountant, RateProviderEntry};
use basin_core::config::{AccountantConfig, WAD};
use basin_core::ports::Operation;
use basin_core::queue::SettlementQueue;
use basin_core::Address;

use crate::ledger::MemoryLedger;
use crate::roles::RoleTable;
use crate::sink::RecordingSink;

/// Well-known addresses of the demo world.
pub mod cast {
    use basin_core::Address;

    /// The base asset (18 decimals).
    pub const BASE: Address = Address::dev(1);
    /// The vault share token (18 decimals).
    pub const SHARES: Address = Address::dev(2);
    /// A 6-decimal stable asset, pegged to base.
    pub const STABLE: Address = Address::dev(3);
    /// Holder of every privileged grant.
    pub const ADMIN: Address = Address::dev(4);
    /// Fee payout destination.
    pub const PAYOUT: Address = Address::dev(5);
    /// The queue's own ledger identity.
    pub const QUEUE: Address = Address::dev(6);
    /// The caller authorized to run settlements.
    pub const SOLVER_CALLER: Address = Address::dev(7);
    /// The solver's ledger identity.
    pub const SOLVER: Address = Address::dev(8);
}

/// The wired fixture. Fields are public; tests reach in.
pub struct DemoWorld {
    /// Shared token/share ledger.
    pub ledger: Arc<MemoryLedger>,
    /// Grant table behind the authorization gate.
    pub roles: Arc<RoleTable>,
    /// Every event the engine and queue emitted, in order.
    pub sink: Arc<RecordingSink>,
    /// The accounting engine.
    pub accountant: Arc<Accountant>,
    /// The settlement queue.
    pub queue: Arc<SettlementQueue>,
    /// The clock origin the engine was constructed with.
    pub genesis: u64,
}

impl DemoWorld {
    /// Builds the world with the default configuration: rate 1.0, 10%
    /// lending, 0.5% protocol fee, 2% management fee, 1 hour minimum
    /// update delay, +/-1% rate-push bounds.
    pub fn new(genesis: u64) -> Self {
        Self::with_config(AccountantConfig {
            base_asset: cast::BASE,
            share_asset: cast::SHARES,
            payout_address: cast::PAYOUT,
            starting_exchange_rate: WAD,
            allowed_change_upper_bps: 10_100,
            allowed_change_lower_bps: 9_900,
            minimum_update_delay_secs: 3_600,
            management_fee_bps: 200,
            max_lending_rate_bps: 2_000,
            lending_rate_bps: 1_000,
            protocol_fee_rate_bps: 50,
            genesis_time: genesis,
        })
    }

    /// Builds the world around an explicit engine configuration. The
    /// cast of addresses and the asset registry are fixed either way.
    pub fn with_config(config: AccountantConfig) -> Self {
        let genesis = config.genesis_time;
        let ledger = Arc::new(MemoryLedger::new(cast::SHARES, 18));
        ledger.register_asset(cast::BASE, 18);
        ledger.register_asset(cast::STABLE, 6);

        let roles = Arc::new(RoleTable::new());
        for operation in [
            Operation::Pause,
            Operation::Unpause,
            Operation::SetUpdateDelay,
            Operation::SetRateBounds,
            Operation::SetManagementFee,
            Operation::SetPayoutAddress,
            Operation::SetRateProvider,
            Operation::UpdateExchangeRate,
            Operation::SetLendingRate,
            Operation::SetProtocolFeeRate,
            Operation::SetMaxLendingRate,
        ] {
            roles.grant(cast::ADMIN, operation);
        }
        roles.grant(cast::SOLVER_CALLER, Operation::Solve);

        let sink = Arc::new(RecordingSink::new());
        let accountant = Arc::new(
            Accountant::new(
                config,
                ledger.clone(),
                ledger.clone(),
                roles.clone(),
                sink.clone(),
            )
            .expect("demo world config is valid"),
        );
        accountant
            .set_rate_provider(cast::ADMIN, cast::STABLE, RateProviderEntry::PeggedToBase)
            .expect("admin holds SetRateProvider");

        let queue = Arc::new(SettlementQueue::new(
            cast::QUEUE,
            accountant.clone(),
            ledger.clone(),
            roles.clone(),
            sink.clone(),
        ));

        Self {
            ledger,
            roles,
            sink,
            accountant,
            queue,
            genesis,
        }
    }

    /// Mints shares to a user (the share ledger total moves with it).
    pub fn mint_shares(&self, user: Address, amount: u128) {
        self.ledger.mint(cast::SHARES, user, amount);
    }

    /// Mints an arbitrary registered asset to a user.
    pub fn fund(&self, asset: Address, user: Address, amount: u128) {
        self.ledger.mint(asset, user, amount);
    }

    /// Funds a user, approves the queue, and registers a request in one
    /// motion.
    pub fn enqueue(
        &self,
        user: Address,
        offer_asset: Address,
        want_asset: Address,
        amount: u128,
        deadline: u64,
    ) {
        self.ledger.mint(offer_asset, user, amount);
        self.ledger.approve(offer_asset, user, cast::QUEUE, amount);
        self.queue
            .update_atomic_request(user, offer_asset, want_asset, amount, deadline)
            .expect("request not locked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basin_core::ports::AssetLedger;

    #[test]
    fn world_boots_with_expected_state() {
        let world = DemoWorld::new(1_700_000_000);
        assert!(!world.accountant.is_paused());
        assert_eq!(world.accountant.fees_owed_in_base(), 0);
        assert_eq!(world.accountant.base_asset(), cast::BASE);
        assert_eq!(world.queue.address(), cast::QUEUE);
    }

    #[test]
    fn enqueue_registers_and_funds() {
        let world = DemoWorld::new(0);
        let user = Address::dev(20);
        world.enqueue(user, cast::BASE, cast::SHARES, 1_000, 100);
        let request = world.queue.get_user_atomic_request(user, cast::BASE, cast::SHARES);
        assert_eq!(request.offer_amount, 1_000);
        assert_eq!(world.ledger.balance_of(cast::BASE, user), 1_000);
    }
}
