//! Integration tests for the settlement queue: registration, advisory
//! previews, NAV pricing across all three asset-pair shapes, and the
//! three-phase atomic `solve` with its undo journal.

use basin_core::config::{SECONDS_PER_YEAR, WAD};
use basin_core::ports::AssetLedger;
use basin_core::{Address, QueueError, VaultEvent};
use basin_testkit::world::{cast, DemoWorld};
use basin_testkit::{FailingSolver, FundedSolver, ReentrantSolver};

const GENESIS: u64 = 1_700_000_000;
const DEADLINE: u64 = GENESIS + 86_400;

fn users3() -> [Address; 3] {
    [Address::dev(21), Address::dev(22), Address::dev(23)]
}

/// Ledger balances for a set of parties in one asset, for before/after
/// comparisons around aborted settlements.
fn balances(world: &DemoWorld, asset: Address, parties: &[Address]) -> Vec<u128> {
    parties.iter().map(|&p| world.ledger.balance_of(asset, p)).collect()
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[test]
fn request_overwrite_and_cancel() {
    let world = DemoWorld::new(GENESIS);
    let user = Address::dev(21);

    world
        .queue
        .update_atomic_request(user, cast::BASE, cast::SHARES, 1_000, DEADLINE)
        .unwrap();
    let request = world.queue.get_user_atomic_request(user, cast::BASE, cast::SHARES);
    assert_eq!(request.offer_amount, 1_000);
    assert_eq!(request.deadline, DEADLINE);

    // Overwrite freely while unlocked; zero amount cancels.
    world
        .queue
        .update_atomic_request(user, cast::BASE, cast::SHARES, 0, 0)
        .unwrap();
    let request = world.queue.get_user_atomic_request(user, cast::BASE, cast::SHARES);
    assert_eq!(request.offer_amount, 0);
}

#[test]
fn missing_request_reads_as_empty() {
    let world = DemoWorld::new(GENESIS);
    let request = world
        .queue
        .get_user_atomic_request(Address::dev(99), cast::BASE, cast::SHARES);
    assert_eq!(request.offer_amount, 0);
    assert!(!request.in_solve);
}

#[test]
fn request_validity_is_advisory_but_accurate() {
    let world = DemoWorld::new(GENESIS);
    let user = Address::dev(21);
    world.enqueue(user, cast::BASE, cast::SHARES, 1_000, DEADLINE);
    let request = world.queue.get_user_atomic_request(user, cast::BASE, cast::SHARES);

    assert!(world.queue.is_atomic_request_valid(cast::BASE, user, &request, GENESIS));
    // Deadline is inclusive: settleable at the deadline itself.
    assert!(world.queue.is_atomic_request_valid(cast::BASE, user, &request, DEADLINE));
    assert!(!world.queue.is_atomic_request_valid(cast::BASE, user, &request, DEADLINE + 1));

    // Drain the balance: no longer valid.
    world.ledger.burn(cast::BASE, user, 1_000);
    assert!(!world.queue.is_atomic_request_valid(cast::BASE, user, &request, GENESIS));
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

#[test]
fn deposit_pricing_divides_by_rate() {
    // One year of 10% accrual: rate 1.1. A 11 base offer buys 10 shares.
    let world = DemoWorld::new(GENESIS);
    world.mint_shares(cast::ADMIN, 100 * WAD);
    let now = GENESIS + SECONDS_PER_YEAR;

    let shares = world
        .queue
        .calculate_want_amount(cast::BASE, cast::SHARES, 11 * WAD, now)
        .unwrap();
    assert_eq!(shares, 10 * WAD);
}

#[test]
fn withdrawal_pricing_multiplies_by_rate() {
    let world = DemoWorld::new(GENESIS);
    world.mint_shares(cast::ADMIN, 100 * WAD);
    let now = GENESIS + SECONDS_PER_YEAR;

    let base = world
        .queue
        .calculate_want_amount(cast::SHARES, cast::BASE, 10 * WAD, now)
        .unwrap();
    assert_eq!(base, 11 * WAD);
}

#[test]
fn swap_pricing_bridges_through_base_value() {
    // Stable (6 decimals, pegged) to base (18 decimals): a pure decimal
    // bridge, no rate involved.
    let world = DemoWorld::new(GENESIS);
    let base = world
        .queue
        .calculate_want_amount(cast::STABLE, cast::BASE, 5_000_000, GENESIS)
        .unwrap();
    assert_eq!(base, 5 * WAD);
}

#[test]
fn pegged_deposit_rescales_then_divides() {
    let world = DemoWorld::new(GENESIS);
    world.mint_shares(cast::ADMIN, 100 * WAD);
    let now = GENESIS + SECONDS_PER_YEAR;

    // 11 stable units -> 11e18 value -> / 1.1 rate -> 10 shares.
    let shares = world
        .queue
        .calculate_want_amount(cast::STABLE, cast::SHARES, 11_000_000, now)
        .unwrap();
    assert_eq!(shares, 10 * WAD);
}

#[test]
fn pricing_works_while_paused() {
    // Settlement prices through the unsafe rate: a paused engine gates
    // privileged mutation, not conversion.
    let world = DemoWorld::new(GENESIS);
    world.accountant.pause(cast::ADMIN).unwrap();
    let out = world
        .queue
        .calculate_want_amount(cast::BASE, cast::SHARES, WAD, GENESIS)
        .unwrap();
    assert_eq!(out, WAD);
}

// ---------------------------------------------------------------------------
// solve: happy path
// ---------------------------------------------------------------------------

#[test]
fn batch_of_three_settles_all_or_nothing() {
    let world = DemoWorld::new(GENESIS);
    let users = users3();
    let amounts = [10 * WAD, 25 * WAD, 7 * WAD];
    for (&user, &amount) in users.iter().zip(amounts.iter()) {
        world.enqueue(user, cast::BASE, cast::SHARES, amount, DEADLINE);
    }

    let solver = FundedSolver::auto_funding(cast::SOLVER, world.ledger.clone());
    let receipt = world
        .queue
        .solve(
            cast::SOLVER_CALLER,
            cast::BASE,
            cast::SHARES,
            &users,
            b"run-1",
            &solver,
            GENESIS,
        )
        .unwrap();

    let total: u128 = amounts.iter().sum();
    assert_eq!(receipt.total_offered, total);
    assert_eq!(receipt.fulfilled.len(), 3);

    // At rate 1.0 with 18/18 decimals, shares received equal base offered.
    for (fulfillment, &amount) in receipt.fulfilled.iter().zip(amounts.iter()) {
        assert_eq!(fulfillment.offered, amount);
        assert_eq!(fulfillment.received, amount);
        assert_eq!(world.ledger.balance_of(cast::SHARES, fulfillment.user), amount);
        assert_eq!(world.ledger.balance_of(cast::BASE, fulfillment.user), 0);
    }
    assert_eq!(world.ledger.balance_of(cast::BASE, cast::SOLVER), total);

    // Every request cleared: amount zero, deadline zero, lock released.
    for &user in &users {
        let request = world.queue.get_user_atomic_request(user, cast::BASE, cast::SHARES);
        assert_eq!(request.offer_amount, 0);
        assert_eq!(request.deadline, 0);
        assert!(!request.in_solve);
    }
}

#[test]
fn solve_emits_fulfillments_and_batch_record() {
    let world = DemoWorld::new(GENESIS);
    let users = users3();
    for &user in &users {
        world.enqueue(user, cast::BASE, cast::SHARES, WAD, DEADLINE);
    }
    world.sink.take();

    let solver = FundedSolver::auto_funding(cast::SOLVER, world.ledger.clone());
    let receipt = world
        .queue
        .solve(cast::SOLVER_CALLER, cast::BASE, cast::SHARES, &users, b"", &solver, GENESIS)
        .unwrap();

    let events = world.sink.events();
    let fulfillments = events
        .iter()
        .filter(|e| matches!(e, VaultEvent::RequestFulfilled { run_id, .. } if *run_id == receipt.run_id))
        .count();
    assert_eq!(fulfillments, 3);
    assert!(matches!(
        events.last(),
        Some(VaultEvent::BatchSettled { users: 3, .. })
    ));
}

#[test]
fn withdrawal_batch_delivers_base() {
    let world = DemoWorld::new(GENESIS);
    let user = Address::dev(21);
    // Shares already exist (they are the offer), base comes from the solver.
    world.enqueue(user, cast::SHARES, cast::BASE, 10 * WAD, DEADLINE);

    let solver = FundedSolver::new(cast::SOLVER, world.ledger.clone());
    world.fund(cast::BASE, cast::SOLVER, 10 * WAD);

    world
        .queue
        .solve(cast::SOLVER_CALLER, cast::SHARES, cast::BASE, &[user], b"", &solver, GENESIS)
        .unwrap();
    assert_eq!(world.ledger.balance_of(cast::BASE, user), 10 * WAD);
    assert_eq!(world.ledger.balance_of(cast::SHARES, cast::SOLVER), 10 * WAD);
}

// ---------------------------------------------------------------------------
// solve: aborts & unwinding
// ---------------------------------------------------------------------------

#[test]
fn expired_member_aborts_whole_batch() {
    let world = DemoWorld::new(GENESIS);
    let users = users3();
    world.enqueue(users[0], cast::BASE, cast::SHARES, WAD, DEADLINE);
    world.enqueue(users[1], cast::BASE, cast::SHARES, WAD, GENESIS - 1); // expired
    world.enqueue(users[2], cast::BASE, cast::SHARES, WAD, DEADLINE);

    let before = balances(&world, cast::BASE, &users);
    let requests_before: Vec<_> = users
        .iter()
        .map(|&u| world.queue.get_user_atomic_request(u, cast::BASE, cast::SHARES))
        .collect();

    let solver = FundedSolver::auto_funding(cast::SOLVER, world.ledger.clone());
    let result = world
        .queue
        .solve(cast::SOLVER_CALLER, cast::BASE, cast::SHARES, &users, b"", &solver, GENESIS);
    assert!(matches!(result, Err(QueueError::RequestExpired { .. })));

    // No transfers survived for anyone, including user 0 whose escrow
    // had already moved.
    assert_eq!(balances(&world, cast::BASE, &users), before);
    assert_eq!(world.ledger.balance_of(cast::BASE, cast::SOLVER), 0);
    for (&user, request_before) in users.iter().zip(requests_before.iter()) {
        let request = world.queue.get_user_atomic_request(user, cast::BASE, cast::SHARES);
        assert_eq!(&request, request_before);
        assert!(!request.in_solve);
    }
}

#[test]
fn zero_amount_member_aborts_whole_batch() {
    let world = DemoWorld::new(GENESIS);
    let users = users3();
    world.enqueue(users[0], cast::BASE, cast::SHARES, WAD, DEADLINE);
    world.enqueue(users[1], cast::BASE, cast::SHARES, WAD, DEADLINE);
    // users[2] never registered: reads as a zero-amount request.

    let solver = FundedSolver::auto_funding(cast::SOLVER, world.ledger.clone());
    let result = world
        .queue
        .solve(cast::SOLVER_CALLER, cast::BASE, cast::SHARES, &users, b"", &solver, GENESIS);
    assert!(matches!(
        result,
        Err(QueueError::ZeroOfferAmount { user }) if user == users[2]
    ));
    assert_eq!(world.ledger.balance_of(cast::BASE, cast::SOLVER), 0);
}

#[test]
fn zero_priced_member_aborts_whole_batch() {
    // Base to the 6-decimal stable: anything under 1e12 base units
    // prices to zero stable and must sink the whole batch.
    let world = DemoWorld::new(GENESIS);
    let users = users3();
    world.enqueue(users[0], cast::BASE, cast::STABLE, 5 * WAD, DEADLINE);
    world.enqueue(users[1], cast::BASE, cast::STABLE, 999, DEADLINE); // dust
    world.enqueue(users[2], cast::BASE, cast::STABLE, 5 * WAD, DEADLINE);

    let before = balances(&world, cast::BASE, &users);
    let requests_before: Vec<_> = users
        .iter()
        .map(|&u| world.queue.get_user_atomic_request(u, cast::BASE, cast::STABLE))
        .collect();

    let solver = FundedSolver::auto_funding(cast::SOLVER, world.ledger.clone());
    let result = world
        .queue
        .solve(cast::SOLVER_CALLER, cast::BASE, cast::STABLE, &users, b"", &solver, GENESIS);
    assert!(matches!(
        result,
        Err(QueueError::ZeroWantAmount { user }) if user == users[1]
    ));

    // User 0's escrow had already moved; it came back with the rest.
    assert_eq!(balances(&world, cast::BASE, &users), before);
    assert_eq!(world.ledger.balance_of(cast::BASE, cast::SOLVER), 0);
    for (&user, request_before) in users.iter().zip(requests_before.iter()) {
        let request = world.queue.get_user_atomic_request(user, cast::BASE, cast::STABLE);
        assert_eq!(&request, request_before);
        assert!(!request.in_solve);
    }
}

#[test]
fn solver_failure_unwinds_escrow() {
    let world = DemoWorld::new(GENESIS);
    let users = users3();
    for &user in &users {
        world.enqueue(user, cast::BASE, cast::SHARES, 5 * WAD, DEADLINE);
    }
    let before = balances(&world, cast::BASE, &users);

    let solver = FailingSolver::new(cast::SOLVER);
    let result = world
        .queue
        .solve(cast::SOLVER_CALLER, cast::BASE, cast::SHARES, &users, b"", &solver, GENESIS);
    assert!(matches!(result, Err(QueueError::Solver(_))));

    assert_eq!(balances(&world, cast::BASE, &users), before);
    assert_eq!(world.ledger.balance_of(cast::BASE, cast::SOLVER), 0);
    for &user in &users {
        let request = world.queue.get_user_atomic_request(user, cast::BASE, cast::SHARES);
        assert_eq!(request.offer_amount, 5 * WAD);
        assert!(!request.in_solve);
    }
}

#[test]
fn underfunded_solver_unwinds_at_finalize() {
    let world = DemoWorld::new(GENESIS);
    let users = users3();
    for &user in &users {
        world.enqueue(user, cast::BASE, cast::SHARES, 5 * WAD, DEADLINE);
    }
    let before = balances(&world, cast::BASE, &users);

    // Cooperative callback, but the solver holds only enough shares for
    // the first delivery: the second finalize transfer bounces.
    let solver = FundedSolver::new(cast::SOLVER, world.ledger.clone());
    world.fund(cast::SHARES, cast::SOLVER, 5 * WAD);

    let result = world
        .queue
        .solve(cast::SOLVER_CALLER, cast::BASE, cast::SHARES, &users, b"", &solver, GENESIS);
    assert!(matches!(result, Err(QueueError::Ledger(_))));

    // Even the already-delivered first user was walked back.
    assert_eq!(balances(&world, cast::BASE, &users), before);
    for &user in &users {
        assert_eq!(world.ledger.balance_of(cast::SHARES, user), 0);
        let request = world.queue.get_user_atomic_request(user, cast::BASE, cast::SHARES);
        assert_eq!(request.offer_amount, 5 * WAD);
        assert!(!request.in_solve);
    }
    // No fulfillment records escaped the aborted run.
    assert_eq!(
        world.sink.count_matching(|e| matches!(e, VaultEvent::RequestFulfilled { .. })),
        0
    );
}

#[test]
fn duplicate_user_trips_the_lock() {
    let world = DemoWorld::new(GENESIS);
    let user = Address::dev(21);
    world.enqueue(user, cast::BASE, cast::SHARES, WAD, DEADLINE);

    let solver = FundedSolver::auto_funding(cast::SOLVER, world.ledger.clone());
    let result = world.queue.solve(
        cast::SOLVER_CALLER,
        cast::BASE,
        cast::SHARES,
        &[user, user],
        b"",
        &solver,
        GENESIS,
    );
    assert!(matches!(result, Err(QueueError::RequestLocked { .. })));

    // Clean unwind of the first occurrence.
    assert_eq!(world.ledger.balance_of(cast::BASE, user), WAD);
    let request = world.queue.get_user_atomic_request(user, cast::BASE, cast::SHARES);
    assert_eq!(request.offer_amount, WAD);
    assert!(!request.in_solve);
}

#[test]
fn empty_batch_and_bad_caller_are_refused() {
    let world = DemoWorld::new(GENESIS);
    let solver = FundedSolver::auto_funding(cast::SOLVER, world.ledger.clone());

    let result = world
        .queue
        .solve(cast::SOLVER_CALLER, cast::BASE, cast::SHARES, &[], b"", &solver, GENESIS);
    assert!(matches!(result, Err(QueueError::EmptyBatch)));

    let result = world.queue.solve(
        cast::ADMIN,
        cast::BASE,
        cast::SHARES,
        &[Address::dev(21)],
        b"",
        &solver,
        GENESIS,
    );
    assert!(matches!(result, Err(QueueError::Unauthorized { .. })));
}

// ---------------------------------------------------------------------------
// Reentrancy
// ---------------------------------------------------------------------------

#[test]
fn reentrant_solver_is_refused_and_outer_batch_completes() {
    let world = DemoWorld::new(GENESIS);
    let users = users3();
    for &user in &users {
        world.enqueue(user, cast::BASE, cast::SHARES, 2 * WAD, DEADLINE);
    }

    let solver = ReentrantSolver::new(cast::SOLVER, world.ledger.clone(), users[0]);
    let receipt = world
        .queue
        .solve(cast::SOLVER_CALLER, cast::BASE, cast::SHARES, &users, b"", &solver, GENESIS)
        .unwrap();
    assert_eq!(receipt.fulfilled.len(), 3);

    let observations = solver.observations();
    assert!(observations[0].contains("already in progress"), "{observations:?}");
    assert!(observations[1].contains("locked"), "{observations:?}");

    // The probed user's request went through settlement untouched by the
    // attempted mid-flight overwrite.
    let request = world.queue.get_user_atomic_request(users[0], cast::BASE, cast::SHARES);
    assert_eq!(request.offer_amount, 0);
    assert!(!request.in_solve);
    assert_eq!(world.ledger.balance_of(cast::SHARES, users[0]), 2 * WAD);
}

// ---------------------------------------------------------------------------
// Advisory preview
// ---------------------------------------------------------------------------

#[test]
fn preview_flags_flaws_and_totals_clean_members() {
    let world = DemoWorld::new(GENESIS);
    let users = users3();
    world.enqueue(users[0], cast::BASE, cast::SHARES, 10 * WAD, DEADLINE);
    world.enqueue(users[1], cast::BASE, cast::SHARES, 4 * WAD, GENESIS - 1); // expired
    world.enqueue(users[2], cast::BASE, cast::SHARES, 6 * WAD, DEADLINE);
    // users[2] spends the balance elsewhere after registering.
    world.ledger.burn(cast::BASE, users[2], 6 * WAD);

    let preview = world
        .queue
        .view_solve_metadata(cast::BASE, cast::SHARES, &users, GENESIS)
        .unwrap();

    assert!(preview.members[0].flaws.is_clean());
    assert!(preview.members[1].flaws.expired);
    assert!(preview.members[2].flaws.insufficient_balance);

    // Totals cover the single clean member only.
    assert_eq!(preview.total_offered, 10 * WAD);
    assert_eq!(preview.total_wanted, 10 * WAD);
}

#[test]
fn preview_prices_identically_to_solve() {
    let world = DemoWorld::new(GENESIS);
    world.mint_shares(cast::ADMIN, 100 * WAD);
    let now = GENESIS + SECONDS_PER_YEAR;
    let user = Address::dev(21);
    world.enqueue(user, cast::BASE, cast::SHARES, 11 * WAD, now + 86_400);

    let preview = world
        .queue
        .view_solve_metadata(cast::BASE, cast::SHARES, &[user], now)
        .unwrap();
    let solver = FundedSolver::auto_funding(cast::SOLVER, world.ledger.clone());
    let receipt = world
        .queue
        .solve(cast::SOLVER_CALLER, cast::BASE, cast::SHARES, &[user], b"", &solver, now)
        .unwrap();

    assert_eq!(preview.members[0].want_amount, receipt.fulfilled[0].received);
    assert_eq!(preview.total_wanted, receipt.total_wanted);
}
