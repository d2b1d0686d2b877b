//! S6: a [`TimeHandle`] is a frozen snapshot of "now" taken at the moment it
//! is acquired. Holding on to one instead of acquiring a fresh handle for
//! each computation silently produces a wrong deadline once the clock has
//! moved on; `ChainPoster` avoids this by calling
//! [`GetTimeHandle::get_time_handle`] anew for every transaction it builds.

use hydra_chain::time::GetTimeHandle;
use hydra_chain::tx::{construct, HeadId, UTxO};
use hydra_chain::ChainSyncHandler;
use hydra_chain_testenv::{FixedClock, MockLedger, TestKey, TestNode};

struct BoundedTime(u64);
impl GetTimeHandle for BoundedTime {
    fn get_time_handle(&self) -> hydra_chain::time::TimeHandle {
        hydra_chain::time::TimeHandle::acquire(
            hydra_chain::time::EraHistory::new(vec![hydra_chain::time::EraBound {
                start_slot: hydra_chain::tx::ChainSlot(0),
                start_time: hydra_chain::time::UtcTime(0),
                slot_length_ms: 1000,
                slot_count: Some(self.0),
            }]),
            hydra_chain::time::UtcTime(0),
        )
    }
}

#[test]
fn a_held_handle_stays_frozen_while_a_freshly_acquired_one_tracks_the_clock() {
    let clock = FixedClock::new(hydra_chain::time::UtcTime(0));

    let stale = clock.get_time_handle();
    let (stale_slot, stale_now) = stale.current_point_in_time().unwrap();

    clock.advance(50);

    // The handle acquired before the advance is frozen: asking it "now"
    // again still answers with the time it was acquired at.
    assert_eq!(stale.current_point_in_time().unwrap(), (stale_slot, stale_now));

    // A freshly acquired handle sees the advanced clock.
    let fresh = clock.get_time_handle();
    let (fresh_slot, fresh_now) = fresh.current_point_in_time().unwrap();
    assert_ne!(fresh_now, stale_now);
    assert!(fresh_slot > stale_slot);
}

#[test]
fn the_poster_reacquires_the_handle_so_successive_deadlines_track_the_clock() {
    let our_key = TestKey::from_seed(7);
    let node = TestNode::new(our_key, 10_000_000);
    let ctx = node.chain_context(our_key.party());
    let mut ledger = MockLedger::new();

    let params = hydra_chain::HeadParameters {
        parties: vec![our_key.party()],
        contestation_period: hydra_chain::tx::ContestationPeriod::from_secs(60),
    };
    let seed = node.wallet.get_seed_input().unwrap();
    let head_id = HeadId::from_seed_tx_id(&seed.tx_id);
    let init_unsigned = construct::initialize(&ctx, &params, seed).unwrap();
    let init_tx = node.wallet.sign(node.wallet.cover_fee(&UTxO::new(), init_unsigned).unwrap());
    let point = ledger.mine(vec![init_tx.clone()]);
    node.roll_forward(point, &[init_tx]);

    let chain_state = node.handler.current_state();
    let collect_unsigned = construct::collect(&ctx, &chain_state, head_id).unwrap();
    let collect_tx = node.wallet.sign(node.wallet.cover_fee(&UTxO::new(), collect_unsigned).unwrap());
    let point = ledger.mine(vec![collect_tx.clone()]);
    node.roll_forward(point, &[collect_tx]);

    // Build an upper bound for "now" at t=0, without advancing the shared
    // clock at all.
    let chain_state = node.handler.current_state();
    let (slot_before, now_before) = node.clock.get_time_handle().current_point_in_time().unwrap();
    let upper_before = construct::upper_bound(now_before, params.contestation_period, |t| {
        node.clock.get_time_handle().slot_from_utc(t)
    })
    .unwrap();

    // Advance the shared clock well past the contestation period, then
    // recompute the same upper bound. A stale, reused handle from before the
    // advance would silently hand back `upper_before` again; a fresh handle
    // must reflect the new time.
    node.clock.advance(120);
    let (slot_after, now_after) = node.clock.get_time_handle().current_point_in_time().unwrap();
    let upper_after = construct::upper_bound(now_after, params.contestation_period, |t| {
        node.clock.get_time_handle().slot_from_utc(t)
    })
    .unwrap();

    assert!(slot_after > slot_before);
    assert!(upper_after.0 > upper_before.0);
    assert!(!chain_state.utxo.is_empty());
}

#[test]
fn rolling_forward_past_the_era_horizon_is_a_fatal_time_conversion_exception() {
    let scripts = hydra_chain::ScriptRegistry {
        head: hydra_chain::tx::ScriptHash([1; 28]),
        initial: hydra_chain::tx::ScriptHash([2; 28]),
        commit: hydra_chain::tx::ScriptHash([3; 28]),
    };
    let handler = hydra_chain::DirectChainSyncHandler::new(
        hydra_chain::NetworkId::Testnet(1),
        scripts,
        hydra_chain::ChainStateAt::genesis(),
        std::sync::Arc::new(BoundedTime(10)),
    );

    let past_horizon = hydra_chain::tx::ChainPoint {
        slot: hydra_chain::tx::ChainSlot(20),
        block_hash: [20; 32],
    };
    let result = handler.on_roll_forward(past_horizon, &[]);
    assert!(matches!(
        result,
        Err(hydra_chain::FatalChainSyncError::TimeConversionException { .. })
    ));
}
