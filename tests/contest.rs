//! S3: once a Head is `Closed`, a higher-numbered snapshot may contest it;
//! a snapshot that does not supersede the currently closed one is refused.

use hydra_chain::api::OnChainTx;
use hydra_chain::tx::{construct, ChainSlot, HeadId, Snapshot, UTxO};
use hydra_chain::{ChainEvent, HeadState};
use hydra_chain_testenv::{MockLedger, TestKey, TestNode};

fn open_a_head(node: &TestNode, ctx: &hydra_chain::ChainContext, ledger: &mut MockLedger, head_id: HeadId, seed: hydra_chain::tx::TxIn) {
    let params = hydra_chain::HeadParameters {
        parties: vec![ctx.our_party.clone()],
        contestation_period: hydra_chain::tx::ContestationPeriod::from_secs(60),
    };
    let init_unsigned = construct::initialize(ctx, &params, seed).unwrap();
    let init_tx = node.wallet.sign(node.wallet.cover_fee(&UTxO::new(), init_unsigned).unwrap());
    let point = ledger.mine(vec![init_tx.clone()]);
    node.roll_forward(point, &[init_tx]);

    let chain_state = node.handler.current_state();
    let collect_unsigned = construct::collect(ctx, &chain_state, head_id).unwrap();
    let collect_tx = node.wallet.sign(node.wallet.cover_fee(&UTxO::new(), collect_unsigned).unwrap());
    let point = ledger.mine(vec![collect_tx.clone()]);
    node.roll_forward(point, &[collect_tx]);
}

#[test]
fn a_higher_snapshot_number_successfully_contests_a_closed_head() {
    let our_key = TestKey::from_seed(9);
    let node = TestNode::new(our_key, 10_000_000);
    let ctx = node.chain_context(our_key.party());
    let mut ledger = MockLedger::new();
    let seed = node.wallet.get_seed_input().unwrap();
    let head_id = HeadId::from_seed_tx_id(&seed.tx_id);

    open_a_head(&node, &ctx, &mut ledger, head_id, seed);

    let params = hydra_chain::HeadParameters {
        parties: vec![our_key.party()],
        contestation_period: hydra_chain::tx::ContestationPeriod::from_secs(60),
    };
    let snapshot_5 = Snapshot {
        number: 5,
        utxo: UTxO::new(),
        signatures: Default::default(),
    };
    let chain_state = node.handler.current_state();
    let close_unsigned = construct::close(
        &ctx,
        &chain_state,
        head_id,
        &params,
        &snapshot_5,
        ChainSlot(1),
        (ChainSlot(10), hydra_chain::time::UtcTime(0)),
    )
    .unwrap();
    let close_tx = node.wallet.sign(node.wallet.cover_fee(&UTxO::new(), close_unsigned).unwrap());
    let point = ledger.mine(vec![close_tx.clone()]);
    let events = node.roll_forward(point, &[close_tx]);
    assert!(matches!(events[0], ChainEvent::Tick { .. }));
    assert!(matches!(
        &events[1],
        ChainEvent::Observation { on_chain_tx: OnChainTx::OnCloseTx { snapshot_number: 5, .. }, .. }
    ));

    let chain_state = node.handler.current_state();
    let head_state = HeadState::Closed {
        snapshot_number: 5,
        contestation_deadline: ChainSlot(1_000),
    };
    let snapshot_7 = Snapshot {
        number: 7,
        utxo: UTxO::new(),
        signatures: Default::default(),
    };
    let contest_unsigned = construct::contest(
        &ctx,
        &chain_state,
        head_id,
        head_state,
        &params,
        &snapshot_7,
        (ChainSlot(20), hydra_chain::time::UtcTime(0)),
    )
    .unwrap();
    let contest_tx = node.wallet.sign(node.wallet.cover_fee(&UTxO::new(), contest_unsigned).unwrap());
    let point = ledger.mine(vec![contest_tx.clone()]);
    let events = node.roll_forward(point, &[contest_tx]);
    assert!(matches!(events[0], ChainEvent::Tick { .. }));
    assert!(matches!(
        &events[1],
        ChainEvent::Observation { on_chain_tx: OnChainTx::OnContestTx { snapshot_number: 7 }, .. }
    ));
}

#[test]
fn a_non_superseding_snapshot_number_is_refused_before_ever_reaching_the_chain() {
    let chain_state = hydra_chain::ChainStateAt::genesis();
    let params = hydra_chain::HeadParameters {
        parties: vec![],
        contestation_period: hydra_chain::tx::ContestationPeriod::from_secs(60),
    };
    let ctx = hydra_chain::ChainContext {
        network_id: hydra_chain::NetworkId::Testnet(1),
        our_party: hydra_chain::tx::Party { vkey: hydra_chain::tx::VerificationKey([1; 32]) },
        our_participant_vkey: hydra_chain::tx::VerificationKey([1; 32]),
        default_contestation_period: hydra_chain::tx::ContestationPeriod::from_secs(60),
        scripts: hydra_chain::ScriptRegistry {
            head: hydra_chain::tx::ScriptHash([1; 28]),
            initial: hydra_chain::tx::ScriptHash([2; 28]),
            commit: hydra_chain::tx::ScriptHash([3; 28]),
        },
    };
    let head_state = HeadState::Closed {
        snapshot_number: 9,
        contestation_deadline: ChainSlot(1_000),
    };
    let snapshot_3 = Snapshot {
        number: 3,
        utxo: UTxO::new(),
        signatures: Default::default(),
    };
    let result = construct::contest(
        &ctx,
        &chain_state,
        HeadId::from_raw([0; 28]),
        head_state,
        &params,
        &snapshot_3,
        (ChainSlot(20), hydra_chain::time::UtcTime(0)),
    );
    assert_eq!(
        result.unwrap_err(),
        construct::ContestErr::SnapshotNotNewer { current: 9, given: 3 }
    );
}
