//! S4: a node with no fuel UTxO, or insufficient fuel to cover a
//! transaction's fee, fails fast with a typed [`PostTxError`] rather than
//! submitting anything.

use hydra_chain::api::PostTxError;
use hydra_chain::chain_state::LocalChainState;
use hydra_chain::{ChainPoster, SubmitTx};
use hydra_chain_testenv::{TestKey, TestNode};

struct NeverCalled;
#[async_trait::async_trait]
impl SubmitTx for NeverCalled {
    async fn submit(&self, _tx: &hydra_chain::Tx) -> Result<(), String> {
        panic!("submission should never be reached once fee coverage fails");
    }
}

fn poster_for(node: &TestNode, our_key: TestKey) -> ChainPoster {
    let ctx = node.chain_context(our_key.party());
    let state = std::sync::Arc::new(LocalChainState::new(node.handler.current_state()));
    ChainPoster::new(ctx, node.wallet.clone(), state, node.clock.clone(), std::sync::Arc::new(NeverCalled))
}

#[tokio::test]
async fn init_tx_without_any_fuel_fails_with_no_fuel_utxo() {
    let our_key = TestKey::from_seed(5);
    let node = TestNode::new(our_key, 0);
    let poster = poster_for(&node, our_key);

    let seed = hydra_chain::tx::TxIn {
        tx_id: hydra_chain::tx::TxId([9; 32]),
        index: 0,
    };
    let req = hydra_chain::PostChainTx::InitTx {
        seed_input: seed,
        parameters: hydra_chain::HeadParameters {
            parties: vec![our_key.party()],
            contestation_period: hydra_chain::tx::ContestationPeriod::from_secs(60),
        },
    };
    let result = poster.post_tx(req).await;
    assert_eq!(result.unwrap_err(), PostTxError::NoFuelUTXOFound);
}

#[tokio::test]
async fn init_tx_with_dust_only_fuel_fails_with_not_enough_funds() {
    let our_key = TestKey::from_seed(6);
    let node = TestNode::new(our_key, 1);
    let poster = poster_for(&node, our_key);

    let seed = node.wallet.get_seed_input().unwrap();
    let req = hydra_chain::PostChainTx::InitTx {
        seed_input: seed,
        parameters: hydra_chain::HeadParameters {
            parties: vec![our_key.party()],
            contestation_period: hydra_chain::tx::ContestationPeriod::from_secs(60),
        },
    };
    let result = poster.post_tx(req).await;
    assert!(matches!(result, Err(PostTxError::NotEnoughFuel)));
}
