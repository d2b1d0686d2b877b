//! Property-based tests, one per testable property this crate publishes.
//!
//! Each test generates many random instances via `proptest` and checks an
//! invariant that must hold for all of them, rather than a single example.

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;

use hydra_chain::config::{ChainContext, HeadParameters, NetworkId, ScriptRegistry};
use hydra_chain::tx::observe::{observe_all, observe_tx, HeadObservation};
use hydra_chain::tx::{
    construct, Address, ChainSlot, ContestationPeriod, HeadSeed, Party, ScriptHash, Tx, TxId, TxIn,
    TxOut, UTxO, Value, VerificationKey,
};
use hydra_chain::wallet::{Signer, TinyWallet};
use hydra_chain::{ChainStateAt, ChainSyncHandler, DirectChainSyncHandler, GetTimeHandle, TimeHandle};

fn scripts() -> ScriptRegistry {
    ScriptRegistry {
        head: ScriptHash([1; 28]),
        initial: ScriptHash([2; 28]),
        commit: ScriptHash([3; 28]),
    }
}

fn vkey(b: u8) -> VerificationKey {
    VerificationKey([b; 32])
}

fn ctx_with(our: u8) -> ChainContext {
    ChainContext {
        network_id: NetworkId::Testnet(1),
        our_party: Party { vkey: vkey(our) },
        our_participant_vkey: vkey(our),
        default_contestation_period: ContestationPeriod::from_secs(60),
        scripts: scripts(),
    }
}

fn arb_tx_in() -> impl Strategy<Value = TxIn> {
    (any::<[u8; 32]>(), any::<u32>()).prop_map(|(bytes, index)| TxIn { tx_id: TxId(bytes), index })
}

struct FixedTime;
impl GetTimeHandle for FixedTime {
    fn get_time_handle(&self) -> TimeHandle {
        TimeHandle::acquire(
            hydra_chain::EraHistory::new(vec![hydra_chain::time::EraBound {
                start_slot: ChainSlot(0),
                start_time: hydra_chain::time::UtcTime(0),
                slot_length_ms: 1000,
                slot_count: None,
            }]),
            hydra_chain::time::UtcTime(0),
        )
    }
}

struct FakeSigner(VerificationKey);
impl Signer for FakeSigner {
    fn vkey(&self) -> VerificationKey {
        self.0
    }
    fn sign_tx(&self, _tx: &Tx) -> hydra_chain::tx::Signature {
        hydra_chain::tx::Signature { by: self.0, bytes: vec![] }
    }
}

proptest! {
    // 1. Event ids are strictly monotonic across any sequence of roll-forward
    // and roll-backward calls on a fresh handler.
    #[test]
    fn event_ids_are_strictly_monotonic(slots in prop::collection::vec(1u64..200, 1..20)) {
        let handler = DirectChainSyncHandler::new(
            NetworkId::Testnet(1),
            scripts(),
            ChainStateAt::genesis(),
            Arc::new(FixedTime),
        );
        let mut last_id: Option<u64> = None;
        let mut current_slot = 0u64;
        for raw_slot in slots {
            let slot = current_slot + raw_slot;
            let point = hydra_chain::tx::ChainPoint { slot: ChainSlot(slot), block_hash: [slot as u8; 32] };
            let events = handler.on_roll_forward(point, &[]).unwrap();
            for event in &events {
                if let Some(prev) = last_id {
                    prop_assert!(event.id() > prev);
                }
                last_id = Some(event.id());
            }
            current_slot = slot;
        }
    }

    // 2. Observation soundness: observing a freshly constructed `InitTx`
    // always yields an `Init` observation, whatever the seed/party bytes.
    #[test]
    fn observing_a_fresh_init_tx_always_yields_an_init_observation(
        seed_byte in any::<u8>(),
        party_byte in any::<u8>(),
        cp_secs in 1u64..10_000,
    ) {
        let ctx = ctx_with(9);
        let params = HeadParameters {
            parties: vec![Party { vkey: vkey(party_byte) }],
            contestation_period: ContestationPeriod::from_secs(cp_secs),
        };
        let seed = TxIn { tx_id: TxId([seed_byte; 32]), index: 0 };
        let tx = construct::initialize(&ctx, &params, seed).unwrap();

        let empty = UTxO::new();
        let (_, observation) = observe_tx(NetworkId::Testnet(1), &scripts(), &empty, &empty, &tx);
        prop_assert!(matches!(observation, Some(HeadObservation::Init { .. })));
    }

    // 3. UTxO advancement: observing any valid Head transition changes the
    // tracked UTxO set.
    #[test]
    fn observing_an_init_tx_always_advances_the_utxo(seed_byte in any::<u8>(), party_byte in any::<u8>()) {
        let ctx = ctx_with(9);
        let params = HeadParameters {
            parties: vec![Party { vkey: vkey(party_byte) }],
            contestation_period: ContestationPeriod::from_secs(60),
        };
        let seed = TxIn { tx_id: TxId([seed_byte; 32]), index: 0 };
        let tx = construct::initialize(&ctx, &params, seed).unwrap();

        let empty = UTxO::new();
        let (new_utxo, observation) = observe_tx(NetworkId::Testnet(1), &scripts(), &empty, &empty, &tx);
        prop_assert!(observation.is_some());
        prop_assert_ne!(new_utxo, empty);
    }

    // 4. Non-interference: a sequence of plain payment transactions, none of
    // them touching a Head script address, never changes the tracked UTxO.
    #[test]
    fn unrelated_payments_never_change_the_tracked_utxo(
        addrs in prop::collection::vec(any::<u8>(), 1..10),
        values in prop::collection::vec(1u64..1_000_000, 1..10),
    ) {
        let txs: Vec<Tx> = addrs
            .iter()
            .zip(values.iter())
            .map(|(a, v)| {
                Tx::unsigned(
                    vec![TxIn { tx_id: TxId([*a; 32]), index: 0 }],
                    vec![TxOut {
                        address: Address(vec![*a, *a, *a]),
                        value: Value(*v),
                        datum: None,
                        reference_script: None,
                    }],
                )
            })
            .collect();
        let utxo = UTxO::new();
        let (final_utxo, observations) = observe_all(NetworkId::Testnet(1), &scripts(), &utxo, &utxo, &txs);
        prop_assert_eq!(final_utxo, utxo);
        prop_assert!(observations.is_empty());
    }

    // 5. Rollback idempotence: rolling back twice to the same slot yields the
    // same state both times, and the result never exceeds the target slot.
    #[test]
    fn rollback_is_idempotent(
        pushed_slots in prop::collection::vec(1u64..500, 1..20),
        target in 0u64..500,
    ) {
        let lcs = hydra_chain::chain_state::LocalChainState::new(ChainStateAt::genesis());
        let mut last = 0u64;
        for raw in pushed_slots {
            let slot = last + raw;
            let state = ChainStateAt {
                utxo: UTxO::new(),
                recorded_at: Some(hydra_chain::tx::ChainPoint { slot: ChainSlot(slot), block_hash: [slot as u8; 32] }),
            };
            let _ = lcs.push_new(state);
            last = slot;
        }
        let once = lcs.rollback(ChainSlot(target));
        let twice = lcs.rollback(ChainSlot(target));
        prop_assert_eq!(&once, &twice);
        if let Some(point) = once.recorded_at {
            prop_assert!(point.slot <= ChainSlot(target));
        }
    }

    // 6. `HeadSeed` round-trips through `TxIn` for every value.
    #[test]
    fn head_seed_round_trips(tx_in in arb_tx_in()) {
        let seed = HeadSeed::from_tx_in(tx_in);
        prop_assert_eq!(seed.tx_in(), tx_in);
    }

    // 7. Wallet determinism: covering fee for the same wallet UTxO set and
    // the same partial transaction always returns a byte-identical result.
    #[test]
    fn cover_fee_is_deterministic(
        values in prop::collection::vec(1_000_000u64..20_000_000, 1..6),
        outputs_total in 100_000u64..5_000_000,
    ) {
        let wallet = TinyWallet::new(Arc::new(FakeSigner(vkey(7))), 1);
        for (i, value) in values.iter().enumerate() {
            wallet.apply_roll_forward(
                &[],
                &[(
                    TxIn { tx_id: TxId([i as u8; 32]), index: 0 },
                    TxOut { address: Address(vkey(7).0.to_vec()), value: Value(*value), datum: None, reference_script: None },
                )],
            );
        }
        let partial = || Tx::unsigned(vec![], vec![TxOut {
            address: Address(vec![1]),
            value: Value(outputs_total),
            datum: None,
            reference_script: None,
        }]);
        let a = wallet.cover_fee(&UTxO::new(), partial());
        let b = wallet.cover_fee(&UTxO::new(), partial());
        prop_assert_eq!(a, b);
    }

    // 8. Fee coverage correctness: whenever `cover_fee` succeeds, the
    // balanced transaction's inputs exactly cover its outputs plus fee.
    #[test]
    fn fee_coverage_balances_inputs_against_outputs_and_fee(
        values in prop::collection::vec(1_000_000u64..20_000_000, 1..6),
        outputs_total in 100_000u64..5_000_000,
    ) {
        let wallet = TinyWallet::new(Arc::new(FakeSigner(vkey(7))), 1);
        let mut value_of: BTreeMap<TxIn, u64> = BTreeMap::new();
        for (i, value) in values.iter().enumerate() {
            let txin = TxIn { tx_id: TxId([i as u8; 32]), index: 0 };
            value_of.insert(txin, *value);
            wallet.apply_roll_forward(
                &[],
                &[(txin, TxOut { address: Address(vkey(7).0.to_vec()), value: Value(*value), datum: None, reference_script: None })],
            );
        }
        let partial = Tx::unsigned(vec![], vec![TxOut {
            address: Address(vec![1]),
            value: Value(outputs_total),
            datum: None,
            reference_script: None,
        }]);
        if let Ok(balanced) = wallet.cover_fee(&UTxO::new(), partial) {
            let total_in: u64 = balanced.inputs.iter().map(|txin| value_of[txin]).sum();
            let total_out: u64 = balanced.total_output_value().0;
            prop_assert_eq!(total_in, total_out + balanced.fee.0);
            prop_assert!(balanced.fee.0 > 0);
        }
    }
}
