//! In-memory test fixture for exercising the full chain-sync/post path
//! without a real node: a [`MockLedger`] that appends blocks and can roll
//! back, paired with a [`TestNode`] bundling a [`DirectChainSyncHandler`]
//! and a funded [`TinyWallet`] the way a real Hydra node wires them.

use std::sync::Arc;

use hydra_chain::{
    ChainContext, ChainEvent, ChainStateAt, ChainSyncHandler, DirectChainSyncHandler, EraHistory,
    GetTimeHandle, HeadState, NetworkId, ScriptRegistry, Signer, TimeHandle, TinyWallet, Tx, UTxO,
};
use hydra_chain::time::{EraBound, UtcTime};
use hydra_chain::tx::{
    Address, ChainPoint, ChainSlot, Party, Signature, TxId, TxIn, TxOut, Value, VerificationKey,
};

/// A key pair stand-in: deterministic from a single byte seed, good enough
/// to sign/verify within this in-memory test environment.
#[derive(Debug, Clone, Copy)]
pub struct TestKey {
    /// Verification key derived from this test key's seed.
    pub vkey: VerificationKey,
}

impl TestKey {
    /// Derive a test key from a single seed byte.
    pub fn from_seed(seed: u8) -> Self {
        TestKey {
            vkey: VerificationKey([seed; 32]),
        }
    }

    /// The party identity corresponding to this key.
    pub fn party(&self) -> Party {
        Party { vkey: self.vkey }
    }
}

/// A [`Signer`] that always succeeds, recording which key signed.
pub struct TestSigner(pub TestKey);

impl Signer for TestSigner {
    fn vkey(&self) -> VerificationKey {
        self.0.vkey
    }

    fn sign_tx(&self, _tx: &Tx) -> Signature {
        Signature {
            by: self.0.vkey,
            bytes: vec![0xAA],
        }
    }
}

/// A clock fixed at construction time, advanced manually by tests that need
/// deterministic timestamps.
pub struct FixedClock(std::sync::atomic::AtomicI64);

impl FixedClock {
    /// A clock starting at `now`.
    pub fn new(now: UtcTime) -> Self {
        FixedClock(std::sync::atomic::AtomicI64::new(now.0))
    }

    /// Advance the clock by `secs` seconds.
    pub fn advance(&self, secs: u64) {
        self.0
            .fetch_add(secs as i64 * 1000, std::sync::atomic::Ordering::SeqCst);
    }
}

impl GetTimeHandle for FixedClock {
    fn get_time_handle(&self) -> TimeHandle {
        let now = UtcTime(self.0.load(std::sync::atomic::Ordering::SeqCst));
        TimeHandle::acquire(
            EraHistory::new(vec![EraBound {
                start_slot: ChainSlot(0),
                start_time: UtcTime(0),
                slot_length_ms: 1000,
                slot_count: None,
            }]),
            now,
        )
    }
}

/// An in-memory append-only chain: blocks of transactions plus rollback.
///
/// Mirrors the shape the teacher's `TestEnv`/`Emitter` combination gives
/// tests against a real `bitcoind` regtest node, but entirely in memory
/// since nothing here needs a real ledger to validate against.
#[derive(Default)]
pub struct MockLedger {
    blocks: Vec<(ChainPoint, Vec<Tx>)>,
}

impl MockLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        MockLedger::default()
    }

    /// Append a new block at the next slot, containing `txs`.
    pub fn mine(&mut self, txs: Vec<Tx>) -> ChainPoint {
        let next_slot = self.blocks.last().map_or(1, |(p, _)| p.slot.0 + 1);
        let point = ChainPoint {
            slot: ChainSlot(next_slot),
            block_hash: [next_slot as u8; 32],
        };
        self.blocks.push((point, txs));
        point
    }

    /// Drop every block after `to_slot`.
    pub fn rollback(&mut self, to_slot: ChainSlot) {
        self.blocks.retain(|(p, _)| p.slot <= to_slot);
    }

    /// Blocks in order, oldest first.
    pub fn blocks(&self) -> &[(ChainPoint, Vec<Tx>)] {
        &self.blocks
    }
}

/// A minimal Hydra node under test: chain-sync handler plus wallet, wired
/// to a shared [`FixedClock`] and script registry.
pub struct TestNode {
    /// The node's chain-sync handler.
    pub handler: DirectChainSyncHandler,
    /// The node's wallet.
    pub wallet: Arc<TinyWallet>,
    /// Shared clock driving both the handler's tick timestamps and any
    /// validity-interval computation a test performs directly.
    pub clock: Arc<FixedClock>,
    /// Script registry used by this node's `ChainContext`.
    pub scripts: ScriptRegistry,
}

impl TestNode {
    /// A node with a fresh wallet funded with two separate UTxOs, each
    /// worth `fuel_lovelace`, starting from genesis chain state. Funding
    /// with two distinct UTxOs rather than one means a transaction can
    /// consume one as the Head seed and still have the other left over for
    /// the wallet to cover fees with. `fuel_lovelace == 0` leaves the
    /// wallet with no UTxOs at all, for exercising the no-fuel path.
    pub fn new(our_key: TestKey, fuel_lovelace: u64) -> Self {
        let scripts = ScriptRegistry {
            head: hydra_chain::tx::ScriptHash([1; 28]),
            initial: hydra_chain::tx::ScriptHash([2; 28]),
            commit: hydra_chain::tx::ScriptHash([3; 28]),
        };
        let clock = Arc::new(FixedClock::new(UtcTime(0)));
        let wallet = Arc::new(TinyWallet::new(Arc::new(TestSigner(our_key)), 1));
        if fuel_lovelace > 0 {
            wallet.apply_roll_forward(
                &[],
                &[
                (
                    TxIn { tx_id: TxId([0xF0; 32]), index: 0 },
                    TxOut {
                        address: Address(our_key.vkey.0.to_vec()),
                        value: Value(fuel_lovelace),
                        datum: None,
                        reference_script: None,
                    },
                ),
                (
                    TxIn { tx_id: TxId([0xF1; 32]), index: 0 },
                    TxOut {
                        address: Address(our_key.vkey.0.to_vec()),
                        value: Value(fuel_lovelace),
                        datum: None,
                        reference_script: None,
                    },
                ),
                ],
            );
        }
        let handler = DirectChainSyncHandler::new(
            NetworkId::Testnet(1),
            scripts,
            ChainStateAt::genesis(),
            clock.clone(),
        );
        TestNode {
            handler,
            wallet,
            clock,
            scripts,
        }
    }

    /// This node's `ChainContext`, for building requests against `construct`/`poster`.
    pub fn chain_context(&self, our_party: Party) -> ChainContext {
        ChainContext {
            network_id: NetworkId::Testnet(1),
            our_participant_vkey: our_party.vkey,
            our_party,
            default_contestation_period: hydra_chain::tx::ContestationPeriod::from_secs(60),
            scripts: self.scripts,
        }
    }

    /// Apply a newly-mined block to both the chain-sync handler and the
    /// wallet, returning the events the handler produced.
    pub fn roll_forward(&self, point: ChainPoint, txs: &[Tx]) -> Vec<ChainEvent> {
        let events = self
            .handler
            .on_roll_forward(point, txs)
            .expect("roll-forward should not be fatal in these fixtures");
        let owned = self.wallet.owned_inputs();
        for tx in txs {
            let spent: Vec<TxIn> = tx.inputs.iter().copied().filter(|i| owned.contains(i)).collect();
            let produced: Vec<(TxIn, TxOut)> = tx
                .outputs
                .iter()
                .enumerate()
                .map(|(i, out)| {
                    (
                        TxIn {
                            tx_id: TxId([point.slot.0 as u8; 32]),
                            index: i as u32,
                        },
                        out.clone(),
                    )
                })
                .collect();
            self.wallet.apply_roll_forward(&spent, &produced);
        }
        events
    }

    /// The node's current Head-relevant UTxO set.
    pub fn current_utxo(&self) -> UTxO {
        self.handler.current_state().utxo
    }

    /// The node's current lifecycle state, as reconstructed from the last
    /// `Init`/`CollectCom`/`Close`/`Fanout` observation a test applied.
    ///
    /// This fixture does not itself maintain a `HeadState`; tests derive it
    /// from the `ChainEvent`s `roll_forward` returned, the same way a real
    /// Head state machine would fold them.
    pub fn idle() -> HeadState {
        HeadState::Idle
    }
}
