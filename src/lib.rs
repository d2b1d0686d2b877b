//! `hydra-chain`: the on-chain interface layer of a Hydra Head node —
//! transaction construction, transaction observation, rollback-safe chain
//! state, fee-covering wallet, and the chain-sync/posting glue around them.

#![warn(missing_docs)]

pub mod api;
pub mod chain_state;
pub mod chain_sync;
pub mod config;
pub mod error;
pub mod log;
pub mod poster;
pub mod time;
pub mod tx;
pub mod wallet;

pub use api::{ChainEvent, OnChainTx, PostChainTx, PostTxError};
pub use chain_state::{ChainStateAt, LocalChainState};
pub use chain_sync::{ChainSyncHandler, DirectChainSyncHandler};
pub use config::{ChainContext, HeadParameters, NetworkId, ScriptRegistry};
pub use error::FatalChainSyncError;
pub use poster::{ChainPoster, SubmitTx};
pub use time::{EraHistory, GetTimeHandle, TimeHandle};
pub use tx::{HeadId, HeadSeed, HeadState, Tx, UTxO};
pub use wallet::{CoverFeeErr, Signer, TinyWallet};
