//! Rotating sequencer set: stake-weighted leader election, block acceptance,
//! slashing and epoch transitions.

pub mod engine;
pub mod error;
pub mod sequencer;

pub use engine::{ConsensusConfig, ConsensusEngine};
pub use error::ConsensusError;
pub use sequencer::{Sequencer, SequencerStatus, SlashingEvidence, SlashingType};
