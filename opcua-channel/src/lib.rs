//! Secure channel layer for OPC UA
//!
//! This crate splits messages into chunks and reassembles them, applies
//! the message security of the negotiated policy and mode, and runs the
//! secure channel state machine with its security token lifecycle.

pub mod assembler;
pub mod channel;
pub mod chunker;
pub mod config;
pub mod error;
pub mod header;
pub mod sequence;
pub mod state;
pub mod statistics;
pub mod token;

pub use assembler::{Assembled, MessageAssembler};
pub use channel::{ChannelRole, SecureChannel};
pub use chunker::{ChunkParams, ChunkPrefix, ChunkSecurity, encode_abort_chunk, encode_chunks, open_chunk};
pub use config::ChannelLimits;
pub use error::{UaError, UaResult};
pub use header::{
    AsymmetricSecurityHeader, SEQUENCE_HEADER_SIZE, SecurityHeader, SequenceHeader,
    SymmetricSecurityHeader,
};
pub use sequence::{SequenceCounter, SequenceValidator};
pub use state::ChannelState;
pub use statistics::ChannelStatistics;
pub use token::{ActiveToken, SecurityToken, TokenSet};
