//! TIA Two-Channel Tracker Playback Engine
//!
//! A tick-driven sequencer for songs written for a two-channel TIA-style
//! programmable sound generator. Each channel exposes three registers per
//! frame: distortion (AUDC), pitch divider (AUDF) and volume (AUDV).
//!
//! # Features
//! - Instrument envelopes with attack, sustain loop and release regions
//! - One-shot percussion envelopes with per-frame waveforms
//! - Two tempo-locked channel sequences with goto loops
//! - Alternating odd/even row speeds
//! - Invalid-note detection that halts playback and reports the offending row
//! - A frame-rate timer thread (50 Hz PAL / 60 Hz NTSC) driving the engine
//!
//! # Quick start
//! ```no_run
//! use tia_player::player::RegisterFile;
//! use tia_player::song::{Song, SongStore};
//! use tia_player::transport::Transport;
//! use tia_player::PlayerConfig;
//!
//! let store = SongStore::new(Song::default());
//! let transport = Transport::spawn(store.clone(), RegisterFile::new(), PlayerConfig::default()).unwrap();
//! if let Err(err) = transport.play_track(0, 0) {
//!     eprintln!("cannot play: {err}");
//! }
//! for event in transport.events().try_iter() {
//!     println!("{event:?}");
//! }
//! ```

#![warn(missing_docs)]

pub mod config; // Player configuration (serde)
pub mod envelope; // Envelope frame arithmetic
pub mod player; // Playback state machine
pub mod song; // Song store and data model
pub mod transport; // Frame-rate timer thread

use player::InvalidNoteReport;

/// Number of sound channels on the chip.
pub const NUM_CHANNELS: usize = 2;

/// Number of instrument slots in a song.
pub const NUM_INSTRUMENTS: usize = 7;

/// Number of percussion slots in a song.
pub const NUM_PERCUSSION: usize = 15;

/// PAL frame rate (50 Hz).
pub const FRAME_RATE_PAL: u32 = 50;

/// NTSC frame rate (60 Hz).
pub const FRAME_RATE_NTSC: u32 = 60;

/// Error types for playback engine and song store operations
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    /// Playback stopped on a note that cannot be played in its context
    #[error("Invalid note: {0}")]
    InvalidNote(InvalidNoteReport),

    /// A song edit was rejected because it would break an invariant
    #[error("Rejected song edit: {0}")]
    SongEdit(String),

    /// An index into one of the song tables was out of range
    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange {
        /// Which table was indexed
        what: &'static str,
        /// Offending index
        index: usize,
        /// Table length
        len: usize,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for PlayerError {
    fn from(msg: String) -> Self {
        PlayerError::Other(msg)
    }
}

impl From<&str> for PlayerError {
    fn from(msg: &str) -> Self {
        PlayerError::Other(msg.to_string())
    }
}

/// Result type for engine and song store operations
pub type Result<T> = std::result::Result<T, PlayerError>;

// Public API exports
pub use config::{OverlayPolicy, PlayerConfig};
pub use player::{HardwareSink, PlayMode, Player, PlayerEvent};
pub use song::{Song, SongStore, TvStandard};
pub use transport::Transport;
