//! Pattern Rows
//!
//! A row is one of five kinds. Each kind carries only the fields that mean
//! something for it.

use std::fmt;

/// One row of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Note {
    /// Keep sounding whatever the channel is playing
    #[default]
    Hold,
    /// Start an instrument at a pitch value
    Instrument {
        /// Index into the song's instrument table
        index: usize,
        /// Pitch value, 0..=31 (0..=63 for the combined waveform)
        pitch: u8,
    },
    /// Start a percussion one-shot
    Percussion {
        /// Index into the song's percussion table
        index: usize,
    },
    /// Cut a held instrument back to its sustain loop
    Pause,
    /// Shift the held instrument's pitch without restarting its envelope
    Slide {
        /// Signed pitch delta
        delta: i8,
    },
}

/// Kind of a [`Note`], without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteKind {
    /// [`Note::Hold`]
    Hold,
    /// [`Note::Instrument`]
    Instrument,
    /// [`Note::Percussion`]
    Percussion,
    /// [`Note::Pause`]
    Pause,
    /// [`Note::Slide`]
    Slide,
}

impl Note {
    /// Kind of this note.
    pub fn kind(&self) -> NoteKind {
        match self {
            Note::Hold => NoteKind::Hold,
            Note::Instrument { .. } => NoteKind::Instrument,
            Note::Percussion { .. } => NoteKind::Percussion,
            Note::Pause => NoteKind::Pause,
            Note::Slide { .. } => NoteKind::Slide,
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::Hold => write!(f, "|"),
            Note::Instrument { index, pitch } => write!(f, "{} {:>2}", index + 1, pitch),
            Note::Percussion { index } => write!(f, "P{}", index + 1),
            Note::Pause => write!(f, "---"),
            Note::Slide { delta } => write!(f, "{:+}", delta),
        }
    }
}
