//! Patterns
//!
//! A named, bounded run of rows with an optional row-speed override.

use super::note::Note;

/// Smallest pattern size.
pub const PATTERN_MIN_SIZE: usize = 1;

/// Largest pattern size.
pub const PATTERN_MAX_SIZE: usize = 256;

/// Lowest ticks-per-row value.
pub const MIN_SPEED: u8 = 1;

/// Highest ticks-per-row value.
pub const MAX_SPEED: u8 = 15;

/// Ticks per row for even and odd rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpeed {
    /// Ticks spent on rows with an even index
    pub even: u8,
    /// Ticks spent on rows with an odd index
    pub odd: u8,
}

impl RowSpeed {
    /// Ticks for the row at `row`.
    pub fn ticks_for_row(&self, row: usize) -> u8 {
        if row % 2 == 0 {
            self.even
        } else {
            self.odd
        }
    }

    /// Whether both speeds are in `MIN_SPEED..=MAX_SPEED`.
    pub fn is_valid(&self) -> bool {
        (MIN_SPEED..=MAX_SPEED).contains(&self.even) && (MIN_SPEED..=MAX_SPEED).contains(&self.odd)
    }
}

impl Default for RowSpeed {
    fn default() -> Self {
        RowSpeed { even: 5, odd: 5 }
    }
}

/// A pattern of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Display name
    pub name: String,
    pub(crate) notes: Vec<Note>,
    pub(crate) speed_override: Option<RowSpeed>,
}

impl Pattern {
    /// Create a pattern of `size` hold rows.
    ///
    /// `size` is clamped to `PATTERN_MIN_SIZE..=PATTERN_MAX_SIZE`.
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Pattern {
            name: name.into(),
            notes: vec![Note::Hold; size.clamp(PATTERN_MIN_SIZE, PATTERN_MAX_SIZE)],
            speed_override: None,
        }
    }

    /// Create a pattern from explicit rows.
    ///
    /// Rows beyond `PATTERN_MAX_SIZE` are dropped; an empty list yields a
    /// single hold row. Note contents are checked when the pattern is added
    /// to a [`Song`](super::Song).
    pub fn with_notes(name: impl Into<String>, mut notes: Vec<Note>) -> Self {
        notes.truncate(PATTERN_MAX_SIZE);
        if notes.is_empty() {
            notes.push(Note::Hold);
        }
        Pattern {
            name: name.into(),
            notes,
            speed_override: None,
        }
    }

    /// Rows of this pattern.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Patterns are never empty; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Row at `index`, if in range.
    pub fn note(&self, index: usize) -> Option<&Note> {
        self.notes.get(index)
    }

    /// Optional per-pattern speed.
    pub fn speed_override(&self) -> Option<RowSpeed> {
        self.speed_override
    }
}
