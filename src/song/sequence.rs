//! Channel Sequences
//!
//! Each channel plays an ordered list of pattern references. An entry may
//! carry a goto target, which replaces the fall-through to the next entry
//! once its pattern has played. Entries cache the absolute row of their
//! first note; the cache is re-derived by [`Sequence::update_first_note_numbers`]
//! whenever the sequence or a pattern length changes.

use super::pattern::Pattern;

/// Location of a row inside a channel sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SequencePosition {
    /// Index of the sequence entry
    pub entry: usize,
    /// Row index inside the entry's pattern
    pub note: usize,
}

impl SequencePosition {
    /// Create a position.
    pub fn new(entry: usize, note: usize) -> Self {
        SequencePosition { entry, note }
    }
}

/// One pattern reference in a channel sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEntry {
    /// Index into the song's pattern table
    pub pattern_index: usize,
    /// Entry to continue with after this one (`None` falls through)
    pub goto_target: Option<usize>,
    first_note_number: usize,
}

impl SequenceEntry {
    /// Reference `pattern_index` with no goto.
    pub fn new(pattern_index: usize) -> Self {
        SequenceEntry {
            pattern_index,
            goto_target: None,
            first_note_number: 0,
        }
    }

    /// Reference `pattern_index`, continuing at `target` afterwards.
    pub fn with_goto(pattern_index: usize, target: usize) -> Self {
        SequenceEntry {
            pattern_index,
            goto_target: Some(target),
            first_note_number: 0,
        }
    }

    /// Absolute row of this entry's first note within the channel.
    pub fn first_note_number(&self) -> usize {
        self.first_note_number
    }
}

/// Ordered pattern references of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sequence {
    pub(crate) entries: Vec<SequenceEntry>,
}

impl Sequence {
    /// Entries of this sequence.
    pub fn entries(&self) -> &[SequenceEntry] {
        &self.entries
    }

    /// Entry at `index`, if in range.
    pub fn entry(&self, index: usize) -> Option<&SequenceEntry> {
        self.entries.get(index)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sequence has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of rows when played linearly.
    pub fn num_rows(&self, patterns: &[Pattern]) -> usize {
        self.entries
            .iter()
            .map(|e| patterns[e.pattern_index].len())
            .sum()
    }

    /// Re-derive every entry's cached first-note offset.
    pub fn update_first_note_numbers(&mut self, patterns: &[Pattern]) {
        let mut row = 0;
        for entry in &mut self.entries {
            entry.first_note_number = row;
            row += patterns[entry.pattern_index].len();
        }
    }

    /// Whether `pos` names an existing row of this sequence.
    pub fn contains(&self, patterns: &[Pattern], pos: SequencePosition) -> bool {
        self.entries
            .get(pos.entry)
            .and_then(|entry| patterns.get(entry.pattern_index))
            .map_or(false, |pattern| pos.note < pattern.len())
    }

    /// Absolute channel row of `pos`.
    pub fn absolute_row(&self, pos: SequencePosition) -> usize {
        self.entries[pos.entry].first_note_number + pos.note
    }

    /// Map an absolute channel row to its entry and in-pattern index.
    ///
    /// Returns `None` if `row` lies beyond the end of the channel.
    pub fn resolve(&self, patterns: &[Pattern], row: usize) -> Option<SequencePosition> {
        self.entries.iter().enumerate().find_map(|(index, entry)| {
            let len = patterns[entry.pattern_index].len();
            let first = entry.first_note_number;
            (row >= first && row < first + len).then(|| SequencePosition::new(index, row - first))
        })
    }

    /// Position of the row following `pos`, honouring goto targets.
    ///
    /// Returns `None` at the end of the channel.
    pub fn advance(&self, patterns: &[Pattern], pos: SequencePosition) -> Option<SequencePosition> {
        let entry = &self.entries[pos.entry];
        if pos.note + 1 < patterns[entry.pattern_index].len() {
            return Some(SequencePosition::new(pos.entry, pos.note + 1));
        }
        match entry.goto_target {
            Some(target) => Some(SequencePosition::new(target, 0)),
            None if pos.entry + 1 < self.entries.len() => Some(SequencePosition::new(pos.entry + 1, 0)),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<Pattern> {
        vec![Pattern::new("a", 4), Pattern::new("b", 2), Pattern::new("c", 3)]
    }

    fn sequence(entries: Vec<SequenceEntry>) -> Sequence {
        let mut seq = Sequence { entries };
        seq.update_first_note_numbers(&patterns());
        seq
    }

    #[test]
    fn test_first_note_numbers_are_prefix_sums() {
        let seq = sequence(vec![
            SequenceEntry::new(0),
            SequenceEntry::new(1),
            SequenceEntry::new(2),
            SequenceEntry::new(1),
        ]);
        let firsts: Vec<usize> = seq.entries().iter().map(|e| e.first_note_number()).collect();
        assert_eq!(firsts, vec![0, 4, 6, 9]);
        assert_eq!(seq.num_rows(&patterns()), 11);
    }

    #[test]
    fn test_resolve() {
        let seq = sequence(vec![SequenceEntry::new(0), SequenceEntry::new(1)]);
        let p = patterns();
        assert_eq!(seq.resolve(&p, 0), Some(SequencePosition::new(0, 0)));
        assert_eq!(seq.resolve(&p, 3), Some(SequencePosition::new(0, 3)));
        assert_eq!(seq.resolve(&p, 4), Some(SequencePosition::new(1, 0)));
        assert_eq!(seq.resolve(&p, 5), Some(SequencePosition::new(1, 1)));
        assert_eq!(seq.resolve(&p, 6), None);
    }

    #[test]
    fn test_contains() {
        let seq = sequence(vec![SequenceEntry::new(0), SequenceEntry::new(1)]);
        let p = patterns();
        assert!(seq.contains(&p, SequencePosition::new(0, 3)));
        assert!(seq.contains(&p, SequencePosition::new(1, 1)));
        assert!(!seq.contains(&p, SequencePosition::new(1, 2)));
        assert!(!seq.contains(&p, SequencePosition::new(2, 0)));
        assert!(!Sequence::default().contains(&p, SequencePosition::default()));
    }

    #[test]
    fn test_advance_falls_through_and_ends() {
        let seq = sequence(vec![SequenceEntry::new(1), SequenceEntry::new(1)]);
        let p = patterns();
        let mut pos = SequencePosition::new(0, 0);
        let mut rows = vec![seq.absolute_row(pos)];
        while let Some(next) = seq.advance(&p, pos) {
            pos = next;
            rows.push(seq.absolute_row(pos));
        }
        assert_eq!(rows, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_self_goto_cycles_with_pattern_period() {
        let seq = sequence(vec![SequenceEntry::new(0), SequenceEntry::with_goto(2, 1)]);
        let p = patterns();
        let mut pos = SequencePosition::new(1, 0);
        let mut rows = Vec::new();
        for _ in 0..9 {
            rows.push(seq.absolute_row(pos));
            pos = seq.advance(&p, pos).unwrap();
        }
        assert_eq!(rows, vec![4, 5, 6, 4, 5, 6, 4, 5, 6]);
    }

    #[test]
    fn test_backward_goto() {
        let seq = sequence(vec![
            SequenceEntry::new(1),
            SequenceEntry::new(1),
            SequenceEntry::with_goto(1, 1),
        ]);
        let p = patterns();
        let end_of_last = SequencePosition::new(2, 1);
        assert_eq!(seq.advance(&p, end_of_last), Some(SequencePosition::new(1, 0)));
    }
}
