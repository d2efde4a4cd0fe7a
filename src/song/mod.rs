//! Song Store Domain
//!
//! The musical data read by the playback engine: instruments, percussion,
//! patterns and the two channel sequences, plus the guarded store that
//! shares a song between the editor and the playback thread.
//!
//! Every structural edit goes through a [`Song`] method which validates the
//! change and re-derives the sequence row caches before returning, so the
//! engine never observes a stale `first_note_number`.

pub mod distortion;
pub mod instrument;
pub mod note;
pub mod pattern;
pub mod percussion;
pub mod sequence;

pub use distortion::Distortion;
pub use instrument::Instrument;
pub use note::{Note, NoteKind};
pub use pattern::{Pattern, RowSpeed};
pub use percussion::Percussion;
pub use sequence::{Sequence, SequenceEntry, SequencePosition};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::{PlayerError, Result, FRAME_RATE_NTSC, FRAME_RATE_PAL, NUM_CHANNELS, NUM_INSTRUMENTS, NUM_PERCUSSION};

/// Largest pitch change a single slide row may apply.
pub const MAX_SLIDE_DELTA: i8 = 7;

/// Television standard, which fixes the tick rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TvStandard {
    /// 50 Hz
    #[default]
    Pal,
    /// 60 Hz
    Ntsc,
}

impl TvStandard {
    /// Ticks per second.
    pub fn frame_rate(self) -> u32 {
        match self {
            TvStandard::Pal => FRAME_RATE_PAL,
            TvStandard::Ntsc => FRAME_RATE_NTSC,
        }
    }

    /// Timer period, truncated to whole milliseconds.
    pub fn frame_period(self) -> Duration {
        Duration::from_millis(u64::from(1000 / self.frame_rate()))
    }
}

/// A complete song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    /// Song title
    pub name: String,
    /// Rows per beat, used by editors for highlighting
    pub rows_per_beat: u8,
    /// Target TV standard
    pub tv_standard: TvStandard,
    /// Instrument table
    pub instruments: [Instrument; NUM_INSTRUMENTS],
    /// Percussion table
    pub percussion: [Percussion; NUM_PERCUSSION],
    speed: RowSpeed,
    patterns: Vec<Pattern>,
    sequences: [Sequence; NUM_CHANNELS],
}

impl Default for Song {
    fn default() -> Self {
        Song {
            name: "Untitled".to_string(),
            rows_per_beat: 4,
            tv_standard: TvStandard::Pal,
            instruments: std::array::from_fn(|_| Instrument::default()),
            percussion: std::array::from_fn(|_| Percussion::default()),
            speed: RowSpeed::default(),
            patterns: Vec::new(),
            sequences: [Sequence::default(), Sequence::default()],
        }
    }
}

impl Song {
    /// Create an empty song.
    pub fn new(name: impl Into<String>) -> Self {
        Song {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Global row speed.
    pub fn speed(&self) -> RowSpeed {
        self.speed
    }

    /// Set the global row speed.
    pub fn set_speed(&mut self, speed: RowSpeed) -> Result<()> {
        check_speed(speed)?;
        self.speed = speed;
        Ok(())
    }

    /// Row speed in effect for `pattern`: its override, or the global speed.
    pub fn speed_for_pattern(&self, pattern: usize) -> RowSpeed {
        self.patterns[pattern].speed_override.unwrap_or(self.speed)
    }

    /// Pattern table.
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Pattern at `index`, if any.
    pub fn pattern(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    /// Sequence of `channel`.
    ///
    /// # Panics
    /// Panics if `channel` is not 0 or 1.
    pub fn sequence(&self, channel: usize) -> &Sequence {
        &self.sequences[channel]
    }

    /// Append a pattern and return its index.
    pub fn add_pattern(&mut self, pattern: Pattern) -> Result<usize> {
        for note in pattern.notes() {
            self.check_note(*note)?;
        }
        if let Some(speed) = pattern.speed_override {
            check_speed(speed)?;
        }
        self.patterns.push(pattern);
        Ok(self.patterns.len() - 1)
    }

    /// Rename a pattern.
    pub fn rename_pattern(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.pattern_mut(index)?.name = name.into();
        Ok(())
    }

    /// Grow (with hold rows) or truncate a pattern.
    pub fn resize_pattern(&mut self, index: usize, size: usize) -> Result<()> {
        if !(pattern::PATTERN_MIN_SIZE..=pattern::PATTERN_MAX_SIZE).contains(&size) {
            return Err(PlayerError::SongEdit(format!(
                "pattern size {} outside {}..={}",
                size,
                pattern::PATTERN_MIN_SIZE,
                pattern::PATTERN_MAX_SIZE
            )));
        }
        self.pattern_mut(index)?.notes.resize(size, Note::Hold);
        self.update_first_note_numbers();
        Ok(())
    }

    /// Set or clear a pattern's row-speed override.
    pub fn set_pattern_speed(&mut self, index: usize, speed: Option<RowSpeed>) -> Result<()> {
        if let Some(speed) = speed {
            check_speed(speed)?;
        }
        self.pattern_mut(index)?.speed_override = speed;
        Ok(())
    }

    /// Overwrite one row of a pattern.
    pub fn set_note(&mut self, pattern: usize, row: usize, note: Note) -> Result<()> {
        self.check_note(note)?;
        let target = self.pattern_mut(pattern)?;
        let len = target.len();
        let slot = target.notes.get_mut(row).ok_or(PlayerError::OutOfRange {
            what: "pattern row",
            index: row,
            len,
        })?;
        *slot = note;
        Ok(())
    }

    /// Insert a sequence entry at `at` on `channel`.
    ///
    /// Goto targets at or after `at` are shifted so they keep pointing at
    /// the same entries. The new entry's own goto is given in post-insert
    /// indices.
    pub fn insert_entry(&mut self, channel: usize, at: usize, entry: SequenceEntry) -> Result<()> {
        let len = self.sequences[channel].len();
        if at > len {
            return Err(PlayerError::OutOfRange {
                what: "sequence entry",
                index: at,
                len,
            });
        }
        self.check_pattern_index(entry.pattern_index)?;
        if let Some(target) = entry.goto_target {
            check_goto(target, len + 1)?;
        }
        let sequence = &mut self.sequences[channel];
        remap_gotos(sequence, |old| Some(if old >= at { old + 1 } else { old }));
        sequence.entries.insert(at, entry);
        self.update_first_note_numbers();
        Ok(())
    }

    /// Append a sequence entry on `channel`.
    pub fn push_entry(&mut self, channel: usize, entry: SequenceEntry) -> Result<()> {
        let at = self.sequences[channel].len();
        self.insert_entry(channel, at, entry)
    }

    /// Remove the sequence entry at `at` on `channel`.
    ///
    /// Gotos that pointed at the removed entry are cleared; later targets
    /// shift down by one.
    pub fn remove_entry(&mut self, channel: usize, at: usize) -> Result<SequenceEntry> {
        let len = self.sequences[channel].len();
        if at >= len {
            return Err(PlayerError::OutOfRange {
                what: "sequence entry",
                index: at,
                len,
            });
        }
        let sequence = &mut self.sequences[channel];
        let removed = sequence.entries.remove(at);
        remap_gotos(sequence, |old| match old {
            t if t == at => None,
            t if t > at => Some(t - 1),
            t => Some(t),
        });
        self.update_first_note_numbers();
        Ok(removed)
    }

    /// Move the sequence entry at `from` so it ends up at index `to`.
    pub fn move_entry(&mut self, channel: usize, from: usize, to: usize) -> Result<()> {
        let len = self.sequences[channel].len();
        for index in [from, to] {
            if index >= len {
                return Err(PlayerError::OutOfRange {
                    what: "sequence entry",
                    index,
                    len,
                });
            }
        }
        if from == to {
            return Ok(());
        }
        let sequence = &mut self.sequences[channel];
        let entry = sequence.entries.remove(from);
        sequence.entries.insert(to, entry);
        remap_gotos(sequence, |old| {
            if old == from {
                return Some(to);
            }
            let shifted = if old > from { old - 1 } else { old };
            Some(if shifted >= to { shifted + 1 } else { shifted })
        });
        self.update_first_note_numbers();
        Ok(())
    }

    /// Set or clear the goto target of one entry.
    pub fn set_goto(&mut self, channel: usize, entry: usize, target: Option<usize>) -> Result<()> {
        let len = self.sequences[channel].len();
        if let Some(target) = target {
            check_goto(target, len)?;
        }
        let slot = self.sequences[channel]
            .entries
            .get_mut(entry)
            .ok_or(PlayerError::OutOfRange {
                what: "sequence entry",
                index: entry,
                len,
            })?;
        slot.goto_target = target;
        Ok(())
    }

    /// Number of rows in `channel` when played linearly.
    pub fn channel_num_rows(&self, channel: usize) -> usize {
        self.sequences[channel].num_rows(&self.patterns)
    }

    /// Length of the longer channel.
    pub fn track_num_rows(&self) -> usize {
        (0..NUM_CHANNELS)
            .map(|channel| self.channel_num_rows(channel))
            .max()
            .unwrap_or(0)
    }

    /// Non-empty instruments; a combined-waveform instrument counts twice
    /// since it needs two waveform tables.
    pub fn num_used_instruments(&self) -> usize {
        self.instruments
            .iter()
            .filter(|ins| !ins.is_empty())
            .map(|ins| if ins.distortion == Distortion::PureCombined { 2 } else { 1 })
            .sum()
    }

    /// Non-empty percussion slots.
    pub fn num_used_percussion(&self) -> usize {
        self.percussion.iter().filter(|perc| !perc.is_empty()).count()
    }

    /// Envelope frames needed by all non-empty instruments.
    ///
    /// An envelope whose last frame is not silent needs one extra
    /// terminating frame.
    pub fn num_used_envelope_frames(&self) -> usize {
        self.instruments
            .iter()
            .filter(|ins| !ins.is_empty())
            .map(|ins| {
                let last = ins.envelope_length() - 1;
                let terminated = ins.volumes()[last] == 0 && ins.frequencies()[last] == 0;
                ins.envelope_length() + usize::from(!terminated)
            })
            .sum()
    }

    /// Envelope frames needed by all non-empty percussion slots.
    pub fn num_used_percussion_frames(&self) -> usize {
        self.percussion
            .iter()
            .filter(|perc| !perc.is_empty())
            .map(|perc| {
                let terminated = perc.volumes().last().map_or(true, |&v| v == 0);
                perc.envelope_length() + usize::from(!terminated)
            })
            .sum()
    }

    /// Playing time up to the start of `row` as `(minutes, seconds)`.
    ///
    /// Uses the global speed: even rows take `speed.even` ticks, odd rows
    /// `speed.odd`.
    pub fn row_timestamp(&self, row: usize) -> (u64, u64) {
        let even_rows = (row as u64 + 1) / 2;
        let odd_rows = row as u64 / 2;
        let ticks = even_rows * u64::from(self.speed.even) + odd_rows * u64::from(self.speed.odd);
        let seconds = ticks / u64::from(self.tv_standard.frame_rate());
        (seconds / 60, seconds % 60)
    }

    fn pattern_mut(&mut self, index: usize) -> Result<&mut Pattern> {
        let len = self.patterns.len();
        self.patterns.get_mut(index).ok_or(PlayerError::OutOfRange {
            what: "pattern",
            index,
            len,
        })
    }

    fn check_pattern_index(&self, index: usize) -> Result<()> {
        if index >= self.patterns.len() {
            return Err(PlayerError::OutOfRange {
                what: "pattern",
                index,
                len: self.patterns.len(),
            });
        }
        Ok(())
    }

    fn check_note(&self, note: Note) -> Result<()> {
        match note {
            Note::Instrument { index, pitch } => {
                let instrument = self.instruments.get(index).ok_or(PlayerError::OutOfRange {
                    what: "instrument",
                    index,
                    len: NUM_INSTRUMENTS,
                })?;
                if pitch > instrument.max_pitch() {
                    return Err(PlayerError::SongEdit(format!(
                        "pitch {} exceeds {} for instrument {}",
                        pitch,
                        instrument.max_pitch(),
                        index
                    )));
                }
            }
            Note::Percussion { index } if index >= NUM_PERCUSSION => {
                return Err(PlayerError::OutOfRange {
                    what: "percussion",
                    index,
                    len: NUM_PERCUSSION,
                });
            }
            Note::Slide { delta } if !(-MAX_SLIDE_DELTA..=MAX_SLIDE_DELTA).contains(&delta) => {
                return Err(PlayerError::SongEdit(format!(
                    "slide delta {} outside -{}..={}",
                    delta, MAX_SLIDE_DELTA, MAX_SLIDE_DELTA
                )));
            }
            _ => {}
        }
        Ok(())
    }

    fn update_first_note_numbers(&mut self) {
        for sequence in &mut self.sequences {
            sequence.update_first_note_numbers(&self.patterns);
        }
    }
}

fn check_speed(speed: RowSpeed) -> Result<()> {
    if !speed.is_valid() {
        return Err(PlayerError::SongEdit(format!(
            "speed {}/{} outside {}..={}",
            speed.even,
            speed.odd,
            pattern::MIN_SPEED,
            pattern::MAX_SPEED
        )));
    }
    Ok(())
}

fn check_goto(target: usize, len: usize) -> Result<()> {
    if target >= len {
        return Err(PlayerError::OutOfRange {
            what: "goto target",
            index: target,
            len,
        });
    }
    Ok(())
}

fn remap_gotos(sequence: &mut Sequence, map: impl Fn(usize) -> Option<usize>) {
    for entry in &mut sequence.entries {
        entry.goto_target = entry.goto_target.and_then(&map);
    }
}

/// Shared, mutex-guarded song.
///
/// The playback thread holds the lock for a whole tick; editors should keep
/// their critical sections equally short.
#[derive(Debug, Clone, Default)]
pub struct SongStore {
    inner: Arc<Mutex<Song>>,
}

impl SongStore {
    /// Wrap a song for sharing.
    pub fn new(song: Song) -> Self {
        SongStore {
            inner: Arc::new(Mutex::new(song)),
        }
    }

    /// Acquire exclusive access for the lifetime of the guard.
    pub fn lock(&self) -> MutexGuard<'_, Song> {
        self.inner.lock()
    }

    /// Acquire exclusive access, giving up after `timeout`.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<MutexGuard<'_, Song>> {
        self.inner.try_lock_for(timeout)
    }

    /// Run a read-only closure under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&Song) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Run an editing closure under the lock.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Song) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song_with_patterns(sizes: &[usize]) -> Song {
        let mut song = Song::new("test");
        for (i, &size) in sizes.iter().enumerate() {
            song.add_pattern(Pattern::new(format!("p{}", i), size)).unwrap();
        }
        song
    }

    fn firsts(song: &Song, channel: usize) -> Vec<usize> {
        song.sequence(channel)
            .entries()
            .iter()
            .map(|e| e.first_note_number())
            .collect()
    }

    fn gotos(song: &Song, channel: usize) -> Vec<Option<usize>> {
        song.sequence(channel)
            .entries()
            .iter()
            .map(|e| e.goto_target)
            .collect()
    }

    #[test]
    fn test_frame_periods() {
        assert_eq!(TvStandard::Pal.frame_period(), Duration::from_millis(20));
        assert_eq!(TvStandard::Ntsc.frame_period(), Duration::from_millis(16));
        assert_eq!(TvStandard::Ntsc.frame_rate(), 60);
    }

    #[test]
    fn test_structural_edits_keep_caches_current() {
        let mut song = song_with_patterns(&[4, 2]);
        song.push_entry(0, SequenceEntry::new(0)).unwrap();
        song.push_entry(0, SequenceEntry::new(1)).unwrap();
        song.push_entry(0, SequenceEntry::new(0)).unwrap();
        assert_eq!(firsts(&song, 0), vec![0, 4, 6]);

        song.resize_pattern(0, 8).unwrap();
        assert_eq!(firsts(&song, 0), vec![0, 8, 10]);
        assert_eq!(song.channel_num_rows(0), 18);

        song.remove_entry(0, 1).unwrap();
        assert_eq!(firsts(&song, 0), vec![0, 8]);

        song.insert_entry(0, 0, SequenceEntry::new(1)).unwrap();
        assert_eq!(firsts(&song, 0), vec![0, 2, 10]);
        assert_eq!(song.track_num_rows(), 18);
    }

    #[test]
    fn test_goto_targets_follow_their_entries() {
        let mut song = song_with_patterns(&[2]);
        for _ in 0..4 {
            song.push_entry(1, SequenceEntry::new(0)).unwrap();
        }
        song.set_goto(1, 3, Some(2)).unwrap();
        song.set_goto(1, 1, Some(1)).unwrap();

        song.insert_entry(1, 0, SequenceEntry::new(0)).unwrap();
        assert_eq!(gotos(&song, 1), vec![None, None, Some(2), None, Some(3)]);

        song.remove_entry(1, 3).unwrap();
        assert_eq!(gotos(&song, 1), vec![None, None, Some(2), None]);

        song.set_goto(1, 3, Some(0)).unwrap();
        song.move_entry(1, 0, 3).unwrap();
        // The moved entry now sits at 3 and is still the goto's destination
        assert_eq!(gotos(&song, 1), vec![None, Some(1), Some(3), None]);
    }

    #[test]
    fn test_move_entry_remaps_self_goto() {
        let mut song = song_with_patterns(&[1]);
        for _ in 0..3 {
            song.push_entry(0, SequenceEntry::new(0)).unwrap();
        }
        song.set_goto(0, 2, Some(2)).unwrap();
        song.move_entry(0, 2, 0).unwrap();
        assert_eq!(gotos(&song, 0), vec![Some(0), None, None]);
    }

    #[test]
    fn test_rejects_bad_edits() {
        let mut song = song_with_patterns(&[4]);
        assert!(song.insert_entry(0, 1, SequenceEntry::new(0)).is_err());
        assert!(song.push_entry(0, SequenceEntry::new(3)).is_err());
        assert!(song.push_entry(0, SequenceEntry::with_goto(0, 1)).is_err());
        song.push_entry(0, SequenceEntry::with_goto(0, 0)).unwrap();
        assert!(song.resize_pattern(0, 0).is_err());
        assert!(song.set_speed(RowSpeed { even: 0, odd: 3 }).is_err());
        assert!(song.set_goto(0, 0, Some(5)).is_err());
        assert!(song.remove_entry(1, 0).is_err());
    }

    #[test]
    fn test_set_note_checks_pitch_range() {
        let mut song = song_with_patterns(&[4]);
        song.instruments[0].distortion = Distortion::Buzzy;
        assert!(song.set_note(0, 0, Note::Instrument { index: 0, pitch: 32 }).is_err());
        song.instruments[1].distortion = Distortion::PureCombined;
        song.set_note(0, 0, Note::Instrument { index: 1, pitch: 63 }).unwrap();
        assert!(song.set_note(0, 0, Note::Instrument { index: 7, pitch: 1 }).is_err());
        assert!(song.set_note(0, 0, Note::Percussion { index: 15 }).is_err());
        assert!(song.set_note(0, 4, Note::Pause).is_err());
        assert!(song.set_note(0, 1, Note::Slide { delta: 8 }).is_err());
        song.set_note(0, 1, Note::Slide { delta: -7 }).unwrap();
        assert_eq!(song.patterns()[0].note(1), Some(&Note::Slide { delta: -7 }));
    }

    #[test]
    fn test_usage_counters() {
        let mut song = Song::default();
        assert_eq!(song.num_used_instruments(), 0);

        song.instruments[0] =
            Instrument::with_envelope("a", Distortion::PureCombined, vec![8, 4, 0], vec![0, 0, 0], 0, 1).unwrap();
        song.instruments[1] =
            Instrument::with_envelope("b", Distortion::Buzzy, vec![8, 4], vec![0, 1], 0, 1).unwrap();
        assert_eq!(song.num_used_instruments(), 3);
        assert_eq!(song.num_used_envelope_frames(), 3 + 3);

        song.percussion[2] = Percussion::with_envelope(
            "kick",
            vec![Distortion::Buzzy; 3],
            vec![3, 4, 5],
            vec![9, 6, 3],
            false,
        )
        .unwrap();
        assert_eq!(song.num_used_percussion(), 1);
        assert_eq!(song.num_used_percussion_frames(), 4);
    }

    #[test]
    fn test_row_timestamp() {
        let mut song = Song::default();
        song.set_speed(RowSpeed { even: 5, odd: 5 }).unwrap();
        // 600 rows of 5 ticks at 50 Hz: one minute
        assert_eq!(song.row_timestamp(600), (1, 0));
        song.set_speed(RowSpeed { even: 3, odd: 7 }).unwrap();
        // 3 even rows and 2 odd rows precede row 5: 23 ticks
        assert_eq!(song.row_timestamp(5), (0, 0));
        assert_eq!(song.row_timestamp(100), (0, 10));
        song.tv_standard = TvStandard::Ntsc;
        assert_eq!(song.row_timestamp(360), (0, 30));
    }

    #[test]
    fn test_store_edit_is_visible_to_readers() {
        let store = SongStore::new(Song::default());
        let reader = store.clone();
        store.edit(|song| song.name = "Edited".to_string());
        assert_eq!(reader.read(|song| song.name.clone()), "Edited");
        let guard = store.lock();
        assert!(reader.try_lock_for(Duration::from_millis(1)).is_none());
        drop(guard);
        assert!(reader.try_lock_for(Duration::from_millis(1)).is_some());
    }
}
