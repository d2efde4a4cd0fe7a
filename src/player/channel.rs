//! Per-Channel Track Cursor
//!
//! Sequencing state of one channel in track mode: where it is in its
//! sequence, which note it is sounding and how far that note's envelope has
//! progressed.

use log::debug;

use super::events::InvalidNoteReason;
use super::sink::ChannelOutput;
use crate::config::OverlayPolicy;
use crate::envelope::{hardware_pitch, step_instrument_frame, step_percussion_frame};
use crate::song::distortion::MAX_PITCH;
use crate::song::{Note, NoteKind, SequencePosition, Song};

/// Note a channel is currently sounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveNote {
    /// Nothing dispatched yet
    #[default]
    None,
    /// Instrument at a pitch
    Instrument {
        /// Instrument table index
        index: usize,
        /// Current pitch, including slides
        pitch: u8,
    },
    /// Percussion one-shot
    Percussion {
        /// Percussion table index
        index: usize,
    },
}

/// Track-mode state of one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCursor {
    position: SequencePosition,
    started: bool,
    active: ActiveNote,
    frame: usize,
    note_mode: NoteKind,
}

impl ChannelCursor {
    /// Cursor that will play `position` on its first row event.
    pub fn new(position: SequencePosition) -> Self {
        ChannelCursor {
            position,
            started: false,
            active: ActiveNote::None,
            frame: 0,
            note_mode: NoteKind::Hold,
        }
    }

    /// Current sequence position.
    pub fn position(&self) -> SequencePosition {
        self.position
    }

    /// Note being sounded.
    pub fn active(&self) -> ActiveNote {
        self.active
    }

    /// Envelope frame of the active note.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Kind of the last sounding note, used to validate pauses and slides.
    pub fn note_mode(&self) -> NoteKind {
        self.note_mode
    }

    /// Move to the next row.
    ///
    /// The first call stays on the start position. Returns `None` at the end
    /// of the channel, or if an edit removed the row the cursor was on.
    pub fn next_row(&mut self, song: &Song, channel: usize) -> Option<SequencePosition> {
        if !song.sequence(channel).contains(song.patterns(), self.position) {
            debug!("Channel {} lost its position {:?} to an edit", channel, self.position);
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.position);
        }
        let next = song.sequence(channel).advance(song.patterns(), self.position)?;
        self.position = next;
        Some(next)
    }

    /// Note at the current position.
    pub fn current_note(&self, song: &Song, channel: usize) -> Note {
        let entry = &song.sequence(channel).entries()[self.position.entry];
        song.patterns()[entry.pattern_index].notes()[self.position.note]
    }

    /// Absolute channel row of the current position.
    pub fn absolute_row(&self, song: &Song, channel: usize) -> usize {
        song.sequence(channel).absolute_row(self.position)
    }

    /// Apply a freshly fetched note.
    pub fn dispatch(&mut self, note: Note, song: &Song) -> Result<(), InvalidNoteReason> {
        match note {
            Note::Hold => {}
            Note::Instrument { index, pitch } => {
                self.active = ActiveNote::Instrument { index, pitch };
                self.frame = 0;
                self.note_mode = NoteKind::Instrument;
            }
            Note::Percussion { index } => {
                self.active = ActiveNote::Percussion { index };
                self.frame = 0;
                self.note_mode = NoteKind::Percussion;
            }
            Note::Pause => {
                let index = match (self.note_mode, self.active) {
                    (NoteKind::Instrument, ActiveNote::Instrument { index, .. }) => index,
                    _ => return Err(InvalidNoteReason::PauseWithoutInstrument),
                };
                self.frame = song.instruments[index].sustain_start();
                self.note_mode = NoteKind::Hold;
            }
            Note::Slide { delta } => {
                let (index, pitch) = match (self.note_mode, self.active) {
                    (NoteKind::Instrument, ActiveNote::Instrument { index, pitch }) => (index, pitch),
                    _ => return Err(InvalidNoteReason::SlideWithoutInstrument),
                };
                let slid = i16::from(pitch) + i16::from(delta);
                let max = i16::from(song.instruments[index].max_pitch());
                if slid < 0 || slid % 32 >= i16::from(MAX_PITCH) || slid > max {
                    return Err(InvalidNoteReason::SlideOutOfRange { pitch: slid });
                }
                self.active = ActiveNote::Instrument {
                    index,
                    pitch: slid as u8,
                };
            }
        }
        Ok(())
    }

    /// Register values for this tick; advances the envelope.
    pub fn output(&mut self, song: &Song, overlay_policy: OverlayPolicy) -> ChannelOutput {
        match self.active {
            ActiveNote::None => ChannelOutput::SILENT,
            ActiveNote::Instrument { index, pitch } => {
                let instrument = &song.instruments[index];
                let aud_c = instrument.aud_c_value(pitch);
                if self.frame >= instrument.envelope_length() {
                    return ChannelOutput::new(aud_c, 0, 0);
                }
                let output = ChannelOutput::new(
                    aud_c,
                    hardware_pitch(pitch, instrument.frequencies()[self.frame]),
                    instrument.volumes()[self.frame],
                );
                self.frame = step_instrument_frame(instrument, self.frame, false).0;
                output
            }
            ActiveNote::Percussion { index } => {
                let percussion = &song.percussion[index];
                let length = percussion.envelope_length();
                if self.frame < length {
                    let output = percussion_frame(song, index, self.frame);
                    self.frame = step_percussion_frame(percussion, self.frame).0;
                    return output;
                }
                let last = length - 1;
                if percussion.overlay && overlay_policy == OverlayPolicy::HoldLastFrame {
                    percussion_frame(song, index, last)
                } else {
                    ChannelOutput::new(percussion.waveforms()[last].aud_c(), 0, 0)
                }
            }
        }
    }
}

/// Register values of one percussion frame.
pub(crate) fn percussion_frame(song: &Song, index: usize, frame: usize) -> ChannelOutput {
    let percussion = &song.percussion[index];
    ChannelOutput::new(
        percussion.waveforms()[frame].aud_c(),
        percussion.frequencies()[frame],
        percussion.volumes()[frame],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::{Distortion, Instrument, Percussion};

    fn song() -> Song {
        let mut song = Song::new("cursor");
        song.instruments[0] =
            Instrument::with_envelope("lead", Distortion::Buzzy, vec![9, 7, 5, 0], vec![0, -1, 1, 0], 1, 3)
                .unwrap();
        song.instruments[1] =
            Instrument::with_envelope("bass", Distortion::PureCombined, vec![8, 8], vec![0, 0], 0, 1).unwrap();
        song.percussion[0] = Percussion::with_envelope(
            "snare",
            vec![Distortion::WhiteNoise, Distortion::Buzzy],
            vec![4, 9],
            vec![12, 6],
            false,
        )
        .unwrap();
        song
    }

    #[test]
    fn test_instrument_output_loops_sustain() {
        let song = song();
        let mut cursor = ChannelCursor::new(SequencePosition::default());
        cursor.dispatch(Note::Instrument { index: 0, pitch: 10 }, &song).unwrap();
        let outputs: Vec<ChannelOutput> = (0..5).map(|_| cursor.output(&song, OverlayPolicy::default())).collect();
        assert_eq!(
            outputs,
            vec![
                ChannelOutput::new(1, 10, 9),
                ChannelOutput::new(1, 9, 7),
                ChannelOutput::new(1, 11, 5),
                ChannelOutput::new(1, 9, 7),
                ChannelOutput::new(1, 11, 5),
            ]
        );
    }

    #[test]
    fn test_pause_requires_held_instrument() {
        let song = song();
        let mut cursor = ChannelCursor::new(SequencePosition::default());
        assert_eq!(
            cursor.dispatch(Note::Pause, &song),
            Err(InvalidNoteReason::PauseWithoutInstrument)
        );
        cursor.dispatch(Note::Instrument { index: 0, pitch: 3 }, &song).unwrap();
        cursor.output(&song, OverlayPolicy::default());
        cursor.output(&song, OverlayPolicy::default());
        cursor.dispatch(Note::Pause, &song).unwrap();
        assert_eq!(cursor.frame(), 1);
        assert_eq!(cursor.note_mode(), NoteKind::Hold);
        // A second pause finds nothing held
        assert!(cursor.dispatch(Note::Pause, &song).is_err());
    }

    #[test]
    fn test_slide_keeps_envelope_and_checks_range() {
        let song = song();
        let mut cursor = ChannelCursor::new(SequencePosition::default());
        cursor.dispatch(Note::Instrument { index: 0, pitch: 28 }, &song).unwrap();
        cursor.output(&song, OverlayPolicy::default());
        cursor.dispatch(Note::Slide { delta: 2 }, &song).unwrap();
        assert_eq!(cursor.active(), ActiveNote::Instrument { index: 0, pitch: 30 });
        assert_eq!(cursor.frame(), 1);
        assert_eq!(
            cursor.dispatch(Note::Slide { delta: 1 }, &song),
            Err(InvalidNoteReason::SlideOutOfRange { pitch: 31 })
        );
        assert_eq!(
            cursor.dispatch(Note::Slide { delta: -31 }, &song),
            Err(InvalidNoteReason::SlideOutOfRange { pitch: -1 })
        );
    }

    #[test]
    fn test_slide_after_percussion_is_invalid() {
        let song = song();
        let mut cursor = ChannelCursor::new(SequencePosition::default());
        cursor.dispatch(Note::Percussion { index: 0 }, &song).unwrap();
        assert_eq!(
            cursor.dispatch(Note::Slide { delta: 1 }, &song),
            Err(InvalidNoteReason::SlideWithoutInstrument)
        );
    }

    #[test]
    fn test_combined_pitch_folds_into_low_waveform() {
        let song = song();
        let mut cursor = ChannelCursor::new(SequencePosition::default());
        cursor.dispatch(Note::Instrument { index: 1, pitch: 40 }, &song).unwrap();
        assert_eq!(cursor.output(&song, OverlayPolicy::default()), ChannelOutput::new(12, 8, 8));
    }

    #[test]
    fn test_exhausted_percussion() {
        let mut song = song();
        let mut cursor = ChannelCursor::new(SequencePosition::default());
        cursor.dispatch(Note::Percussion { index: 0 }, &song).unwrap();
        assert_eq!(cursor.output(&song, OverlayPolicy::default()), ChannelOutput::new(8, 4, 12));
        assert_eq!(cursor.output(&song, OverlayPolicy::default()), ChannelOutput::new(1, 9, 6));
        assert_eq!(cursor.output(&song, OverlayPolicy::default()), ChannelOutput::new(1, 0, 0));

        song.percussion[0].overlay = true;
        assert_eq!(cursor.output(&song, OverlayPolicy::HoldLastFrame), ChannelOutput::new(1, 9, 6));
        assert_eq!(cursor.output(&song, OverlayPolicy::Silence), ChannelOutput::new(1, 0, 0));
    }
}
