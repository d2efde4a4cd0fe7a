//! Melodic Instruments
//!
//! An instrument is a pair of equal-length frame arrays (volume and signed
//! pitch delta) split into three regions by two phase markers:
//!
//! ```text
//! 0 ........ sustain_start ........ release_start ........ envelope_length
//! |  attack   |   sustain loop        |   release (one-shot)   |
//! ```
//!
//! The sustain region loops while the note is held. Edits keep
//! `sustain_start < release_start < envelope_length` at all times.

use super::distortion::Distortion;
use crate::{PlayerError, Result};

/// Shortest allowed envelope (one sustain frame, one release frame).
pub const ENVELOPE_MIN_LENGTH: usize = 2;

/// Longest allowed envelope.
pub const ENVELOPE_MAX_LENGTH: usize = 99;

/// Loudest AUDV value.
pub const MAX_VOLUME: u8 = 15;

/// Lowest pitch delta an instrument frame may apply.
pub const MIN_FREQUENCY_DELTA: i8 = -8;

/// Highest pitch delta an instrument frame may apply.
pub const MAX_FREQUENCY_DELTA: i8 = 7;

/// A melodic instrument with an attack/sustain/release envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    /// Display name
    pub name: String,
    /// Waveform used for every frame
    pub distortion: Distortion,
    volumes: Vec<u8>,
    frequencies: Vec<i8>,
    sustain_start: usize,
    release_start: usize,
}

impl Default for Instrument {
    fn default() -> Self {
        Self::new("---")
    }
}

impl Instrument {
    /// Create an empty two-frame instrument.
    pub fn new(name: impl Into<String>) -> Self {
        Instrument {
            name: name.into(),
            distortion: Distortion::PureCombined,
            volumes: vec![0; ENVELOPE_MIN_LENGTH],
            frequencies: vec![0; ENVELOPE_MIN_LENGTH],
            sustain_start: 0,
            release_start: 1,
        }
    }

    /// Build an instrument from complete envelope data.
    ///
    /// # Errors
    /// Returns [`PlayerError::SongEdit`] if the arrays differ in length, the
    /// length is out of range, a frame value is out of range or the phase
    /// markers are not ordered `sustain_start < release_start < length`.
    pub fn with_envelope(
        name: impl Into<String>,
        distortion: Distortion,
        volumes: Vec<u8>,
        frequencies: Vec<i8>,
        sustain_start: usize,
        release_start: usize,
    ) -> Result<Self> {
        if volumes.len() != frequencies.len() {
            return Err(PlayerError::SongEdit(format!(
                "volume envelope has {} frames but frequency envelope has {}",
                volumes.len(),
                frequencies.len()
            )));
        }
        check_length(volumes.len())?;
        for (frame, (&volume, &delta)) in volumes.iter().zip(&frequencies).enumerate() {
            check_frame(frame, volume, delta)?;
        }
        let mut instrument = Instrument {
            name: name.into(),
            distortion,
            volumes,
            frequencies,
            sustain_start: 0,
            release_start: 1,
        };
        instrument.set_sustain_and_release(sustain_start, release_start)?;
        Ok(instrument)
    }

    /// Number of frames in the envelope.
    pub fn envelope_length(&self) -> usize {
        self.volumes.len()
    }

    /// First frame of the sustain loop.
    pub fn sustain_start(&self) -> usize {
        self.sustain_start
    }

    /// First frame of the release region.
    pub fn release_start(&self) -> usize {
        self.release_start
    }

    /// Volume envelope.
    pub fn volumes(&self) -> &[u8] {
        &self.volumes
    }

    /// Pitch delta envelope.
    pub fn frequencies(&self) -> &[i8] {
        &self.frequencies
    }

    /// Overwrite one envelope frame.
    pub fn set_frame(&mut self, frame: usize, volume: u8, delta: i8) -> Result<()> {
        if frame >= self.envelope_length() {
            return Err(PlayerError::OutOfRange {
                what: "envelope frame",
                index: frame,
                len: self.envelope_length(),
            });
        }
        check_frame(frame, volume, delta)?;
        self.volumes[frame] = volume;
        self.frequencies[frame] = delta;
        Ok(())
    }

    /// Grow (with silent frames) or truncate the envelope.
    ///
    /// Phase markers that fall off the end are pulled back so that at least
    /// one release frame and one sustain frame remain.
    pub fn set_envelope_length(&mut self, length: usize) -> Result<()> {
        check_length(length)?;
        self.volumes.resize(length, 0);
        self.frequencies.resize(length, 0);
        self.validate_sustain_release();
        Ok(())
    }

    /// Move both phase markers at once.
    pub fn set_sustain_and_release(&mut self, sustain_start: usize, release_start: usize) -> Result<()> {
        if sustain_start >= release_start || release_start >= self.envelope_length() {
            return Err(PlayerError::SongEdit(format!(
                "sustain start {} and release start {} must satisfy sustain < release < {}",
                sustain_start,
                release_start,
                self.envelope_length()
            )));
        }
        self.sustain_start = sustain_start;
        self.release_start = release_start;
        Ok(())
    }

    fn validate_sustain_release(&mut self) {
        let length = self.envelope_length();
        if self.release_start >= length {
            self.release_start = length - 1;
        }
        if self.sustain_start >= self.release_start {
            self.sustain_start = self.release_start - 1;
        }
    }

    /// Quietest frame volume.
    pub fn min_volume(&self) -> u8 {
        self.volumes.iter().copied().min().unwrap_or(0)
    }

    /// Loudest frame volume.
    pub fn max_volume(&self) -> u8 {
        self.volumes.iter().copied().max().unwrap_or(0)
    }

    /// Shift the whole volume envelope so that its peak becomes `peak`.
    pub fn set_peak_volume(&mut self, peak: u8) -> Result<()> {
        self.volumes = shift_volumes(&self.volumes, peak)?;
        Ok(())
    }

    /// An instrument with an all-zero envelope produces no sound.
    pub fn is_empty(&self) -> bool {
        self.volumes.iter().all(|&v| v == 0) && self.frequencies.iter().all(|&f| f == 0)
    }

    /// Highest pitch value a note for this instrument may use.
    pub fn max_pitch(&self) -> u8 {
        self.distortion.max_pitch()
    }

    /// AUDC value for a note of this instrument at `pitch`.
    pub fn aud_c_value(&self, pitch: u8) -> u8 {
        self.distortion.aud_c_for_pitch(pitch)
    }
}

pub(crate) fn check_length(length: usize) -> Result<()> {
    if !(ENVELOPE_MIN_LENGTH..=ENVELOPE_MAX_LENGTH).contains(&length) {
        return Err(PlayerError::SongEdit(format!(
            "envelope length {} outside {}..={}",
            length, ENVELOPE_MIN_LENGTH, ENVELOPE_MAX_LENGTH
        )));
    }
    Ok(())
}

fn check_frame(frame: usize, volume: u8, delta: i8) -> Result<()> {
    if volume > MAX_VOLUME {
        return Err(PlayerError::SongEdit(format!(
            "frame {}: volume {} exceeds {}",
            frame, volume, MAX_VOLUME
        )));
    }
    if !(MIN_FREQUENCY_DELTA..=MAX_FREQUENCY_DELTA).contains(&delta) {
        return Err(PlayerError::SongEdit(format!(
            "frame {}: pitch delta {} outside {}..={}",
            frame, delta, MIN_FREQUENCY_DELTA, MAX_FREQUENCY_DELTA
        )));
    }
    Ok(())
}

pub(crate) fn shift_volumes(volumes: &[u8], peak: u8) -> Result<Vec<u8>> {
    let max = volumes.iter().copied().max().unwrap_or(0) as i16;
    let min = volumes.iter().copied().min().unwrap_or(0) as i16;
    let shift = peak as i16 - max;
    if peak > MAX_VOLUME || min + shift < 0 {
        return Err(PlayerError::SongEdit(format!(
            "peak volume {} would push the envelope outside 0..={}",
            peak, MAX_VOLUME
        )));
    }
    Ok(volumes.iter().map(|&v| (v as i16 + shift) as u8).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adsr() -> Instrument {
        Instrument::with_envelope(
            "lead",
            Distortion::PureCombined,
            vec![8, 12, 10, 6, 2, 0],
            vec![0, 1, 0, -1, 0, 0],
            2,
            4,
        )
        .unwrap()
    }

    #[test]
    fn test_new_instrument_is_empty() {
        let ins = Instrument::new("---");
        assert!(ins.is_empty());
        assert_eq!(ins.envelope_length(), 2);
        assert_eq!(ins.sustain_start(), 0);
        assert_eq!(ins.release_start(), 1);
    }

    #[test]
    fn test_rejects_unordered_markers() {
        let mut ins = adsr();
        assert!(ins.set_sustain_and_release(3, 3).is_err());
        assert!(ins.set_sustain_and_release(1, 6).is_err());
        assert!(ins.set_sustain_and_release(0, 5).is_ok());
    }

    #[test]
    fn test_shrinking_pulls_markers_back() {
        let mut ins = adsr();
        ins.set_envelope_length(3).unwrap();
        assert_eq!(ins.envelope_length(), 3);
        assert_eq!(ins.release_start(), 2);
        assert_eq!(ins.sustain_start(), 1);

        ins.set_envelope_length(2).unwrap();
        assert_eq!(ins.release_start(), 1);
        assert_eq!(ins.sustain_start(), 0);
    }

    #[test]
    fn test_growing_appends_silent_frames() {
        let mut ins = adsr();
        ins.set_envelope_length(8).unwrap();
        assert_eq!(&ins.volumes()[6..], &[0, 0]);
        assert_eq!(&ins.frequencies()[6..], &[0, 0]);
        assert_eq!(ins.release_start(), 4);
        assert!(ins.set_envelope_length(1).is_err());
        assert!(ins.set_envelope_length(ENVELOPE_MAX_LENGTH + 1).is_err());
    }

    #[test]
    fn test_peak_volume_shift() {
        let mut ins = adsr();
        ins.set_peak_volume(15).unwrap();
        assert_eq!(ins.max_volume(), 15);
        assert_eq!(ins.min_volume(), 3);
        // Would push the zero frame below 0
        let mut ins = adsr();
        assert!(ins.set_peak_volume(11).is_err());
    }

    #[test]
    fn test_frame_value_ranges() {
        let mut ins = adsr();
        assert!(ins.set_frame(0, 16, 0).is_err());
        assert!(ins.set_frame(0, 5, -9).is_err());
        assert!(ins.set_frame(9, 5, 0).is_err());
        ins.set_frame(0, 5, -8).unwrap();
        assert_eq!(ins.volumes()[0], 5);
        assert_eq!(ins.frequencies()[0], -8);
    }
}
