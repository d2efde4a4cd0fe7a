//! Envelope Frame Arithmetic
//!
//! Frame stepping shared by instrument and percussion playback, and the
//! pitch combination that feeds the AUDF register. Everything here is pure;
//! callers keep `frame` inside the envelope.

use crate::song::distortion::MAX_PITCH;
use crate::song::{Instrument, Percussion};

/// Step an instrument envelope past `frame`.
///
/// Returns the next frame and whether the envelope is finished. A held
/// (non one-shot) note wraps from the last sustain frame back to
/// `sustain_start`; a one-shot note runs straight through into the release
/// region. When `done` is set the returned frame equals the envelope length.
pub fn step_instrument_frame(instrument: &Instrument, frame: usize, one_shot: bool) -> (usize, bool) {
    let next = frame + 1;
    if !one_shot && next == instrument.release_start() {
        (instrument.sustain_start(), false)
    } else {
        (next, next >= instrument.envelope_length())
    }
}

/// Step a percussion envelope past `frame`.
pub fn step_percussion_frame(percussion: &Percussion, frame: usize) -> (usize, bool) {
    let next = frame + 1;
    (next, next >= percussion.envelope_length())
}

/// AUDF value for a note at `base_pitch` with envelope delta `delta`.
///
/// Pitches above 31 belong to the upper half of the combined waveform and
/// are folded down by 32. Negative sums wrap like the 8-bit register does.
pub fn hardware_pitch(base_pitch: u8, delta: i8) -> u8 {
    let base = if base_pitch > MAX_PITCH {
        base_pitch - (MAX_PITCH + 1)
    } else {
        base_pitch
    };
    let sum = i16::from(base) + i16::from(delta);
    if sum < 0 {
        (sum + 256) as u8
    } else {
        sum as u8
    }
}
