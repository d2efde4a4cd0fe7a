//! Percussion One-Shots
//!
//! Percussion envelopes carry a waveform, an absolute pitch and a volume per
//! frame and always play from start to end with no sustain phase.

use super::distortion::{Distortion, MAX_PITCH};
use super::instrument::{check_length, shift_volumes, MAX_VOLUME};
use crate::{PlayerError, Result};

/// A one-shot percussion sound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Percussion {
    /// Display name
    pub name: String,
    /// Keep the last register values once the envelope is exhausted
    pub overlay: bool,
    waveforms: Vec<Distortion>,
    frequencies: Vec<u8>,
    volumes: Vec<u8>,
}

impl Default for Percussion {
    fn default() -> Self {
        Self::new("---")
    }
}

impl Percussion {
    /// Create an empty two-frame percussion.
    pub fn new(name: impl Into<String>) -> Self {
        Percussion {
            name: name.into(),
            overlay: false,
            waveforms: vec![Distortion::WhiteNoise; 2],
            frequencies: vec![0; 2],
            volumes: vec![0; 2],
        }
    }

    /// Build a percussion from complete envelope data.
    pub fn with_envelope(
        name: impl Into<String>,
        waveforms: Vec<Distortion>,
        frequencies: Vec<u8>,
        volumes: Vec<u8>,
        overlay: bool,
    ) -> Result<Self> {
        if waveforms.len() != frequencies.len() || waveforms.len() != volumes.len() {
            return Err(PlayerError::SongEdit(format!(
                "percussion envelopes differ in length ({} waveforms, {} frequencies, {} volumes)",
                waveforms.len(),
                frequencies.len(),
                volumes.len()
            )));
        }
        check_length(waveforms.len())?;
        for frame in 0..waveforms.len() {
            check_frame(frame, waveforms[frame], frequencies[frame], volumes[frame])?;
        }
        Ok(Percussion {
            name: name.into(),
            overlay,
            waveforms,
            frequencies,
            volumes,
        })
    }

    /// Number of frames in the envelope.
    pub fn envelope_length(&self) -> usize {
        self.volumes.len()
    }

    /// Per-frame waveforms.
    pub fn waveforms(&self) -> &[Distortion] {
        &self.waveforms
    }

    /// Per-frame absolute pitch values.
    pub fn frequencies(&self) -> &[u8] {
        &self.frequencies
    }

    /// Per-frame volumes.
    pub fn volumes(&self) -> &[u8] {
        &self.volumes
    }

    /// Overwrite one envelope frame.
    pub fn set_frame(&mut self, frame: usize, waveform: Distortion, pitch: u8, volume: u8) -> Result<()> {
        if frame >= self.envelope_length() {
            return Err(PlayerError::OutOfRange {
                what: "envelope frame",
                index: frame,
                len: self.envelope_length(),
            });
        }
        check_frame(frame, waveform, pitch, volume)?;
        self.waveforms[frame] = waveform;
        self.frequencies[frame] = pitch;
        self.volumes[frame] = volume;
        Ok(())
    }

    /// Grow (repeating the last waveform, silent) or truncate the envelope.
    pub fn set_envelope_length(&mut self, length: usize) -> Result<()> {
        check_length(length)?;
        let last_waveform = self.waveforms.last().copied().unwrap_or_default();
        self.waveforms.resize(length, last_waveform);
        self.frequencies.resize(length, 0);
        self.volumes.resize(length, 0);
        Ok(())
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

    /// A percussion whose every frame is silent.
    pub fn is_empty(&self) -> bool {
        self.volumes.iter().all(|&v| v == 0)
    }
}

fn check_frame(frame: usize, waveform: Distortion, pitch: u8, volume: u8) -> Result<()> {
    if !waveform.is_real() {
        return Err(PlayerError::SongEdit(format!(
            "frame {}: {} is not a hardware waveform",
            frame, waveform
        )));
    }
    if pitch > MAX_PITCH || volume > MAX_VOLUME {
        return Err(PlayerError::SongEdit(format!(
            "frame {}: pitch {} / volume {} out of range",
            frame, pitch, volume
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_mismatched_arrays() {
        let result = Percussion::with_envelope(
            "kick",
            vec![Distortion::Buzzy; 3],
            vec![0; 2],
            vec![0; 3],
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_virtual_waveform() {
        let mut perc = Percussion::new("snare");
        assert!(perc.set_frame(0, Distortion::PureCombined, 3, 8).is_err());
        assert!(perc.set_frame(0, Distortion::WhiteNoise, 32, 8).is_err());
        perc.set_frame(0, Distortion::WhiteNoise, 3, 8).unwrap();
        assert!(!perc.is_empty());
    }

    #[test]
    fn test_grow_repeats_last_waveform() {
        let mut perc = Percussion::with_envelope(
            "hat",
            vec![Distortion::WhiteNoise, Distortion::PureHigh],
            vec![1, 2],
            vec![10, 5],
            false,
        )
        .unwrap();
        perc.set_envelope_length(4).unwrap();
        assert_eq!(perc.waveforms()[3], Distortion::PureHigh);
        assert_eq!(perc.volumes(), &[10, 5, 0, 0]);
    }
}
