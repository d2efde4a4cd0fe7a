//! TIA Distortion (Waveform) Selector
//!
//! The AUDC register selects one of sixteen polynomial-counter distortions.
//! Only the distinct ones are exposed here, plus the virtual `PureCombined`
//! waveform which spans two octaves by switching between `PureHigh` and
//! `PureLow` depending on the pitch value.

use std::fmt;

/// Highest pitch value playable in a single-waveform instrument.
pub const MAX_PITCH: u8 = 31;

/// Highest pitch value playable with [`Distortion::PureCombined`].
pub const MAX_COMBINED_PITCH: u8 = 63;

/// TIA distortion selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Distortion {
    /// AUDC 0: no sound
    Silent,
    /// AUDC 1
    #[default]
    Buzzy,
    /// AUDC 2
    BuzzyRumble,
    /// AUDC 3
    FlangyWavering,
    /// AUDC 4
    PureHigh,
    /// AUDC 6
    PureBuzzy,
    /// AUDC 7
    ReedyRumble,
    /// AUDC 8
    WhiteNoise,
    /// AUDC 12
    PureLow,
    /// AUDC 14
    ElectronicRumble,
    /// AUDC 15
    ElectronicSqueal,
    /// Virtual: `PureHigh` for pitches 0..=31, `PureLow` for 32..=63
    PureCombined,
}

impl Distortion {
    /// Raw AUDC register value.
    ///
    /// `PureCombined` has no register value of its own; it reports the
    /// `PureHigh` value here. Use [`Distortion::aud_c_for_pitch`] when the
    /// pitch is known.
    pub fn aud_c(self) -> u8 {
        match self {
            Distortion::Silent => 0,
            Distortion::Buzzy => 1,
            Distortion::BuzzyRumble => 2,
            Distortion::FlangyWavering => 3,
            Distortion::PureHigh | Distortion::PureCombined => 4,
            Distortion::PureBuzzy => 6,
            Distortion::ReedyRumble => 7,
            Distortion::WhiteNoise => 8,
            Distortion::PureLow => 12,
            Distortion::ElectronicRumble => 14,
            Distortion::ElectronicSqueal => 15,
        }
    }

    /// AUDC value for a note at `pitch`, resolving `PureCombined`.
    pub fn aud_c_for_pitch(self, pitch: u8) -> u8 {
        match self {
            Distortion::PureCombined if pitch > MAX_PITCH => Distortion::PureLow.aud_c(),
            Distortion::PureCombined => Distortion::PureHigh.aud_c(),
            other => other.aud_c(),
        }
    }

    /// Highest legal pitch value for notes using this distortion.
    pub fn max_pitch(self) -> u8 {
        if self == Distortion::PureCombined {
            MAX_COMBINED_PITCH
        } else {
            MAX_PITCH
        }
    }

    /// Whether this distortion may be used as a percussion frame waveform.
    pub fn is_real(self) -> bool {
        self != Distortion::PureCombined
    }
}

impl fmt::Display for Distortion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Distortion::Silent => "Silent",
            Distortion::Buzzy => "Buzzy",
            Distortion::BuzzyRumble => "Buzzy rumble",
            Distortion::FlangyWavering => "Flangy wavering",
            Distortion::PureHigh => "Pure high",
            Distortion::PureBuzzy => "Pure buzzy",
            Distortion::ReedyRumble => "Reedy rumble",
            Distortion::WhiteNoise => "White noise",
            Distortion::PureLow => "Pure low",
            Distortion::ElectronicRumble => "Electronic rumble",
            Distortion::ElectronicSqueal => "Electronic squeal",
            Distortion::PureCombined => "Pure combined",
        };
        write!(f, "{} ({})", name, self.aud_c())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_switches_octave() {
        assert_eq!(Distortion::PureCombined.aud_c_for_pitch(0), 4);
        assert_eq!(Distortion::PureCombined.aud_c_for_pitch(31), 4);
        assert_eq!(Distortion::PureCombined.aud_c_for_pitch(32), 12);
        assert_eq!(Distortion::PureCombined.aud_c_for_pitch(63), 12);
    }

    #[test]
    fn test_plain_waveform_ignores_pitch() {
        assert_eq!(Distortion::WhiteNoise.aud_c_for_pitch(5), 8);
        assert_eq!(Distortion::WhiteNoise.aud_c_for_pitch(40), 8);
        assert_eq!(Distortion::Buzzy.max_pitch(), 31);
        assert_eq!(Distortion::PureCombined.max_pitch(), 63);
    }
}
