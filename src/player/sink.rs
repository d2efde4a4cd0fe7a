//! Hardware Sink Abstraction
//!
//! The engine hands each channel's register values to a [`HardwareSink`] once
//! per tick. Actual synthesis is the sink's business; the two sinks shipped
//! here only store what they are given.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::NUM_CHANNELS;

/// Register values for one channel on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChannelOutput {
    /// AUDC distortion selector (0-15)
    pub distortion: u8,
    /// AUDF pitch divider (0-255)
    pub pitch: u8,
    /// AUDV volume (0-15)
    pub volume: u8,
}

impl ChannelOutput {
    /// All registers zero.
    pub const SILENT: ChannelOutput = ChannelOutput {
        distortion: 0,
        pitch: 0,
        volume: 0,
    };

    /// Create an output tuple.
    pub const fn new(distortion: u8, pitch: u8, volume: u8) -> Self {
        ChannelOutput {
            distortion,
            pitch,
            volume,
        }
    }

    /// Whether the channel is inaudible.
    pub fn is_silent(&self) -> bool {
        self.volume == 0
    }
}

/// Receiver of per-tick register values.
///
/// The engine calls [`write_channel`](HardwareSink::write_channel) exactly
/// once per channel per tick, channel 0 first, then
/// [`end_frame`](HardwareSink::end_frame).
///
/// # Example
///
/// ```
/// use tia_player::player::{ChannelOutput, HardwareSink};
///
/// struct Printer;
///
/// impl HardwareSink for Printer {
///     fn write_channel(&mut self, channel: usize, output: ChannelOutput) {
///         println!("ch{}: {:?}", channel, output);
///     }
/// }
/// ```
pub trait HardwareSink: Send {
    /// Latch the registers of `channel` for the current tick.
    fn write_channel(&mut self, channel: usize, output: ChannelOutput);

    /// Called after both channels were written.
    fn end_frame(&mut self) {}
}

impl<S: HardwareSink + ?Sized> HardwareSink for Box<S> {
    fn write_channel(&mut self, channel: usize, output: ChannelOutput) {
        (**self).write_channel(channel, output);
    }

    fn end_frame(&mut self) {
        (**self).end_frame();
    }
}

/// Sink that keeps only the latest values per channel.
///
/// Clones share the same register file, so a caller can keep a handle while
/// the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    registers: Arc<Mutex<[ChannelOutput; NUM_CHANNELS]>>,
}

impl RegisterFile {
    /// Create a register file with all registers cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current registers of both channels.
    pub fn snapshot(&self) -> [ChannelOutput; NUM_CHANNELS] {
        *self.registers.lock()
    }

    /// Current registers of one channel.
    pub fn channel(&self, channel: usize) -> ChannelOutput {
        self.registers.lock()[channel]
    }
}

impl HardwareSink for RegisterFile {
    fn write_channel(&mut self, channel: usize, output: ChannelOutput) {
        self.registers.lock()[channel] = output;
    }
}

#[derive(Debug, Default)]
struct Recording {
    pending: [ChannelOutput; NUM_CHANNELS],
    frames: Vec<[ChannelOutput; NUM_CHANNELS]>,
}

/// Sink that records every tick.
///
/// Clones share the same recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingSink {
    /// Create an empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded tick, oldest first.
    pub fn frames(&self) -> Vec<[ChannelOutput; NUM_CHANNELS]> {
        self.recording.lock().frames.clone()
    }

    /// Recorded values of one channel, oldest first.
    pub fn channel(&self, channel: usize) -> Vec<ChannelOutput> {
        self.recording
            .lock()
            .frames
            .iter()
            .map(|frame| frame[channel])
            .collect()
    }

    /// Most recent tick, if any.
    pub fn last(&self) -> Option<[ChannelOutput; NUM_CHANNELS]> {
        self.recording.lock().frames.last().copied()
    }

    /// Number of recorded ticks.
    pub fn len(&self) -> usize {
        self.recording.lock().frames.len()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the recording.
    pub fn take(&self) -> Vec<[ChannelOutput; NUM_CHANNELS]> {
        std::mem::take(&mut self.recording.lock().frames)
    }
}

impl HardwareSink for RecordingSink {
    fn write_channel(&mut self, channel: usize, output: ChannelOutput) {
        self.recording.lock().pending[channel] = output;
    }

    fn end_frame(&mut self) {
        let mut recording = self.recording.lock();
        let frame = recording.pending;
        recording.frames.push(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_file_keeps_latest() {
        let handle = RegisterFile::new();
        let mut sink = handle.clone();
        sink.write_channel(0, ChannelOutput::new(4, 10, 8));
        sink.write_channel(0, ChannelOutput::new(8, 3, 2));
        sink.write_channel(1, ChannelOutput::new(1, 1, 1));
        assert_eq!(handle.channel(0), ChannelOutput::new(8, 3, 2));
        assert_eq!(handle.snapshot()[1], ChannelOutput::new(1, 1, 1));
    }

    #[test]
    fn test_recording_groups_ticks() {
        let handle = RecordingSink::new();
        let mut sink: Box<dyn HardwareSink> = Box::new(handle.clone());
        for volume in 0..3 {
            sink.write_channel(0, ChannelOutput::new(4, 0, volume));
            sink.write_channel(1, ChannelOutput::SILENT);
            sink.end_frame();
        }
        assert_eq!(handle.len(), 3);
        let volumes: Vec<u8> = handle.channel(0).iter().map(|o| o.volume).collect();
        assert_eq!(volumes, vec![0, 1, 2]);
        assert!(handle.channel(1).iter().all(ChannelOutput::is_silent));
        assert_eq!(handle.take().len(), 3);
        assert!(handle.is_empty());
    }
}
