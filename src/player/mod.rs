//! Playback State Machine Domain
//!
//! The tick-driven engine. Each call to [`Player::tick`] advances the current
//! play mode by one frame and hands one register tuple per channel to the
//! [`HardwareSink`].
//!
//! Modes:
//! - `Idle`: both channels silent
//! - `Instrument` / `InstrumentOnce`: preview one instrument on channel 0,
//!   with or without its sustain loop
//! - `Percussion`: preview one percussion on channel 0
//! - `Waveform`: a fixed tone on channel 0
//! - `Track`: both channel sequences, tempo-locked to one row grid
//!
//! The song is locked for the whole of a tick, and commands that read song
//! data lock it as well. Whoever owns the player must not hold the song lock
//! while calling into it.

pub mod channel;
pub mod events;
pub mod sink;

pub use channel::{ActiveNote, ChannelCursor};
pub use events::{InvalidNoteReason, InvalidNoteReport, PlayerEvent};
pub use sink::{ChannelOutput, HardwareSink, RecordingSink, RegisterFile};

use bitflags::bitflags;
use crossbeam_channel::Receiver;
use log::{debug, trace, warn};

use crate::config::{OverlayPolicy, PlayerConfig};
use crate::envelope::{hardware_pitch, step_instrument_frame, step_percussion_frame};
use crate::song::distortion::{MAX_COMBINED_PITCH, MAX_PITCH};
use crate::song::instrument::MAX_VOLUME;
use crate::song::{Distortion, Song, SongStore};
use crate::{PlayerError, Result, NUM_CHANNELS, NUM_INSTRUMENTS, NUM_PERCUSSION};

use channel::percussion_frame;
use events::EventQueue;

/// Top-level play mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlayMode {
    /// Silence
    #[default]
    Idle,
    /// Held instrument preview
    Instrument,
    /// Instrument preview without sustain loop
    InstrumentOnce,
    /// Percussion preview
    Percussion,
    /// Static tone
    Waveform,
    /// Two-channel sequencer
    Track,
}

bitflags! {
    /// Set of muted channels
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChannelMask: u8 {
        /// Channel 0
        const CHANNEL_0 = 0x01;
        /// Channel 1
        const CHANNEL_1 = 0x02;
    }
}

impl ChannelMask {
    /// Mask bit of `channel`.
    ///
    /// # Panics
    /// Panics if `channel` is not 0 or 1.
    pub fn channel(channel: usize) -> Self {
        assert!(channel < NUM_CHANNELS, "channel {} out of range", channel);
        ChannelMask::from_bits_truncate(1u8 << channel)
    }

    /// Mask of every listed channel.
    pub fn from_channels(channels: &[usize]) -> Self {
        channels
            .iter()
            .fold(ChannelMask::empty(), |mask, &ch| mask | ChannelMask::channel(ch))
    }
}

/// State of the single-voice preview modes.
#[derive(Debug, Clone, Copy, Default)]
struct Preview {
    index: usize,
    pitch: u8,
    frame: usize,
    waveform: ChannelOutput,
}

/// The playback engine.
pub struct Player<S: HardwareSink> {
    store: SongStore,
    sink: S,
    events: EventQueue,
    mode: PlayMode,
    muted: ChannelMask,
    overlay_policy: OverlayPolicy,
    preview: Preview,
    channels: [ChannelCursor; NUM_CHANNELS],
    row_ticks: i32,
    tick_count: u64,
}

impl<S: HardwareSink> Player<S> {
    /// Create a player with the default configuration.
    pub fn new(store: SongStore, sink: S) -> Self {
        Self::build(store, sink, &PlayerConfig::default())
    }

    /// Create a player using `config` for mutes, overlay policy and queue
    /// size.
    ///
    /// # Errors
    /// Returns [`PlayerError::ConfigError`] if `config` does not validate.
    pub fn with_config(store: SongStore, sink: S, config: &PlayerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(store, sink, config))
    }

    fn build(store: SongStore, sink: S, config: &PlayerConfig) -> Self {
        Player {
            store,
            sink,
            events: EventQueue::bounded(config.event_capacity.max(1)),
            mode: PlayMode::Idle,
            muted: ChannelMask::from_channels(&config.muted_channels),
            overlay_policy: config.overlay_policy,
            preview: Preview::default(),
            channels: [
                ChannelCursor::new(Default::default()),
                ChannelCursor::new(Default::default()),
            ],
            row_ticks: 0,
            tick_count: 0,
        }
    }

    /// Receiver for engine notifications.
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.events.receiver()
    }

    /// Current play mode.
    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    /// Whether anything but silence is playing.
    pub fn is_playing(&self) -> bool {
        self.mode != PlayMode::Idle
    }

    /// Ticks processed since creation.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Track cursor of `channel`.
    pub fn cursor(&self, channel: usize) -> &ChannelCursor {
        &self.channels[channel]
    }

    /// The hardware sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The hardware sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Song store this player reads from.
    pub fn store(&self) -> &SongStore {
        &self.store
    }

    /// Exhausted overlay percussion behaviour.
    pub fn overlay_policy(&self) -> OverlayPolicy {
        self.overlay_policy
    }

    /// Change the exhausted overlay percussion behaviour.
    pub fn set_overlay_policy(&mut self, policy: OverlayPolicy) {
        self.overlay_policy = policy;
    }

    /// Mute or unmute a channel. Muted channels keep advancing but emit
    /// zeros.
    pub fn set_muted(&mut self, channel: usize, muted: bool) {
        self.muted.set(ChannelMask::channel(channel), muted);
        debug!("Channel {} {}", channel, if muted { "muted" } else { "unmuted" });
    }

    /// Flip the mute state of a channel.
    pub fn toggle_mute(&mut self, channel: usize) {
        let muted = !self.is_muted(channel);
        self.set_muted(channel, muted);
    }

    /// Whether `channel` is muted.
    pub fn is_muted(&self, channel: usize) -> bool {
        self.muted.contains(ChannelMask::channel(channel))
    }

    /// Go silent.
    pub fn silence(&mut self) {
        self.set_mode(PlayMode::Idle);
    }

    /// Preview an instrument with its sustain loop until stopped.
    pub fn play_instrument(&mut self, index: usize, pitch: u8) -> Result<()> {
        self.start_instrument(index, pitch, PlayMode::Instrument)
    }

    /// Preview an instrument once through, ignoring the sustain loop.
    pub fn play_instrument_once(&mut self, index: usize, pitch: u8) -> Result<()> {
        self.start_instrument(index, pitch, PlayMode::InstrumentOnce)
    }

    /// Release the previewed instrument: jump to its release region, which
    /// then plays out.
    pub fn stop_instrument(&mut self) {
        if !matches!(self.mode, PlayMode::Instrument | PlayMode::InstrumentOnce) {
            return;
        }
        let release_start = self.store.lock().instruments[self.preview.index].release_start();
        self.preview.frame = release_start;
        debug!("Instrument {} released at frame {}", self.preview.index, release_start);
    }

    /// Preview a percussion.
    pub fn play_percussion(&mut self, index: usize) -> Result<()> {
        check_index("percussion", index, NUM_PERCUSSION)?;
        self.preview = Preview {
            index,
            ..Preview::default()
        };
        self.set_mode(PlayMode::Percussion);
        Ok(())
    }

    /// Cut a percussion preview.
    pub fn stop_percussion(&mut self) {
        if self.mode == PlayMode::Percussion {
            self.set_mode(PlayMode::Idle);
        }
    }

    /// Sound a fixed tone on channel 0.
    pub fn play_waveform(&mut self, distortion: Distortion, pitch: u8, volume: u8) -> Result<()> {
        if !distortion.is_real() || pitch > MAX_PITCH || volume > MAX_VOLUME {
            return Err(PlayerError::SongEdit(format!(
                "cannot play {} at pitch {} volume {}",
                distortion, pitch, volume
            )));
        }
        self.preview.waveform = ChannelOutput::new(distortion.aud_c(), pitch, volume);
        self.set_mode(PlayMode::Waveform);
        Ok(())
    }

    /// Start the sequencer with channel 0 at absolute row `start0` and
    /// channel 1 at `start1`.
    ///
    /// # Errors
    /// Returns [`PlayerError::OutOfRange`] if a start row lies beyond the end
    /// of its channel.
    pub fn play_track(&mut self, start0: usize, start1: usize) -> Result<()> {
        let store = self.store.clone();
        let song = store.lock();
        let mut cursors = Vec::with_capacity(NUM_CHANNELS);
        for (channel, start) in [start0, start1].into_iter().enumerate() {
            let position = song
                .sequence(channel)
                .resolve(song.patterns(), start)
                .ok_or(PlayerError::OutOfRange {
                    what: "start row",
                    index: start,
                    len: song.channel_num_rows(channel),
                })?;
            cursors.push(ChannelCursor::new(position));
        }
        drop(song);
        for (slot, cursor) in self.channels.iter_mut().zip(cursors) {
            *slot = cursor;
        }
        self.row_ticks = 0;
        debug!("Track starts at rows {}/{}", start0, start1);
        self.set_mode(PlayMode::Track);
        Ok(())
    }

    /// Stop the sequencer.
    pub fn stop_track(&mut self) {
        if self.mode == PlayMode::Track {
            self.set_mode(PlayMode::Idle);
        }
    }

    /// Advance one frame and emit both channels.
    pub fn tick(&mut self) {
        let store = self.store.clone();
        let song = store.lock();
        let outputs = match self.mode {
            PlayMode::Idle => [ChannelOutput::SILENT; NUM_CHANNELS],
            PlayMode::Instrument | PlayMode::InstrumentOnce => [self.tick_instrument(&song), ChannelOutput::SILENT],
            PlayMode::Percussion => [self.tick_percussion(&song), ChannelOutput::SILENT],
            PlayMode::Waveform => [self.preview.waveform, ChannelOutput::SILENT],
            PlayMode::Track => self.tick_track(&song),
        };
        drop(song);

        for (channel, output) in outputs.into_iter().enumerate() {
            let gated = if self.is_muted(channel) {
                ChannelOutput::SILENT
            } else {
                output
            };
            self.sink.write_channel(channel, gated);
        }
        self.sink.end_frame();
        self.tick_count += 1;
    }

    fn start_instrument(&mut self, index: usize, pitch: u8, mode: PlayMode) -> Result<()> {
        check_index("instrument", index, NUM_INSTRUMENTS)?;
        if pitch > MAX_COMBINED_PITCH {
            return Err(PlayerError::SongEdit(format!(
                "pitch {} exceeds {}",
                pitch, MAX_COMBINED_PITCH
            )));
        }
        self.preview = Preview {
            index,
            pitch,
            ..Preview::default()
        };
        self.set_mode(mode);
        Ok(())
    }

    fn tick_instrument(&mut self, song: &Song) -> ChannelOutput {
        let instrument = &song.instruments[self.preview.index];
        let frame = self.preview.frame;
        if frame >= instrument.envelope_length() {
            // Envelope shrank under us
            self.set_mode(PlayMode::Idle);
            return ChannelOutput::SILENT;
        }
        let output = ChannelOutput::new(
            instrument.aud_c_value(self.preview.pitch),
            hardware_pitch(self.preview.pitch, instrument.frequencies()[frame]),
            instrument.volumes()[frame],
        );
        let (next, done) = step_instrument_frame(instrument, frame, self.mode == PlayMode::InstrumentOnce);
        self.preview.frame = next;
        if done {
            self.set_mode(PlayMode::Idle);
        }
        output
    }

    fn tick_percussion(&mut self, song: &Song) -> ChannelOutput {
        let index = self.preview.index;
        let percussion = &song.percussion[index];
        let length = percussion.envelope_length();
        let holds_last = percussion.overlay && self.overlay_policy == OverlayPolicy::HoldLastFrame;
        if self.preview.frame < length {
            let output = percussion_frame(song, index, self.preview.frame);
            let (next, done) = step_percussion_frame(percussion, self.preview.frame);
            self.preview.frame = next;
            if done && !holds_last {
                self.set_mode(PlayMode::Idle);
            }
            return output;
        }
        if holds_last {
            percussion_frame(song, index, length - 1)
        } else {
            // Envelope shrank under us
            self.set_mode(PlayMode::Idle);
            ChannelOutput::SILENT
        }
    }

    fn tick_track(&mut self, song: &Song) -> [ChannelOutput; NUM_CHANNELS] {
        self.row_ticks -= 1;
        if self.row_ticks < 0 && !self.sequence_row(song) {
            return [ChannelOutput::SILENT; NUM_CHANNELS];
        }
        let policy = self.overlay_policy;
        [
            self.channels[0].output(song, policy),
            self.channels[1].output(song, policy),
        ]
    }

    /// Fetch and dispatch the next row on both channels. Returns `false` if
    /// playback stopped.
    fn sequence_row(&mut self, song: &Song) -> bool {
        for channel in 0..NUM_CHANNELS {
            let cursor = &mut self.channels[channel];
            if cursor.next_row(song, channel).is_none() {
                debug!("Channel {} reached the end of its sequence", channel);
                self.events.send(PlayerEvent::TrackFinished);
                self.set_mode(PlayMode::Idle);
                return false;
            }
            let note = cursor.current_note(song, channel);
            if let Err(reason) = cursor.dispatch(note, song) {
                let position = cursor.position();
                let report = InvalidNoteReport {
                    channel,
                    entry_index: position.entry,
                    note_index: position.note,
                    reason,
                };
                warn!("Stopping playback: {}", report);
                self.set_mode(PlayMode::Idle);
                self.events.send(PlayerEvent::InvalidNote(report));
                return false;
            }
        }

        let lead = self.channels[0].position();
        let pattern = song.sequence(0).entries()[lead.entry].pattern_index;
        let ticks = song.speed_for_pattern(pattern).ticks_for_row(lead.note);
        self.row_ticks = i32::from(ticks) - 1;

        let row0 = self.channels[0].absolute_row(song, 0);
        let row1 = self.channels[1].absolute_row(song, 1);
        trace!("Row {}/{} for {} ticks", row0, row1, ticks);
        self.events.send(PlayerEvent::Position { row0, row1 });
        true
    }

    fn set_mode(&mut self, mode: PlayMode) {
        if self.mode != mode {
            debug!("Play mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
            self.events.send(PlayerEvent::ModeChanged(mode));
        }
    }
}

fn check_index(what: &'static str, index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(PlayerError::OutOfRange { what, index, len });
    }
    Ok(())
}
