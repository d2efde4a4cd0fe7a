//! Transport Driver Domain
//!
//! Runs the engine on a dedicated thread at the TV frame rate and exposes the
//! transport commands to the editor. Commands execute synchronously on the
//! caller's thread under the engine lock; the tick thread only ever calls
//! [`Player::tick`].
//!
//! Lock order is engine first, then song. Editors lock only the song.

mod timing;

pub use timing::FrameClock;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::config::{OverlayPolicy, PlayerConfig};
use crate::player::{HardwareSink, PlayMode, Player, PlayerEvent};
use crate::song::{Distortion, SongStore, TvStandard};
use crate::Result;

/// Handle to a running playback thread.
pub struct Transport<S: HardwareSink + 'static> {
    player: Arc<Mutex<Player<S>>>,
    tv_standard: Arc<Mutex<TvStandard>>,
    running: Arc<AtomicBool>,
    events: Receiver<PlayerEvent>,
    tick_thread: Option<JoinHandle<()>>,
}

impl<S: HardwareSink + 'static> Transport<S> {
    /// Start the playback thread.
    ///
    /// The engine starts idle, ticking silence into `sink`.
    pub fn spawn(store: SongStore, sink: S, config: PlayerConfig) -> Result<Self> {
        let player = Player::with_config(store, sink, &config)?;
        let events = player.events();
        let player = Arc::new(Mutex::new(player));
        let tv_standard = Arc::new(Mutex::new(config.tv_standard));
        let running = Arc::new(AtomicBool::new(true));

        let player_clone = Arc::clone(&player);
        let tv_standard_clone = Arc::clone(&tv_standard);
        let running_clone = Arc::clone(&running);
        let tick_thread = thread::Builder::new()
            .name("tia-player-tick".into())
            .spawn(move || run_tick_loop(player_clone, tv_standard_clone, running_clone))?;

        info!(
            "Playback thread started at {} Hz",
            config.tv_standard.frame_rate()
        );
        Ok(Transport {
            player,
            tv_standard,
            running,
            events,
            tick_thread: Some(tick_thread),
        })
    }

    /// Stop and join the playback thread.
    pub fn shutdown(mut self) {
        self.stop_thread();
    }

    fn stop_thread(&mut self) {
        if let Some(handle) = self.tick_thread.take() {
            self.running.store(false, Ordering::Release);
            if handle.join().is_err() {
                warn!("Playback thread panicked");
            }
            info!("Playback thread stopped");
        }
    }

    /// Receiver for position, invalid-note and mode events.
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.events.clone()
    }

    /// Switch the tick rate. Engine state is untouched.
    pub fn set_frame_rate(&self, standard: TvStandard) {
        *self.tv_standard.lock() = standard;
        info!("Frame rate set to {} Hz", standard.frame_rate());
    }

    /// Current tick rate.
    pub fn frame_rate(&self) -> TvStandard {
        *self.tv_standard.lock()
    }

    /// Current play mode.
    pub fn mode(&self) -> PlayMode {
        self.player.lock().mode()
    }

    /// Whether anything but silence is playing.
    pub fn is_playing(&self) -> bool {
        self.player.lock().is_playing()
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with_player<R>(&self, f: impl FnOnce(&mut Player<S>) -> R) -> R {
        f(&mut self.player.lock())
    }

    /// See [`Player::play_instrument`].
    pub fn play_instrument(&self, index: usize, pitch: u8) -> Result<()> {
        debug!("play_instrument({}, {})", index, pitch);
        self.player.lock().play_instrument(index, pitch)
    }

    /// See [`Player::play_instrument_once`].
    pub fn play_instrument_once(&self, index: usize, pitch: u8) -> Result<()> {
        debug!("play_instrument_once({}, {})", index, pitch);
        self.player.lock().play_instrument_once(index, pitch)
    }

    /// See [`Player::stop_instrument`].
    pub fn stop_instrument(&self) {
        self.player.lock().stop_instrument();
    }

    /// See [`Player::play_percussion`].
    pub fn play_percussion(&self, index: usize) -> Result<()> {
        debug!("play_percussion({})", index);
        self.player.lock().play_percussion(index)
    }

    /// See [`Player::stop_percussion`].
    pub fn stop_percussion(&self) {
        self.player.lock().stop_percussion();
    }

    /// See [`Player::play_waveform`].
    pub fn play_waveform(&self, distortion: Distortion, pitch: u8, volume: u8) -> Result<()> {
        debug!("play_waveform({}, {}, {})", distortion, pitch, volume);
        self.player.lock().play_waveform(distortion, pitch, volume)
    }

    /// See [`Player::play_track`].
    pub fn play_track(&self, start0: usize, start1: usize) -> Result<()> {
        debug!("play_track({}, {})", start0, start1);
        self.player.lock().play_track(start0, start1)
    }

    /// See [`Player::stop_track`].
    pub fn stop_track(&self) {
        self.player.lock().stop_track();
    }

    /// See [`Player::silence`].
    pub fn silence(&self) {
        self.player.lock().silence();
    }

    /// See [`Player::set_muted`].
    pub fn set_muted(&self, channel: usize, muted: bool) {
        self.player.lock().set_muted(channel, muted);
    }

    /// See [`Player::toggle_mute`].
    pub fn toggle_mute(&self, channel: usize) {
        self.player.lock().toggle_mute(channel);
    }

    /// See [`Player::is_muted`].
    pub fn is_muted(&self, channel: usize) -> bool {
        self.player.lock().is_muted(channel)
    }

    /// See [`Player::set_overlay_policy`].
    pub fn set_overlay_policy(&self, policy: OverlayPolicy) {
        self.player.lock().set_overlay_policy(policy);
    }
}

impl<S: HardwareSink + 'static> Drop for Transport<S> {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

/// Tick loop of the playback thread.
fn run_tick_loop<S: HardwareSink>(
    player: Arc<Mutex<Player<S>>>,
    tv_standard: Arc<Mutex<TvStandard>>,
    running: Arc<AtomicBool>,
) {
    let mut clock = FrameClock::new(*tv_standard.lock());
    while running.load(Ordering::Acquire) {
        player.lock().tick();
        clock.set_standard(*tv_standard.lock());
        if let Some(wait) = clock.advance() {
            thread::sleep(wait);
        }
    }
}
