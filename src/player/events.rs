//! Engine Notifications
//!
//! Events flow from the tick path to the editor over a bounded channel. The
//! tick never blocks on a slow consumer: when the queue is full a progress
//! event is dropped and a warning is logged. Events that end a run
//! ([`PlayerEvent::TrackFinished`] and [`PlayerEvent::InvalidNote`]) are
//! never dropped; they evict the oldest queued progress event instead.

use std::fmt;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::warn;

use super::PlayMode;

/// Why a note could not be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidNoteReason {
    /// Pause while the channel was not holding an instrument note
    PauseWithoutInstrument,
    /// Slide while the channel was not holding an instrument note
    SlideWithoutInstrument,
    /// Slide that would leave the playable pitch range
    SlideOutOfRange {
        /// Pitch the slide would have produced
        pitch: i16,
    },
}

impl fmt::Display for InvalidNoteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidNoteReason::PauseWithoutInstrument => write!(f, "pause without a held instrument"),
            InvalidNoteReason::SlideWithoutInstrument => write!(f, "slide without a held instrument"),
            InvalidNoteReason::SlideOutOfRange { pitch } => write!(f, "slide to illegal pitch {}", pitch),
        }
    }
}

/// Location and cause of an invalid note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidNoteReport {
    /// Channel that hit the note
    pub channel: usize,
    /// Sequence entry holding the note
    pub entry_index: usize,
    /// Row inside the entry's pattern
    pub note_index: usize,
    /// What was wrong
    pub reason: InvalidNoteReason,
}

impl fmt::Display for InvalidNoteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "channel {}, entry {}, row {}: {}",
            self.channel, self.entry_index, self.note_index, self.reason
        )
    }
}

/// Notification from the engine to the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// A new row started; absolute row of each channel
    Position {
        /// Channel 0 row
        row0: usize,
        /// Channel 1 row
        row1: usize,
    },
    /// Track playback stopped on an invalid note
    InvalidNote(InvalidNoteReport),
    /// A channel sequence ran out of rows
    TrackFinished,
    /// The play mode changed
    ModeChanged(PlayMode),
}

impl PlayerEvent {
    /// Whether this event ends the current playback run.
    pub fn ends_run(&self) -> bool {
        matches!(self, PlayerEvent::TrackFinished | PlayerEvent::InvalidNote(_))
    }
}

/// Non-blocking sending half of the event queue.
#[derive(Debug, Clone)]
pub(crate) struct EventQueue {
    tx: Sender<PlayerEvent>,
    rx: Receiver<PlayerEvent>,
    dropping: bool,
}

impl EventQueue {
    pub(crate) fn bounded(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        EventQueue {
            tx,
            rx,
            dropping: false,
        }
    }

    pub(crate) fn receiver(&self) -> Receiver<PlayerEvent> {
        self.rx.clone()
    }

    /// Queue `event`; warns once per run of dropped events.
    pub(crate) fn send(&mut self, event: PlayerEvent) {
        match self.tx.try_send(event) {
            Ok(()) => self.dropping = false,
            Err(TrySendError::Full(event)) if event.ends_run() => self.force_send(event),
            Err(TrySendError::Full(event)) => {
                if !self.dropping {
                    warn!("Event queue full, dropping {:?} and later events", event);
                    self.dropping = true;
                }
            }
            // The queue owns a receiver, so this cannot happen while `self` lives
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Make room for `event` by evicting the oldest progress event, or the
    /// oldest event of any kind if only run-ending events are queued.
    fn force_send(&self, event: PlayerEvent) {
        let mut queued: Vec<PlayerEvent> = self.rx.try_iter().collect();
        let victim = queued
            .iter()
            .position(|queued| !queued.ends_run())
            .unwrap_or(0);
        if victim < queued.len() {
            let evicted = queued.remove(victim);
            warn!("Event queue full, evicting {:?} to deliver {:?}", evicted, event);
        }
        queued.push(event);
        for pending in queued {
            if let Err(err) = self.tx.try_send(pending) {
                warn!("Event queue full, lost {:?}", err.into_inner());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let mut queue = EventQueue::bounded(2);
        for _ in 0..5 {
            queue.send(PlayerEvent::TrackFinished);
        }
        let received: Vec<_> = queue.receiver().try_iter().collect();
        assert_eq!(received.len(), 2);
        assert!(queue.dropping);
        queue.send(PlayerEvent::TrackFinished);
        assert!(!queue.dropping);
    }

    #[test]
    fn test_run_ending_events_survive_full_queue() {
        let mut queue = EventQueue::bounded(2);
        for row in 0..5 {
            queue.send(PlayerEvent::Position { row0: row, row1: row });
        }
        let report = InvalidNoteReport {
            channel: 0,
            entry_index: 0,
            note_index: 6,
            reason: InvalidNoteReason::PauseWithoutInstrument,
        };
        queue.send(PlayerEvent::InvalidNote(report));
        queue.send(PlayerEvent::TrackFinished);

        let received: Vec<_> = queue.receiver().try_iter().collect();
        assert_eq!(
            received,
            vec![PlayerEvent::InvalidNote(report), PlayerEvent::TrackFinished]
        );
    }

    #[test]
    fn test_eviction_keeps_order() {
        let mut queue = EventQueue::bounded(3);
        queue.send(PlayerEvent::Position { row0: 0, row1: 0 });
        queue.send(PlayerEvent::ModeChanged(PlayMode::Idle));
        queue.send(PlayerEvent::Position { row0: 1, row1: 1 });
        queue.send(PlayerEvent::TrackFinished);

        let received: Vec<_> = queue.receiver().try_iter().collect();
        assert_eq!(
            received,
            vec![
                PlayerEvent::ModeChanged(PlayMode::Idle),
                PlayerEvent::Position { row0: 1, row1: 1 },
                PlayerEvent::TrackFinished,
            ]
        );
    }

    #[test]
    fn test_report_display() {
        let report = InvalidNoteReport {
            channel: 1,
            entry_index: 3,
            note_index: 7,
            reason: InvalidNoteReason::SlideOutOfRange { pitch: 31 },
        };
        assert_eq!(report.to_string(), "channel 1, entry 3, row 7: slide to illegal pitch 31");
    }
}
