//! TIA Tracker Demo Player
//!
//! Plays a built-in two-channel demo song through the playback thread and
//! prints the channel registers at every row.

use std::env;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::RecvTimeoutError;
use log::{error, info};

use tia_player::player::{ChannelOutput, RegisterFile};
use tia_player::song::{Distortion, Instrument, Note, Pattern, Percussion, RowSpeed, SequenceEntry};
use tia_player::{PlayerConfig, PlayerEvent, Song, SongStore, Transport, TvStandard};

/// Parsed command-line arguments.
#[derive(Debug)]
struct CliArgs {
    /// Force 60 Hz playback
    ntsc: bool,
    /// Playing time in seconds
    seconds: f64,
    /// Optional JSON player configuration
    config_path: Option<String>,
    /// Whether help was requested
    show_help: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            ntsc: false,
            seconds: 8.0,
            config_path: None,
            show_help: false,
        }
    }
}

impl CliArgs {
    fn parse() -> Self {
        let mut args = Self::default();
        let mut iter = env::args().skip(1);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--ntsc" => args.ntsc = true,
                "--help" | "-h" => args.show_help = true,
                "--seconds" => match iter.next().and_then(|v| v.parse::<f64>().ok()) {
                    Some(seconds) if seconds > 0.0 => args.seconds = seconds,
                    _ => {
                        eprintln!("--seconds requires a positive number");
                        args.show_help = true;
                    }
                },
                "--config" => match iter.next() {
                    Some(path) => args.config_path = Some(path),
                    None => {
                        eprintln!("--config requires a path");
                        args.show_help = true;
                    }
                },
                _ => {
                    eprintln!("Unknown argument: {}", arg);
                    args.show_help = true;
                }
            }
        }

        args
    }

    fn print_help() {
        eprintln!(
            "Usage:\n  tia-player [--ntsc] [--seconds N] [--config <file.json>]\n\n\
             Flags:\n\
             \x20 --ntsc             Tick at 60 Hz instead of 50 Hz\n\
             \x20 --seconds N        Stop after N seconds (default 8)\n\
             \x20 --config <file>    Load player settings from JSON\n\
             \x20 -h, --help         Show this help\n\n\
             Set RUST_LOG=debug for transport and mode logging."
        );
    }
}

fn demo_song() -> Result<Song> {
    let mut song = Song::new("Demo");
    song.set_speed(RowSpeed { even: 6, odd: 4 })?;

    song.instruments[0] = Instrument::with_envelope(
        "Lead",
        Distortion::PureCombined,
        vec![12, 11, 10, 9, 8, 6, 3, 0],
        vec![0, 0, 0, 1, 0, -1, 0, 0],
        3,
        5,
    )?;
    song.instruments[1] = Instrument::with_envelope(
        "Bass",
        Distortion::Buzzy,
        vec![14, 12, 10, 10, 4, 0],
        vec![0, 0, 0, 0, 0, 0],
        2,
        4,
    )?;
    song.percussion[0] = Percussion::with_envelope(
        "Kick",
        vec![Distortion::Buzzy, Distortion::Buzzy, Distortion::WhiteNoise, Distortion::WhiteNoise],
        vec![20, 25, 8, 8],
        vec![15, 12, 6, 2],
        false,
    )?;

    let hold = Note::Hold;
    let lead = |pitch| Note::Instrument { index: 0, pitch };
    let bass = |pitch| Note::Instrument { index: 1, pitch };
    let kick = Note::Percussion { index: 0 };

    let melody = song.add_pattern(Pattern::with_notes(
        "Melody",
        vec![
            lead(20), hold, Note::Slide { delta: 2 }, hold,
            Note::Pause, hold, lead(40), hold,
            Note::Slide { delta: -3 }, hold, lead(15), hold,
            hold, hold, Note::Pause, hold,
        ],
    ))?;
    let groove = song.add_pattern(Pattern::with_notes(
        "Groove",
        vec![
            bass(28), hold, hold, hold,
            kick, hold, hold, hold,
            bass(31), hold, hold, hold,
            kick, hold, bass(24), hold,
        ],
    ))?;

    song.push_entry(0, SequenceEntry::new(melody))?;
    song.push_entry(0, SequenceEntry::with_goto(melody, 0))?;
    song.push_entry(1, SequenceEntry::new(groove))?;
    song.push_entry(1, SequenceEntry::with_goto(groove, 0))?;
    Ok(song)
}

fn format_registers(output: ChannelOutput) -> String {
    format!("C{:>2} F{:>3} V{:>2}", output.distortion, output.pitch, output.volume)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse();
    if args.show_help {
        CliArgs::print_help();
        return Ok(());
    }

    let mut config = match &args.config_path {
        Some(path) => PlayerConfig::load(path).with_context(|| format!("Failed to load config {}", path))?,
        None => PlayerConfig::default(),
    };
    if args.ntsc {
        config.tv_standard = TvStandard::Ntsc;
    }

    let store = SongStore::new(demo_song().context("Failed to build demo song")?);
    let registers = RegisterFile::new();
    let transport = Transport::spawn(store.clone(), registers.clone(), config)
        .context("Failed to start playback thread")?;
    let events = transport.events();

    info!(
        "Playing \"{}\" for {:.1}s at {} Hz",
        store.read(|song| song.name.clone()),
        args.seconds,
        transport.frame_rate().frame_rate()
    );
    transport.play_track(0, 0)?;

    let deadline = Instant::now() + Duration::from_secs_f64(args.seconds);
    while Instant::now() < deadline {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(PlayerEvent::Position { row0, row1 }) => {
                let (minutes, seconds) = store.read(|song| song.row_timestamp(row0));
                let [ch0, ch1] = registers.snapshot();
                println!(
                    "{:02}:{:02}  row {:>3}/{:>3}  | {} | {} |",
                    minutes,
                    seconds,
                    row0,
                    row1,
                    format_registers(ch0),
                    format_registers(ch1)
                );
            }
            Ok(PlayerEvent::InvalidNote(report)) => {
                error!("Playback stopped: {}", report);
                break;
            }
            Ok(PlayerEvent::TrackFinished) => {
                info!("Track finished");
                break;
            }
            Ok(PlayerEvent::ModeChanged(_)) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    transport.stop_track();
    transport.shutdown();
    Ok(())
}
