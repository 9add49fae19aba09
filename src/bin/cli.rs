//! polyseq CLI: runs a demo song through the sequencer host offline and
//! prints every gate and CV change.
//!
//! Usage:
//!   cargo run --bin ps-cli -- --demo eight-quarter-notes --clocks 16
//!   cargo run --bin ps-cli -- --config polyseq.yaml --polyphony 4

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, ValueEnum};
use ps_engine::MAX_VOICES;
use ps_ir::{cv_to_semitone, DemoContent, SharedSong, Song, MAX_TRACKS};
use ps_master::{Inputs, Sequencer, SequencerConfig, TrackConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    version = crate_version!(),
    about = "Plays a demo song through the polyseq engine and prints the gate/CV transcript."
)]
struct Cli {
    /// YAML sequencer config. Flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Demo song to play.
    #[arg(short, long, value_enum, default_value_t = Demo::EightQuarterNotes)]
    demo: Demo,
    /// Number of clock pulses to send.
    #[arg(long, default_value_t = 16)]
    clocks: usize,
    /// Samples between clock pulses.
    #[arg(long, default_value_t = 2048)]
    pulse_period: usize,
    /// Samples per second.
    #[arg(short, long)]
    sample_rate: Option<f32>,
    /// Clock rate label, e.g. "Quarter note" or "External x24".
    #[arg(long)]
    clock_rate: Option<String>,
    /// Number of tracks (1..=4).
    #[arg(short, long)]
    tracks: Option<usize>,
    /// Voices per track (1..=16).
    #[arg(short, long)]
    polyphony: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Demo {
    Empty,
    OneQuarter,
    EightQuarterNotes,
    FourTouchingQuarters,
    FourAlmostTouchingQuarters,
}

impl From<Demo> for DemoContent {
    fn from(demo: Demo) -> Self {
        match demo {
            Demo::Empty => DemoContent::Empty,
            Demo::OneQuarter => DemoContent::OneQuarter,
            Demo::EightQuarterNotes => DemoContent::EightQuarterNotes,
            Demo::FourTouchingQuarters => DemoContent::FourTouchingQuarters,
            Demo::FourAlmostTouchingQuarters => DemoContent::FourAlmostTouchingQuarters,
        }
    }
}

/// Last printed state of every output.
struct Snapshot {
    gate: [[f32; MAX_VOICES]; MAX_TRACKS],
    cv: [[f32; MAX_VOICES]; MAX_TRACKS],
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let song = Song::make_demo(cli.demo.into(), config.tracks.len());
    let mut sequencer = Sequencer::new(Arc::new(SharedSong::new(song)), &config)?;
    info!(
        tracks = config.tracks.len(),
        clock_rate = config.clock_rate.as_str(),
        sample_rate = config.sample_rate,
        "starting demo run"
    );

    let mut last = Snapshot {
        gate: [[0.0; MAX_VOICES]; MAX_TRACKS],
        cv: [[0.0; MAX_VOICES]; MAX_TRACKS],
    };
    let mut gate_ons = 0usize;
    let mut sample = 0usize;
    let high_samples = (cli.pulse_period / 2).max(1);

    for _ in 0..cli.clocks {
        for i in 0..cli.pulse_period.max(2) {
            let clock = if i < high_samples { 10.0 } else { 0.0 };
            sequencer.set_inputs(Inputs { clock, ..Inputs::default() });
            sequencer.step();
            gate_ons += print_changes(&sequencer, &mut last, sample);
            sample += 1;
        }
    }

    let outputs = sequencer.outputs();
    info!(
        clocks = cli.clocks,
        samples = sample,
        metric_time = sequencer.metric_time(),
        gate_ons,
        lock_failures = outputs.lock_failures(),
        "demo run finished"
    );
    Ok(())
}

fn build_config(cli: &Cli) -> Result<SequencerConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => SequencerConfig::load(path)?,
        None => SequencerConfig::default(),
    };
    if let Some(sample_rate) = cli.sample_rate {
        config.sample_rate = sample_rate;
    }
    if let Some(clock_rate) = &cli.clock_rate {
        config.clock_rate = clock_rate.clone();
    }
    if let Some(tracks) = cli.tracks {
        config.tracks.resize(tracks, TrackConfig::default());
    }
    if let Some(polyphony) = cli.polyphony {
        for track in config.tracks.iter_mut() {
            track.polyphony = polyphony;
        }
    }
    config.validate()?;
    Ok(config)
}

/// Print outputs that changed since `last`. Returns the number of gates that
/// went high.
fn print_changes(sequencer: &Sequencer, last: &mut Snapshot, sample: usize) -> usize {
    let outputs = sequencer.outputs();
    let mut gate_ons = 0;
    for track in 0..sequencer.num_tracks() {
        for voice in 0..outputs.channels(track) {
            let cv = outputs.cv(track, voice);
            let gate = outputs.gate(track, voice);
            if cv != last.cv[track][voice] {
                println!(
                    "{:>8}  t={:>7.3}  track {} voice {:>2}  cv   {:+.3} V (note {})",
                    sample,
                    sequencer.metric_time(),
                    track,
                    voice,
                    cv,
                    cv_to_semitone(cv)
                );
                last.cv[track][voice] = cv;
            }
            if gate != last.gate[track][voice] {
                let on = gate > 0.0;
                println!(
                    "{:>8}  t={:>7.3}  track {} voice {:>2}  gate {}",
                    sample,
                    sequencer.metric_time(),
                    track,
                    voice,
                    if on { "on" } else { "off" }
                );
                if on {
                    gate_ons += 1;
                }
                last.gate[track][voice] = gate;
            }
        }
    }
    gate_ons
}
