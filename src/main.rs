//! pianohands - Split a piano score into right- and left-hand MIDI tracks.
//!
//! Reads an uncompressed MuseScore score (`.mscx`) or an already-rendered
//! Standard MIDI File and writes a Format 1 MIDI file with one track per
//! hand.
//!
//! # Usage
//!
//! ```bash
//! pianohands sonata.mscx                   # writes sonata.mid
//! pianohands render.mid -o fixed.mid --split C4 --analyze
//! RUST_LOG=debug pianohands sonata.mscx --meta
//! ```

use anyhow::{bail, Context, Result};
use pianohands::midi::{import_source_file, name_to_note, note_to_name, SourceMidi};
use pianohands::transcribe::analyze;
use pianohands::{parse_mscx_file, reseparate, transcribe_score, TranscribeConfig};
use std::path::{Path, PathBuf};

/// Command-line options for the application.
struct CliOptions {
    /// Score or MIDI file to transcribe.
    input: PathBuf,
    /// Output path; defaults to the input with a .mid extension.
    output: Option<PathBuf>,
    /// JSON config file.
    config: Option<PathBuf>,
    /// Forced split pitch.
    split: Option<u8>,
    /// Write a leading metadata track.
    meta: bool,
    title: Option<String>,
    composer: Option<String>,
    /// Print a per-track summary of the written file.
    analyze: bool,
    /// Print the arrangement as JSON.
    json: bool,
}

fn print_help(program: &str) {
    eprintln!("pianohands - Two-hand score to MIDI transcription");
    eprintln!();
    eprintln!("Usage: {} <input.mscx|input.mid> [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o, --output PATH     Output .mid file (default: input with .mid extension)");
    eprintln!("  -c, --config PATH     Load settings from a JSON file");
    eprintln!("  -s, --split NOTE      Force the hand split (MIDI number or name, e.g. C4)");
    eprintln!("  -m, --meta            Add a metadata track (title, tempo, meter, key)");
    eprintln!("      --title TEXT      Override the piece title");
    eprintln!("      --composer TEXT   Override the composer");
    eprintln!("  -a, --analyze         Print a summary of the written file");
    eprintln!("      --json            Print the arrangement as JSON");
    eprintln!("  -h, --help            Print this help message");
}

/// Parses a split pitch given as a MIDI number or a note name.
fn parse_split(value: &str) -> Option<u8> {
    match value.parse::<u8>() {
        Ok(n) if n <= 127 => Some(n),
        Ok(_) => None,
        Err(_) => name_to_note(value),
    }
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let program = args.first().map(String::as_str).unwrap_or("pianohands");
        let mut input: Option<PathBuf> = None;
        let mut output = None;
        let mut config = None;
        let mut split = None;
        let mut meta = false;
        let mut title = None;
        let mut composer = None;
        let mut analyze = false;
        let mut json = false;
        let mut i = 1;

        let value = |i: usize, flag: &str| -> Result<String> {
            match args.get(i) {
                Some(v) => Ok(v.clone()),
                None => bail!("{} requires an argument", flag),
            }
        };

        while i < args.len() {
            match args[i].as_str() {
                "--output" | "-o" => {
                    i += 1;
                    output = Some(PathBuf::from(value(i, "--output")?));
                }
                "--config" | "-c" => {
                    i += 1;
                    config = Some(PathBuf::from(value(i, "--config")?));
                }
                "--split" | "-s" => {
                    i += 1;
                    let raw = value(i, "--split")?;
                    match parse_split(&raw) {
                        Some(pitch) => split = Some(pitch),
                        None => bail!("invalid split note: {}", raw),
                    }
                }
                "--meta" | "-m" => meta = true,
                "--title" => {
                    i += 1;
                    title = Some(value(i, "--title")?);
                }
                "--composer" => {
                    i += 1;
                    composer = Some(value(i, "--composer")?);
                }
                "--analyze" | "-a" => analyze = true,
                "--json" => json = true,
                "--help" | "-h" => {
                    print_help(program);
                    std::process::exit(0);
                }
                other if other.starts_with('-') => {
                    eprintln!("Unknown option: {}", other);
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
                other => {
                    if input.is_some() {
                        bail!("more than one input file given: {}", other);
                    }
                    input = Some(PathBuf::from(other));
                }
            }
            i += 1;
        }

        let Some(input) = input else {
            print_help(program);
            std::process::exit(1);
        };

        Ok(Self {
            input,
            output,
            config,
            split,
            meta,
            title,
            composer,
            analyze,
            json,
        })
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Prints name, note count, channels and pitch range of every track.
fn print_analysis(source: &SourceMidi) {
    println!(
        "{}: {} tracks, {} ticks per quarter",
        source.name,
        source.tracks.len(),
        source.ticks_per_quarter
    );
    for (index, track) in source.tracks.iter().enumerate() {
        let pitches: Vec<u8> = track.events.iter().filter_map(|e| e.note_on_pitch()).collect();
        let mut channels: Vec<u8> = track
            .events
            .iter()
            .filter(|e| e.is_note())
            .map(|e| e.channel)
            .collect();
        channels.sort_unstable();
        channels.dedup();
        let range = match (pitches.iter().min(), pitches.iter().max()) {
            (Some(&lo), Some(&hi)) => format!("{}-{}", note_to_name(lo), note_to_name(hi)),
            _ => "-".to_string(),
        };
        println!(
            "  track {}: {:<16} notes={:<5} channels={:?} range={}",
            index,
            track.name.as_deref().unwrap_or(""),
            pitches.len(),
            channels,
            range
        );
    }
    let structure = analyze(source);
    println!(
        "  note-bearing tracks={} channels={:?}",
        structure.note_sources, structure.channels
    );
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => TranscribeConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TranscribeConfig::default(),
    };
    if cli.split.is_some() {
        config.split_override = cli.split;
    }
    if cli.meta {
        config.metadata_track = true;
    }

    let arrangement = match extension(&cli.input).as_str() {
        "mscx" => {
            let mut score = parse_mscx_file(&cli.input)
                .with_context(|| format!("Failed to read score {}", cli.input.display()))?;
            if let Some(title) = &cli.title {
                score.metadata.title = Some(title.clone());
            }
            if let Some(composer) = &cli.composer {
                score.metadata.composer = Some(composer.clone());
                score.metadata.artist = Some(composer.clone());
            }
            transcribe_score(&score, &config).context("Failed to transcribe score")?
        }
        "mid" | "midi" => {
            let mut source = import_source_file(&cli.input)
                .with_context(|| format!("Failed to read MIDI {}", cli.input.display()))?;
            if let Some(title) = &cli.title {
                source.name = title.clone();
            }
            if let Some(composer) = &cli.composer {
                source.artist = Some(composer.clone());
            }
            reseparate(&source, &config).context("Failed to separate hands")?
        }
        "mscz" => bail!("compressed .mscz scores are not supported; extract the .mscx first"),
        other => bail!("unsupported input type: .{}", other),
    };

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("mid"));
    if output == cli.input {
        bail!("output would overwrite the input; pass --output");
    }
    arrangement
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!(
        path = %output.display(),
        tracks = arrangement.track_count(),
        notes = arrangement.note_count(),
        ticks = arrangement.duration_ticks(),
        "wrote arrangement"
    );

    if cli.json {
        println!(
            "{}",
            arrangement.to_json().context("Failed to serialize arrangement")?
        );
    }
    if cli.analyze {
        let written = import_source_file(&output)
            .with_context(|| format!("Failed to re-read {}", output.display()))?;
        print_analysis(&written);
    }

    Ok(())
}
