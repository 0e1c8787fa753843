//! MuseScore (.mscx) score reader.
//!
//! Builds a [`Score`] from the uncompressed MuseScore XML payload using
//! roxmltree. Only what the transcription needs is read: the division,
//! staff/measure/voice structure, chords and rests with their durations and
//! tie markers, key signature declarations and descriptive metadata.

use super::{
    ChordNote, DurationType, KeySigDecl, Measure, NotatedDuration, NotatedEvent, PartInfo, Score,
    ScoreMetadata, Staff,
};
use roxmltree::{Document, Node};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while reading a score.
#[derive(Debug, Error)]
pub enum ScoreParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    /// The document has no <Division> element
    #[error("missing <Division> element")]
    MissingDivision,
    /// The division is not a positive integer
    #[error("invalid division '{0}'")]
    InvalidDivision(String),
}

/// First child element with the given tag name.
fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.has_tag_name(name))
}

/// Trimmed text of the first child element with the given tag name.
fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text()).map(str::trim)
}

/// Parses a MuseScore XML document into a [`Score`].
///
/// # Errors
///
/// Returns error if the XML is malformed or the division is missing or not
/// a positive integer. Everything else is read leniently: unknown elements
/// are ignored, notes without a pitch are skipped.
pub fn parse_mscx(xml: &str) -> Result<Score, ScoreParseError> {
    let doc = Document::parse(xml)?;

    let division_text = doc
        .descendants()
        .find(|n| n.has_tag_name("Division"))
        .and_then(|n| n.text())
        .map(str::trim)
        .ok_or(ScoreParseError::MissingDivision)?;
    let division = match division_text.parse::<u32>() {
        Ok(d) if d > 0 => d,
        _ => return Err(ScoreParseError::InvalidDivision(division_text.to_string())),
    };

    let score_node = doc
        .descendants()
        .find(|n| n.has_tag_name("Score"))
        .unwrap_or_else(|| doc.root_element());

    let mut score = Score::new(division);

    for (index, staff_node) in score_node
        .children()
        .filter(|n| n.has_tag_name("Staff"))
        .enumerate()
    {
        score.staves.push(parse_staff(staff_node, index));
    }

    score.key_signatures = doc
        .descendants()
        .filter(|n| n.has_tag_name("KeySig"))
        .map(|ks| KeySigDecl {
            accidental: child_text(ks, "accidental")
                .or_else(|| child_text(ks, "concertKey"))
                .map(str::to_string),
            mode: child_text(ks, "mode").map(str::to_string),
        })
        .collect();

    score.metadata = extract_metadata(&doc, score_node);

    tracing::debug!(
        division,
        staves = score.staves.len(),
        key_signatures = score.key_signatures.len(),
        "parsed score"
    );

    Ok(score)
}

/// Reads and parses a .mscx file.
pub fn parse_mscx_file<P: AsRef<Path>>(path: P) -> Result<Score, ScoreParseError> {
    let xml = fs::read_to_string(path)?;
    parse_mscx(&xml)
}

fn parse_staff(staff_node: Node, index: usize) -> Staff {
    let id = staff_node
        .attribute("id")
        .map(str::to_string)
        .unwrap_or_else(|| (index + 1).to_string());

    let measures = staff_node
        .children()
        .filter(|n| n.has_tag_name("Measure"))
        .map(|measure_node| {
            let voice_nodes: Vec<_> = measure_node
                .children()
                .filter(|n| n.has_tag_name("voice"))
                .collect();
            // Older files put chords directly in the measure.
            let voices = if voice_nodes.is_empty() {
                vec![parse_voice(measure_node)]
            } else {
                voice_nodes.into_iter().map(parse_voice).collect()
            };
            Measure { voices }
        })
        .collect();

    Staff { id, measures }
}

fn parse_voice(voice_node: Node) -> Vec<NotatedEvent> {
    let mut events = Vec::new();

    for element in voice_node.children().filter(Node::is_element) {
        let Some(duration_name) = child_text(element, "durationType") else {
            continue;
        };
        let duration = NotatedDuration {
            kind: DurationType::from_name(duration_name),
            dotted: child(element, "dots").is_some(),
        };

        match element.tag_name().name() {
            "Chord" => {
                let notes = element
                    .children()
                    .filter(|n| n.has_tag_name("Note"))
                    .filter_map(parse_note)
                    .collect();
                events.push(NotatedEvent::Chord { duration, notes });
            }
            "Rest" => events.push(NotatedEvent::Rest { duration }),
            _ => {}
        }
    }

    events
}

fn parse_note(note_node: Node) -> Option<ChordNote> {
    let pitch_text = child_text(note_node, "pitch")?;
    let pitch = match pitch_text.parse::<u8>() {
        Ok(p) if p <= 127 => p,
        _ => {
            tracing::debug!(pitch = pitch_text, "skipping note with invalid pitch");
            return None;
        }
    };

    let tie_spanners: Vec<_> = note_node
        .descendants()
        .filter(|n| n.has_tag_name("Spanner"))
        .filter(|n| n.attribute("type").map_or(true, |t| t == "Tie"))
        .collect();

    Some(ChordNote {
        pitch,
        tied_from_previous: tie_spanners.iter().any(|s| child(*s, "prev").is_some()),
        tied_to_next: tie_spanners.iter().any(|s| child(*s, "next").is_some()),
    })
}

/// Collects title, credits, tempo, time signature and parts.
fn extract_metadata(doc: &Document, score_node: Node) -> ScoreMetadata {
    let mut metadata = ScoreMetadata::default();

    for tag in doc.descendants().filter(|n| n.has_tag_name("metaTag")) {
        let Some(value) = tag.text().map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };
        let value = Some(value.to_string());
        match tag.attribute("name").unwrap_or("").to_lowercase().as_str() {
            "worktitle" | "title" => metadata.title = value,
            "composer" => metadata.composer = value,
            "lyricist" | "poet" => metadata.lyricist = value,
            "copyright" => metadata.copyright = value,
            "subtitle" => metadata.subtitle = value,
            "artist" | "arranger" => metadata.artist = value,
            _ => {}
        }
    }

    if let Some(title) = doc
        .descendants()
        .find(|n| n.has_tag_name("workTitle"))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        metadata.title = Some(title.to_string());
    }

    if metadata.artist.is_none() {
        metadata.artist = metadata.composer.clone();
    }

    // MuseScore stores tempo in quarter notes per second.
    metadata.tempo_bpm = doc
        .descendants()
        .filter(|n| n.has_tag_name("Tempo"))
        .find_map(|n| child_text(n, "tempo").and_then(|t| t.parse::<f64>().ok()))
        .filter(|qps| *qps > 0.0)
        .map(|qps| qps * 60.0);

    metadata.time_signature = doc
        .descendants()
        .filter(|n| n.has_tag_name("TimeSig"))
        .find_map(|n| {
            let num = child_text(n, "sigN")?.parse::<u8>().ok()?;
            let den = child_text(n, "sigD")?.parse::<u8>().ok()?;
            Some((num, den))
        });

    metadata.parts = score_node
        .children()
        .filter(|n| n.has_tag_name("Part"))
        .enumerate()
        .map(|(i, part)| {
            let instrument = child(part, "Instrument");
            let name = instrument
                .and_then(|inst| {
                    child_text(inst, "longName")
                        .filter(|n| !n.is_empty())
                        .or_else(|| child_text(inst, "shortName").filter(|n| !n.is_empty()))
                })
                .unwrap_or("Piano")
                .to_string();
            PartInfo {
                id: part
                    .attribute("id")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("part_{}", i)),
                name,
            }
        })
        .collect();

    metadata
}
