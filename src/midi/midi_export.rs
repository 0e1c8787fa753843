//! Standard MIDI File (SMF) export functionality.
//!
//! Encodes an [`Arrangement`] as an SMF Format 1 (multi-track) file. Each
//! output track is already delta-timed, so export is a direct encoding:
//! - Optional track 0: conductor metadata (title, tempo, time signature, key)
//! - Following tracks: one per hand, channel 0 (right) and 1 (left)

use super::{Arrangement, TrackMessage};

/// Writes a variable-length quantity (VLQ) used for delta times in MIDI.
///
/// VLQ encodes values using 7 bits per byte, with the MSB indicating
/// whether more bytes follow (1 = more bytes, 0 = last byte).
fn write_vlq(value: u32, buffer: &mut Vec<u8>) {
    if value == 0 {
        buffer.push(0);
        return;
    }

    let mut temp = value;
    let mut bytes = Vec::with_capacity(4);

    while temp > 0 {
        bytes.push((temp & 0x7F) as u8);
        temp >>= 7;
    }

    // Write bytes in reverse order with continuation bits
    for (i, &byte) in bytes.iter().rev().enumerate() {
        if i < bytes.len() - 1 {
            buffer.push(byte | 0x80);
        } else {
            buffer.push(byte);
        }
    }
}

/// Writes a meta event carrying text: FF type len text
fn write_text_meta(kind: u8, text: &str, buffer: &mut Vec<u8>) {
    buffer.push(0xFF);
    buffer.push(kind);
    let bytes = text.as_bytes();
    write_vlq(bytes.len() as u32, buffer);
    buffer.extend_from_slice(bytes);
}

/// Writes a single MIDI message to the buffer (without delta time).
fn write_message(message: &TrackMessage, buffer: &mut Vec<u8>) {
    match message {
        TrackMessage::NoteOn {
            channel,
            pitch,
            velocity,
        } => {
            buffer.push(0x90 | (channel & 0x0F));
            buffer.push(pitch & 0x7F);
            buffer.push(velocity & 0x7F);
        }
        TrackMessage::NoteOff {
            channel,
            pitch,
            velocity,
        } => {
            buffer.push(0x80 | (channel & 0x0F));
            buffer.push(pitch & 0x7F);
            buffer.push(velocity & 0x7F);
        }
        TrackMessage::ProgramChange { channel, program } => {
            buffer.push(0xC0 | (channel & 0x0F));
            buffer.push(program & 0x7F);
        }
        TrackMessage::ControlChange {
            channel,
            controller,
            value,
        } => {
            buffer.push(0xB0 | (channel & 0x0F));
            buffer.push(controller & 0x7F);
            buffer.push(value & 0x7F);
        }
        TrackMessage::SetTempo {
            microseconds_per_beat,
        } => {
            // Meta event: FF 51 03 tt tt tt
            buffer.push(0xFF);
            buffer.push(0x51);
            buffer.push(0x03);
            buffer.push((microseconds_per_beat >> 16) as u8);
            buffer.push((microseconds_per_beat >> 8) as u8);
            buffer.push(*microseconds_per_beat as u8);
        }
        TrackMessage::TimeSignature {
            numerator,
            denominator_power,
        } => {
            // Meta event: FF 58 04 nn dd cc bb
            buffer.push(0xFF);
            buffer.push(0x58);
            buffer.push(0x04);
            buffer.push(*numerator);
            buffer.push(*denominator_power);
            buffer.push(24); // Clocks per click
            buffer.push(8); // 32nd notes per quarter
        }
        TrackMessage::KeySignature { fifths, minor } => {
            // Meta event: FF 59 02 sf mi
            buffer.push(0xFF);
            buffer.push(0x59);
            buffer.push(0x02);
            buffer.push(*fifths as u8);
            buffer.push(u8::from(*minor));
        }
        TrackMessage::TrackName(name) => write_text_meta(0x03, name, buffer),
        TrackMessage::Copyright(text) => write_text_meta(0x02, text, buffer),
        TrackMessage::EndOfTrack => {
            // Meta event: FF 2F 00
            buffer.push(0xFF);
            buffer.push(0x2F);
            buffer.push(0x00);
        }
    }
}

/// Writes a track chunk to the output.
fn write_track_chunk(out: &mut Vec<u8>, track_data: &[u8]) {
    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
    out.extend_from_slice(track_data);
}

/// Encodes an arrangement as Standard MIDI File bytes.
///
/// Creates a Format 1 file at the arrangement's ticks-per-quarter resolution,
/// one track chunk per output track, in order.
pub fn encode_smf(arrangement: &Arrangement) -> Vec<u8> {
    let mut out = Vec::new();

    // Header chunk (MThd)
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes()); // Format 1 (multi-track)
    out.extend_from_slice(&(arrangement.track_count() as u16).to_be_bytes());
    out.extend_from_slice(&arrangement.ticks_per_quarter.to_be_bytes());

    for track in arrangement.tracks() {
        let mut data = Vec::new();
        for event in track.events() {
            write_vlq(event.delta, &mut data);
            write_message(&event.message, &mut data);
        }
        write_track_chunk(&mut out, &data);
    }

    out
}
