// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fmt;
use std::sync::Arc;

use crate::config::program::{NoteOffBehavior, RetriggerBehavior};

/// Default root note (middle C).
pub const DEFAULT_ROOT_NOTE: u8 = 60;

/// Default attack time in milliseconds.
pub const DEFAULT_ATTACK_MS: f32 = 1.0;

/// Default release time in milliseconds.
pub const DEFAULT_RELEASE_MS: f32 = 50.0;

/// Index of an instrument within its [`super::Program`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstrumentId(pub(crate) usize);

impl InstrumentId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Frame range that playback cycles through while a voice is sounding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopPoints {
    pub start: usize,
    pub end: usize,
}

/// Immutable mono sample data plus the metadata needed to play it across a key range.
#[derive(Clone)]
pub struct Instrument {
    name: String,
    data: Arc<Vec<f32>>,
    sample_rate: u32,
    root_note: u8,
    key_range: (u8, u8),
    channel: Option<u8>,
    gain: f32,
    attack_ms: f32,
    release_ms: f32,
    loop_points: Option<LoopPoints>,
    note_off: NoteOffBehavior,
    retrigger: RetriggerBehavior,
    max_voices: Option<u32>,
}

impl Instrument {
    /// Creates an instrument that answers every key on every channel at its native pitch
    /// for the default root note.
    pub fn new(name: &str, data: Arc<Vec<f32>>, sample_rate: u32) -> Instrument {
        Instrument {
            name: name.to_string(),
            data,
            sample_rate,
            root_note: DEFAULT_ROOT_NOTE,
            key_range: (0, 127),
            channel: None,
            gain: 1.0,
            attack_ms: DEFAULT_ATTACK_MS,
            release_ms: DEFAULT_RELEASE_MS,
            loop_points: None,
            note_off: NoteOffBehavior::default(),
            retrigger: RetriggerBehavior::default(),
            max_voices: None,
        }
    }

    pub fn with_root_note(mut self, root_note: u8) -> Self {
        self.root_note = root_note;
        self
    }

    pub fn with_key_range(mut self, low: u8, high: u8) -> Self {
        self.key_range = (low, high);
        self
    }

    pub fn with_channel(mut self, channel: Option<u8>) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_attack_ms(mut self, attack_ms: f32) -> Self {
        self.attack_ms = attack_ms.max(0.0);
        self
    }

    pub fn with_release_ms(mut self, release_ms: f32) -> Self {
        self.release_ms = release_ms.max(0.0);
        self
    }

    pub fn with_loop(mut self, loop_points: Option<LoopPoints>) -> Self {
        self.loop_points = loop_points;
        self
    }

    pub fn with_note_off(mut self, note_off: NoteOffBehavior) -> Self {
        self.note_off = note_off;
        self
    }

    pub fn with_retrigger(mut self, retrigger: RetriggerBehavior) -> Self {
        self.retrigger = retrigger;
        self
    }

    pub fn with_max_voices(mut self, max_voices: Option<u32>) -> Self {
        self.max_voices = max_voices;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn root_note(&self) -> u8 {
        self.root_note
    }

    pub fn key_range(&self) -> (u8, u8) {
        self.key_range
    }

    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn loop_points(&self) -> Option<LoopPoints> {
        self.loop_points
    }

    pub fn note_off(&self) -> NoteOffBehavior {
        self.note_off
    }

    pub fn retrigger(&self) -> RetriggerBehavior {
        self.retrigger
    }

    pub fn max_voices(&self) -> Option<u32> {
        self.max_voices
    }

    /// Returns true if this instrument answers the given note on the given channel.
    pub fn matches(&self, channel: u8, note: u8) -> bool {
        let (low, high) = self.key_range;
        note >= low && note <= high && self.channel.map_or(true, |c| c == channel)
    }

    /// The playhead increment, in source frames per output sample, for the given note.
    pub fn pitch_ratio(&self, note: u8, output_rate: u32) -> f64 {
        let semitones = note as f64 - self.root_note as f64;
        2f64.powf(semitones / 12.0) * self.sample_rate as f64 / output_rate.max(1) as f64
    }

    /// Attack length in samples at the given output rate.
    pub fn attack_samples(&self, output_rate: u32) -> u32 {
        ms_to_samples(self.attack_ms, output_rate)
    }

    /// Release length in samples at the given output rate.
    pub fn release_samples(&self, output_rate: u32) -> u32 {
        ms_to_samples(self.release_ms, output_rate)
    }

    /// Memory used by the sample data in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

fn ms_to_samples(ms: f32, rate: u32) -> u32 {
    (ms as f64 * rate as f64 / 1000.0).round() as u32
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name)
            .field("frames", &self.data.len())
            .field("sample_rate", &self.sample_rate)
            .field("root_note", &self.root_note)
            .field("key_range", &self.key_range)
            .field("channel", &self.channel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument(rate: u32) -> Instrument {
        Instrument::new("test", Arc::new(vec![0.0; 16]), rate)
    }

    #[test]
    fn test_pitch_ratio() {
        let inst = instrument(48000).with_root_note(60);
        assert!((inst.pitch_ratio(60, 48000) - 1.0).abs() < 1e-12);
        assert!((inst.pitch_ratio(72, 48000) - 2.0).abs() < 1e-12);
        assert!((inst.pitch_ratio(48, 48000) - 0.5).abs() < 1e-12);

        // A 44.1k sample played at its root on a 48k device.
        let inst = instrument(44100).with_root_note(60);
        assert!((inst.pitch_ratio(60, 48000) - 44100.0 / 48000.0).abs() < 1e-12);
    }

    #[test]
    fn test_matches() {
        let inst = instrument(48000).with_key_range(36, 38).with_channel(Some(9));
        assert!(inst.matches(9, 36));
        assert!(inst.matches(9, 38));
        assert!(!inst.matches(9, 39));
        assert!(!inst.matches(0, 36));

        let inst = instrument(48000).with_key_range(60, 60);
        assert!(inst.matches(0, 60));
        assert!(inst.matches(15, 60));
        assert!(!inst.matches(0, 61));
    }

    #[test]
    fn test_envelope_lengths() {
        let inst = instrument(48000).with_attack_ms(2.0).with_release_ms(50.0);
        assert_eq!(96, inst.attack_samples(48000));
        assert_eq!(2400, inst.release_samples(48000));
    }
}
