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
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

/// A YAML representation of a program: the instruments the sampler can play.
#[derive(Deserialize, Clone, Debug)]
pub struct ProgramFile {
    instruments: Vec<InstrumentDefinition>,
}

impl ProgramFile {
    /// Parse a program from a YAML file.
    pub fn deserialize(path: &Path) -> Result<ProgramFile, config::ConfigError> {
        Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<ProgramFile>()
    }

    pub fn instruments(&self) -> &[InstrumentDefinition] {
        &self.instruments
    }
}

/// A YAML representation of a single instrument.
#[derive(Deserialize, Clone, Debug)]
pub struct InstrumentDefinition {
    /// The name used in logs.
    name: String,

    /// The audio file, relative to the program file.
    file: String,

    /// The note at which the sample plays at its native pitch.
    #[serde(default = "default_root_note")]
    root_note: u8,

    /// The lowest and highest note this instrument answers. Defaults to the root note only.
    key_range: Option<Vec<u8>>,

    /// The channel this instrument answers. Absent means every channel.
    channel: Option<u8>,

    #[serde(default = "default_gain")]
    gain: f32,

    #[serde(default = "default_attack_ms")]
    attack_ms: f32,

    #[serde(default = "default_release_ms")]
    release_ms: f32,

    /// Frames to cycle through while the note is held.
    #[serde(rename = "loop")]
    loop_points: Option<LoopDefinition>,

    /// Behavior when a note-off event is received.
    #[serde(default)]
    note_off: NoteOffBehavior,

    /// Behavior when the same note is triggered while still playing.
    #[serde(default)]
    retrigger: RetriggerBehavior,

    /// Maximum number of concurrent voices for this instrument.
    /// If not set, only the pool capacity applies.
    max_voices: Option<u32>,
}

fn default_root_note() -> u8 {
    60
}

fn default_gain() -> f32 {
    1.0
}

fn default_attack_ms() -> f32 {
    1.0
}

fn default_release_ms() -> f32 {
    50.0
}

impl InstrumentDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn root_note(&self) -> u8 {
        self.root_note
    }

    /// Gets the key range, falling back to the root note alone.
    pub fn key_range(&self) -> Option<(u8, u8)> {
        match self.key_range.as_deref() {
            None => Some((self.root_note, self.root_note)),
            Some([low, high]) => Some((*low, *high)),
            Some([note]) => Some((*note, *note)),
            Some(_) => None,
        }
    }

    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn attack_ms(&self) -> f32 {
        self.attack_ms
    }

    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    pub fn loop_points(&self) -> Option<&LoopDefinition> {
        self.loop_points.as_ref()
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
}

/// Loop region in frames. `end` is exclusive.
#[derive(Deserialize, Clone, Debug)]
pub struct LoopDefinition {
    pub start: usize,
    pub end: usize,
}

/// Behavior when a note-off event is received for a playing voice.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteOffBehavior {
    /// Start the instrument's release.
    #[default]
    Release,
    /// Ignore the note-off and let the sample play out. Suited to one-shot drums.
    PlayToCompletion,
}

/// Behavior when a note is triggered again while a previous voice for it is playing.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerBehavior {
    /// Fade out the previous voice before the new one starts.
    #[default]
    Cut,
    /// Let voices for the same note overlap.
    Polyphonic,
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> ProgramFile {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<ProgramFile>()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let program = parse(
            r#"
            instruments:
              - name: kick
                file: kick.wav
            "#,
        );
        let kick = &program.instruments()[0];
        assert_eq!("kick", kick.name());
        assert_eq!("kick.wav", kick.file());
        assert_eq!(60, kick.root_note());
        assert_eq!(Some((60, 60)), kick.key_range());
        assert_eq!(None, kick.channel());
        assert_eq!(1.0, kick.gain());
        assert_eq!(50.0, kick.release_ms());
        assert!(kick.loop_points().is_none());
        assert_eq!(NoteOffBehavior::Release, kick.note_off());
        assert_eq!(RetriggerBehavior::Cut, kick.retrigger());
        assert_eq!(None, kick.max_voices());
    }

    #[test]
    fn test_full_definition() {
        let program = parse(
            r#"
            instruments:
              - name: pad
                file: samples/pad.flac
                root_note: 48
                key_range: [36, 72]
                channel: 2
                gain: 0.5
                attack_ms: 20
                release_ms: 400
                loop:
                  start: 1000
                  end: 20000
                note_off: release
                retrigger: polyphonic
                max_voices: 6
              - name: hat
                file: hat.wav
                root_note: 42
                key_range: [42]
                note_off: play_to_completion
            "#,
        );
        let pad = &program.instruments()[0];
        assert_eq!(48, pad.root_note());
        assert_eq!(Some((36, 72)), pad.key_range());
        assert_eq!(Some(2), pad.channel());
        assert_eq!(0.5, pad.gain());
        assert_eq!(20.0, pad.attack_ms());
        assert_eq!(400.0, pad.release_ms());
        let lp = pad.loop_points().unwrap();
        assert_eq!((1000, 20000), (lp.start, lp.end));
        assert_eq!(RetriggerBehavior::Polyphonic, pad.retrigger());
        assert_eq!(Some(6), pad.max_voices());

        let hat = &program.instruments()[1];
        assert_eq!(Some((42, 42)), hat.key_range());
        assert_eq!(NoteOffBehavior::PlayToCompletion, hat.note_off());
    }

    #[test]
    fn test_bad_key_range() {
        let program = parse(
            r#"
            instruments:
              - name: bad
                file: bad.wav
                key_range: [1, 2, 3]
            "#,
        );
        assert_eq!(None, program.instruments()[0].key_range());
    }
}
