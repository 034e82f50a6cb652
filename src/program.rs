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

//! Instruments and the program that maps notes onto them.
//!
//! A program is loaded once at startup and never changes afterwards, so the render thread
//! reads it without any synchronization.

mod error;
mod instrument;
mod loader;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::program::{InstrumentDefinition, ProgramFile};
use crate::sampler::{MAX_NOTE, NUM_CHANNELS};

pub use error::LoadError;
pub use instrument::{Instrument, InstrumentId, LoopPoints};
pub use loader::{LoadedSample, SampleLoader};

/// An ordered, immutable set of instruments.
#[derive(Debug, Default)]
pub struct Program {
    instruments: Vec<Instrument>,
}

impl Program {
    pub fn new(instruments: Vec<Instrument>) -> Program {
        Program { instruments }
    }

    /// The first instrument, in declaration order, that answers the note on the channel.
    pub fn find(&self, channel: u8, note: u8) -> Option<InstrumentId> {
        self.instruments
            .iter()
            .position(|i| i.matches(channel, note))
            .map(InstrumentId)
    }

    pub fn get(&self, id: InstrumentId) -> Option<&Instrument> {
        self.instruments.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter()
    }

    /// Memory held by sample data, counting shared data once per instrument.
    pub fn memory_size(&self) -> usize {
        self.instruments.iter().map(|i| i.memory_size()).sum()
    }
}

/// Reads a program file and loads every sample it references.
pub fn load_program(path: &Path) -> Result<Program, LoadError> {
    let file = ProgramFile::deserialize(path)?;
    if file.instruments().is_empty() {
        return Err(LoadError::NoInstruments(path.to_path_buf()));
    }

    let base_path = path.parent().unwrap_or(Path::new(""));
    let mut loader = SampleLoader::new();
    let instruments = file
        .instruments()
        .iter()
        .map(|definition| build_instrument(definition, base_path, &mut loader))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        path = ?path,
        instruments = instruments.len(),
        memory_kb = loader.total_memory_usage() / 1024,
        "Program loaded"
    );
    Ok(Program::new(instruments))
}

fn build_instrument(
    definition: &InstrumentDefinition,
    base_path: &Path,
    loader: &mut SampleLoader,
) -> Result<Instrument, LoadError> {
    let name = definition.name();
    if definition.root_note() > MAX_NOTE {
        return Err(LoadError::InvalidRootNote {
            name: name.to_string(),
            note: definition.root_note(),
        });
    }
    let (low, high) = match definition.key_range() {
        Some((low, high)) if low <= high && high <= MAX_NOTE => (low, high),
        _ => {
            return Err(LoadError::InvalidKeyRange {
                name: name.to_string(),
            })
        }
    };
    if let Some(channel) = definition.channel() {
        if channel as usize >= NUM_CHANNELS {
            return Err(LoadError::InvalidChannel {
                name: name.to_string(),
                channel,
            });
        }
    }

    let file = Path::new(definition.file());
    let full_path = if file.is_absolute() {
        PathBuf::from(file)
    } else {
        base_path.join(file)
    };
    let sample = loader.load(&full_path)?;

    let loop_points = match definition.loop_points() {
        Some(lp) if lp.start < lp.end && lp.end <= sample.frames() => Some(LoopPoints {
            start: lp.start,
            end: lp.end,
        }),
        Some(lp) => {
            return Err(LoadError::InvalidLoop {
                name: name.to_string(),
                start: lp.start,
                end: lp.end,
                frames: sample.frames(),
            })
        }
        None => None,
    };

    Ok(Instrument::new(name, sample.data(), sample.sample_rate())
        .with_root_note(definition.root_note())
        .with_key_range(low, high)
        .with_channel(definition.channel())
        .with_gain(definition.gain())
        .with_attack_ms(definition.attack_ms())
        .with_release_ms(definition.release_ms())
        .with_loop(loop_points)
        .with_note_off(definition.note_off())
        .with_retrigger(definition.retrigger())
        .with_max_voices(definition.max_voices()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::program::{NoteOffBehavior, RetriggerBehavior};

    fn write_wav(path: &Path, frames: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(8192i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn program_dir(yaml: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("samples")).unwrap();
        write_wav(&dir.path().join("samples").join("kick.wav"), 1000);
        write_wav(&dir.path().join("samples").join("pad.wav"), 4000);
        let path = dir.path().join("program.yaml");
        std::fs::write(&path, yaml).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_program() {
        let (_dir, path) = program_dir(
            r#"
instruments:
  - name: kick
    file: samples/kick.wav
    root_note: 36
    channel: 9
    note_off: play_to_completion
  - name: pad
    file: samples/pad.wav
    root_note: 60
    key_range: [48, 72]
    loop:
      start: 100
      end: 3900
    retrigger: polyphonic
    max_voices: 4
  - name: kick-everywhere
    file: samples/kick.wav
    key_range: [0, 127]
"#,
        );

        let program = load_program(&path).unwrap();
        assert_eq!(3, program.len());

        let kick = program.get(program.find(9, 36).unwrap()).unwrap();
        assert_eq!("kick", kick.name());
        assert_eq!(44100, kick.sample_rate());
        assert_eq!(1000, kick.data().len());
        assert_eq!(NoteOffBehavior::PlayToCompletion, kick.note_off());

        let pad = program.get(program.find(0, 50).unwrap()).unwrap();
        assert_eq!("pad", pad.name());
        assert_eq!(Some(LoopPoints { start: 100, end: 3900 }), pad.loop_points());
        assert_eq!(RetriggerBehavior::Polyphonic, pad.retrigger());
        assert_eq!(Some(4), pad.max_voices());

        // Declaration order wins when ranges overlap.
        assert_eq!("pad", program.get(program.find(9, 60).unwrap()).unwrap().name());
        assert_eq!(
            "kick-everywhere",
            program.get(program.find(0, 36).unwrap()).unwrap().name()
        );

        // The kick file is decoded once and shared.
        let first = program.get(InstrumentId(0)).unwrap();
        let last = program.get(InstrumentId(2)).unwrap();
        assert!(std::ptr::eq(first.data(), last.data()));
    }

    #[test]
    fn test_find_without_match() {
        let program = Program::new(vec![Instrument::new("a", Arc::new(vec![0.0; 4]), 48000)
            .with_key_range(10, 20)
            .with_channel(Some(1))]);
        assert_eq!(Some(InstrumentId(0)), program.find(1, 15));
        assert_eq!(None, program.find(0, 15));
        assert_eq!(None, program.find(1, 21));
        assert!(Program::default().find(0, 60).is_none());
    }

    #[test]
    fn test_invalid_loop() {
        let (_dir, path) = program_dir(
            r#"
instruments:
  - name: pad
    file: samples/pad.wav
    loop:
      start: 100
      end: 5000
"#,
        );
        assert!(matches!(
            load_program(&path),
            Err(LoadError::InvalidLoop { frames: 4000, .. })
        ));
    }

    #[test]
    fn test_invalid_key_range() {
        let (_dir, path) = program_dir(
            r#"
instruments:
  - name: pad
    file: samples/pad.wav
    key_range: [72, 48]
"#,
        );
        assert!(matches!(
            load_program(&path),
            Err(LoadError::InvalidKeyRange { .. })
        ));
    }

    #[test]
    fn test_invalid_channel() {
        let (_dir, path) = program_dir(
            r#"
instruments:
  - name: pad
    file: samples/pad.wav
    channel: 16
"#,
        );
        assert!(matches!(
            load_program(&path),
            Err(LoadError::InvalidChannel { channel: 16, .. })
        ));
    }

    #[test]
    fn test_missing_sample() {
        let (_dir, path) = program_dir(
            r#"
instruments:
  - name: snare
    file: samples/snare.wav
"#,
        );
        assert!(matches!(load_program(&path), Err(LoadError::Io { .. })));
    }

    #[test]
    fn test_empty_program() {
        let (_dir, path) = program_dir("instruments: []\n");
        assert!(matches!(
            load_program(&path),
            Err(LoadError::NoInstruments(_))
        ));
    }
}
