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
use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::sampler::{Clip, InvalidPattern, NoteSeq, MAX_NOTE, NUM_CHANNELS};

const DEFAULT_NOTE: u32 = 64;
const DEFAULT_VELOCITY: u32 = 64;
const DEFAULT_STEP_DURATION: f64 = 1.0;

/// A YAML representation of the key bindings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct KeyMapConfig {
    #[serde(default)]
    keys: Vec<KeyConfig>,

    #[serde(default)]
    sequences: Vec<SequenceConfig>,
}

/// A key that plays a single note while it is held.
#[derive(Deserialize, Clone, Debug)]
pub struct KeyConfig {
    key: String,

    #[serde(default = "default_note")]
    note: u32,

    #[serde(default = "default_velocity", alias = "vel")]
    velocity: u32,

    #[serde(default, alias = "chan")]
    channel: u32,
}

/// A key that toggles a clip on its channel.
#[derive(Deserialize, Clone, Debug)]
pub struct SequenceConfig {
    key: String,

    #[serde(default, alias = "chan")]
    channel: u32,

    /// Length of one step in beats.
    #[serde(default = "default_step_duration", alias = "stepdur")]
    step_duration: f64,

    #[serde(default)]
    notes: Vec<SequenceNoteConfig>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SequenceNoteConfig {
    #[serde(default = "default_note")]
    note: u32,

    #[serde(default = "default_velocity", alias = "vel")]
    velocity: u32,

    /// Pattern such as `"1000 1000"`.
    data: String,
}

fn default_note() -> u32 {
    DEFAULT_NOTE
}

fn default_velocity() -> u32 {
    DEFAULT_VELOCITY
}

fn default_step_duration() -> f64 {
    DEFAULT_STEP_DURATION
}

/// Why a single binding was skipped.
#[derive(Debug, thiserror::Error)]
enum BindingError {
    #[error("key must be a single character, got {0:?}")]
    Key(String),

    #[error("note {0} is out of range")]
    Note(u32),

    #[error("velocity {0} is out of range")]
    Velocity(u32),

    #[error("channel {0} is out of range")]
    Channel(u32),

    #[error(transparent)]
    Pattern(#[from] InvalidPattern),
}

/// What pressing a key does.
#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
    /// NOTE_ON on key-down, NOTE_OFF on key-up.
    Note { channel: u8, note: u8, velocity: u8 },
    /// Installs the clip on key-down, or clears it if it is already playing.
    Sequence(Arc<Clip>),
}

/// Immutable key bindings, built once from the configuration. A key can carry one note
/// binding and one sequence binding, and pressing it fires both.
#[derive(Clone, Debug, Default)]
pub struct KeyMap {
    bindings: HashMap<char, Vec<Binding>>,
}

impl KeyMap {
    /// Builds the key map. Invalid bindings are logged and skipped.
    pub fn from_config(config: &KeyMapConfig) -> KeyMap {
        let mut bindings: HashMap<char, Vec<Binding>> = HashMap::new();

        let notes = config.keys.iter().map(|k| (&k.key, note_binding(k)));
        let sequences = config
            .sequences
            .iter()
            .map(|s| (&s.key, sequence_binding(s)));

        for (key, result) in notes.chain(sequences) {
            match result {
                Ok((key, binding)) => {
                    debug!(key = %key, binding = ?binding, "Bound key");
                    let existing = bindings.entry(key).or_default();
                    let kind = mem::discriminant(&binding);
                    match existing.iter_mut().find(|b| mem::discriminant(&**b) == kind) {
                        Some(previous) => {
                            warn!(key = %key, "Key bound more than once, keeping the last binding");
                            *previous = binding;
                        }
                        None => existing.push(binding),
                    }
                }
                Err(e) => warn!(key = key.as_str(), err = %e, "Skipping invalid key binding"),
            }
        }

        KeyMap { bindings }
    }

    /// Bindings for the key, note binding first. Empty for an unbound key.
    pub fn get(&self, key: char) -> &[Binding] {
        self.bindings.get(&key).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = char> + '_ {
        self.bindings.keys().copied()
    }
}

fn parse_key(key: &str) -> Result<char, BindingError> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(BindingError::Key(key.to_string())),
    }
}

fn parse_note(note: u32) -> Result<u8, BindingError> {
    u8::try_from(note)
        .ok()
        .filter(|n| *n <= MAX_NOTE)
        .ok_or(BindingError::Note(note))
}

fn parse_velocity(velocity: u32) -> Result<u8, BindingError> {
    u8::try_from(velocity)
        .ok()
        .filter(|v| *v <= MAX_NOTE)
        .ok_or(BindingError::Velocity(velocity))
}

fn parse_channel(channel: u32) -> Result<u8, BindingError> {
    u8::try_from(channel)
        .ok()
        .filter(|c| (*c as usize) < NUM_CHANNELS)
        .ok_or(BindingError::Channel(channel))
}

fn note_binding(config: &KeyConfig) -> Result<(char, Binding), BindingError> {
    Ok((
        parse_key(&config.key)?,
        Binding::Note {
            channel: parse_channel(config.channel)?,
            note: parse_note(config.note)?,
            velocity: parse_velocity(config.velocity)?,
        },
    ))
}

fn sequence_binding(config: &SequenceConfig) -> Result<(char, Binding), BindingError> {
    let key = parse_key(&config.key)?;
    let channel = parse_channel(config.channel)?;
    let notes = config
        .notes
        .iter()
        .map(|n| -> Result<NoteSeq, BindingError> {
            Ok(NoteSeq::parse(
                parse_note(n.note)?,
                parse_velocity(n.velocity)?,
                &n.data,
                config.step_duration,
            )?)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((key, Binding::Sequence(Arc::new(Clip::new(channel, notes)?))))
}
