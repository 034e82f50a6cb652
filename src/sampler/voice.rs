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

//! A single sounding instance of an instrument.
//!
//! Voices resample their instrument's data with linear interpolation and shape it with
//! a linear attack/sustain/release envelope. A voice that is being stolen runs a short
//! fixed ramp to silence instead of its release.

use crate::config::program::NoteOffBehavior;
use crate::program::{Instrument, InstrumentId};

use super::STEAL_RAMP_SAMPLES;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stage {
    Attack,
    Sustain,
    Release,
    Steal,
    Idle,
}

/// Shortest time a note sounds before a note-off can start its release. A note-off
/// that arrives earlier is held back until then, so taps are audible.
pub const MIN_GATE_SAMPLES: u32 = STEAL_RAMP_SAMPLES;

/// Linear amplitude envelope. Ramps are counted in samples so they end exactly on time.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Envelope {
    stage: Stage,
    level: f32,
    step: f32,
    remaining: u32,
    elapsed: u32,
    held_release: Option<u32>,
}

impl Envelope {
    fn attack(samples: u32) -> Envelope {
        let samples = samples.max(1);
        Envelope {
            stage: Stage::Attack,
            level: 0.0,
            step: 1.0 / samples as f32,
            remaining: samples,
            elapsed: 0,
            held_release: None,
        }
    }

    fn ramp_down(&mut self, stage: Stage, samples: u32) {
        self.held_release = None;
        if samples == 0 || self.level <= 0.0 {
            self.stage = Stage::Idle;
            self.level = 0.0;
            return;
        }
        self.stage = stage;
        self.step = self.level / samples as f32;
        self.remaining = samples;
    }

    /// Starts the release, or holds it until the minimum gate has elapsed.
    fn release(&mut self, samples: u32) {
        if !matches!(self.stage, Stage::Attack | Stage::Sustain) {
            return;
        }
        if self.elapsed < MIN_GATE_SAMPLES {
            self.held_release = Some(samples);
        } else {
            self.ramp_down(Stage::Release, samples);
        }
    }

    /// Returns the level for the current sample and moves to the next one.
    fn next(&mut self) -> f32 {
        let level = self.level;
        self.elapsed = self.elapsed.saturating_add(1);
        match self.stage {
            Stage::Attack => {
                self.level += self.step;
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.level = 1.0;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Release | Stage::Steal => {
                self.level -= self.step;
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                }
            }
            Stage::Sustain | Stage::Idle => {}
        }
        if self.elapsed >= MIN_GATE_SAMPLES {
            if let Some(samples) = self.held_release {
                self.ramp_down(Stage::Release, samples);
            }
        }
        level
    }
}

/// A playing note. Holds an index into the program, never the sample data itself.
#[derive(Clone, Debug)]
pub struct Voice {
    instrument: InstrumentId,
    note: u8,
    channel: u8,
    gain: f32,
    position: f64,
    increment: f64,
    envelope: Envelope,
    release_samples: u32,
    ignores_note_off: bool,
    age: u64,
}

impl Voice {
    /// Prepares a voice for the given note. The envelope starts from silence.
    pub fn new(
        id: InstrumentId,
        instrument: &Instrument,
        channel: u8,
        note: u8,
        velocity: u8,
        output_rate: u32,
    ) -> Voice {
        Voice {
            instrument: id,
            note,
            channel,
            gain: instrument.gain() * velocity as f32 / 127.0,
            position: 0.0,
            increment: instrument.pitch_ratio(note, output_rate),
            envelope: Envelope::attack(
                instrument
                    .attack_samples(output_rate)
                    .max(STEAL_RAMP_SAMPLES),
            ),
            release_samples: instrument.release_samples(output_rate),
            ignores_note_off: instrument.note_off() == NoteOffBehavior::PlayToCompletion,
            age: 0,
        }
    }

    pub fn instrument(&self) -> InstrumentId {
        self.instrument
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Trigger order. Lower is older.
    pub fn age(&self) -> u64 {
        self.age
    }

    pub(crate) fn set_age(&mut self, age: u64) {
        self.age = age;
    }

    /// Current loudness, used to pick the quietest voice.
    pub fn level(&self) -> f32 {
        self.envelope.level * self.gain
    }

    pub fn is_stealing(&self) -> bool {
        self.envelope.stage == Stage::Steal
    }

    /// True once a note-off was accepted, including one held back by the minimum gate.
    pub fn is_releasing(&self) -> bool {
        self.envelope.stage == Stage::Release || self.envelope.held_release.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.stage == Stage::Idle
    }

    /// Handles a note-off. Instruments that play to completion ignore it.
    pub fn note_off(&mut self) {
        if !self.ignores_note_off {
            self.release();
        }
    }

    /// Starts the release from the current level.
    pub fn release(&mut self) {
        self.envelope.release(self.release_samples);
    }

    /// Starts the fast ramp to silence that precedes reuse of this voice's slot. A voice
    /// that has not sounded yet finishes at once.
    pub fn steal(&mut self) {
        if self.envelope.stage != Stage::Idle && self.envelope.stage != Stage::Steal {
            self.envelope.ramp_down(Stage::Steal, STEAL_RAMP_SAMPLES);
        }
    }

    /// Mixes this voice into `out`. Returns how many samples were written before the
    /// voice finished, which is `out.len()` if it is still sounding afterwards.
    pub fn render(&mut self, instrument: &Instrument, out: &mut [f32], channel_gain: f32) -> usize {
        let data = instrument.data();
        let loop_points = instrument
            .loop_points()
            .filter(|lp| lp.start < lp.end && lp.end <= data.len());
        let gain = self.gain * channel_gain;

        for (i, sample) in out.iter_mut().enumerate() {
            if self.envelope.stage == Stage::Idle {
                return i;
            }

            if let Some(lp) = loop_points {
                let end = lp.end as f64;
                if self.position >= end {
                    let span = (lp.end - lp.start) as f64;
                    self.position = lp.start as f64 + (self.position - end) % span;
                }
            }

            let index = self.position as usize;
            if index >= data.len() {
                self.envelope.stage = Stage::Idle;
                self.envelope.level = 0.0;
                return i;
            }

            let frac = (self.position - index as f64) as f32;
            let s0 = data[index];
            let s1 = match loop_points {
                Some(lp) if index + 1 == lp.end => data[lp.start],
                _ => data.get(index + 1).copied().unwrap_or(s0),
            };

            *sample += (s0 + (s1 - s0) * frac) * self.envelope.next() * gain;
            self.position += self.increment;
        }
        out.len()
    }
}
