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

//! Binary step patterns and their conversion into note events.
//!
//! Step `k` of a sequence sits at beat `k * step_duration` on a grid anchored at beat
//! zero, and the pattern repeats forever in both directions. A triggered step opens a
//! gate that is closed on the next step boundary, so every note lasts exactly one step.

use std::cmp::Ordering;
use std::fmt;

use super::{MidiEvent, Status, MAX_NOTE, NUM_CHANNELS};

/// The most note sequences a single clip may hold.
pub const MAX_CLIP_NOTES: usize = 32;

/// Step indices further from zero than this are not scheduled. Below it every index is
/// exact as an f64.
const MAX_STEP_INDEX: f64 = (1u64 << 52) as f64;

/// Reasons a pattern is rejected when it is loaded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidPattern {
    #[error("step duration must be a positive number of beats, got {0}")]
    StepDuration(f64),

    #[error("pattern contains {0:?}, only digits are allowed")]
    NonDigit(char),

    #[error("pattern has no steps")]
    Empty,

    #[error("note {0} is out of range")]
    Note(u8),

    #[error("velocity {0} is out of range")]
    Velocity(u8),

    #[error("channel {0} is out of range")]
    Channel(u8),

    #[error("clip has no note sequences")]
    EmptyClip,

    #[error("clip has {0} note sequences, at most {MAX_CLIP_NOTES} are supported")]
    TooManyNotes(usize),
}

/// One subdivision of a pattern. Either triggers its note or stays silent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step(pub bool);

impl Step {
    pub fn is_triggered(&self) -> bool {
        self.0
    }
}

/// A note number paired with the steps that trigger it.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteSeq {
    note: u8,
    velocity: u8,
    steps: Vec<Step>,
    step_duration: f64,
}

impl NoteSeq {
    pub fn new(
        note: u8,
        velocity: u8,
        steps: Vec<Step>,
        step_duration: f64,
    ) -> Result<NoteSeq, InvalidPattern> {
        if !step_duration.is_finite() || step_duration <= 0.0 {
            return Err(InvalidPattern::StepDuration(step_duration));
        }
        if steps.is_empty() {
            return Err(InvalidPattern::Empty);
        }
        if note > MAX_NOTE {
            return Err(InvalidPattern::Note(note));
        }
        if velocity > MAX_NOTE {
            return Err(InvalidPattern::Velocity(velocity));
        }
        Ok(NoteSeq {
            note,
            velocity,
            steps,
            step_duration,
        })
    }

    /// Parses a pattern such as `"1000 1010"`. Whitespace is ignored, '0' is a silent
    /// step and any other digit triggers.
    pub fn parse(
        note: u8,
        velocity: u8,
        pattern: &str,
        step_duration: f64,
    ) -> Result<NoteSeq, InvalidPattern> {
        let steps = pattern
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c.to_digit(10) {
                Some(digit) => Ok(Step(digit != 0)),
                None => Err(InvalidPattern::NonDigit(c)),
            })
            .collect::<Result<Vec<Step>, InvalidPattern>>()?;
        NoteSeq::new(note, velocity, steps, step_duration)
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_duration(&self) -> f64 {
        self.step_duration
    }

    /// The step at absolute index `k`, wrapping in both directions.
    pub fn step_at(&self, k: i64) -> Step {
        self.steps[k.rem_euclid(self.steps.len() as i64) as usize]
    }

    /// Index of the first step boundary at or after `beat`, or `None` if it is outside
    /// the schedulable range.
    fn first_boundary(&self, beat: f64) -> Option<i64> {
        let d = self.step_duration;
        let k = (beat / d).ceil();
        if !k.is_finite() || k.abs() > MAX_STEP_INDEX {
            return None;
        }
        // Correct for rounding in the division.
        let mut k = k as i64;
        while (k as f64) * d < beat {
            k += 1;
        }
        while ((k - 1) as f64) * d >= beat {
            k -= 1;
        }
        Some(k)
    }

    /// Number of triggered steps with an index in `[from, to)`.
    fn triggers_between(&self, from: i64, to: i64) -> usize {
        if to <= from {
            return 0;
        }
        let before = |k: i64| -> i128 {
            let len = self.steps.len() as i64;
            let per_cycle = self.steps.iter().filter(|s| s.is_triggered()).count() as i128;
            let partial = self.steps[..k.rem_euclid(len) as usize]
                .iter()
                .filter(|s| s.is_triggered())
                .count() as i128;
            k.div_euclid(len) as i128 * per_cycle + partial
        };
        usize::try_from(before(to) - before(from)).unwrap_or(usize::MAX)
    }
}

impl fmt::Display for NoteSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pattern: String = self
            .steps
            .iter()
            .map(|s| if s.is_triggered() { '1' } else { '0' })
            .collect();
        write!(f, "note {} [{}] every {} beats", self.note, pattern, self.step_duration)
    }
}

/// A set of note sequences that play together on one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    channel: u8,
    notes: Vec<NoteSeq>,
}

impl Clip {
    pub fn new(channel: u8, notes: Vec<NoteSeq>) -> Result<Clip, InvalidPattern> {
        if channel as usize >= NUM_CHANNELS {
            return Err(InvalidPattern::Channel(channel));
        }
        if notes.is_empty() {
            return Err(InvalidPattern::EmptyClip);
        }
        if notes.len() > MAX_CLIP_NOTES {
            return Err(InvalidPattern::TooManyNotes(notes.len()));
        }
        Ok(Clip { channel, notes })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn notes(&self) -> &[NoteSeq] {
        &self.notes
    }
}

/// A note event produced by a sequencer, positioned in beats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepEvent {
    pub beat: f64,
    pub event: MidiEvent,
}

impl StepEvent {
    fn order(&self, other: &StepEvent) -> Ordering {
        let rank = |e: &StepEvent| match e.event.status {
            Status::NoteOff => 0,
            _ => 1,
        };
        self.beat
            .total_cmp(&other.beat)
            .then(rank(self).cmp(&rank(other)))
            .then(self.event.key.cmp(&other.event.key))
    }
}

/// Render-side state of a channel's sequencer: which notes are currently gated on.
#[derive(Clone, Debug, Default)]
pub struct SequencerState {
    gates: [bool; MAX_CLIP_NOTES],
}

impl SequencerState {
    pub fn new() -> SequencerState {
        SequencerState::default()
    }

    /// Returns true if the clip's `index`th sequence has a note sounding.
    pub fn is_gated(&self, index: usize) -> bool {
        self.gates.get(index).copied().unwrap_or(false)
    }

    pub fn any_gated(&self) -> bool {
        self.gates.iter().any(|g| *g)
    }

    /// Appends, in beat order, every event the clip produces over `[start, end)`.
    ///
    /// Events are only pushed while `out` has spare capacity so the buffer is never
    /// reallocated. Once it is full the remaining steps are counted rather than walked,
    /// so the cost is bounded by the buffer size whatever the interval. Returns how many
    /// events were dropped for lack of room.
    pub fn advance(&mut self, clip: &Clip, start: f64, end: f64, out: &mut Vec<StepEvent>) -> usize {
        if !start.is_finite() || !end.is_finite() || start >= end {
            return 0;
        }

        let first = out.len();
        let mut dropped = 0;
        let mut skipped: usize = 0;
        let mut push = |out: &mut Vec<StepEvent>, event: StepEvent| {
            if out.len() < out.capacity() {
                out.push(event);
            } else {
                dropped += 1;
            }
        };

        for (index, seq) in clip.notes.iter().enumerate() {
            let (Some(from), Some(to)) = (seq.first_boundary(start), seq.first_boundary(end))
            else {
                continue;
            };
            if from >= to {
                continue;
            }
            let gate = &mut self.gates[index];

            // A pattern with no triggers can only close a gate left open.
            if seq.triggers_between(0, seq.steps.len() as i64) == 0 {
                if std::mem::take(gate) {
                    push(out, StepEvent {
                        beat: from as f64 * seq.step_duration,
                        event: MidiEvent::note_off(clip.channel, seq.note),
                    });
                }
                continue;
            }

            // Every pattern cycle holds a trigger, so this walk ends within a few cycles
            // of the buffer filling up.
            let mut k = from;
            while k < to && out.len() < out.capacity() {
                let beat = k as f64 * seq.step_duration;
                if *gate {
                    push(out, StepEvent {
                        beat,
                        event: MidiEvent::note_off(clip.channel, seq.note),
                    });
                    *gate = false;
                }
                if seq.step_at(k).is_triggered() {
                    push(out, StepEvent {
                        beat,
                        event: MidiEvent::note_on(clip.channel, seq.note, seq.velocity),
                    });
                    *gate = true;
                }
                k += 1;
            }

            if k < to {
                // Steps `k..to` did not fit: one note-on per trigger, and a note-off for
                // the open gate and for every trigger but one on the last step.
                let ons = seq.triggers_between(k, to);
                let offs = *gate as usize + seq.triggers_between(k, to - 1);
                skipped = skipped.saturating_add(ons).saturating_add(offs);
                *gate = seq.step_at(to - 1).is_triggered();
            }
        }

        out[first..].sort_unstable_by(StepEvent::order);
        dropped + skipped
    }

    /// Closes every open gate at `beat`. Used when the clip is removed or replaced, or
    /// when the transport stops.
    pub fn release(&mut self, clip: &Clip, beat: f64, out: &mut Vec<StepEvent>) -> usize {
        let mut dropped = 0;
        for (index, seq) in clip.notes.iter().enumerate() {
            if std::mem::take(&mut self.gates[index]) {
                if out.len() < out.capacity() {
                    out.push(StepEvent {
                        beat,
                        event: MidiEvent::note_off(clip.channel, seq.note),
                    });
                } else {
                    dropped += 1;
                }
            }
        }
        dropped
    }
}
