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

//! The real-time sampler core.
//!
//! This module provides:
//! - A bounded, non-blocking event queue between control threads and the render thread
//! - A fixed-capacity voice pool with a selectable stealing strategy
//! - A beat-synchronized step sequencer for binary note patterns
//! - The render entrypoint that mixes every active voice into a mono buffer
//!
//! The render side ([`Sampler`]) is owned by whatever thread services the audio device.
//! Control threads talk to it only through a cloneable [`SamplerHandle`].

mod control;
mod engine;
mod error;
mod event;
mod pool;
mod queue;
mod sequencer;
mod stats;
mod transport;
mod voice;

pub use control::SamplerHandle;
pub use engine::{Sampler, SamplerSettings, DEFAULT_SAMPLE_RATE};
pub use error::{QueueFull, SamplerError};
pub use event::{MidiEvent, Status, CC_ALL_NOTES_OFF, CC_ALL_SOUND_OFF, CC_CHANNEL_VOLUME};
pub use pool::{StealPolicy, Trigger, VoiceHandle, VoicePool, DEFAULT_VOICES};
pub use queue::DEFAULT_QUEUE_CAPACITY;
pub use sequencer::{Clip, InvalidPattern, NoteSeq, SequencerState, Step, StepEvent, MAX_CLIP_NOTES};
pub use stats::StatsSnapshot;
pub use transport::{PlayState, Transport, DEFAULT_TEMPO, MAX_TEMPO};
pub use voice::{Voice, MIN_GATE_SAMPLES};

/// Number of addressable channels.
pub const NUM_CHANNELS: usize = 16;

/// Highest valid note number and velocity.
pub const MAX_NOTE: u8 = 127;

/// Length of the fade applied to a voice before its slot is reused, in samples.
pub const STEAL_RAMP_SAMPLES: u32 = 64;
