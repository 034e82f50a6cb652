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

//! The render entrypoint.
//!
//! Each block runs in a fixed order: pick up clip changes, drain and apply queued
//! events, run the step sequencers over the block's beat interval, then mix every
//! voice. Sequencer events land on the sample they fall on, so voices are rendered in
//! segments split at those offsets. Nothing in here allocates, blocks, or logs.

use std::fmt;
use std::sync::Arc;

use crate::config::program::RetriggerBehavior;
use crate::program::Program;

use super::control::{SamplerHandle, Shared};
use super::event::{CC_ALL_NOTES_OFF, CC_ALL_SOUND_OFF, CC_CHANNEL_VOLUME};
use super::pool::{StealPolicy, VoicePool, DEFAULT_VOICES};
use super::queue::{self, EventReceiver, DEFAULT_QUEUE_CAPACITY};
use super::sequencer::{SequencerState, StepEvent};
use super::transport::{PlayState, Transport, DEFAULT_TEMPO};
use super::voice::Voice;
use super::{Clip, MidiEvent, Status, NUM_CHANNELS};

/// Default output sample rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default number of sequencer events a single block can hold.
pub const DEFAULT_MAX_BLOCK_EVENTS: usize = 1024;

/// Construction parameters for a [`Sampler`].
#[derive(Clone, Debug)]
pub struct SamplerSettings {
    pub sample_rate: u32,
    pub master_gain: f32,
    pub min_out: f32,
    pub max_out: f32,
    /// Number of voice slots, allocated once.
    pub voices: usize,
    pub steal_policy: StealPolicy,
    pub queue_capacity: usize,
    pub max_block_events: usize,
    pub tempo: f64,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        SamplerSettings {
            sample_rate: DEFAULT_SAMPLE_RATE,
            master_gain: 1.0,
            min_out: -1.0,
            max_out: 1.0,
            voices: DEFAULT_VOICES,
            steal_policy: StealPolicy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_block_events: DEFAULT_MAX_BLOCK_EVENTS,
            tempo: DEFAULT_TEMPO,
        }
    }
}

#[derive(Default)]
struct ChannelState {
    clip: Option<Arc<Clip>>,
    sequencer: SequencerState,
}

/// The render side of the sampler. Owned by the thread that services the audio device.
pub struct Sampler {
    sample_rate: u32,
    master_gain: f32,
    min_out: f32,
    max_out: f32,
    enabled: bool,
    program: Arc<Program>,
    pool: VoicePool,
    events: EventReceiver,
    shared: Arc<Shared>,
    channels: [ChannelState; NUM_CHANNELS],
    gains: [f32; NUM_CHANNELS],
    drained: Vec<MidiEvent>,
    scheduled: Vec<StepEvent>,
}

impl Sampler {
    /// Creates a sampler and the handle used to control it. Every buffer the render
    /// path needs is allocated here.
    pub fn new(program: Arc<Program>, settings: SamplerSettings) -> (Sampler, SamplerHandle) {
        let (tx, rx) = queue::channel(settings.queue_capacity);
        let shared = Arc::new(Shared::new(settings.tempo));
        let handle = SamplerHandle::new(tx, shared.clone());

        let mut sampler = Sampler {
            sample_rate: DEFAULT_SAMPLE_RATE,
            master_gain: 1.0,
            min_out: -1.0,
            max_out: 1.0,
            enabled: true,
            program,
            pool: VoicePool::new(settings.voices, settings.steal_policy),
            drained: Vec::with_capacity(rx.capacity()),
            events: rx,
            shared,
            channels: std::array::from_fn(|_| ChannelState::default()),
            gains: [1.0; NUM_CHANNELS],
            scheduled: Vec::with_capacity(settings.max_block_events.max(1)),
        };
        sampler.init(
            settings.sample_rate,
            settings.master_gain,
            settings.min_out,
            settings.max_out,
        );
        (sampler, handle)
    }

    /// Sets the output rate, master gain and output range. Sounding voices are dropped
    /// because their pitch was computed for the previous rate.
    pub fn init(&mut self, sample_rate: u32, master_gain: f32, min_out: f32, max_out: f32) {
        self.sample_rate = sample_rate.max(1);
        self.master_gain = if master_gain.is_finite() {
            master_gain
        } else {
            1.0
        };
        let min_out = if min_out.is_nan() { -1.0 } else { min_out };
        let max_out = if max_out.is_nan() { 1.0 } else { max_out };
        self.min_out = min_out.min(max_out);
        self.max_out = min_out.max(max_out);
        self.pool.clear();
    }

    /// While disabled, every block is silent and queued events are discarded.
    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn active_voices(&self) -> usize {
        self.pool.active_count()
    }

    /// Renders one block against the transport, using the tempo and play state last set
    /// through the handle. The transport only moves while playing, and rewinds to the
    /// start when stopped.
    pub fn render(&mut self, transport: &mut Transport, out: &mut [f32]) {
        let tempo = self.shared.tempo();
        let play_state = self.shared.play_state();
        let (start, end) = match play_state {
            PlayState::Playing => transport.advance(out.len(), self.sample_rate, tempo),
            PlayState::Paused => (transport.position(), transport.position()),
            PlayState::Stopped => {
                transport.seek(0.0);
                (0.0, 0.0)
            }
        };
        self.process(start, end, tempo, out, play_state);
    }

    /// Fills `out` with the next block of mono audio covering `[start_beat, end_beat)`.
    ///
    /// `out` is always completely overwritten, with silence if nothing is sounding.
    /// Outside of [`PlayState::Playing`] the sequencers are idle but voices keep sounding.
    pub fn process(
        &mut self,
        start_beat: f64,
        end_beat: f64,
        tempo: f64,
        out: &mut [f32],
        play_state: PlayState,
    ) {
        // A non-finite interval schedules nothing.
        let (start_beat, end_beat) = if start_beat.is_finite() && end_beat.is_finite() {
            (start_beat, end_beat)
        } else {
            (0.0, 0.0)
        };
        self.scheduled.clear();
        self.load_clips(start_beat);
        self.run_block(start_beat, end_beat, tempo, out, play_state);
    }

    /// Takes this block's view of every channel's clip. A clip replaced or cleared after
    /// this point is not seen until the next block.
    fn load_clips(&mut self, start_beat: f64) {
        let mut overflow = 0;
        for (channel, state) in self.channels.iter_mut().enumerate() {
            let current = self.shared.clips[channel].load();
            let unchanged = match (Option::as_ref(&*current), state.clip.as_ref()) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                continue;
            }
            if let Some(old) = state.clip.take() {
                overflow += state
                    .sequencer
                    .release(&old, start_beat, &mut self.scheduled);
            }
            state.clip = Option::clone(&*current);
        }
        self.shared.stats.sequencer_overflow(overflow);
    }

    fn run_block(
        &mut self,
        start_beat: f64,
        end_beat: f64,
        tempo: f64,
        out: &mut [f32],
        play_state: PlayState,
    ) {
        out.fill(0.0);

        if !self.enabled {
            let discarded = self.events.discard();
            self.shared.stats.dropped_events(discarded);
            self.scheduled.clear();
            self.shared.stats.block_rendered(self.pool.active_count());
            return;
        }

        // Queued events apply at the start of the block.
        self.drained.clear();
        self.events.drain_into(&mut self.drained);
        let drained = std::mem::take(&mut self.drained);
        for event in drained.iter() {
            self.apply(*event);
        }
        self.drained = drained;

        let mut overflow = 0;
        for state in self.channels.iter_mut() {
            let Some(clip) = state.clip.as_ref() else {
                continue;
            };
            overflow += if play_state == PlayState::Playing {
                state
                    .sequencer
                    .advance(clip, start_beat, end_beat, &mut self.scheduled)
            } else {
                state
                    .sequencer
                    .release(clip, start_beat, &mut self.scheduled)
            };
        }
        self.shared.stats.sequencer_overflow(overflow);

        self.scheduled.sort_unstable_by(|a, b| {
            a.beat
                .total_cmp(&b.beat)
                .then(status_rank(a).cmp(&status_rank(b)))
                .then(a.event.channel.cmp(&b.event.channel))
                .then(a.event.key.cmp(&b.event.key))
        });

        let mut cursor = 0;
        for index in 0..self.scheduled.len() {
            let scheduled = self.scheduled[index];
            let at = self.offset_of(scheduled.beat, start_beat, end_beat, tempo, out.len());
            if at > cursor {
                self.pool
                    .render(&self.program, &mut out[cursor..at], &self.gains);
                cursor = at;
            }
            self.apply(scheduled.event);
        }
        self.pool
            .render(&self.program, &mut out[cursor..], &self.gains);

        for sample in out.iter_mut() {
            *sample = (*sample * self.master_gain).clamp(self.min_out, self.max_out);
        }

        self.shared.stats.block_rendered(self.pool.active_count());
    }

    /// Sample offset within the block for a beat inside `[start, end)`.
    fn offset_of(&self, beat: f64, start: f64, end: f64, tempo: f64, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let samples = if tempo.is_finite() && tempo > 0.0 {
            (beat - start) * 60.0 / tempo * self.sample_rate as f64
        } else if end > start {
            (beat - start) / (end - start) * len as f64
        } else {
            0.0
        };
        // Negative and NaN offsets saturate to zero.
        (samples.floor() as usize).min(len - 1)
    }

    fn apply(&mut self, event: MidiEvent) {
        let event = event.normalized();
        if !event.is_valid() {
            self.shared.stats.dropped_events(1);
            return;
        }

        match event.status {
            Status::NoteOn => self.note_on(event.channel, event.key, event.velocity),
            Status::NoteOff => {
                self.pool.note_off(event.channel, event.key);
            }
            Status::Control => self.control(event.channel, event.key, event.velocity),
        }
    }

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        let Some(id) = self.program.find(channel, note) else {
            self.shared.stats.dropped_events(1);
            return;
        };
        let Some(instrument) = self.program.get(id) else {
            self.shared.stats.dropped_events(1);
            return;
        };

        let voice = Voice::new(id, instrument, channel, note, velocity, self.sample_rate);
        let parked = match instrument.retrigger() {
            RetriggerBehavior::Cut => self.pool.cut(channel, note),
            RetriggerBehavior::Polyphonic => None,
        };

        // A cut note hands its own slot to the new one before anything else is stolen.
        let trigger = match (parked, instrument.max_voices()) {
            (Some(handle), _) => self.pool.park(handle, voice),
            (None, Some(limit)) if self.pool.instrument_count(id) >= limit as usize => {
                self.pool.steal_where(voice, |v| v.instrument() == id)
            }
            _ => self.pool.trigger(voice),
        };

        match trigger {
            Some(t) if t.is_steal() => self.shared.stats.voice_stolen(),
            Some(_) => {}
            None => self.shared.stats.dropped_events(1),
        }
    }

    fn control(&mut self, channel: u8, controller: u8, value: u8) {
        match controller {
            CC_CHANNEL_VOLUME => self.gains[channel as usize] = value as f32 / 127.0,
            CC_ALL_SOUND_OFF => self.pool.all_sound_off(channel),
            CC_ALL_NOTES_OFF => self.pool.all_notes_off(channel),
            _ => {}
        }
    }
}

fn status_rank(event: &StepEvent) -> u8 {
    match event.event.status {
        Status::NoteOff => 0,
        _ => 1,
    }
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler")
            .field("sample_rate", &self.sample_rate)
            .field("master_gain", &self.master_gain)
            .field("output_range", &(self.min_out, self.max_out))
            .field("enabled", &self.enabled)
            .field("instruments", &self.program.len())
            .field("pool", &self.pool)
            .finish()
    }
}
