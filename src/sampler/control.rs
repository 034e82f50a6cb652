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

//! The control side of the sampler.
//!
//! Everything reachable from a [`SamplerHandle`] is lock-free: events go through the
//! bounded queue, clips are swapped in per channel with an atomic pointer, and tempo
//! and play state are plain atomics read once at the start of each render block.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::error::SamplerError;
use super::queue::EventSender;
use super::stats::{SamplerStats, StatsSnapshot};
use super::{Clip, MidiEvent, PlayState, DEFAULT_TEMPO, MAX_TEMPO, NUM_CHANNELS};

/// State shared between the render thread and every handle.
pub(crate) struct Shared {
    pub(crate) clips: [ArcSwapOption<Clip>; NUM_CHANNELS],
    tempo: AtomicU64,
    play_state: AtomicU8,
    pub(crate) stats: SamplerStats,
}

impl Shared {
    pub(crate) fn new(tempo: f64) -> Shared {
        Shared {
            clips: std::array::from_fn(|_| ArcSwapOption::empty()),
            tempo: AtomicU64::new(clamp_tempo(tempo).unwrap_or(DEFAULT_TEMPO).to_bits()),
            play_state: AtomicU8::new(PlayState::default().to_u8()),
            stats: SamplerStats::default(),
        }
    }

    pub(crate) fn tempo(&self) -> f64 {
        f64::from_bits(self.tempo.load(Ordering::Acquire))
    }

    pub(crate) fn play_state(&self) -> PlayState {
        PlayState::from_u8(self.play_state.load(Ordering::Acquire))
    }
}

/// A cloneable, thread-safe handle for driving a [`super::Sampler`] from control threads.
#[derive(Clone)]
pub struct SamplerHandle {
    events: EventSender,
    shared: Arc<Shared>,
}

impl SamplerHandle {
    pub(crate) fn new(events: EventSender, shared: Arc<Shared>) -> SamplerHandle {
        SamplerHandle { events, shared }
    }

    /// Queues an event for the next render block without blocking.
    pub fn post_midi_event(&self, event: MidiEvent) -> Result<(), SamplerError> {
        let result = self.events.post(event);
        if let Err(SamplerError::QueueFull(_)) = result {
            self.shared.stats.queue_full();
        }
        result
    }

    /// Installs a clip on its channel, replacing whatever was there. The render thread
    /// picks it up at the start of its next block.
    pub fn set_sequence(&self, channel: u8, clip: Arc<Clip>) -> Result<(), SamplerError> {
        let slot = self.slot(channel)?;
        if clip.channel() != channel {
            return Err(SamplerError::ChannelMismatch {
                channel,
                clip: clip.channel(),
            });
        }
        slot.store(Some(clip));
        Ok(())
    }

    /// Removes the channel's clip. A block already in progress finishes with the old one.
    pub fn clear_sequence(&self, channel: u8) -> Result<(), SamplerError> {
        self.slot(channel)?.store(None);
        Ok(())
    }

    /// The clip installed on the channel, if any.
    pub fn active_sequence(&self, channel: u8) -> Option<Arc<Clip>> {
        self.slot(channel).ok().and_then(|slot| slot.load_full())
    }

    /// Returns true if this exact clip is the one installed on the channel.
    pub fn is_active(&self, channel: u8, clip: &Arc<Clip>) -> bool {
        self.slot(channel)
            .map(|slot| {
                Option::as_ref(&*slot.load()).is_some_and(|active| Arc::ptr_eq(active, clip))
            })
            .unwrap_or(false)
    }

    fn slot(&self, channel: u8) -> Result<&ArcSwapOption<Clip>, SamplerError> {
        self.shared
            .clips
            .get(channel as usize)
            .ok_or(SamplerError::UnknownChannel(channel))
    }

    /// Sets the tempo used from the next render block on. Tempos above [`MAX_TEMPO`] are
    /// clamped, negative ones stop the transport, and NaN is ignored.
    pub fn set_tempo(&self, bpm: f64) {
        if let Some(bpm) = clamp_tempo(bpm) {
            self.shared.tempo.store(bpm.to_bits(), Ordering::Release);
        }
    }

    pub fn tempo(&self) -> f64 {
        self.shared.tempo()
    }

    pub fn set_play_state(&self, state: PlayState) {
        self.shared
            .play_state
            .store(state.to_u8(), Ordering::Release);
    }

    pub fn play_state(&self) -> PlayState {
        self.shared.play_state()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

fn clamp_tempo(bpm: f64) -> Option<f64> {
    (!bpm.is_nan()).then(|| bpm.clamp(0.0, MAX_TEMPO))
}

impl fmt::Debug for SamplerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active: Vec<usize> = (0..NUM_CHANNELS)
            .filter(|c| self.shared.clips[*c].load().is_some())
            .collect();
        f.debug_struct("SamplerHandle")
            .field("tempo", &self.tempo())
            .field("play_state", &self.play_state())
            .field("active_sequences", &active)
            .finish()
    }
}
