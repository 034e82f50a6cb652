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

//! Fixed-capacity voice allocation.
//!
//! All slots are allocated when the pool is created. When every slot is busy, a victim
//! is chosen by the configured [`StealPolicy`], faded out over
//! [`super::STEAL_RAMP_SAMPLES`], and the new note starts in the same slot on the sample
//! where the fade ends.

use std::fmt;

use serde::Deserialize;

use crate::program::{InstrumentId, Program};

use super::voice::Voice;
use super::NUM_CHANNELS;

/// Default number of voice slots.
pub const DEFAULT_VOICES: usize = 256;

/// How a victim is chosen when the pool is full.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StealPolicy {
    /// Steal the voice that was triggered first.
    #[default]
    Oldest,
    /// Steal the voice with the lowest current envelope level.
    Quietest,
}

/// Identifies a pool slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoiceHandle(usize);

impl VoiceHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The outcome of [`VoicePool::trigger`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// The note took a free slot and starts immediately.
    Fresh(VoiceHandle),
    /// A sounding voice is fading out and the note starts when the fade ends.
    Stolen(VoiceHandle),
    /// Every candidate was already fading out. The note took the waiting place of the
    /// slot whose queued note is oldest, dropping that note if there was one.
    Replaced(VoiceHandle),
    /// The note replaces an earlier voice of the same note and starts when it has faded.
    Retriggered(VoiceHandle),
}

impl Trigger {
    pub fn handle(&self) -> VoiceHandle {
        match self {
            Trigger::Fresh(h)
            | Trigger::Stolen(h)
            | Trigger::Replaced(h)
            | Trigger::Retriggered(h) => *h,
        }
    }

    pub fn is_steal(&self) -> bool {
        matches!(self, Trigger::Stolen(_) | Trigger::Replaced(_))
    }
}

#[derive(Default)]
struct Slot {
    voice: Option<Voice>,
    pending: Option<Voice>,
}

impl Slot {
    fn is_free(&self) -> bool {
        self.voice.is_none() && self.pending.is_none()
    }
}

/// The set of voice slots owned by the render thread.
pub struct VoicePool {
    slots: Vec<Slot>,
    policy: StealPolicy,
    next_age: u64,
}

impl VoicePool {
    /// Allocates every slot up front. The pool never grows.
    pub fn new(capacity: usize, policy: StealPolicy) -> VoicePool {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::default);
        VoicePool {
            slots,
            policy,
            next_age: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn policy(&self) -> StealPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: StealPolicy) {
        self.policy = policy;
    }

    /// Number of slots holding a sounding or waiting note.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_free()).count()
    }

    /// Returns the voice currently sounding in the slot.
    pub fn get(&self, handle: VoiceHandle) -> Option<&Voice> {
        self.slots.get(handle.0).and_then(|slot| slot.voice.as_ref())
    }

    /// Returns the note waiting for the slot's fade to end.
    pub fn pending(&self, handle: VoiceHandle) -> Option<&Voice> {
        self.slots.get(handle.0).and_then(|slot| slot.pending.as_ref())
    }

    /// Every sounding voice.
    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.slots.iter().filter_map(|slot| slot.voice.as_ref())
    }

    fn stamp(&mut self, mut voice: Voice) -> Voice {
        voice.set_age(self.next_age);
        self.next_age += 1;
        voice
    }

    /// Places the voice in a free slot. Returns `None` when the pool is full.
    pub fn acquire(&mut self, voice: Voice) -> Option<VoiceHandle> {
        let index = self.slots.iter().position(Slot::is_free)?;
        let voice = self.stamp(voice);
        self.slots[index].voice = Some(voice);
        Some(VoiceHandle(index))
    }

    /// Returns a slot to the pool immediately, dropping anything it was playing.
    pub fn release(&mut self, handle: VoiceHandle) {
        if let Some(slot) = self.slots.get_mut(handle.0) {
            slot.voice = None;
            slot.pending = None;
        }
    }

    /// Returns every slot to the pool.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.voice = None;
            slot.pending = None;
        }
    }

    /// Starts a note in a free slot, or steals one under the current policy.
    /// Returns `None` only for a pool with no slots.
    pub fn trigger(&mut self, voice: Voice) -> Option<Trigger> {
        if self.slots.iter().any(Slot::is_free) {
            return self.acquire(voice).map(Trigger::Fresh);
        }
        self.steal_where(voice, |_| true)
    }

    /// Steals a slot among the voices accepted by `filter`.
    pub fn steal_where<F>(&mut self, voice: Voice, filter: F) -> Option<Trigger>
    where
        F: Fn(&Voice) -> bool,
    {
        let policy = self.policy;
        let victim = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.voice.as_ref().map(|v| (i, v)))
            .filter(|(_, v)| !v.is_stealing() && !v.is_finished() && filter(v))
            .min_by(|(_, a), (_, b)| match policy {
                StealPolicy::Oldest => a.age().cmp(&b.age()),
                StealPolicy::Quietest => a
                    .level()
                    .total_cmp(&b.level())
                    .then(a.age().cmp(&b.age())),
            })
            .map(|(i, _)| i);

        if let Some(index) = victim {
            let voice = self.stamp(voice);
            let slot = &mut self.slots[index];
            if let Some(victim) = slot.voice.as_mut() {
                victim.steal();
            }
            slot.pending = Some(voice);
            return Some(Trigger::Stolen(VoiceHandle(index)));
        }

        // Everything that matches is already fading out. Replace the longest-waiting note.
        let index = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                slot.voice.as_ref().is_some_and(&filter)
                    || slot.pending.as_ref().is_some_and(&filter)
            })
            .min_by_key(|(_, slot)| slot.pending.as_ref().map_or(0, |p| p.age()))
            .map(|(i, _)| i)?;
        let voice = self.stamp(voice);
        let slot = &mut self.slots[index];
        if let Some(victim) = slot.voice.as_mut() {
            victim.steal();
        }
        slot.pending = Some(voice);
        Some(Trigger::Replaced(VoiceHandle(index)))
    }

    /// Number of notes for the instrument that are sounding or waiting, ignoring voices
    /// that are fading out to make room or have already finished.
    pub fn instrument_count(&self, instrument: InstrumentId) -> usize {
        self.slots
            .iter()
            .map(|slot| {
                let sounding = slot
                    .voice
                    .as_ref()
                    .is_some_and(|v| {
                        v.instrument() == instrument && !v.is_stealing() && !v.is_finished()
                    });
                let waiting = slot
                    .pending
                    .as_ref()
                    .is_some_and(|v| v.instrument() == instrument);
                sounding as usize + waiting as usize
            })
            .sum()
    }

    /// Releases every voice playing the note on the channel.
    pub fn note_off(&mut self, channel: u8, note: u8) -> usize {
        let mut released = 0;
        for slot in self.slots.iter_mut() {
            for voice in slot.voice.iter_mut().chain(slot.pending.iter_mut()) {
                if voice.channel() == channel && voice.note() == note && !voice.is_stealing() {
                    voice.note_off();
                    released += 1;
                }
            }
        }
        released
    }

    /// Fades out every voice playing the note on the channel so it can be retriggered,
    /// and drops the note where it is still waiting to start. Returns a slot the new
    /// note can wait in, if one of the faded voices left its slot otherwise unclaimed.
    pub fn cut(&mut self, channel: u8, note: u8) -> Option<VoiceHandle> {
        let matches = |v: &Voice| v.channel() == channel && v.note() == note;
        let mut parking = None;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.pending.as_ref().is_some_and(matches) {
                slot.pending = None;
            }
            if let Some(voice) = slot.voice.as_mut().filter(|v| matches(&**v)) {
                voice.steal();
                if parking.is_none() && slot.pending.is_none() {
                    parking = Some(VoiceHandle(index));
                }
            }
        }
        parking
    }

    /// Queues the note in the slot, to start once the slot's voice has faded out.
    pub fn park(&mut self, handle: VoiceHandle, voice: Voice) -> Option<Trigger> {
        if handle.0 >= self.slots.len() {
            return None;
        }
        let voice = self.stamp(voice);
        self.slots[handle.0].pending = Some(voice);
        Some(Trigger::Retriggered(handle))
    }

    /// Releases every voice on the channel, including ones that ignore note-offs.
    pub fn all_notes_off(&mut self, channel: u8) {
        for slot in self.slots.iter_mut() {
            for voice in slot.voice.iter_mut().chain(slot.pending.iter_mut()) {
                if voice.channel() == channel {
                    voice.release();
                }
            }
        }
    }

    /// Fades out every voice on the channel and drops notes waiting to start on it.
    pub fn all_sound_off(&mut self, channel: u8) {
        for slot in self.slots.iter_mut() {
            if slot.pending.as_ref().is_some_and(|p| p.channel() == channel) {
                slot.pending = None;
            }
            if let Some(voice) = slot.voice.as_mut() {
                if voice.channel() == channel {
                    voice.steal();
                }
            }
        }
    }

    /// Mixes every voice into `out`. Voices that finish are returned to the pool, and a
    /// waiting note takes over its slot on the sample where the previous voice ended.
    pub fn render(&mut self, program: &Program, out: &mut [f32], channel_gains: &[f32; NUM_CHANNELS]) {
        for slot in self.slots.iter_mut() {
            let mut offset = 0;
            loop {
                let Some(voice) = slot.voice.as_mut() else {
                    // A slot that lost its voice without a fade starts its waiting note now.
                    match slot.pending.take() {
                        Some(pending) => {
                            slot.voice = Some(pending);
                            continue;
                        }
                        None => break,
                    }
                };

                if offset < out.len() {
                    let Some(instrument) = program.get(voice.instrument()) else {
                        slot.voice = None;
                        continue;
                    };
                    let gain = channel_gains
                        .get(voice.channel() as usize)
                        .copied()
                        .unwrap_or(1.0);
                    offset += voice.render(instrument, &mut out[offset..], gain);
                }

                if voice.is_finished() {
                    slot.voice = slot.pending.take();
                    if slot.voice.is_some() && offset < out.len() {
                        continue;
                    }
                }
                break;
            }
        }
    }
}

impl fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoicePool")
            .field("capacity", &self.capacity())
            .field("active", &self.active_count())
            .field("policy", &self.policy)
            .finish()
    }
}
