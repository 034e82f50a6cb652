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
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by both sides of the sampler. The render thread never logs, so
/// these are how its decisions become visible.
#[derive(Debug, Default)]
pub(crate) struct SamplerStats {
    blocks: AtomicU64,
    queue_full: AtomicU64,
    dropped_events: AtomicU64,
    voices_stolen: AtomicU64,
    sequencer_overflow: AtomicU64,
    active_voices: AtomicU64,
}

impl SamplerStats {
    pub(crate) fn block_rendered(&self, active_voices: usize) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
        self.active_voices
            .store(active_voices as u64, Ordering::Relaxed);
    }

    pub(crate) fn queue_full(&self) {
        self.queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped_events(&self, count: usize) {
        if count > 0 {
            self.dropped_events
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn voice_stolen(&self) {
        self.voices_stolen.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sequencer_overflow(&self, count: usize) {
        if count > 0 {
            self.sequencer_overflow
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks: self.blocks.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            voices_stolen: self.voices_stolen.load(Ordering::Relaxed),
            sequencer_overflow: self.sequencer_overflow.load(Ordering::Relaxed),
            active_voices: self.active_voices.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the sampler counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Render blocks processed.
    pub blocks: u64,
    /// Events rejected because the queue was full.
    pub queue_full: u64,
    /// Events discarded by the render thread: malformed, unmapped, or posted while disabled.
    pub dropped_events: u64,
    /// Voices faded out to make room for a new note.
    pub voices_stolen: u64,
    /// Sequencer events that did not fit in a block's event buffer.
    pub sequencer_overflow: u64,
    /// Voices sounding at the end of the last block.
    pub active_voices: u64,
}

impl StatsSnapshot {
    /// Counter increases since `earlier`. The active voice gauge is carried over as is.
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            blocks: self.blocks.saturating_sub(earlier.blocks),
            queue_full: self.queue_full.saturating_sub(earlier.queue_full),
            dropped_events: self.dropped_events.saturating_sub(earlier.dropped_events),
            voices_stolen: self.voices_stolen.saturating_sub(earlier.voices_stolen),
            sequencer_overflow: self
                .sequencer_overflow
                .saturating_sub(earlier.sequencer_overflow),
            active_voices: self.active_voices,
        }
    }

    /// True when something went wrong since the counters were last compared.
    pub fn has_problems(&self) -> bool {
        self.queue_full > 0 || self.dropped_events > 0 || self.sequencer_overflow > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since() {
        let stats = SamplerStats::default();
        stats.queue_full();
        stats.voice_stolen();
        let first = stats.snapshot();

        stats.queue_full();
        stats.dropped_events(3);
        stats.block_rendered(5);
        let delta = stats.snapshot().since(&first);

        assert_eq!(1, delta.queue_full);
        assert_eq!(3, delta.dropped_events);
        assert_eq!(0, delta.voices_stolen);
        assert_eq!(1, delta.blocks);
        assert_eq!(5, delta.active_voices);
        assert!(delta.has_problems());
        assert!(!StatsSnapshot::default().has_problems());
    }
}
