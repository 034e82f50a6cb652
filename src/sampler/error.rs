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
use super::MidiEvent;

/// The event queue had no room. The event was dropped and counted.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("event queue is full, dropped {0}")]
pub struct QueueFull(pub MidiEvent);

/// Errors returned to control threads.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SamplerError {
    #[error(transparent)]
    QueueFull(#[from] QueueFull),

    #[error("the sampler has shut down, dropped {0}")]
    Disconnected(MidiEvent),

    #[error("unknown channel {0}")]
    UnknownChannel(u8),

    #[error("clip for channel {clip} cannot be installed on channel {channel}")]
    ChannelMismatch { channel: u8, clip: u8 },
}
