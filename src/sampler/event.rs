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
use std::fmt;

use super::{MAX_NOTE, NUM_CHANNELS};

/// Controller number for channel volume.
pub const CC_CHANNEL_VOLUME: u8 = 7;

/// Controller number that silences every voice on a channel immediately.
pub const CC_ALL_SOUND_OFF: u8 = 120;

/// Controller number that releases every voice on a channel.
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// The kind of a [`MidiEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    NoteOn,
    NoteOff,
    /// A control change. The event's key is the controller number and its velocity the value.
    Control,
}

/// A single note or control event. Consumed once by the render thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    pub status: Status,
    pub key: u8,
    pub velocity: u8,
    pub channel: u8,
}

impl MidiEvent {
    pub fn note_on(channel: u8, key: u8, velocity: u8) -> MidiEvent {
        MidiEvent {
            status: Status::NoteOn,
            key,
            velocity,
            channel,
        }
    }

    pub fn note_off(channel: u8, key: u8) -> MidiEvent {
        MidiEvent {
            status: Status::NoteOff,
            key,
            velocity: 0,
            channel,
        }
    }

    pub fn control(channel: u8, controller: u8, value: u8) -> MidiEvent {
        MidiEvent {
            status: Status::Control,
            key: controller,
            velocity: value,
            channel,
        }
    }

    /// Returns true if the channel, key and velocity are all in range.
    pub fn is_valid(&self) -> bool {
        (self.channel as usize) < NUM_CHANNELS && self.key <= MAX_NOTE && self.velocity <= MAX_NOTE
    }

    /// Folds a note-on with zero velocity into a note-off.
    pub fn normalized(self) -> MidiEvent {
        match self.status {
            Status::NoteOn if self.velocity == 0 => MidiEvent::note_off(self.channel, self.key),
            _ => self,
        }
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Status::NoteOn => write!(
                f,
                "note on (ch {}, key {}, vel {})",
                self.channel, self.key, self.velocity
            ),
            Status::NoteOff => write!(f, "note off (ch {}, key {})", self.channel, self.key),
            Status::Control => write!(
                f,
                "control (ch {}, cc {}, value {})",
                self.channel, self.key, self.velocity
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        assert!(MidiEvent::note_on(0, 60, 100).is_valid());
        assert!(MidiEvent::note_on(15, 127, 127).is_valid());
        assert!(!MidiEvent::note_on(16, 60, 100).is_valid());
        assert!(!MidiEvent::note_on(0, 128, 100).is_valid());
        assert!(!MidiEvent::note_on(0, 60, 200).is_valid());
    }

    #[test]
    fn test_zero_velocity_note_on_is_note_off() {
        let event = MidiEvent::note_on(3, 64, 0).normalized();
        assert_eq!(MidiEvent::note_off(3, 64), event);

        let event = MidiEvent::note_on(3, 64, 1).normalized();
        assert_eq!(Status::NoteOn, event.status);
    }
}
