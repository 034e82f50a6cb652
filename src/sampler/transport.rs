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

use serde::Deserialize;

/// Default tempo in beats per minute.
pub const DEFAULT_TEMPO: f64 = 120.0;

/// Fastest tempo the sampler will run at.
pub const MAX_TEMPO: f64 = 1000.0;

/// Whether the transport is moving.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    #[default]
    Playing,
    Paused,
    Stopped,
}

impl PlayState {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            PlayState::Playing => 0,
            PlayState::Paused => 1,
            PlayState::Stopped => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> PlayState {
        match value {
            0 => PlayState::Playing,
            1 => PlayState::Paused,
            _ => PlayState::Stopped,
        }
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayState::Playing => write!(f, "playing"),
            PlayState::Paused => write!(f, "paused"),
            PlayState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Musical position of the render thread, in beats.
#[derive(Clone, Debug)]
pub struct Transport {
    position: f64,
    tempo: f64,
}

impl Transport {
    pub fn new(tempo: f64) -> Transport {
        Transport {
            position: 0.0,
            tempo,
        }
    }

    /// Number of beats spanned by `block_len` samples.
    pub fn beats_per_block(block_len: usize, sample_rate: u32, tempo: f64) -> f64 {
        if sample_rate == 0 || !tempo.is_finite() || tempo <= 0.0 {
            return 0.0;
        }
        block_len as f64 / sample_rate as f64 / 60.0 * tempo
    }

    /// Moves the position forward by one block at the given tempo and returns the block's
    /// `[start, end)` interval.
    pub fn advance(&mut self, block_len: usize, sample_rate: u32, tempo: f64) -> (f64, f64) {
        self.tempo = tempo;
        let start = self.position;
        let end = start + Transport::beats_per_block(block_len, sample_rate, tempo);
        self.position = end;
        (start, end)
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Jumps to the given beat.
    pub fn seek(&mut self, beat: f64) {
        self.position = beat;
    }
}

impl Default for Transport {
    fn default() -> Self {
        Transport::new(DEFAULT_TEMPO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance() {
        let mut transport = Transport::new(120.0);
        // 1024 samples at 48k and 120 BPM.
        let beats = 1024.0 / 48000.0 / 60.0 * 120.0;
        let (start, end) = transport.advance(1024, 48000, 120.0);
        assert_eq!(0.0, start);
        assert!((end - beats).abs() < 1e-12);

        let (start, end) = transport.advance(1024, 48000, 120.0);
        assert!((start - beats).abs() < 1e-12);
        assert!((end - 2.0 * beats).abs() < 1e-12);
    }

    #[test]
    fn test_tempo_change_only_affects_next_block() {
        let mut transport = Transport::new(120.0);
        let (_, first_end) = transport.advance(48000, 48000, 120.0);
        assert!((first_end - 2.0).abs() < 1e-12);

        let (start, end) = transport.advance(48000, 48000, 60.0);
        assert!((start - 2.0).abs() < 1e-12);
        assert!((end - 3.0).abs() < 1e-12);
        assert_eq!(60.0, transport.tempo());
    }

    #[test]
    fn test_invalid_parameters_do_not_move() {
        let mut transport = Transport::new(120.0);
        assert_eq!((0.0, 0.0), transport.advance(1024, 0, 120.0));
        assert_eq!((0.0, 0.0), transport.advance(1024, 48000, 0.0));
        assert_eq!((0.0, 0.0), transport.advance(1024, 48000, f64::NAN));
    }
}
