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
use std::io;
use std::path::PathBuf;

/// Failures while loading a program. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unable to parse program: {0}")]
    Config(#[from] config::ConfigError),

    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },

    #[error("{} has no audio track", .0.display())]
    NoAudioTrack(PathBuf),

    #[error("{} does not declare a sample rate", .0.display())]
    MissingSampleRate(PathBuf),

    #[error("{} contains no audio", .0.display())]
    EmptySample(PathBuf),

    #[error("program {} defines no instruments", .0.display())]
    NoInstruments(PathBuf),

    #[error("instrument {name}: key range must be [low, high] with low <= high <= 127")]
    InvalidKeyRange { name: String },

    #[error("instrument {name}: root note {note} is out of range")]
    InvalidRootNote { name: String, note: u8 },

    #[error("instrument {name}: channel {channel} is out of range")]
    InvalidChannel { name: String, channel: u8 },

    #[error("instrument {name}: loop {start}..{end} does not fit in {frames} frames")]
    InvalidLoop {
        name: String,
        start: usize,
        end: usize,
        frames: usize,
    },
}
