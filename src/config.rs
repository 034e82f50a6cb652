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
use std::path::{Path, PathBuf};

use config::File;
use serde::Deserialize;

use crate::program::{load_program, Program};

mod audio;
mod error;
mod keymap;
pub mod program;
mod sampler;

pub use audio::Audio;
pub use error::ConfigError;
pub use keymap::{Binding, KeyMap, KeyMapConfig};
pub use sampler::{Sampler, Transport};

/// A YAML representation of the whole sampler configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    /// The program file, relative to this configuration file.
    program: String,

    #[serde(default)]
    audio: Audio,

    #[serde(default)]
    sampler: Sampler,

    #[serde(default)]
    transport: Transport,

    #[serde(default)]
    keymap: KeyMapConfig,

    /// Where this configuration was read from.
    #[serde(skip)]
    path: PathBuf,
}

impl Config {
    /// Parse a configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Config, ConfigError> {
        let mut config = config::Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Config>()?;
        config.path = path.to_path_buf();
        Ok(config)
    }

    /// The program path, resolved against the configuration file's directory.
    pub fn program_path(&self) -> PathBuf {
        let program = Path::new(&self.program);
        if program.is_absolute() {
            return program.to_path_buf();
        }
        match self.path.parent() {
            Some(base) => base.join(program),
            None => program.to_path_buf(),
        }
    }

    /// Loads the program and every sample it references.
    pub fn load_program(&self) -> Result<Program, ConfigError> {
        Ok(load_program(&self.program_path())?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Builds the key bindings. Invalid bindings are logged and skipped.
    pub fn keymap(&self) -> KeyMap {
        KeyMap::from_config(&self.keymap)
    }
}
