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

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, Level};

use super::KeyEvent;

const QUIT: &str = "quit";

/// A driver that reads key presses from stdin, one line at a time.
///
/// `+k` holds key `k` down and `-k` releases it. Any other line presses and releases each
/// of its characters in turn. `quit` or end of input stops the controller.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads one line and forwards its key events. Returns false when input is finished.
    fn monitor_io<R, W>(
        events_tx: &Sender<KeyEvent>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "Keys (+k down, -k up, {} to exit): ", QUIT)?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            Self::send(events_tx, KeyEvent::Quit)?;
            return Ok(false);
        }

        let line = input.trim();
        if line.eq_ignore_ascii_case(QUIT) {
            Self::send(events_tx, KeyEvent::Quit)?;
            return Ok(false);
        }

        let mut chars = line.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some('+'), Some(key), None) => Self::send(events_tx, KeyEvent::Down(key))?,
            (Some('-'), Some(key), None) => Self::send(events_tx, KeyEvent::Up(key))?,
            _ => {
                for key in line.chars().filter(|c| !c.is_whitespace()) {
                    Self::send(events_tx, KeyEvent::Down(key))?;
                    Self::send(events_tx, KeyEvent::Up(key))?;
                }
            }
        }
        Ok(true)
    }

    fn send(events_tx: &Sender<KeyEvent>, event: KeyEvent) -> Result<(), io::Error> {
        events_tx.blocking_send(event).map_err(io::Error::other)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Driver::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<KeyEvent>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use super::{Driver, KeyEvent};

    fn get_events(input: &str) -> Result<(bool, Vec<KeyEvent>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<KeyEvent>(64);

        let reader = BufReader::new(input.as_bytes());
        let writer = BufWriter::new(Vec::new());
        let more = Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        let mut events = Vec::new();
        while let Some(event) = receiver.blocking_recv() {
            events.push(event);
        }
        Ok((more, events))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!((true, vec![KeyEvent::Down('a')]), get_events("+a\n")?);
        assert_eq!((true, vec![KeyEvent::Up('a')]), get_events("-a\n")?);
        assert_eq!(
            (
                true,
                vec![
                    KeyEvent::Down('1'),
                    KeyEvent::Up('1'),
                    KeyEvent::Down('s'),
                    KeyEvent::Up('s'),
                ]
            ),
            get_events("1 s\n")?
        );
        // A lone sign is an ordinary key.
        assert_eq!(
            (true, vec![KeyEvent::Down('+'), KeyEvent::Up('+')]),
            get_events("+\n")?
        );
        assert_eq!((true, vec![]), get_events("\n")?);
        Ok(())
    }

    #[test]
    fn test_quit() -> Result<(), io::Error> {
        assert_eq!((false, vec![KeyEvent::Quit]), get_events("quit\n")?);
        assert_eq!((false, vec![KeyEvent::Quit]), get_events("QUIT")?);
        assert_eq!((false, vec![KeyEvent::Quit]), get_events("")?);
        Ok(())
    }
}
