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
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, span, warn, Instrument, Level};

use crate::config::{Binding, KeyMap};
use crate::sampler::{MidiEvent, SamplerError, SamplerHandle};

pub mod keyboard;

/// Key transitions delivered by an input driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    Down(char),
    Up(char),
    /// Stop the controller.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<KeyEvent>) -> JoinHandle<Result<(), io::Error>>;
}

/// Turns key events into sampler calls according to a key map.
pub struct Controller {
    sampler: SamplerHandle,
    keymap: KeyMap,
}

impl Controller {
    pub fn new(sampler: SamplerHandle, keymap: KeyMap) -> Controller {
        Controller { sampler, keymap }
    }

    /// Applies a single key event. Returns false once the controller should stop.
    pub fn handle_key(&self, event: KeyEvent) -> bool {
        let (key, down) = match event {
            KeyEvent::Quit => return false,
            KeyEvent::Down(key) => (key, true),
            KeyEvent::Up(key) => (key, false),
        };

        let bindings = self.keymap.get(key);
        if bindings.is_empty() {
            debug!(key = %key, "Unbound key");
        }
        for binding in bindings {
            match binding {
                Binding::Note {
                    channel,
                    note,
                    velocity,
                } => {
                    let midi = if down {
                        MidiEvent::note_on(*channel, *note, *velocity)
                    } else {
                        MidiEvent::note_off(*channel, *note)
                    };
                    match self.sampler.post_midi_event(midi) {
                        Ok(()) => {}
                        Err(SamplerError::QueueFull(e)) => {
                            warn!(key = %key, err = %e, "Dropped note")
                        }
                        Err(e) => error!(key = %key, err = %e, "Unable to post note"),
                    }
                }
                Binding::Sequence(clip) if down => {
                    let channel = clip.channel();
                    let result = if self.sampler.is_active(channel, clip) {
                        info!(key = %key, channel, "Stopping sequence");
                        self.sampler.clear_sequence(channel)
                    } else {
                        info!(key = %key, channel, "Starting sequence");
                        self.sampler.set_sequence(channel, clip.clone())
                    };
                    if let Err(e) = result {
                        error!(key = %key, err = %e, "Unable to toggle sequence");
                    }
                }
                Binding::Sequence(_) => {}
            }
        }
        true
    }

    /// Spawns the controller onto the runtime. The task ends on quit or when the driver
    /// stops sending events.
    pub fn spawn(self, driver: Arc<dyn Driver>) -> JoinHandle<()> {
        tokio::spawn(
            self.trigger_events(driver)
                .instrument(span!(Level::INFO, "controller")),
        )
    }

    async fn trigger_events(self, driver: Arc<dyn Driver>) {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let join_handle = driver.monitor_events(events_tx);

        info!(keys = self.keymap.len(), "Controller started.");

        while let Some(event) = events_rx.recv().await {
            debug!(event = ?event, "Received event.");
            if !self.handle_key(event) {
                break;
            }
        }

        info!("Controller closing.");
        drop(events_rx);
        match join_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(err = %e, "Input driver failed"),
            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
        }
    }
}

/// Periodically logs how the sampler counters moved since the previous tick.
pub fn spawn_stats_monitor(sampler: SamplerHandle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        let mut last = sampler.stats();
        loop {
            interval.tick().await;
            let current = sampler.stats();
            let delta = current.since(&last);
            last = current;

            if delta.has_problems() {
                warn!(
                    queue_full = delta.queue_full,
                    dropped_events = delta.dropped_events,
                    sequencer_overflow = delta.sequencer_overflow,
                    voices_stolen = delta.voices_stolen,
                    active_voices = delta.active_voices,
                    "Sampler dropped events"
                );
            } else {
                debug!(
                    blocks = delta.blocks,
                    voices_stolen = delta.voices_stolen,
                    active_voices = delta.active_voices,
                    "Sampler stats"
                );
            }
        }
    })
}

#[cfg(test)]
mod test {
    use std::io;
    use std::sync::{Arc, Mutex};

    use config::{Config, File, FileFormat};
    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use super::*;
    use crate::config::KeyMapConfig;
    use crate::program::Program;
    use crate::sampler::{PlayState, Sampler, SamplerSettings};

    fn keymap() -> KeyMap {
        let config = Config::builder()
            .add_source(File::from_str(
                r#"
                keys:
                  - key: a
                    note: 60
                    vel: 100
                    chan: 1
                  - key: b
                    note: 62
                    chan: 3
                sequences:
                  - key: "1"
                    chan: 2
                    notes:
                      - note: 36
                        data: "1000"
                  - key: b
                    chan: 3
                    notes:
                      - note: 38
                        data: "1"
                "#,
                FileFormat::Yaml,
            ))
            .build()
            .unwrap()
            .try_deserialize::<KeyMapConfig>()
            .unwrap();
        KeyMap::from_config(&config)
    }

    /// The sampler is returned so its queue stays connected.
    fn controller(queue_capacity: usize) -> (Controller, SamplerHandle, Sampler) {
        let (sampler, handle) = Sampler::new(
            Arc::new(Program::default()),
            SamplerSettings {
                queue_capacity,
                ..Default::default()
            },
        );
        (Controller::new(handle.clone(), keymap()), handle, sampler)
    }

    #[test]
    fn test_sequence_key_toggles() {
        let (controller, handle, _sampler) = controller(8);
        let [Binding::Sequence(clip)] = controller.keymap.get('1') else {
            panic!("expected a sequence binding");
        };
        let clip = clip.clone();

        assert!(controller.handle_key(KeyEvent::Down('1')));
        assert!(handle.is_active(2, &clip));

        // Releasing the key does nothing.
        assert!(controller.handle_key(KeyEvent::Up('1')));
        assert!(handle.is_active(2, &clip));

        assert!(controller.handle_key(KeyEvent::Down('1')));
        assert!(handle.active_sequence(2).is_none());

        assert!(controller.handle_key(KeyEvent::Down('1')));
        assert!(handle.is_active(2, &clip));
    }

    #[test]
    fn test_note_keys_fill_the_queue() {
        let (controller, handle, _sampler) = controller(2);
        assert!(controller.handle_key(KeyEvent::Down('a')));
        assert!(controller.handle_key(KeyEvent::Up('a')));
        assert_eq!(0, handle.stats().queue_full);

        // The render side never drains, so the third event is dropped.
        assert!(controller.handle_key(KeyEvent::Down('a')));
        assert_eq!(1, handle.stats().queue_full);

        assert!(controller.handle_key(KeyEvent::Down('z')));
        assert!(!controller.handle_key(KeyEvent::Quit));
    }

    #[test]
    fn test_key_fires_note_and_sequence() {
        let (controller, handle, mut sampler) = controller(8);
        assert!(controller.handle_key(KeyEvent::Down('b')));
        assert!(handle.active_sequence(3).is_some());

        // The note reaches the sampler, which has no instrument for it.
        let mut out = vec![0.0; 64];
        sampler.process(0.0, 0.0, 120.0, &mut out, PlayState::Stopped);
        assert_eq!(1, handle.stats().dropped_events);

        assert!(controller.handle_key(KeyEvent::Up('b')));
        assert!(handle.active_sequence(3).is_some());
        assert_eq!(0, handle.stats().queue_full);
    }

    struct TestDriver {
        events: Mutex<Vec<KeyEvent>>,
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<KeyEvent>) -> JoinHandle<Result<(), io::Error>> {
            let events = std::mem::take(&mut *self.events.lock().expect("failed to get lock"));
            tokio::spawn(async move {
                for event in events {
                    if events_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Ok::<(), io::Error>(())
            })
        }
    }

    #[tokio::test]
    async fn test_controller_runs_until_quit() {
        let (controller, handle, _sampler) = controller(8);
        let driver = Arc::new(TestDriver {
            events: Mutex::new(vec![
                KeyEvent::Down('1'),
                KeyEvent::Quit,
                KeyEvent::Down('1'),
            ]),
        });

        controller.spawn(driver).await.unwrap();

        // The second press came after quit and was never applied.
        assert!(handle.active_sequence(2).is_some());
    }
}
