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

//! Bounded event channel between control threads and the render thread.
//!
//! Both sides are non-blocking. Posting into a full queue fails immediately, and the
//! render side only ever takes what is already queued when it starts draining.

use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::error::{QueueFull, SamplerError};
use super::MidiEvent;

/// Default number of events that can be queued between two render blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Creates a bounded event queue.
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (EventSender { tx }, EventReceiver { rx, capacity })
}

/// The producer side. Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<MidiEvent>,
}

impl EventSender {
    /// Queues an event without blocking.
    pub fn post(&self, event: MidiEvent) -> Result<(), SamplerError> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => SamplerError::QueueFull(QueueFull(event)),
            TrySendError::Disconnected(event) => SamplerError::Disconnected(event),
        })
    }
}

/// The consumer side, owned by the render thread.
pub struct EventReceiver {
    rx: Receiver<MidiEvent>,
    capacity: usize,
}

impl EventReceiver {
    /// The maximum number of events the queue can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Moves every event queued before this call into `out`, in FIFO order.
    ///
    /// Events posted while draining are left for the next call. `out` never grows past
    /// the queue capacity, so a buffer allocated with that capacity is never reallocated.
    pub fn drain_into(&self, out: &mut Vec<MidiEvent>) -> usize {
        let pending = self.rx.len();
        let mut drained = 0;
        for _ in 0..pending {
            match self.rx.try_recv() {
                Ok(event) => {
                    out.push(event);
                    drained += 1;
                }
                Err(_) => break,
            }
        }
        drained
    }

    /// Drops everything queued before this call.
    pub fn discard(&self) -> usize {
        let pending = self.rx.len();
        let mut discarded = 0;
        for _ in 0..pending {
            if self.rx.try_recv().is_err() {
                break;
            }
            discarded += 1;
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_drain_preserves_fifo_order() {
        let (tx, rx) = channel(256);
        for key in 0..100u8 {
            tx.post(MidiEvent::note_on(0, key, 100)).unwrap();
        }

        let mut out = Vec::with_capacity(rx.capacity());
        assert_eq!(100, rx.drain_into(&mut out));
        let keys: Vec<u8> = out.iter().map(|e| e.key).collect();
        assert_eq!((0..100u8).collect::<Vec<u8>>(), keys);

        out.clear();
        assert_eq!(0, rx.drain_into(&mut out));
    }

    #[test]
    fn test_full_queue_rejects_without_blocking() {
        let (tx, rx) = channel(2);
        tx.post(MidiEvent::note_on(0, 1, 100)).unwrap();
        tx.post(MidiEvent::note_on(0, 2, 100)).unwrap();

        let rejected = MidiEvent::note_on(0, 3, 100);
        assert_eq!(
            Err(SamplerError::QueueFull(QueueFull(rejected))),
            tx.post(rejected)
        );

        let mut out = Vec::with_capacity(rx.capacity());
        rx.drain_into(&mut out);
        assert_eq!(2, out.len());
        assert!(tx.post(rejected).is_ok());
    }

    #[test]
    fn test_disconnected_receiver() {
        let (tx, rx) = channel(4);
        drop(rx);
        let event = MidiEvent::note_off(0, 1);
        assert_eq!(Err(SamplerError::Disconnected(event)), tx.post(event));
    }

    #[test]
    fn test_per_producer_order_with_many_producers() {
        let (tx, rx) = channel(4096);
        let handles: Vec<_> = (0..4u8)
            .map(|channel| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for key in 0..100u8 {
                        tx.post(MidiEvent::note_on(channel, key, 1)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut out = Vec::with_capacity(rx.capacity());
        rx.drain_into(&mut out);
        assert_eq!(400, out.len());
        for channel in 0..4u8 {
            let keys: Vec<u8> = out
                .iter()
                .filter(|e| e.channel == channel)
                .map(|e| e.key)
                .collect();
            assert_eq!((0..100u8).collect::<Vec<u8>>(), keys);
        }
    }

    #[test]
    fn test_discard() {
        let (tx, rx) = channel(8);
        tx.post(MidiEvent::note_on(0, 1, 1)).unwrap();
        tx.post(MidiEvent::note_on(0, 2, 1)).unwrap();
        assert_eq!(2, rx.discard());

        let mut out = Vec::new();
        assert_eq!(0, rx.drain_into(&mut out));
    }
}
