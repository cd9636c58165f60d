//! Remote input queue
//!
//! Guest inputs arrive on the relay task; the host simulation drains them at
//! the start of each frame. crossbeam keeps the hand-off lock-free.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::game::state::PlayerSlot;
use crate::net::protocol::PlayerInput;

/// Input tagged with the avatar it drives
#[derive(Debug, Clone, PartialEq)]
pub struct InputMessage {
    pub slot: PlayerSlot,
    pub input: PlayerInput,
}

/// Bounded MPSC queue of player inputs
pub struct InputBuffer {
    sender: Sender<InputMessage>,
    receiver: Receiver<InputMessage>,
    capacity: usize,
}

impl InputBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Clonable producer handle
    pub fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
        }
    }

    /// Non-blocking submit; false when full
    #[inline]
    pub fn try_submit(&self, slot: PlayerSlot, input: PlayerInput) -> bool {
        self.sender.try_send(InputMessage { slot, input }).is_ok()
    }

    /// Everything queued since the last drain, in arrival order
    pub fn drain(&self) -> Vec<InputMessage> {
        self.receiver.try_iter().collect()
    }

    /// Only the newest input per slot
    ///
    /// Inputs are level-triggered (held keys, aim point), so older entries
    /// for the same slot carry nothing the newest does not.
    pub fn drain_latest(&self) -> [Option<PlayerInput>; 2] {
        let mut latest: [Option<PlayerInput>; 2] = Default::default();
        for msg in self.receiver.try_iter() {
            if let Some(entry) = latest.get_mut(msg.slot as usize) {
                *entry = Some(msg.input);
            }
        }
        latest
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        // A few seconds of 60 Hz input from one guest
        Self::new(256)
    }
}

/// Producer handle held by the relay side
#[derive(Clone)]
pub struct InputSender {
    sender: Sender<InputMessage>,
}

impl InputSender {
    #[inline]
    pub fn try_send(&self, slot: PlayerSlot, input: PlayerInput) -> Result<(), InputBufferError> {
        self.sender
            .try_send(InputMessage { slot, input })
            .map_err(|e| match e {
                TrySendError::Full(_) => InputBufferError::Full,
                TrySendError::Disconnected(_) => InputBufferError::Disconnected,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InputBufferError {
    #[error("input buffer full")]
    Full,
    #[error("input buffer closed")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{HOST_SLOT, PARTNER_SLOT};
    use crate::net::protocol::Key;

    fn input(seq: u32) -> PlayerInput {
        PlayerInput {
            seq,
            ..PlayerInput::with_keys(&[Key::Up])
        }
    }

    #[test]
    fn test_submit_and_drain() {
        let buffer = InputBuffer::new(10);
        assert!(buffer.try_submit(PARTNER_SLOT, input(1)));
        assert!(buffer.try_submit(PARTNER_SLOT, input(2)));
        assert_eq!(buffer.pending_count(), 2);

        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].input.seq, 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_backpressure() {
        let buffer = InputBuffer::new(2);
        let sender = buffer.sender();
        assert!(sender.try_send(PARTNER_SLOT, input(1)).is_ok());
        assert!(sender.try_send(PARTNER_SLOT, input(2)).is_ok());
        assert_eq!(sender.try_send(PARTNER_SLOT, input(3)), Err(InputBufferError::Full));
    }

    #[test]
    fn test_drain_latest_keeps_newest_per_slot() {
        let buffer = InputBuffer::default();
        buffer.try_submit(PARTNER_SLOT, input(1));
        buffer.try_submit(HOST_SLOT, input(7));
        buffer.try_submit(PARTNER_SLOT, input(3));
        buffer.try_submit(9, input(99));

        let latest = buffer.drain_latest();
        assert_eq!(latest[HOST_SLOT as usize].as_ref().map(|i| i.seq), Some(7));
        assert_eq!(latest[PARTNER_SLOT as usize].as_ref().map(|i| i.seq), Some(3));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_disconnected_after_drop() {
        let buffer = InputBuffer::new(4);
        let sender = buffer.sender();
        drop(buffer);
        assert_eq!(
            sender.try_send(PARTNER_SLOT, input(1)),
            Err(InputBufferError::Disconnected)
        );
    }
}
