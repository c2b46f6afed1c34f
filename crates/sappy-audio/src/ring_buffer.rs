//! Low-latency ring buffer between the engine thread and the audio device.
//!
//! The buffer only holds as much audio as the consumer needs: a producer
//! blocks while more than `margin` consumer-sized chunks are waiting, and
//! the storage grows whenever the chunk sizes on either side outgrow it.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

/// Consumer chunks buffered ahead by default.
pub const DEFAULT_MARGIN: usize = 1;

struct State {
    buffer: Vec<f32>,
    /// Index of the oldest buffered sample.
    data_pos: usize,
    data_count: usize,
    margin: usize,
    closed: bool,
}

impl State {
    fn free_pos(&self) -> usize {
        if self.buffer.is_empty() {
            0
        } else {
            (self.data_pos + self.data_count) % self.buffer.len()
        }
    }

    fn free_count(&self) -> usize {
        self.buffer.len() - self.data_count
    }

    fn required_size(&self, last_take: usize, put: usize) -> usize {
        (self.margin + 2) * last_take.max(put)
    }

    /// Grow to `required` samples, moving buffered data to the front.
    fn grow(&mut self, required: usize) {
        if self.buffer.len() >= required {
            return;
        }
        let mut grown = Vec::with_capacity(required);
        let first = self.data_count.min(self.buffer.len() - self.data_pos);
        grown.extend_from_slice(&self.buffer[self.data_pos..self.data_pos + first]);
        grown.extend_from_slice(&self.buffer[..self.data_count - first]);
        grown.resize(required, 0.0);
        log::debug!("ring buffer grown from {} to {required} samples", self.buffer.len());
        self.buffer = grown;
        self.data_pos = 0;
    }

    fn push(&mut self, mut input: &[f32]) {
        while !input.is_empty() {
            let pos = self.free_pos();
            let n = input.len().min(self.buffer.len() - pos);
            self.buffer[pos..pos + n].copy_from_slice(&input[..n]);
            self.data_count += n;
            input = &input[n..];
        }
    }

    fn pop(&mut self, mut out: &mut [f32]) {
        while !out.is_empty() {
            let n = out.len().min(self.buffer.len() - self.data_pos);
            out[..n].copy_from_slice(&self.buffer[self.data_pos..self.data_pos + n]);
            self.data_pos = (self.data_pos + n) % self.buffer.len();
            self.data_count -= n;
            out = &mut out[n..];
        }
    }
}

/// Interleaved sample queue with a blocking producer and a non-blocking
/// consumer.
pub struct RingBuffer {
    state: Mutex<State>,
    cond: Condvar,
    /// Size of the consumer's most recent request. Read without the lock.
    last_take: AtomicUsize,
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN)
    }
}

impl RingBuffer {
    pub fn new(margin: usize) -> Self {
        Self {
            state: Mutex::new(State {
                buffer: Vec::new(),
                data_pos: 0,
                data_count: 0,
                margin: margin.max(1),
                closed: false,
            }),
            cond: Condvar::new(),
            last_take: AtomicUsize::new(0),
        }
    }

    /// Consumer chunks kept ahead. Zero is treated as one.
    pub fn set_margin(&self, margin: usize) {
        self.state.lock().margin = margin.max(1);
        self.cond.notify_all();
    }

    /// Drop buffered audio and reopen a closed buffer.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.data_pos = 0;
        state.data_count = 0;
        state.closed = false;
    }

    /// Release blocked producers. Later calls to [`put`](Self::put) return
    /// immediately.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.cond.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Samples waiting for the consumer.
    pub fn buffered(&self) -> usize {
        self.state.lock().data_count
    }

    /// Storage size in samples.
    pub fn capacity(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Queue `input`, waiting while the consumer still has enough to play.
    /// Returns `false` if the buffer was closed.
    pub fn put(&self, input: &[f32]) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return false;
            }
            let last_take = self.last_take.load(Ordering::Acquire);
            let required = state.required_size(last_take, input.len());
            state.grow(required);
            if state.data_count <= state.margin * last_take {
                break;
            }
            self.cond.wait(&mut state);
        }
        state.push(input);
        true
    }

    /// Fill `out` with buffered samples. Writes silence and returns `false`
    /// if the lock is busy or not enough data is buffered.
    pub fn take(&self, out: &mut [f32]) -> bool {
        self.last_take.store(out.len(), Ordering::Release);
        let filled = match self.state.try_lock() {
            Some(mut state) if out.len() <= state.data_count => {
                state.pop(out);
                true
            }
            _ => {
                out.fill(0.0);
                false
            }
        };
        self.cond.notify_one();
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underrun_gives_silence() {
        let ring = RingBuffer::default();
        let mut out = [1.0f32; 8];
        assert!(!ring.take(&mut out));
        assert_eq!(out, [0.0; 8]);
    }

    #[test]
    fn first_put_never_blocks() {
        let ring = RingBuffer::default();
        assert!(ring.put(&[1.0, 2.0, 3.0, 4.0]));
        assert_eq!(ring.buffered(), 4);
        let mut out = [0.0f32; 4];
        assert!(ring.take(&mut out));
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn grows_for_larger_chunks_and_keeps_order() {
        let ring = RingBuffer::new(2);
        let mut out = [0.0f32; 2];
        ring.take(&mut out);
        assert!(ring.put(&[1.0, 2.0]));
        assert_eq!(ring.capacity(), 8);
        assert!(ring.take(&mut out));
        for chunk in [[3.0, 4.0], [5.0, 6.0], [7.0, 8.0]] {
            assert!(ring.put(&chunk));
        }
        assert!(ring.take(&mut out));
        assert_eq!(out, [3.0, 4.0]);
        // Wrap the buffered data around the end of the storage.
        assert!(ring.put(&[9.0, 10.0]));
        assert!(ring.take(&mut out));
        assert_eq!(out, [5.0, 6.0]);

        assert!(ring.put(&[11.0, 12.0, 13.0, 14.0, 15.0, 16.0]));
        assert_eq!(ring.capacity(), 24);
        let mut rest = [0.0f32; 10];
        assert!(ring.take(&mut rest));
        assert_eq!(rest, [7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
    }

    #[test]
    fn close_releases_blocked_producer() {
        let ring = std::sync::Arc::new(RingBuffer::default());
        ring.put(&[0.0; 4]);
        let producer = {
            let ring = ring.clone();
            std::thread::spawn(move || ring.put(&[0.0; 4]))
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        ring.close();
        assert!(!producer.join().unwrap_or(true));
        assert!(!ring.put(&[0.0; 4]));
        ring.reset();
        assert!(!ring.is_closed());
    }
}
