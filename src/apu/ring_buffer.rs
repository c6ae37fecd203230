//! Bounded single-producer/single-consumer sample queue between the emulation thread and the host
//! audio callback.
//!
//! Writes never block: a sample (or slice) that does not fit is dropped whole.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

pub struct SampleBuffer<T> {
    queue: Arc<ArrayQueue<T>>,
}

impl<T> SampleBuffer<T> {
    /// `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity.max(1))),
        }
    }

    pub fn split(self) -> (SampleProducer<T>, SampleConsumer<T>) {
        let consumer = SampleConsumer {
            queue: Arc::clone(&self.queue),
        };
        (SampleProducer { queue: self.queue }, consumer)
    }
}

/// Emulation side. Not `Clone`: there is exactly one producer.
pub struct SampleProducer<T> {
    queue: Arc<ArrayQueue<T>>,
}

impl<T> SampleProducer<T> {
    /// Returns false when the buffer was full and the sample was dropped.
    pub fn push(&self, sample: T) -> bool {
        self.queue.push(sample).is_ok()
    }

    /// Free space only grows while the producer works, so the check up front holds for every push.
    pub fn push_slice(&self, samples: &[T]) -> bool
    where
        T: Copy,
    {
        if samples.len() > self.free() {
            return false;
        }
        for &sample in samples {
            if self.queue.push(sample).is_err() {
                return false;
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn free(&self) -> usize {
        self.queue.capacity() - self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Host audio side.
#[derive(Clone)]
pub struct SampleConsumer<T> {
    queue: Arc<ArrayQueue<T>>,
}

impl<T> SampleConsumer<T> {
    pub fn pop(&self) -> Option<T> {
        self.queue.pop()
    }

    /// Fill `out` from the front of the queue. Returns how many samples were written.
    pub fn read(&self, out: &mut [T]) -> usize {
        let mut n = 0;
        for slot in out.iter_mut() {
            match self.queue.pop() {
                Some(sample) => {
                    *slot = sample;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn free(&self) -> usize {
        self.queue.capacity() - self.queue.len()
    }

    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &[u8] = b"hello world";

    #[test]
    fn repeated_writes_round_trip() {
        let (producer, consumer) = SampleBuffer::new(16).split();
        for _ in 0..3 {
            assert!(producer.push_slice(PAYLOAD));
            let mut out = [0u8; 11];
            assert_eq!(consumer.read(&mut out), PAYLOAD.len());
            assert_eq!(&out, PAYLOAD);
        }
        assert!(consumer.is_empty());
    }

    #[test]
    fn partial_read_frees_space() {
        let (producer, consumer) = SampleBuffer::new(16).split();
        assert!(producer.push_slice(PAYLOAD));
        let mut out = [0u8; 5];
        assert_eq!(consumer.read(&mut out), 5);
        assert_eq!(&out, b"hello");
        assert_eq!(consumer.free(), 16 - 11 + 5);
        assert_eq!(consumer.len(), 6);
    }

    #[test]
    fn oversized_write_is_discarded_whole() {
        let (producer, consumer) = SampleBuffer::new(16).split();
        assert!(producer.push_slice(PAYLOAD));
        assert!(!producer.push_slice(PAYLOAD));
        assert_eq!(consumer.len(), 11);

        let mut out = [0u8; 16];
        assert_eq!(consumer.read(&mut out), 11);
        assert_eq!(&out[..11], PAYLOAD);
    }

    #[test]
    fn full_buffer_drops_single_samples() {
        let (producer, consumer) = SampleBuffer::new(2).split();
        assert!(producer.push(1.0f32));
        assert!(producer.push(2.0));
        assert!(!producer.push(3.0));
        assert_eq!(consumer.pop(), Some(1.0));
        consumer.clear();
        assert!(consumer.is_empty());
    }

    #[test]
    fn crosses_threads() {
        let (producer, consumer) = SampleBuffer::new(64).split();
        let reader = std::thread::spawn(move || {
            let mut total = 0;
            while total < 32 {
                if consumer.pop().is_some() {
                    total += 1;
                }
            }
            total
        });
        let mut pushed = 0;
        while pushed < 32 {
            if producer.push(pushed) {
                pushed += 1;
            }
        }
        assert_eq!(reader.join().unwrap(), 32);
    }
}
