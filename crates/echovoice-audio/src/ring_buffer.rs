use rtrb::{Consumer, Producer, RingBuffer};
use tracing::warn;

/// Lock-free SPSC sample buffer between the audio callback and the frame
/// assembler. rtrb is wait-free on both sides, which keeps the cpal
/// callback real-time safe.
pub struct AudioRingBuffer {
    producer: Producer<i16>,
    consumer: Consumer<i16>,
}

impl AudioRingBuffer {
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self { producer, consumer }
    }

    /// Split into producer and consumer halves for separate threads.
    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        (
            AudioProducer {
                producer: self.producer,
            },
            AudioConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Producer half, owned by the audio callback thread.
pub struct AudioProducer {
    producer: Producer<i16>,
}

impl AudioProducer {
    /// Write samples without blocking. Returns Err on overflow; the caller
    /// counts the drop and moves on.
    pub fn write(&mut self, samples: &[i16]) -> Result<usize, ()> {
        let mut chunk = match self.producer.write_chunk(samples.len()) {
            Ok(chunk) => chunk,
            Err(_) => {
                warn!(
                    "ring buffer overflow: tried to write {} samples",
                    samples.len()
                );
                return Err(());
            }
        };

        // The chunk may wrap; fill both slices.
        let (first, second) = chunk.as_mut_slices();
        let split = first.len();
        if split > 0 {
            first.copy_from_slice(&samples[..split]);
        }
        if !second.is_empty() {
            second.copy_from_slice(&samples[split..]);
        }
        chunk.commit_all();
        Ok(samples.len())
    }

    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Consumer half, owned by the frame assembler task.
pub struct AudioConsumer {
    consumer: Consumer<i16>,
}

impl AudioConsumer {
    /// Read up to `buffer.len()` available samples without blocking.
    pub fn read(&mut self, buffer: &mut [i16]) -> usize {
        let chunk = match self.consumer.read_chunk(buffer.len()) {
            Ok(chunk) => chunk,
            Err(rtrb::chunks::ChunkError::TooFewSlots(available)) => {
                if available == 0 {
                    return 0;
                }
                self.consumer.read_chunk(available).unwrap()
            }
        };

        let len = chunk.len();
        let (first, second) = chunk.as_slices();
        let split = first.len();
        if split > 0 {
            buffer[..split].copy_from_slice(first);
        }
        if !second.is_empty() {
            buffer[split..split + second.len()].copy_from_slice(second);
        }
        chunk.commit_all();
        len
    }

    pub fn slots(&self) -> usize {
        self.consumer.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_write_read() {
        let rb = AudioRingBuffer::new(1024);
        let (mut producer, mut consumer) = rb.split();

        let samples = vec![1, 2, 3, 4, 5];
        assert_eq!(producer.write(&samples).unwrap(), 5);

        let mut buffer = vec![0i16; 10];
        let read = consumer.read(&mut buffer);

        assert_eq!(read, 5);
        assert_eq!(&buffer[..5], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn overflow_is_reported() {
        let rb = AudioRingBuffer::new(16);
        let (mut producer, mut _consumer) = rb.split();

        assert!(producer.write(&vec![1i16; 20]).is_err());
        assert!(producer.write(&vec![1i16; 16]).is_ok());
        assert!(producer.write(&[2i16]).is_err());
    }

    #[test]
    fn wrap_around_preserves_order() {
        let rb = AudioRingBuffer::new(8);
        let (mut producer, mut consumer) = rb.split();
        let mut scratch = vec![0i16; 8];

        producer.write(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(consumer.read(&mut scratch[..4]), 4);

        // This write wraps around the end of the buffer.
        producer.write(&[7, 8, 9, 10]).unwrap();
        let read = consumer.read(&mut scratch);
        assert_eq!(read, 6);
        assert_eq!(&scratch[..6], &[5, 6, 7, 8, 9, 10]);
    }
}
