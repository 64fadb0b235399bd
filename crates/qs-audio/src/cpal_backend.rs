//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::traits::{AudioError, AudioOutput};

/// How long a write waits for the device to make room before giving up.
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Queue every sample, waiting while the ring is full.
///
/// Fails with [`AudioError::Playback`] once the consumer has taken nothing
/// for `timeout`, so a stalled device can't hold the writer forever.
pub fn push_with_timeout<P>(producer: &mut P, samples: &[i16], timeout: Duration) -> Result<(), AudioError>
where
    P: Producer<Item = i16>,
{
    let mut pending = samples;
    let mut deadline = Instant::now() + timeout;
    while !pending.is_empty() {
        let pushed = producer.push_slice(pending);
        if pushed > 0 {
            pending = &pending[pushed..];
            deadline = Instant::now() + timeout;
        } else if Instant::now() >= deadline {
            return Err(AudioError::Playback(format!(
                "device stopped draining, {} samples dropped",
                pending.len()
            )));
        } else {
            std::thread::sleep(Duration::from_millis(1));
        }
    }
    Ok(())
}

/// CPAL-based audio output.
///
/// Mono samples are pushed through a ring buffer and copied to every
/// device channel by the stream callback.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<i16>,
    running: Arc<AtomicBool>,
    underruns: Arc<AtomicU64>,
}

impl CpalOutput {
    /// Create a new CPAL output with default device.
    pub fn new() -> Result<(Self, HeapCons<i16>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        let config: StreamConfig = config.into();

        // About 100ms of audio
        let buffer_size = config.sample_rate.0 as usize / 10;
        let rb = HeapRb::<i16>::new(buffer_size);
        let (producer, consumer) = rb.split();

        let output = Self {
            device,
            config,
            stream: None,
            producer,
            running: Arc::new(AtomicBool::new(false)),
            underruns: Arc::new(AtomicU64::new(0)),
        };

        Ok((output, consumer))
    }

    /// Open the default device and build its stream.
    pub fn open() -> Result<Self, AudioError> {
        let (mut output, consumer) = Self::new()?;
        output.build_stream(consumer)?;
        tracing::debug!(
            sample_rate = output.config.sample_rate.0,
            channels = output.config.channels,
            "audio stream ready"
        );
        Ok(output)
    }

    /// Build and start the audio stream.
    pub fn build_stream(&mut self, mut consumer: HeapCons<i16>) -> Result<(), AudioError> {
        let running = self.running.clone();
        let underruns = self.underruns.clone();
        let channels = self.config.channels.max(1) as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }

                    let mut starved = false;
                    for frame in data.chunks_mut(channels) {
                        let value = match consumer.try_pop() {
                            Some(sample) => sample as f32 / 32768.0,
                            None => {
                                starved = true;
                                0.0
                            }
                        };
                        frame.fill(value);
                    }
                    if starved {
                        underruns.fetch_add(1, Ordering::Relaxed);
                    }
                },
                |err| tracing::error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        self.stream = Some(stream);

        Ok(())
    }

}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        push_with_timeout(&mut self.producer, samples, WRITE_TIMEOUT)
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_fails_when_nothing_drains() {
        let (mut producer, mut consumer) = HeapRb::<i16>::new(4).split();
        let result = push_with_timeout(&mut producer, &[1, 2, 3, 4, 5, 6], Duration::from_millis(20));
        assert!(matches!(result, Err(AudioError::Playback(_))));
        assert_eq!(consumer.try_pop(), Some(1));
    }

    #[test]
    fn push_waits_for_a_slow_consumer() {
        let (mut producer, mut consumer) = HeapRb::<i16>::new(4).split();
        let reader = std::thread::spawn(move || {
            let mut got = Vec::new();
            while got.len() < 16 {
                match consumer.try_pop() {
                    Some(sample) => got.push(sample),
                    None => std::thread::sleep(Duration::from_millis(2)),
                }
            }
            got
        });
        let samples: Vec<i16> = (0..16).collect();
        push_with_timeout(&mut producer, &samples, WRITE_TIMEOUT).unwrap();
        assert_eq!(reader.join().unwrap(), samples);
    }
}
