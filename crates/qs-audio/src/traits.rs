//! Audio output trait and error types.

use std::time::Duration;

use thiserror::Error;

/// Error type for audio operations.
#[derive(Error, Debug)]
pub enum AudioError {
    /// Failed to initialize audio device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// Failed to create audio stream
    #[error("stream create error: {0}")]
    StreamCreate(String),
    /// Playback error
    #[error("playback error: {0}")]
    Playback(String),
    /// No audio device available
    #[error("no audio device available")]
    NoDevice,
}

/// Trait for audio output backends.
///
/// Backends take mono 16-bit samples and spread them over however many
/// channels the device has.
pub trait AudioOutput {
    /// Get the sample rate.
    fn sample_rate(&self) -> u32;

    /// Write samples to the output, blocking until all are queued. Fails
    /// rather than waiting forever if the device stops taking samples.
    fn write(&mut self, samples: &[i16]) -> Result<(), AudioError>;

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// Number of times the device ran out of queued samples.
    fn underruns(&self) -> u64 {
        0
    }
}

/// Output that discards everything it is given, paced like a device
/// running at `sample_rate`. Useful headless.
#[derive(Debug)]
pub struct NullOutput {
    sample_rate: u32,
    written: u64,
    running: bool,
}

impl NullOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate, written: 0, running: false }
    }

    /// Total samples accepted while running.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl AudioOutput for NullOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        if self.running {
            self.written += samples.len() as u64;
            let seconds = samples.len() as f64 / self.sample_rate.max(1) as f64;
            std::thread::sleep(Duration::from_secs_f64(seconds));
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_output_counts_while_running() {
        let mut out = NullOutput::new(44100);
        out.write(&[0; 10]).unwrap();
        assert_eq!(out.written(), 0);
        out.start().unwrap();
        out.write(&[0; 10]).unwrap();
        out.stop().unwrap();
        out.write(&[0; 10]).unwrap();
        assert_eq!(out.written(), 10);
        assert_eq!(out.sample_rate(), 44100);
    }
}
