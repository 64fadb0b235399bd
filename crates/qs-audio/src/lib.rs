//! Audio output backends for the quadsid chiptune tracker.

mod cpal_backend;
mod traits;

pub use cpal_backend::{push_with_timeout, CpalOutput, WRITE_TIMEOUT};
pub use traits::{AudioError, AudioOutput, NullOutput};
