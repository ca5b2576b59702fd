//! Audio output devices for synthesized reply playback.
//!
//! The playback scheduler decides *when* each segment starts; an
//! [`AudioOutput`] only moves samples to the device. Rate alignment happens
//! before `write` — an output never resamples.

use crate::defaults;
use crate::error::Result;
use std::sync::{Arc, Mutex};

/// Trait for audio output devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
pub trait AudioOutput: Send + Sync {
    /// Start the output stream.
    fn start(&mut self) -> Result<()>;

    /// Stop the output stream and discard queued samples.
    fn stop(&mut self) -> Result<()>;

    /// Queue samples for playback. Samples must already be at `sample_rate()`.
    fn write(&mut self, samples: &[i16]) -> Result<()>;

    /// The device's native sample rate.
    fn sample_rate(&self) -> u32;

    /// Samples queued but not yet consumed by the device.
    fn pending_samples(&self) -> usize;
}

/// Mock audio output for testing.
///
/// Records every written segment and drains instantly.
#[derive(Debug, Clone)]
pub struct MockAudioOutput {
    sample_rate: u32,
    segments: Arc<Mutex<Vec<Vec<i16>>>>,
    started: bool,
}

impl MockAudioOutput {
    /// Create a new mock output at the default sample rate.
    pub fn new() -> Self {
        Self::with_sample_rate(defaults::SAMPLE_RATE)
    }

    /// Create a new mock output at a specific sample rate.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            segments: Arc::new(Mutex::new(Vec::new())),
            started: false,
        }
    }

    /// All segments written so far, in order.
    pub fn written_segments(&self) -> Vec<Vec<i16>> {
        self.segments
            .lock()
            .map(|segments| segments.clone())
            .unwrap_or_default()
    }

    /// Total number of samples written.
    pub fn written_samples(&self) -> usize {
        self.segments
            .lock()
            .map(|segments| segments.iter().map(|s| s.len()).sum())
            .unwrap_or(0)
    }
}

impl Default for MockAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for MockAudioOutput {
    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        if let Ok(mut segments) = self.segments.lock() {
            segments.clear();
        }
        Ok(())
    }

    fn write(&mut self, samples: &[i16]) -> Result<()> {
        if let Ok(mut segments) = self.segments.lock() {
            segments.push(samples.to_vec());
        }
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn pending_samples(&self) -> usize {
        0
    }
}

#[cfg(feature = "cpal-audio")]
pub use cpal_output::CpalAudioOutput;

#[cfg(feature = "cpal-audio")]
mod cpal_output {
    use super::*;
    use crate::error::VoxloopError;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::collections::VecDeque;

    /// Wrapper for cpal::Stream to make it Send.
    ///
    /// SAFETY: the stream is only accessed through the Mutex in
    /// CpalAudioOutput, never concurrently from multiple threads.
    struct SendableStream(cpal::Stream);

    unsafe impl Send for SendableStream {}

    /// Real audio output implementation using CPAL.
    ///
    /// The device callback drains a shared queue; underruns emit silence
    /// rather than stalling the stream.
    pub struct CpalAudioOutput {
        device: cpal::Device,
        sample_rate: u32,
        stream: Arc<Mutex<Option<SendableStream>>>,
        queue: Arc<Mutex<VecDeque<i16>>>,
    }

    impl CpalAudioOutput {
        /// Create an output on the default device at the given sample rate.
        ///
        /// # Errors
        /// Returns `DeviceUnavailable` when no output device can be acquired.
        pub fn new(sample_rate: u32) -> Result<Self> {
            let host = cpal::default_host();
            let device =
                host.default_output_device()
                    .ok_or_else(|| VoxloopError::DeviceUnavailable {
                        message: "no output device available".to_string(),
                    })?;

            Ok(Self {
                device,
                sample_rate,
                stream: Arc::new(Mutex::new(None)),
                queue: Arc::new(Mutex::new(VecDeque::new())),
            })
        }
    }

    impl AudioOutput for CpalAudioOutput {
        fn start(&mut self) -> Result<()> {
            {
                let guard = self.stream.lock().map_err(|e| VoxloopError::Playback {
                    message: format!("Failed to lock stream: {}", e),
                })?;
                if guard.is_some() {
                    return Ok(());
                }
            }

            let config = cpal::StreamConfig {
                channels: 1,
                sample_rate: cpal::SampleRate(self.sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let queue = Arc::clone(&self.queue);
            let stream = self
                .device
                .build_output_stream(
                    &config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        let mut queue = match queue.lock() {
                            Ok(q) => q,
                            Err(_) => {
                                data.fill(0);
                                return;
                            }
                        };
                        for slot in data.iter_mut() {
                            *slot = queue.pop_front().unwrap_or(0);
                        }
                    },
                    |err| {
                        eprintln!("voxloop: audio output error: {}", err);
                    },
                    None,
                )
                .map_err(|e| VoxloopError::Playback {
                    message: format!("Failed to build output stream: {}", e),
                })?;

            stream.play().map_err(|e| VoxloopError::DeviceUnavailable {
                message: format!("Failed to start output stream: {}", e),
            })?;

            let mut guard = self.stream.lock().map_err(|e| VoxloopError::Playback {
                message: format!("Failed to lock stream: {}", e),
            })?;
            *guard = Some(SendableStream(stream));
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            let mut guard = self.stream.lock().map_err(|e| VoxloopError::Playback {
                message: format!("Failed to lock stream: {}", e),
            })?;

            if let Some(sendable) = guard.take() {
                sendable.0.pause().map_err(|e| VoxloopError::Playback {
                    message: format!("Failed to stop output stream: {}", e),
                })?;
            }

            if let Ok(mut queue) = self.queue.lock() {
                queue.clear();
            }
            Ok(())
        }

        fn write(&mut self, samples: &[i16]) -> Result<()> {
            let mut queue = self.queue.lock().map_err(|e| VoxloopError::Playback {
                message: format!("Failed to lock queue: {}", e),
            })?;
            queue.extend(samples.iter().copied());
            Ok(())
        }

        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn pending_samples(&self) -> usize {
            self.queue.lock().map(|q| q.len()).unwrap_or(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_written_segments() {
        let mut output = MockAudioOutput::new();
        output.start().unwrap();
        output.write(&[1, 2, 3]).unwrap();
        output.write(&[4, 5]).unwrap();

        assert_eq!(output.written_segments(), vec![vec![1, 2, 3], vec![4, 5]]);
        assert_eq!(output.written_samples(), 5);
    }

    #[test]
    fn test_mock_stop_discards_queue() {
        let mut output = MockAudioOutput::new();
        output.start().unwrap();
        output.write(&[1, 2, 3]).unwrap();
        output.stop().unwrap();
        assert!(output.written_segments().is_empty());
    }

    #[test]
    fn test_mock_clones_share_segments() {
        let mut output = MockAudioOutput::new();
        let observer = output.clone();
        output.write(&[7, 8]).unwrap();
        assert_eq!(observer.written_samples(), 2);
    }

    #[test]
    fn test_output_trait_is_object_safe() {
        let mut output: Box<dyn AudioOutput> = Box::new(MockAudioOutput::with_sample_rate(48000));
        assert_eq!(output.sample_rate(), 48000);
        assert!(output.start().is_ok());
        assert!(output.write(&[0i16; 10]).is_ok());
        assert_eq!(output.pending_samples(), 0);
    }
}
