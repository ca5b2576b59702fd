use crate::defaults;
use crate::error::{Result, VoxloopError};
use std::time::Instant;

/// A frame of raw audio samples with timing information.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// PCM samples (16-bit signed integers), mono.
    pub samples: Vec<i16>,
    /// Timestamp when this frame was captured.
    pub timestamp: Instant,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(samples: Vec<i16>, timestamp: Instant, sequence: u64) -> Self {
        Self {
            samples,
            timestamp,
            sequence,
        }
    }

    /// Returns the duration of this frame in milliseconds.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        (self.samples.len() as u32 * 1000) / sample_rate
    }
}

/// Recognized capture device options.
///
/// `channel_count` is always 1 for voice input; the processing flags map to
/// whatever the platform capture stack supports and are hints, not guarantees.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channel_count: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            channel_count: 1,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
pub trait AudioSource: Send + Sync {
    /// Start capturing audio from the source.
    ///
    /// # Returns
    /// Ok(()) if the source started successfully. A device that cannot be
    /// acquired (permission denied, device busy) returns
    /// [`VoxloopError::DeviceUnavailable`]; callers must not retry.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Read audio samples accumulated since the last read.
    ///
    /// # Returns
    /// Vector of 16-bit PCM audio samples, possibly empty, or an error
    fn read_samples(&mut self) -> Result<Vec<i16>>;
}

/// Mock audio source for testing
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    frames: Vec<Vec<i16>>,
    position: usize,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new mock audio source with default settings
    pub fn new() -> Self {
        Self {
            is_started: false,
            frames: vec![vec![0i16; 320]],
            position: 0,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Configure the mock to replay the given frames in order, then silence.
    pub fn with_frames(mut self, frames: Vec<Vec<i16>>) -> Self {
        self.frames = frames;
        self.position = 0;
        self
    }

    /// Configure the mock to fail on start with `DeviceUnavailable`
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(VoxloopError::DeviceUnavailable {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(VoxloopError::AudioCapture {
                message: self.error_message.clone(),
            });
        }

        if self.position < self.frames.len() {
            let frame = self.frames[self.position].clone();
            self.position += 1;
            Ok(frame)
        } else {
            // Exhausted scripted frames: keep producing silence like a live mic
            Ok(vec![0i16; 320])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_config_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.channel_count, 1);
        assert!(config.echo_cancellation);
        assert!(config.noise_suppression);
        assert!(config.auto_gain_control);
    }

    #[test]
    fn test_audio_frame_duration() {
        let frame = AudioFrame::new(vec![0i16; 320], Instant::now(), 0);
        assert_eq!(frame.duration_ms(16000), 20);
    }

    #[test]
    fn test_mock_replays_frames_in_order() {
        let mut source = MockAudioSource::new().with_frames(vec![vec![1i16; 4], vec![2i16; 4]]);

        assert_eq!(source.read_samples().unwrap(), vec![1i16; 4]);
        assert_eq!(source.read_samples().unwrap(), vec![2i16; 4]);
        // Exhausted → silence
        assert!(source.read_samples().unwrap().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_mock_start_failure_is_device_unavailable() {
        let mut source = MockAudioSource::new()
            .with_start_failure()
            .with_error_message("microphone is busy");

        let result = source.start();
        assert!(!source.is_started());
        match result {
            Err(VoxloopError::DeviceUnavailable { message }) => {
                assert_eq!(message, "microphone is busy");
            }
            _ => panic!("Expected DeviceUnavailable error"),
        }
    }

    #[test]
    fn test_mock_read_failure() {
        let mut source = MockAudioSource::new().with_read_failure();
        let result = source.read_samples();
        assert!(matches!(result, Err(VoxloopError::AudioCapture { .. })));
    }

    #[test]
    fn test_mock_start_stop_state() {
        let mut source = MockAudioSource::new();
        assert!(!source.is_started());
        source.start().unwrap();
        assert!(source.is_started());
        source.stop().unwrap();
        assert!(!source.is_started());
    }

    #[test]
    fn test_audio_source_trait_is_object_safe() {
        let mut source: Box<dyn AudioSource> =
            Box::new(MockAudioSource::new().with_frames(vec![vec![5i16; 8]]));

        assert!(source.start().is_ok());
        assert_eq!(source.read_samples().unwrap(), vec![5i16; 8]);
        assert!(source.stop().is_ok());
    }
}
