//! Error types for voxloop.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxloopError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Capture device errors — fatal to session start, never retried
    #[error("Audio device unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Recognition errors — abandon the current turn, session keeps listening
    #[error("Transcription stream error: {message}")]
    Stream { message: String },

    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    // Synthesis/playback errors — resume listening rather than hang
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("Audio playback failed: {message}")]
    Playback { message: String },

    // Dialogue errors — turn-local, same recovery as recognition
    #[error("Dialogue request failed: {message}")]
    Dialogue { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl VoxloopError {
    /// True when the error ends the whole session rather than a single turn.
    ///
    /// Only failure to acquire the capture device is session-fatal; every
    /// other error abandons the current turn and returns to listening.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            VoxloopError::DeviceUnavailable { .. } | VoxloopError::AudioDeviceNotFound { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxloopError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_device_unavailable_display() {
        let error = VoxloopError::DeviceUnavailable {
            message: "permission denied".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Audio device unavailable: permission denied"
        );
    }

    #[test]
    fn test_stream_error_display() {
        let error = VoxloopError::Stream {
            message: "socket closed mid-turn".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transcription stream error: socket closed mid-turn"
        );
    }

    #[test]
    fn test_recognition_error_display() {
        let error = VoxloopError::Recognition {
            message: "backend rejected audio".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Recognition failed: backend rejected audio"
        );
    }

    #[test]
    fn test_synthesis_error_display() {
        let error = VoxloopError::Synthesis {
            message: "no audio returned".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Speech synthesis failed: no audio returned"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = VoxloopError::ConfigInvalidValue {
            key: "turn.base_silence_ms".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for turn.base_silence_ms: must be positive"
        );
    }

    #[test]
    fn test_only_device_errors_are_session_fatal() {
        assert!(
            VoxloopError::DeviceUnavailable {
                message: "busy".to_string()
            }
            .is_session_fatal()
        );
        assert!(
            VoxloopError::AudioDeviceNotFound {
                device: "default".to_string()
            }
            .is_session_fatal()
        );
        assert!(
            !VoxloopError::Stream {
                message: "drop".to_string()
            }
            .is_session_fatal()
        );
        assert!(
            !VoxloopError::Synthesis {
                message: "late".to_string()
            }
            .is_session_fatal()
        );
        assert!(
            !VoxloopError::Dialogue {
                message: "timeout".to_string()
            }
            .is_session_fatal()
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: VoxloopError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: VoxloopError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<VoxloopError>();
        assert_sync::<VoxloopError>();
    }
}
