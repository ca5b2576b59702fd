use crate::defaults;
use crate::error::{Result, VoxloopError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub turn: TurnConfig,
    pub stt: SttConfig,
    pub playback: PlaybackConfig,
    pub voice: VoiceConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub vad_threshold: f32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

/// Turn segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TurnConfig {
    pub base_silence_ms: u32,
    pub silence_step_ms: u32,
    pub silence_cap_ms: u32,
    pub resume_delay_min_ms: u32,
    pub resume_delay_max_ms: u32,
}

/// Speech-to-text stream configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub language: String,
    /// Vocabulary hints passed to the recognizer at stream-open time.
    pub vocabulary: Vec<String>,
    /// Ask the recognizer for punctuated, formatted transcripts.
    pub punctuate: bool,
}

/// Playback scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    pub sample_rate: u32,
    pub lead_ms: u32,
}

/// Voice synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoiceConfig {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            vad_threshold: defaults::VAD_THRESHOLD,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            base_silence_ms: defaults::BASE_SILENCE_MS,
            silence_step_ms: defaults::SILENCE_STEP_MS,
            silence_cap_ms: defaults::SILENCE_CAP_MS,
            resume_delay_min_ms: defaults::RESUME_DELAY_MIN_MS,
            resume_delay_max_ms: defaults::RESUME_DELAY_MAX_MS,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            vocabulary: Vec::new(),
            punctuate: true,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            lead_ms: defaults::PLAYBACK_LEAD_MS,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXLOOP_AUDIO_DEVICE → audio.device
    /// - VOXLOOP_VAD_THRESHOLD → audio.vad_threshold
    /// - VOXLOOP_LANGUAGE → stt.language
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(device) = std::env::var("VOXLOOP_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(threshold) = std::env::var("VOXLOOP_VAD_THRESHOLD")
            && let Ok(value) = threshold.parse::<f32>()
        {
            self.audio.vad_threshold = value;
        }

        if let Ok(language) = std::env::var("VOXLOOP_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        self
    }

    /// Validate configuration values.
    ///
    /// Catches values that would silently misbehave at runtime (a zero
    /// silence threshold finalizes every turn instantly; an inverted resume
    /// range panics inside the RNG).
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(VoxloopError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.audio.vad_threshold) {
            return Err(VoxloopError::ConfigInvalidValue {
                key: "audio.vad_threshold".to_string(),
                message: "must be between 0.0 and 1.0".to_string(),
            });
        }

        if self.turn.base_silence_ms == 0 {
            return Err(VoxloopError::ConfigInvalidValue {
                key: "turn.base_silence_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }

        if self.turn.silence_cap_ms < self.turn.base_silence_ms {
            return Err(VoxloopError::ConfigInvalidValue {
                key: "turn.silence_cap_ms".to_string(),
                message: format!(
                    "must be at least base_silence_ms ({})",
                    self.turn.base_silence_ms
                ),
            });
        }

        if self.turn.resume_delay_max_ms < self.turn.resume_delay_min_ms {
            return Err(VoxloopError::ConfigInvalidValue {
                key: "turn.resume_delay_max_ms".to_string(),
                message: format!(
                    "must be at least resume_delay_min_ms ({})",
                    self.turn.resume_delay_min_ms
                ),
            });
        }

        if self.playback.sample_rate == 0 {
            return Err(VoxloopError::ConfigInvalidValue {
                key: "playback.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.voice.volume) {
            return Err(VoxloopError::ConfigInvalidValue {
                key: "voice.volume".to_string(),
                message: "must be between 0.0 and 1.0".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.audio.sample_rate, 16000);
        assert!((config.audio.vad_threshold - 0.02).abs() < f32::EPSILON);
        assert_eq!(config.turn.base_silence_ms, 2000);
        assert_eq!(config.turn.silence_step_ms, 200);
        assert_eq!(config.turn.silence_cap_ms, 3500);
        assert_eq!(config.stt.language, "en");
        assert!(config.stt.punctuate);
        assert_eq!(config.playback.lead_ms, 30);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[turn]\nbase_silence_ms = 1500\n\n[audio]\nvad_threshold = 0.05"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.turn.base_silence_ms, 1500);
        assert!((config.audio.vad_threshold - 0.05).abs() < f32::EPSILON);
        // Untouched sections keep defaults
        assert_eq!(config.turn.silence_cap_ms, 3500);
        assert_eq!(config.playback.sample_rate, 16000);
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml = = =").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/voxloop.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("voxloop.toml");

        let mut config = Config::default();
        config.audio.device = Some("pipewire".to_string());
        config.turn.base_silence_ms = 1800;
        config.stt.vocabulary = vec!["voxloop".to_string(), "playhead".to_string()];

        config.save(&path).unwrap();
        let reloaded = Config::load(&path).unwrap();
        assert_eq!(config, reloaded);
    }

    #[test]
    fn test_validate_rejects_zero_silence() {
        let mut config = Config::default();
        config.turn.base_silence_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("turn.base_silence_ms"));
    }

    #[test]
    fn test_validate_rejects_cap_below_base() {
        let mut config = Config::default();
        config.turn.base_silence_ms = 2000;
        config.turn.silence_cap_ms = 1000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("turn.silence_cap_ms"));
    }

    #[test]
    fn test_validate_rejects_inverted_resume_range() {
        let mut config = Config::default();
        config.turn.resume_delay_min_ms = 500;
        config.turn.resume_delay_max_ms = 200;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("turn.resume_delay_max_ms"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.audio.vad_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override_threshold() {
        // SAFETY: test runs single-threaded with respect to this variable
        unsafe {
            std::env::set_var("VOXLOOP_VAD_THRESHOLD", "0.08");
        }
        let config = Config::default().with_env_overrides();
        unsafe {
            std::env::remove_var("VOXLOOP_VAD_THRESHOLD");
        }
        assert!((config.audio.vad_threshold - 0.08).abs() < f32::EPSILON);
    }
}
