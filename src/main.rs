use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use voxloop::audio::capture::{CpalAudioSource, list_devices};
use voxloop::audio::source::{AudioSource, DeviceConfig};
use voxloop::audio::vad::{Vad, VadConfig};
use voxloop::cli::{Cli, Commands, ConfigAction, default_config_path};
use voxloop::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(default_config_path);

    match cli.command {
        None | Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Meter {
            device,
            threshold,
            duration,
        }) => {
            let config = load_config(&config_path)?;
            run_meter(config, device, threshold, duration, cli.quiet).await?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, &config_path)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_or_default(path)?.with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn list_audio_devices() -> Result<()> {
    let devices = list_devices()?;
    if devices.is_empty() {
        eprintln!("voxloop: no audio input devices found");
        return Ok(());
    }
    for device in devices {
        println!("{}", device);
    }
    Ok(())
}

fn handle_config_command(action: ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Init => {
            if path.exists() {
                anyhow::bail!("config file already exists at {}", path.display());
            }
            Config::default().save(path)?;
            println!("wrote {}", path.display());
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// Live input meter: renders level against the speech threshold so users can
/// tune `audio.vad_threshold` for their room and microphone.
async fn run_meter(
    config: Config,
    device: Option<String>,
    threshold: Option<f32>,
    duration: Option<Duration>,
    quiet: bool,
) -> Result<()> {
    let device_name = device.or_else(|| config.audio.device.clone());
    let device_config = DeviceConfig {
        sample_rate: config.audio.sample_rate,
        ..DeviceConfig::default()
    };

    let mut source = CpalAudioSource::new(device_name.as_deref(), device_config)?;
    source.start()?;

    let mut vad = Vad::new(VadConfig {
        speech_threshold: threshold.unwrap_or(config.audio.vad_threshold),
    });

    if !quiet {
        eprintln!("voxloop: metering input — speak to see levels (Ctrl-C to exit)");
    }

    let started = Instant::now();
    let mut interval = tokio::time::interval(Duration::from_millis(voxloop::defaults::FRAME_MS as u64));
    let mut was_speech = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = interval.tick() => {
                if let Some(limit) = duration
                    && started.elapsed() >= limit
                {
                    break;
                }

                let samples = source.read_samples()?;
                if samples.is_empty() {
                    continue;
                }

                let activity = vad.process(&samples);
                display_level(activity.level, vad.threshold());

                if activity.is_speech != was_speech {
                    was_speech = activity.is_speech;
                    if !quiet {
                        clear_meter_line();
                        if activity.is_speech {
                            eprintln!("speech started (level {:.3})", activity.level);
                        } else {
                            eprintln!("speech ended");
                        }
                    }
                }
            }
        }
    }

    clear_meter_line();
    source.stop()?;
    Ok(())
}

/// Displays a visual level meter to stderr.
fn display_level(level: f32, threshold: f32) {
    const BAR_WIDTH: usize = 30;

    // Logarithmic scale for visibility at low levels: map 0.001-0.5 to the bar
    let position = |value: f32| -> usize {
        if value > 0.001 {
            ((value.log10() + 3.0) / 2.7 * BAR_WIDTH as f32).clamp(0.0, BAR_WIDTH as f32) as usize
        } else {
            0
        }
    };

    let filled = position(level);
    let threshold_pos = position(threshold);

    let bar: String = (0..BAR_WIDTH)
        .map(|i| {
            if i < filled {
                if level > threshold { '█' } else { '▓' }
            } else if i == threshold_pos {
                '│'
            } else {
                '░'
            }
        })
        .collect();

    eprint!("\r[{}] {:.3}  ", bar, level);
    let _ = std::io::stderr().flush();
}

/// Clear the meter line before printing a full-width message.
fn clear_meter_line() {
    eprint!("\r{:60}\r", "");
}
