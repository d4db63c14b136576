use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use wavestream::audio::{
    list_playback_devices, list_recording_devices, measure_quiet_threshold, play_wav, record_wav,
    CpalSubsystem, DeviceId, RecordingDevice, WavChunkReader, WavChunkWriter, WaveFormat,
};
use wavestream::cli::{CliApp, Commands, RecordArgs, StatusDisplay};
use wavestream::config::ConfigManager;
use wavestream::error::AppError;
use wavestream::logging::{self, LOG_LEVEL_ENV};

/// Length of the chunk recorded by the threshold command
const THRESHOLD_CHUNK: Duration = Duration::from_millis(500);

/// Main application controller that wires configuration to the audio subsystem
struct AppController {
    config_manager: ConfigManager,
    subsystem: CpalSubsystem,
}

impl AppController {
    fn new() -> Result<Self, AppError> {
        let config_manager = ConfigManager::new()?;
        let subsystem = CpalSubsystem::new();

        info!(
            "Using {} audio host, config at {}",
            subsystem.host_name(),
            config_manager.config_path().display()
        );

        Ok(Self {
            config_manager,
            subsystem,
        })
    }

    fn execute_command(&mut self, command: Commands) -> Result<(), AppError> {
        match command {
            Commands::Devices => {
                let playback = list_playback_devices(&self.subsystem);
                let recording = list_recording_devices(&self.subsystem);
                StatusDisplay::display_devices(&playback, &recording);
                Ok(())
            }
            Commands::Play { file, device, chunk_ms } => self.play(&file, device, chunk_ms),
            Commands::Record(args) => self.record(&args),
            Commands::Threshold { device, rate, bits, save } => self.threshold(device, rate, bits, save),
        }
    }

    fn play(&self, file: &Path, device: Option<DeviceId>, chunk_ms: Option<u64>) -> Result<(), AppError> {
        let config = self.config_manager.get_config();
        let path = CliApp::expand_path(&file.to_string_lossy());

        let reader = WavChunkReader::open(&path)?;
        let format = reader.format();
        let chunk = chunk_ms.map(Duration::from_millis).unwrap_or_else(|| config.playback_chunk());
        let device = device.unwrap_or_else(|| config.playback_device_id());

        let summary = play_wav(&self.subsystem, device, reader, chunk, config.wait_timeout())?;
        StatusDisplay::display_playback(&path, &format, &summary);
        Ok(())
    }

    fn record(&self, args: &RecordArgs) -> Result<(), AppError> {
        let config = self.config_manager.get_config();
        let settings = args.apply(&config.recording);
        let format = settings.format()?;
        let device = args.device.unwrap_or_else(|| config.recording_device_id());
        let path: PathBuf = CliApp::expand_path(&args.file.to_string_lossy());

        let writer = WavChunkWriter::create(&path, format)?;
        let stop = install_stop_handler();

        println!("Recording {} - press Ctrl-C to stop", format.format_description());
        let recording = record_wav(
            &self.subsystem,
            device,
            writer,
            settings.limits(),
            settings.seconds_per_chunk,
            config.wait_timeout(),
            Some(stop),
        )?;

        StatusDisplay::display_recording(&path, &format, &recording);
        Ok(())
    }

    fn threshold(
        &mut self,
        device: Option<DeviceId>,
        rate: Option<u32>,
        bits: Option<u16>,
        save: bool,
    ) -> Result<(), AppError> {
        let config = self.config_manager.get_config();
        let format = WaveFormat::from_bits(
            1,
            rate.unwrap_or(config.recording.sample_rate),
            bits.unwrap_or(config.recording.bits_per_sample),
        )?;
        let device = device.unwrap_or_else(|| config.recording_device_id());

        let mut recorder = RecordingDevice::open(&self.subsystem, device, format)?
            .with_wait_timeout(config.wait_timeout());
        let frames = recorder.frames_per_chunk(THRESHOLD_CHUNK);
        let level = measure_quiet_threshold(&mut recorder, frames)?;
        recorder.close()?;

        if save {
            self.config_manager.set_quiet_threshold(level)?;
        }
        StatusDisplay::display_threshold(level, save);
        Ok(())
    }
}

/// Ctrl-C ends a recording after the chunk in progress
fn install_stop_handler() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    if let Err(e) = ctrlc::set_handler(move || {
        println!("\nStopping after the current chunk...");
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }
    stop
}

fn main() {
    // Default to 'warn' so log lines do not interleave with command output
    if std::env::var(LOG_LEVEL_ENV).is_err() {
        std::env::set_var(LOG_LEVEL_ENV, "warn");
    }
    if let Err(e) = logging::init() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let cli = CliApp::parse();

    let mut app = match AppController::new() {
        Ok(app) => app,
        Err(e) => {
            StatusDisplay::display_error(&e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.execute_command(cli.command) {
        StatusDisplay::display_error(&e);
        std::process::exit(1);
    }

    info!("Application shutdown complete");
}
