use thiserror::Error;

/// Error raised by a producer or consumer callback.
///
/// The engine never wraps or inspects it; it comes back to the caller of
/// `play`/`record` as the `source` of [`StreamError::Callback`] and can be
/// downcast to the callback's own type.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failed call into the waveform subsystem, translated into readable form
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to {cause}: {name} ({code})")]
pub struct DeviceError {
    /// The operation that was attempted, e.g. "open audio device"
    pub cause: String,
    /// Raw subsystem result code
    pub code: u32,
    /// Symbolic name, device description, or `UNKNOWN_ERROR`
    pub name: String,
    /// Whether the code is in the subsystem's table of known codes
    pub known: bool,
}

/// Errors raised while opening, streaming through, or closing a device
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Invalid format: {channels} channel(s), {sample_rate} Hz, {sample_width} byte(s) per sample")]
    InvalidFormat {
        channels: u16,
        sample_rate: u32,
        sample_width: u16,
    },

    #[error("Invalid chunk size: a chunk must hold at least one frame")]
    InvalidChunkSize,

    #[error("Unsupported sample width: {bits} bits")]
    UnsupportedSampleWidth { bits: u16 },

    #[error("Device open failed: {0}")]
    DeviceOpen(DeviceError),

    #[error("Device I/O failed: {error}{}", cleanup_suffix(.cleanup))]
    DeviceIo {
        error: DeviceError,
        cleanup: Vec<DeviceError>,
    },

    #[error("Stream callback failed: {source}{}", cleanup_suffix(.cleanup))]
    Callback {
        source: CallbackError,
        cleanup: Vec<DeviceError>,
    },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

fn cleanup_suffix(cleanup: &[DeviceError]) -> String {
    if cleanup.is_empty() {
        return String::new();
    }
    let failures: Vec<String> = cleanup.iter().map(|err| err.to_string()).collect();
    format!(" (cleanup also failed: {})", failures.join("; "))
}

impl From<DeviceError> for StreamError {
    fn from(error: DeviceError) -> Self {
        StreamError::DeviceIo {
            error,
            cleanup: Vec::new(),
        }
    }
}

impl StreamError {
    /// Wrap a callback failure
    pub fn callback(source: CallbackError) -> Self {
        StreamError::Callback {
            source,
            cleanup: Vec::new(),
        }
    }

    /// Attach a failure that happened while cleaning up after this error.
    ///
    /// Errors that carry no cleanup list are returned unchanged and the
    /// cleanup failure is logged instead.
    pub fn with_cleanup_failure(mut self, failure: DeviceError) -> Self {
        if let StreamError::DeviceIo { cleanup, .. } | StreamError::Callback { cleanup, .. } = &mut self {
            cleanup.push(failure);
            return self;
        }
        log::warn!("Cleanup failed after {}: {}", self, failure);
        self
    }

    /// Cleanup failures recorded on this error
    pub fn cleanup_failures(&self) -> &[DeviceError] {
        match self {
            StreamError::DeviceIo { cleanup, .. } | StreamError::Callback { cleanup, .. } => cleanup.as_slice(),
            _ => &[],
        }
    }

    /// The translated subsystem error, for device failures
    pub fn device_error(&self) -> Option<&DeviceError> {
        match self {
            StreamError::DeviceOpen(error) | StreamError::DeviceIo { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            StreamError::InvalidFormat { channels, sample_rate, sample_width } => format!(
                "Audio format is not valid ({} channels, {} Hz, {}-byte samples) - all values must be positive",
                channels, sample_rate, sample_width
            ),
            StreamError::InvalidChunkSize => {
                "Chunk length is too short - it must cover at least one audio frame".to_string()
            }
            StreamError::UnsupportedSampleWidth { bits } => {
                format!("{}-bit audio is not supported for this operation", bits)
            }
            StreamError::DeviceOpen(err) => {
                format!("Could not open the audio device: {}", err.name)
            }
            StreamError::DeviceIo { error, .. } => {
                format!("Audio device stopped responding while trying to {}: {}", error.cause, error.name)
            }
            StreamError::Callback { source, .. } => {
                format!("Audio stream was interrupted: {}", source)
            }
            StreamError::Wav(err) => format!("Could not read or write the WAV file: {}", err),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            StreamError::InvalidFormat { .. } => vec![
                "Use a positive channel count, sample rate and sample width".to_string(),
                "Common settings: 1 channel, 11025 Hz, 8-bit".to_string(),
            ],
            StreamError::InvalidChunkSize => vec![
                "Increase the seconds per chunk setting".to_string(),
            ],
            StreamError::UnsupportedSampleWidth { .. } => vec![
                "Record with 8 or 16 bits per sample".to_string(),
                "Convert the file to 16-bit PCM".to_string(),
            ],
            StreamError::DeviceOpen(err) => match err.name.as_str() {
                "BAD_DEVICE_ID" => vec![
                    "Use 'devices' to see available audio devices".to_string(),
                    "Select the default device instead".to_string(),
                ],
                "BAD_FORMAT" => vec![
                    "The device does not accept this format - try 16-bit audio".to_string(),
                    "Try a common sample rate such as 44100 or 48000 Hz".to_string(),
                ],
                "ALLOCATED" | "HANDLE_BUSY" => vec![
                    "Close other applications using the audio device".to_string(),
                ],
                _ => vec![
                    "Check that your audio device is connected".to_string(),
                    "Verify audio drivers are properly installed".to_string(),
                ],
            },
            StreamError::DeviceIo { .. } => vec![
                "Check audio device connections".to_string(),
                "Try the operation again".to_string(),
            ],
            StreamError::Callback { .. } => vec![
                "Check the audio source or destination and try again".to_string(),
            ],
            StreamError::Wav(_) => vec![
                "Check that the file is an uncompressed PCM WAV file".to_string(),
                "Check file permissions".to_string(),
            ],
        }
    }

    /// Check if retrying the same stream could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            StreamError::InvalidFormat { .. } => false, // Requires different parameters
            StreamError::InvalidChunkSize => false,
            StreamError::UnsupportedSampleWidth { .. } => false,
            StreamError::DeviceOpen(err) => {
                matches!(err.name.as_str(), "ALLOCATED" | "HANDLE_BUSY" | "OUT_OF_MEMORY")
            }
            StreamError::DeviceIo { .. } => true, // Device may come back
            StreamError::Callback { .. } => true, // Producer may be re-invoked
            StreamError::Wav(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            StreamError::InvalidFormat { .. }
            | StreamError::InvalidChunkSize
            | StreamError::UnsupportedSampleWidth { .. } => ErrorSeverity::Warning,
            StreamError::DeviceOpen(_) => ErrorSeverity::Error,
            StreamError::DeviceIo { .. } => ErrorSeverity::Critical,
            StreamError::Callback { cleanup, .. } if !cleanup.is_empty() => ErrorSeverity::Critical,
            StreamError::Callback { .. } => ErrorSeverity::Error,
            StreamError::Wav(_) => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
                "Try creating the directory manually: ~/.config/wavestream/".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Try resetting configuration to defaults".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
                "Check the configuration file format manually".to_string(),
            ],
        }
    }
}

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),
}

impl AppError {
    pub fn user_message(&self) -> String {
        match self {
            AppError::Stream(err) => err.user_message(),
            AppError::Config(err) => err.user_message(),
            AppError::File(err) => match err.kind() {
                std::io::ErrorKind::NotFound => "File or directory not found".to_string(),
                std::io::ErrorKind::PermissionDenied => "Permission denied - cannot access file".to_string(),
                _ => format!("File system error: {}", err),
            },
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            AppError::Stream(err) => err.recovery_suggestions(),
            AppError::Config(err) => err.recovery_suggestions(),
            AppError::File(_) => vec!["Check that the file path is correct".to_string()],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Stream(err) => err.is_recoverable(),
            AppError::Config(_) => true,
            AppError::File(_) => false,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Stream(err) => err.severity(),
            AppError::Config(_) => ErrorSeverity::Warning,
            AppError::File(_) => ErrorSeverity::Error,
        }
    }
}
