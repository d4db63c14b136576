use std::fmt;

use crate::error::DeviceError;

/// Raw result code returned by a waveform subsystem call.
///
/// Values follow the classic multimedia system numbering so codes reported by
/// a backend can be compared against driver documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultCode(pub u32);

impl ResultCode {
    pub const NO_ERROR: ResultCode = ResultCode(0);
    pub const GENERAL_ERROR: ResultCode = ResultCode(1);
    pub const BAD_DEVICE_ID: ResultCode = ResultCode(2);
    pub const NOT_ENABLED: ResultCode = ResultCode(3);
    pub const ALLOCATED: ResultCode = ResultCode(4);
    pub const INVALID_HANDLE: ResultCode = ResultCode(5);
    pub const NO_DRIVER: ResultCode = ResultCode(6);
    pub const OUT_OF_MEMORY: ResultCode = ResultCode(7);
    pub const NOT_SUPPORTED: ResultCode = ResultCode(8);
    pub const INVALID_FLAG: ResultCode = ResultCode(10);
    pub const INVALID_PARAM: ResultCode = ResultCode(11);
    pub const HANDLE_BUSY: ResultCode = ResultCode(12);
    pub const BAD_FORMAT: ResultCode = ResultCode(32);
    pub const STILL_PLAYING: ResultCode = ResultCode(33);
    pub const UNPREPARED: ResultCode = ResultCode(34);
    pub const SYNC: ResultCode = ResultCode(35);

    pub fn code(self) -> u32 {
        self.0
    }

    /// Symbolic name of the code, if it is one the subsystem documents
    pub fn known_name(self) -> Option<&'static str> {
        KNOWN_CODES
            .iter()
            .find(|(code, _)| *code == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known_name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "code {}", self.0),
        }
    }
}

/// Outcome of a subsystem call. `Ok` is the `NO_ERROR` case.
pub type SubsystemResult = Result<(), ResultCode>;

static KNOWN_CODES: &[(ResultCode, &str)] = &[
    (ResultCode::NO_ERROR, "NO_ERROR"),
    (ResultCode::GENERAL_ERROR, "GENERAL_ERROR"),
    (ResultCode::BAD_DEVICE_ID, "BAD_DEVICE_ID"),
    (ResultCode::NOT_ENABLED, "NOT_ENABLED"),
    (ResultCode::ALLOCATED, "ALLOCATED"),
    (ResultCode::INVALID_HANDLE, "INVALID_HANDLE"),
    (ResultCode::NO_DRIVER, "NO_DRIVER"),
    (ResultCode::OUT_OF_MEMORY, "OUT_OF_MEMORY"),
    (ResultCode::NOT_SUPPORTED, "NOT_SUPPORTED"),
    (ResultCode::INVALID_FLAG, "INVALID_FLAG"),
    (ResultCode::INVALID_PARAM, "INVALID_PARAM"),
    (ResultCode::HANDLE_BUSY, "HANDLE_BUSY"),
    (ResultCode::BAD_FORMAT, "BAD_FORMAT"),
    (ResultCode::STILL_PLAYING, "STILL_PLAYING"),
    (ResultCode::UNPREPARED, "UNPREPARED"),
    (ResultCode::SYNC, "SYNC"),
];

/// Name used when a code is neither in the table nor described by the device
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

/// Translate a failed subsystem call into a structured error.
///
/// `cause` names the operation that was attempted ("open audio device").
/// `device_text` is the device's own description of the code, used only for
/// codes missing from the known table.
pub fn translate(code: ResultCode, cause: &str, device_text: Option<String>) -> DeviceError {
    let (name, known) = match code.known_name() {
        Some(name) => (name.to_string(), true),
        None => (
            device_text
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            false,
        ),
    };

    DeviceError {
        cause: cause.to_string(),
        code: code.0,
        name,
        known,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_resolve() {
        let err = translate(ResultCode::STILL_PLAYING, "close audio device", None);
        assert_eq!(err.cause, "close audio device");
        assert_eq!(err.code, 33);
        assert_eq!(err.name, "STILL_PLAYING");
        assert!(err.known);

        assert_eq!(ResultCode::INVALID_HANDLE.known_name(), Some("INVALID_HANDLE"));
        assert_eq!(ResultCode::NO_DRIVER.known_name(), Some("NO_DRIVER"));
        assert_eq!(ResultCode::OUT_OF_MEMORY.known_name(), Some("OUT_OF_MEMORY"));
    }

    #[test]
    fn test_known_code_ignores_device_text() {
        let err = translate(
            ResultCode::BAD_DEVICE_ID,
            "open audio device",
            Some("driver says no".to_string()),
        );
        assert_eq!(err.name, "BAD_DEVICE_ID");
    }

    #[test]
    fn test_unknown_code_uses_device_text() {
        let err = translate(
            ResultCode(512),
            "prepare buffer",
            Some("The driver is asleep".to_string()),
        );
        assert_eq!(err.name, "The driver is asleep");
        assert_eq!(err.code, 512);
        assert!(!err.known);
    }

    #[test]
    fn test_unknown_code_without_text() {
        let err = translate(ResultCode(999), "reset audio device", None);
        assert_eq!(err.name, UNKNOWN_ERROR);
        assert!(!err.known);

        let blank = translate(ResultCode(999), "reset audio device", Some("  ".to_string()));
        assert_eq!(blank.name, UNKNOWN_ERROR);
    }

    #[test]
    fn test_result_code_display() {
        assert_eq!(ResultCode::BAD_FORMAT.to_string(), "BAD_FORMAT (32)");
        assert_eq!(ResultCode(77).to_string(), "code 77");
    }
}
