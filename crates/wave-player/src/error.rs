//! Error and warning types shared across the crate.
//!
//! Every public player operation resets the session's single error slot
//! before doing anything else; on failure it stores one of these values
//! and signals failure through its return value. Warnings describe
//! requests that were ignored (or applied with a caveat) while the
//! session keeps running.

use thiserror::Error;

use crate::wave::WaveFormat;

/// Severity attached to a stored [`PlayerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Nothing went wrong.
    Info,
    /// The request was ignored or applied with a caveat; playback is fine.
    Warning,
    /// The operation failed.
    Error,
}

/// All errors and warnings a player session can report.
///
/// Decode variants map one-to-one onto the container fields they guard,
/// so a rejected file names exactly which rule it broke first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    // Transport warnings. The operation is a no-op (play/pause) or is
    // still applied with clamping (jump).
    #[error("audio is already playing")]
    AlreadyPlaying,
    #[error("audio is already paused")]
    AlreadyPaused,
    #[error("jump target is beyond the end of the audio")]
    JumpBeyondEnd,

    // Container decode errors, fail-fast in parse order.
    #[error("input is too small for a WAVE container")]
    FileTooSmall,
    #[error("RIFF magic is invalid")]
    BadRiffMagic,
    #[error("WAVE magic is invalid")]
    BadWaveMagic,
    #[error("declared RIFF size does not match the input length")]
    BadFileSize,
    #[error("fmt chunk magic is invalid")]
    BadFmtMagic,
    #[error("fmt chunk size does not match the declared format")]
    BadFmtSize,
    #[error("unsupported format code {0:#06x}")]
    UnsupportedFormat(u16),
    #[error("non-PCM fmt extension size is invalid")]
    BadNonPcmExtensionSize,
    #[error("extensible fmt extension size is invalid")]
    BadExtensibleExtensionSize,
    #[error("extensible nested format code {0:#06x} is invalid")]
    BadExtensibleFormat(u16),
    #[error("extensible sub-format GUID is invalid")]
    BadExtensibleGuid,
    #[error("fact chunk magic is invalid")]
    BadFactMagic,
    #[error("fact chunk size is invalid")]
    BadFactSize,
    #[error("byte rate is inconsistent with rate, channels and bit depth")]
    BadByteRate,
    #[error("block align is inconsistent with channels and bit depth")]
    BadBlockAlign,
    #[error("data chunk not found")]
    DataChunkNotFound,
    #[error("data chunk magic is invalid")]
    BadDataMagic,
    #[error("declared data size does not match the remaining input")]
    BadDataSize,
    #[error("samples per channel is inconsistent with rate and duration")]
    BadSamplesPerChannel,

    // Device negotiation and mixer errors.
    #[error("unsupported bits per sample: {bits} for {format:?}")]
    UnsupportedBitsPerSample { format: WaveFormat, bits: u16 },
    #[error("audio device error: {0}")]
    Device(String),
    #[error("mixer master control not found")]
    MixerControlNotFound,
}

impl PlayerError {
    /// Severity of this value when stored in the session error slot.
    pub fn severity(&self) -> Severity {
        match self {
            PlayerError::AlreadyPlaying
            | PlayerError::AlreadyPaused
            | PlayerError::JumpBeyondEnd => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Native device error text, when the failure came from the output backend.
    pub fn device_error(&self) -> Option<&str> {
        match self {
            PlayerError::Device(detail) => Some(detail),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_caveats_are_warnings() {
        assert_eq!(PlayerError::AlreadyPlaying.severity(), Severity::Warning);
        assert_eq!(PlayerError::AlreadyPaused.severity(), Severity::Warning);
        assert_eq!(PlayerError::JumpBeyondEnd.severity(), Severity::Warning);
    }

    #[test]
    fn decode_and_device_failures_are_errors() {
        assert_eq!(PlayerError::BadRiffMagic.severity(), Severity::Error);
        assert_eq!(
            PlayerError::Device("boom".into()).severity(),
            Severity::Error
        );
    }

    #[test]
    fn device_error_exposes_native_detail() {
        let err = PlayerError::Device("ENODEV".into());
        assert_eq!(err.device_error(), Some("ENODEV"));
        assert_eq!(PlayerError::BadFmtSize.device_error(), None);
    }
}
