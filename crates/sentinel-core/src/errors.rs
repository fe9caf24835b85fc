//! Frame decoding errors.

/// Why an inbound frame could not be turned into a [`TelemetryFrame`].
///
/// [`TelemetryFrame`]: crate::frames::TelemetryFrame
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame has no string `type` discriminant")]
    MissingType,

    #[error("unknown frame type: {0}")]
    UnknownType(String),

    #[error("{frame_type} frame is missing `payload`")]
    MissingPayload { frame_type: &'static str },

    #[error("invalid {frame_type} payload: {detail}")]
    InvalidPayload {
        frame_type: &'static str,
        detail: String,
    },

    #[error("start_session frame has no usable `sessionId`")]
    InvalidSessionId,

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

impl FrameError {
    /// Unknown discriminants are expected from newer producers and are
    /// ignored quietly; everything else is a malformed frame.
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, Self::UnknownType(_))
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::NotAnObject => "not_an_object",
            Self::MissingType => "missing_type",
            Self::UnknownType(_) => "unknown_type",
            Self::MissingPayload { .. } => "missing_payload",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::InvalidSessionId => "invalid_session_id",
            Self::Encode(_) => "encode",
        }
    }
}
