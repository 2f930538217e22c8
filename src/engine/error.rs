use thiserror::Error;

/// Why a raw timestamp could not become an instant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("empty timestamp")]
    Empty,
    #[error("invalid timestamp '{0}'")]
    Invalid(String),
    #[error("local time '{time}' does not exist in {tz}")]
    NonexistentLocalTime { time: String, tz: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid working hours {start_hour}:00-{end_hour}:00")]
    InvalidWindow { start_hour: u32, end_hour: u32 },
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
    #[error("interval ends before it starts ({start} > {end})")]
    InvertedInterval { start: String, end: String },
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}
