use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Failed to decode message: {message}"))]
    Decode {
        message: String,
        #[snafu(source(false))]
        source: Option<eyre::Report>,
    },

    #[snafu(display("Malformed release time {value:?}: {reason}"))]
    MalformedReleaseTime { value: String, reason: String },

    #[snafu(display("Failed to send message to {queue_url}"))]
    Send {
        queue_url: String,
        #[snafu(source(false))]
        source: eyre::Report,
    },

    #[snafu(display("Failed to delete message from {queue_url}"))]
    Delete {
        queue_url: String,
        #[snafu(source(false))]
        source: eyre::Report,
    },

    #[snafu(display("Failed to receive messages from {queue_url}"))]
    Receive {
        queue_url: String,
        #[snafu(source(false))]
        source: eyre::Report,
    },

    #[snafu(display("Invalid configuration: {message}"))]
    InvalidConfig { message: String },
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode {
            message: "invalid JSON envelope".to_owned(),
            source: Some(e.into()),
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::Decode {
            message: "invalid base64 in binary attribute".to_owned(),
            source: Some(e.into()),
        }
    }
}

impl Error {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            source: None,
        }
    }

    pub fn malformed_release_time(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedReleaseTime {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn send(queue_url: impl Into<String>, e: impl Into<eyre::Report>) -> Self {
        Self::Send {
            queue_url: queue_url.into(),
            source: e.into(),
        }
    }

    pub fn delete(queue_url: impl Into<String>, e: impl Into<eyre::Report>) -> Self {
        Self::Delete {
            queue_url: queue_url.into(),
            source: e.into(),
        }
    }

    pub fn receive(queue_url: impl Into<String>, e: impl Into<eyre::Report>) -> Self {
        Self::Receive {
            queue_url: queue_url.into(),
            source: e.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
