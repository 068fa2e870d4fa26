use thiserror::Error;

use crate::domain::ControlId;

/// Errors surfaced to the host when a value is bound to a control.
#[derive(Debug, Error)]
pub enum BindError {
    #[error(
        "subscription expected, stream given ({stream_type}); subscribe to the stream before binding it"
    )]
    StreamNotSubscribed { stream_type: String },
    #[error("control {control} needs a tokio runtime to watch its bound value")]
    NoRuntime { control: ControlId },
    #[error("control {control} rejected the bound value: {source}")]
    Control {
        control: ControlId,
        #[source]
        source: Box<BindError>,
    },
}

impl BindError {
    pub fn stream_not_subscribed(stream_type: impl Into<String>) -> Self {
        Self::StreamNotSubscribed {
            stream_type: stream_type.into(),
        }
    }

    /// Attaches the control the failed bind was aimed at.
    pub fn for_control(self, control: ControlId) -> Self {
        match self {
            already @ (Self::Control { .. } | Self::NoRuntime { .. }) => already,
            other => Self::Control {
                control,
                source: Box::new(other),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(String),
}
