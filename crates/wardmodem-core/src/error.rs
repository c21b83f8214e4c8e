//! Collaborator error types.

use thiserror::Error;

/// Errors a [`CommandChannel`](crate::CommandChannel) or
/// [`ModelLink`](crate::ModelLink) may return from a send.
///
/// The transceiver never propagates these: a failed send is logged and
/// counted, and processing continues with the next line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The endpoint is closed and accepts no more lines.
    #[error("channel {channel} is closed")]
    Closed {
        /// Name of the closed channel.
        channel: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ChannelError::Closed { channel: "modem".to_string() };
        assert_eq!(err.to_string(), "channel modem is closed");
    }
}
