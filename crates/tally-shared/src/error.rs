use thiserror::Error;

/// Errors raised while encoding or decoding wire frames.
///
/// A decode failure is never fatal to the connection: the frame is logged
/// and dropped at the transport layer.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
}
