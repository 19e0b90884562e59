/// Core error type for the bridge.
///
/// Adapter crates map their library errors into these variants so the loops
/// can tell an expected long-poll expiry from a real failure, and a transient
/// fault from data worth skipping.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// A bounded network call ran out its timeout. Expected on the chat
    /// long poll; treated as "no updates this cycle".
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure (refused, reset, DNS). Retry after backoff.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered, but not usefully: bad status, `ok:false`
    /// envelope, undecodable body. Treated as transient.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// One datum is broken (unparsable timestamp, missing field). Skip it,
    /// keep the cycle going.
    #[error("malformed data: {0}")]
    MalformedData(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
