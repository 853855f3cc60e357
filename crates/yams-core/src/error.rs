//! Error taxonomy for the query/link engine.
//!
//! Every fallible engine operation returns [`Result`]. None of them retry:
//! the caller decides whether an error is worth another attempt.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed caller input, rejected before any store round trip.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A store round trip failed (network, non-success status, bad state).
    #[error("query failed ({context}): {message}")]
    Query { context: String, message: String },

    /// An insert collided with an existing document id.
    #[error("existing document found, count: {count} ID: {id} URL: {uri}")]
    DuplicateDocument { id: String, uri: String, count: u64 },

    /// The codec could not turn a store response into the expected entity.
    #[error("could not decode {kind}: {message}")]
    Decode { kind: &'static str, message: String },

    /// Some closure levels of a branch were deleted before a later level failed.
    #[error("branch {root} partially deleted ({deleted} of {closure} documents): {source}")]
    PartialBranchDelete {
        root: String,
        deleted: usize,
        closure: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn query(context: impl Into<String>, message: impl ToString) -> Self {
        Error::Query {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub fn decode(kind: &'static str, message: impl ToString) -> Self {
        Error::Decode {
            kind,
            message: message.to_string(),
        }
    }
}
