use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Packet contains an invalid header.
    #[error("Invalid header")]
    InvalidHeader,
    /// Packet received is too short.
    #[error("Packet too short to be read")]
    PacketTooShort,
    /// Buffer is too short.
    #[error("Buffer too short to be written")]
    BufferTooShort,
    /// Invalid packet version.
    #[error("Invalid packet version")]
    BadVersion,
    /// Wrong packet type.
    #[error("Wrong packet type")]
    WrongType,
    /// Wrong feedback message type.
    #[error("Wrong feedback message type")]
    WrongFeedbackType,
    /// Delta exceeds limit.
    #[error("Delta exceed limit")]
    DeltaExceedLimit,
    /// Packet status chunk is not 2 bytes.
    #[error("Packet status chunk must be 2 bytes")]
    PacketStatusChunkLength,
    /// Sequence number is not ahead of the ones already reported.
    #[error("Sequence number out of order")]
    SeqNumOutOfOrder,
    /// Feedback packet reached its packet status count capacity.
    #[error("Too many packet statuses")]
    TooManyPacketStatuses,
    /// Feedback packet reached its RTCP length field capacity.
    #[error("Feedback packet size limit reached")]
    FeedbackPacketTooLarge,

    #[error("{0}")]
    Util(#[from] util::Error),

    #[error("{0}")]
    Other(String),
}

impl From<Error> for util::Error {
    fn from(e: Error) -> Self {
        util::Error::from_std(e)
    }
}

impl PartialEq<util::Error> for Error {
    fn eq(&self, other: &util::Error) -> bool {
        if let Some(down) = other.downcast_ref::<Error>() {
            return self == down;
        }
        false
    }
}
