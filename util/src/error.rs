use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The source or destination region does not fit in the buffer.
    #[error("buffer too short")]
    ErrBufferTooShort,
    /// A bit-range accessor was called with a range that does not fit
    /// its containing field.
    #[error("invalid size or start index")]
    ErrInvalidSizeOrStartIndex,

    #[error("{0}")]
    Std(#[source] StdError),
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn from_std<T>(error: T) -> Self
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        Error::Std(StdError(Box::new(error)))
    }

    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        if let Error::Std(s) = self {
            return s.0.downcast_ref();
        }

        None
    }
}

/// An escape hatch to preserve the original error when a crate higher up the
/// stack has to surface its own error through `util::Error`. Use
/// [`Error::from_std`] to wrap and [`Error::downcast_ref`] to recover it.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StdError(pub Box<dyn std::error::Error + Send + Sync>);

impl PartialEq for StdError {
    fn eq(&self, _: &Self) -> bool {
        false
    }
}
