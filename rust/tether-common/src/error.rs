use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Index, slice or partition bounds were violated.
    pub fn range(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Range {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    /// The operation is not permitted for the handle's ownership tag or element type.
    pub fn type_error(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Type {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn allocation(bytes: usize) -> Error {
        Error(ErrorKind::AllocationFailure { bytes }.into())
    }

    pub fn stale_handle(index: u32, generation: u32) -> Error {
        Error(ErrorKind::StaleHandle { index, generation }.into())
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn invalid_encoding(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidEncoding {
                message: message.into(),
            }
            .into(),
        )
    }

    /// Returns `true` for the `RangeError` kind.
    pub fn is_range(&self) -> bool {
        matches!(self.kind(), ErrorKind::Range { .. })
    }

    /// Returns `true` for the `TypeError` kind.
    pub fn is_type(&self) -> bool {
        matches!(self.kind(), ErrorKind::Type { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("range error for {name}: {message}")]
    Range { name: String, message: String },

    #[error("type error for {name}: {message}")]
    Type { name: String, message: String },

    #[error("failed to allocate {bytes} bytes")]
    AllocationFailure { bytes: usize },

    #[error("handle {index}:{generation} is no longer live")]
    StaleHandle { index: u32, generation: u32 },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("invalid text encoding: {message}")]
    InvalidEncoding { message: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}
