use std::borrow::Cow;

/// All possible error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The operation kind does not identify any affordance category.
    UnknownOperationKind,
    /// The affordance filter mode is not supported.
    IllegalFilterMode,
    /// The output scope is not supported.
    InvalidOutputScope,
    /// An operation requires an input value which has not been provided.
    MissingInput,
    /// The input value could not be decoded as structured data.
    InvalidInput,
    /// No Thing Description has been provided.
    MissingThingDescription,
    /// The Thing Description is not a valid document.
    InvalidThingDescription,
    /// The Thing Description does not carry any identity.
    MissingThingIdentity,
    /// A device session could not be established.
    Session,
    /// A device runtime call failed.
    Runtime,
    /// An operation on an affordance failed.
    Dispatch,
    /// A message or a diagnostic could not be delivered to the host.
    Output,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::UnknownOperationKind => "Unknown Operation Kind",
            Self::IllegalFilterMode => "Illegal Filter Mode",
            Self::InvalidOutputScope => "Invalid Output Scope",
            Self::MissingInput => "Missing Input",
            Self::InvalidInput => "Invalid Input",
            Self::MissingThingDescription => "Missing Thing Description",
            Self::InvalidThingDescription => "Invalid Thing Description",
            Self::MissingThingIdentity => "Missing Thing Identity",
            Self::Session => "Session",
            Self::Runtime => "Runtime",
            Self::Dispatch => "Dispatch",
            Self::Output => "Output",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// A consumer error.
#[derive(Clone, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    info: Cow<'static, str>,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error())
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description of the
    /// encountered problem.
    #[inline]
    pub fn new(kind: ErrorKind, info: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            info: info.into(),
        }
    }

    /// Creates a [`ErrorKind::Runtime`] error.
    ///
    /// Device runtimes use this constructor to report transport failures.
    #[inline]
    pub fn runtime(info: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Runtime, info)
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error description.
    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }

    fn error(&self) -> String {
        format!("{}: {}", self.kind, self.info)
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn error_display() {
        let error = Error::new(ErrorKind::MissingInput, "`brightness` requires an input value");

        assert_eq!(error.kind(), ErrorKind::MissingInput);
        assert_eq!(error.info(), "`brightness` requires an input value");
        assert_eq!(
            error.to_string(),
            "Missing Input: `brightness` requires an input value"
        );
        assert_eq!(format!("{error:?}"), error.to_string());
    }
}
