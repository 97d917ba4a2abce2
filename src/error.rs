use quick_xml::Error as XMLError;
use std::{str::Utf8Error, string::FromUtf8Error};

/// Wrapper around `std::Result`
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug)]
pub enum Error {
    /// [`std::io`] related error.
    Io(std::io::Error),
    /// Decoding related error.
    /// Maybe the XML declaration has an encoding value that it doesn't recognize,
    /// or it doesn't match its actual encoding,
    CannotDecode,
    /// Assorted errors while parsing XML.
    MalformedXML(String),
    /// The container element cannot have a parent.
    ContainerCannotMove,
    /// You need to call `element.detach()` before assigning another parent.
    HasAParent,
    /// The element to insert is the new parent itself or one of its ancestors.
    CyclicInsert,
    /// A collection already holds a member under this key.
    AlreadyExists(String),
    /// A required child element, attribute, or collection key is absent.
    NotFound(String),
    /// Write attempted through a read-only binding.
    ReadOnly(String),
    /// A value could not be converted to or from its attribute text.
    TypeMismatch(String),
    /// The document is well-formed XML but not an L5X export.
    InvalidFile(String),
    /// A number outside of its allowed range, such as a rung the routine doesn't have.
    OutOfRange(String),
    /// A mirrored write stopped after `written` of its writes took effect.
    /// Earlier writes are not rolled back.
    PartialWrite { written: usize, source: Box<Error> },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO Error: {}", err),
            Error::CannotDecode => write!(f, "Cannot decode XML"),
            Error::MalformedXML(err) => write!(f, "Malformed XML: {}", err),
            Error::ContainerCannotMove => write!(f, "Container element cannot move"),
            Error::HasAParent => write!(
                f,
                "Element already has a parent. Call detach() before changing parent."
            ),
            Error::CyclicInsert => write!(f, "Element cannot become its own descendant"),
            Error::AlreadyExists(key) => write!(f, "{} already exists", key),
            Error::NotFound(what) => write!(f, "{} not found", what),
            Error::ReadOnly(what) => write!(f, "{} is read-only", what),
            Error::TypeMismatch(msg) => write!(f, "Type mismatch: {}", msg),
            Error::InvalidFile(msg) => write!(f, "Invalid L5X file: {}", msg),
            Error::OutOfRange(msg) => write!(f, "Out of range: {}", msg),
            Error::PartialWrite { written, source } => write!(
                f,
                "Write partially applied ({} location(s) written): {}",
                written, source
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::PartialWrite { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<XMLError> for Error {
    fn from(err: XMLError) -> Error {
        match err {
            XMLError::EndEventMismatch { expected, found } => Error::MalformedXML(format!(
                "Closing tag mismatch. Expected {}, found {}",
                expected, found,
            )),
            XMLError::Io(err) => Error::Io(err),
            XMLError::Utf8(_) => Error::CannotDecode,
            err => Error::MalformedXML(err.to_string()),
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(_: FromUtf8Error) -> Error {
        Error::CannotDecode
    }
}

impl From<Utf8Error> for Error {
    fn from(_: Utf8Error) -> Error {
        Error::CannotDecode
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_partial_write_source() {
        let err = Error::PartialWrite {
            written: 1,
            source: Box::new(Error::NotFound("Modules".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "Write partially applied (1 location(s) written): Modules not found"
        );
        assert!(matches!(
            err.source().and_then(|e| e.downcast_ref::<Error>()),
            Some(Error::NotFound(_))
        ));
    }
}
