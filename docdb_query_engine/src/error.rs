// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{borrow::Cow, fmt::Display};

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Indicates that SQL text violated the query grammar.
    ///
    /// The error message carries the offending token and its position in the input.
    ParseSql,

    /// Indicates that a JSON DSL document could not be parsed.
    ///
    /// The error message carries the position reported by the JSON parser, and the underlying
    /// parser error is available in [`Error::source`](std::error::Error::source).
    ParseJson,

    /// Indicates a semantic validation failure inside an otherwise well-formed query,
    /// such as an unknown aggregation function or an ON clause naming the wrong namespaces.
    Params,

    /// Indicates invalid binary query data: a truncated buffer, a malformed varint,
    /// an out-of-range enum code, or an unknown clause tag.
    ///
    /// The wire format carries no payload lengths, so none of these are recoverable;
    /// the remainder of the buffer cannot be located after a bad clause.
    Wire,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ErrorKind::ParseSql => write!(f, "SQL parse error"),
            ErrorKind::ParseJson => write!(f, "JSON parse error"),
            ErrorKind::Params => write!(f, "invalid query parameters"),
            ErrorKind::Wire => write!(f, "invalid binary query data"),
        }
    }
}

impl ErrorKind {
    pub fn with_source(self, source: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::from(self).with_source(source)
    }

    pub fn with_message(self, message: impl Into<Cow<'static, str>>) -> Error {
        Error::from(self).with_message(message)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
    message: Option<Cow<'static, str>>,
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            source: None,
            message: None,
        }
    }
}

impl Error {
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn into_source(self) -> Option<Box<dyn std::error::Error + Send + Sync>> {
        self.source
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{message}"),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let source = self.source.as_ref()?;
        Some(&**source)
    }
}
