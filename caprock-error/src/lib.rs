#![deny(missing_docs)]

//! Error handling for the caprock crates.
//!
//! All fallible operations in the caprock workspace return
//! [`CaprockResult`]. Errors are constructed with the [`caprock_err`] and
//! [`caprock_bail`] macros, which capture a backtrace at the point of
//! creation.

// Aliased so thiserror's derive does not detect a `Backtrace` field and
// generate the nightly-only `Error::provide` implementation.
use std::backtrace::Backtrace as StdBacktrace;
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// A cheaply cloneable, eagerly formatted error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Arc<str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        ErrString(msg.into().into())
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The set of errors that can arise when reading, writing or indexing
/// simulation-result files.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CaprockError {
    /// A record could not be decoded from the stream: bad framing, an
    /// unknown type tag, or payload bytes that do not parse.
    #[error("malformed record: {0}\nBacktrace:\n{1}")]
    MalformedRecord(ErrString, StdBacktrace),
    /// The stream ended in the middle of a record.
    #[error("unexpected end of stream: {0}\nBacktrace:\n{1}")]
    UnexpectedEof(ErrString, StdBacktrace),
    /// A record's header and its payload disagree on name, type or
    /// element count.
    #[error("schema mismatch: {0}\nBacktrace:\n{1}")]
    SchemaMismatch(ErrString, StdBacktrace),
    /// A record name or compound key is not present.
    #[error("unknown key: {0}\nBacktrace:\n{1}")]
    UnknownKey(ErrString, StdBacktrace),
    /// A positional or temporal index lies outside the valid range.
    #[error("index out of range: {0}\nBacktrace:\n{1}")]
    IndexOutOfRange(ErrString, StdBacktrace),
    /// An attempt to add a record under a name that is already taken.
    #[error("duplicate key: {0}\nBacktrace:\n{1}")]
    DuplicateKey(ErrString, StdBacktrace),
    /// The requested combination of options is not supported.
    #[error("invalid configuration: {0}\nBacktrace:\n{1}")]
    InvalidConfiguration(ErrString, StdBacktrace),
    /// A raw I/O failure that is none of the above (open, seek, flush).
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// The result type used throughout the caprock crates.
pub type CaprockResult<T> = Result<T, CaprockError>;

#[doc(hidden)]
pub mod __private {
    use crate::CaprockError;

    #[inline]
    #[must_use]
    pub fn must_use(error: CaprockError) -> CaprockError {
        error
    }
}

/// Construct a [`CaprockError`].
///
/// The first token may name a variant (`caprock_err!(UnknownKey: "...")`);
/// without one the error is a `MalformedRecord`.
#[macro_export]
macro_rules! caprock_err {
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        $crate::__private::must_use(
            $crate::CaprockError::$variant(
                format!($fmt, $($arg),*).into(),
                std::backtrace::Backtrace::capture(),
            )
        )
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::caprock_err!(MalformedRecord: $fmt, $($arg),*)
    };
}

/// Return early with a [`CaprockError`]; accepts the same arguments as
/// [`caprock_err`].
#[macro_export]
macro_rules! caprock_bail {
    ($($tt:tt)+) => {
        return Err($crate::caprock_err!($($tt)+))
    };
}

#[cfg(test)]
mod tests {
    use crate::{CaprockError, CaprockResult};

    fn unknown() -> CaprockResult<()> {
        caprock_bail!(UnknownKey: "no record named {}", "SEQNUM")
    }

    #[test]
    fn bail_selects_variant() {
        let err = unknown().unwrap_err();
        assert!(matches!(err, CaprockError::UnknownKey(..)));
        assert!(err.to_string().contains("SEQNUM"));
    }

    #[test]
    fn default_variant_is_malformed() {
        let err = caprock_err!("bad frame of {} bytes", 12);
        assert!(matches!(err, CaprockError::MalformedRecord(..)));
    }
}
