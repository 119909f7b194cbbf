use std::fmt::{Display, Formatter};

use caprock_error::{CaprockResult, caprock_bail};

/// The element type of a record payload.
///
/// The enumeration is closed: result files only ever carry these six
/// types, identified on disk by a four-character tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit signed integer (`INTE`).
    Int,
    /// 32-bit float (`REAL`).
    Float,
    /// 64-bit float (`DOUB`).
    Double,
    /// Boolean, stored as a 32-bit word (`LOGI`).
    Bool,
    /// Fixed-width, blank-padded 8-character string (`CHAR`).
    Str,
    /// Raw byte (`BYTE`).
    Byte,
}

impl DataType {
    /// The four-character on-disk type tag.
    pub const fn tag(&self) -> [u8; 4] {
        match self {
            DataType::Int => *b"INTE",
            DataType::Float => *b"REAL",
            DataType::Double => *b"DOUB",
            DataType::Bool => *b"LOGI",
            DataType::Str => *b"CHAR",
            DataType::Byte => *b"BYTE",
        }
    }

    /// Decode a four-character tag read from a record header.
    pub fn from_tag(tag: [u8; 4]) -> CaprockResult<Self> {
        match &tag {
            b"INTE" => Ok(DataType::Int),
            b"REAL" => Ok(DataType::Float),
            b"DOUB" => Ok(DataType::Double),
            b"LOGI" => Ok(DataType::Bool),
            b"CHAR" => Ok(DataType::Str),
            b"BYTE" => Ok(DataType::Byte),
            _ => caprock_bail!(
                "unknown record type tag '{}'",
                String::from_utf8_lossy(&tag)
            ),
        }
    }

    /// The width of one element in an unformatted payload, in bytes.
    pub const fn element_size(&self) -> usize {
        match self {
            DataType::Int | DataType::Float | DataType::Bool => 4,
            DataType::Double | DataType::Str => 8,
            DataType::Byte => 1,
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let tag = self.tag();
        write!(f, "{}", String::from_utf8_lossy(&tag))
    }
}

#[cfg(test)]
mod tests {
    use caprock_error::CaprockError;
    use rstest::rstest;

    use super::DataType;

    #[rstest]
    #[case(DataType::Int)]
    #[case(DataType::Float)]
    #[case(DataType::Double)]
    #[case(DataType::Bool)]
    #[case(DataType::Str)]
    #[case(DataType::Byte)]
    fn tag_round_trip(#[case] dtype: DataType) {
        assert_eq!(DataType::from_tag(dtype.tag()).unwrap(), dtype);
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let err = DataType::from_tag(*b"XXXX").unwrap_err();
        assert!(matches!(err, CaprockError::MalformedRecord(..)));
    }
}
