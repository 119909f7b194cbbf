use std::fmt::{Display, Formatter};

use caprock_error::{CaprockResult, caprock_bail};

use crate::{DataType, RecordStream};

/// Maximum length of a record name, in characters.
pub const NAME_LEN: usize = 8;

/// A record name: at most [`NAME_LEN`] printable characters, stored
/// trimmed of trailing blanks and truncated on construction. Written
/// blank-padded to eight bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordName(String);

impl RecordName {
    /// Build a name from arbitrary input, truncating to eight characters
    /// and dropping trailing blanks.
    pub fn new(name: &str) -> Self {
        let truncated: String = name.chars().take(NAME_LEN).collect();
        RecordName(truncated.trim_end().to_string())
    }

    /// The canonical (trimmed) form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The blank-padded eight-byte on-disk form.
    pub fn padded(&self) -> [u8; NAME_LEN] {
        let mut out = [b' '; NAME_LEN];
        let bytes = self.0.as_bytes();
        out[..bytes.len()].copy_from_slice(bytes);
        out
    }
}

impl From<&str> for RecordName {
    fn from(name: &str) -> Self {
        RecordName::new(name)
    }
}

impl PartialEq<str> for RecordName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.trim_end()
    }
}

impl Display for RecordName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The header of one record: everything except the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Record name.
    pub name: RecordName,
    /// Element type of the payload.
    pub data_type: DataType,
    /// Number of elements in the payload.
    pub count: usize,
}

impl Display for RecordHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} x {}", self.name, self.data_type, self.count)
    }
}

/// A typed record payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordData {
    /// `INTE` payload.
    Int(Vec<i32>),
    /// `REAL` payload.
    Float(Vec<f32>),
    /// `DOUB` payload.
    Double(Vec<f64>),
    /// `LOGI` payload.
    Bool(Vec<bool>),
    /// `CHAR` payload, each element at most eight characters.
    Str(Vec<String>),
    /// `BYTE` payload.
    Byte(Vec<u8>),
}

impl RecordData {
    /// The element type of this payload.
    pub fn data_type(&self) -> DataType {
        match self {
            RecordData::Int(_) => DataType::Int,
            RecordData::Float(_) => DataType::Float,
            RecordData::Double(_) => DataType::Double,
            RecordData::Bool(_) => DataType::Bool,
            RecordData::Str(_) => DataType::Str,
            RecordData::Byte(_) => DataType::Byte,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            RecordData::Int(v) => v.len(),
            RecordData::Float(v) => v.len(),
            RecordData::Double(v) => v.len(),
            RecordData::Bool(v) => v.len(),
            RecordData::Str(v) => v.len(),
            RecordData::Byte(v) => v.len(),
        }
    }

    /// True when the payload holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_index(&self, index: usize) -> CaprockResult<()> {
        if index >= self.len() {
            caprock_bail!(
                IndexOutOfRange: "element {} of a {}-element {} payload",
                index,
                self.len(),
                self.data_type()
            );
        }
        Ok(())
    }

    /// The integer element at `index`.
    pub fn int_at(&self, index: usize) -> CaprockResult<i32> {
        self.check_index(index)?;
        match self {
            RecordData::Int(v) => Ok(v[index]),
            _ => caprock_bail!(
                SchemaMismatch: "expected INTE data, record holds {}",
                self.data_type()
            ),
        }
    }

    /// The numeric element at `index`, coerced to `f64`. Valid for
    /// `INTE`, `REAL` and `DOUB` payloads.
    pub fn f64_at(&self, index: usize) -> CaprockResult<f64> {
        self.check_index(index)?;
        match self {
            RecordData::Int(v) => Ok(f64::from(v[index])),
            RecordData::Float(v) => Ok(f64::from(v[index])),
            RecordData::Double(v) => Ok(v[index]),
            _ => caprock_bail!(
                SchemaMismatch: "expected numeric data, record holds {}",
                self.data_type()
            ),
        }
    }

    /// The string element at `index`.
    pub fn str_at(&self, index: usize) -> CaprockResult<&str> {
        self.check_index(index)?;
        match self {
            RecordData::Str(v) => Ok(&v[index]),
            _ => caprock_bail!(
                SchemaMismatch: "expected CHAR data, record holds {}",
                self.data_type()
            ),
        }
    }

    /// The boolean element at `index`.
    pub fn bool_at(&self, index: usize) -> CaprockResult<bool> {
        self.check_index(index)?;
        match self {
            RecordData::Bool(v) => Ok(v[index]),
            _ => caprock_bail!(
                SchemaMismatch: "expected LOGI data, record holds {}",
                self.data_type()
            ),
        }
    }
}

/// One named, typed, sized unit of data, fully resident in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: RecordName,
    data: RecordData,
}

impl Record {
    /// Build a record from a name and a typed payload.
    pub fn new(name: impl Into<RecordName>, data: RecordData) -> Self {
        Record {
            name: name.into(),
            data,
        }
    }

    /// The record name.
    pub fn name(&self) -> &RecordName {
        &self.name
    }

    /// The typed payload.
    pub fn data(&self) -> &RecordData {
        &self.data
    }

    /// The element type.
    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the record holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The header this record would carry on disk.
    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            name: self.name.clone(),
            data_type: self.data_type(),
            count: self.len(),
        }
    }

    /// See [`RecordData::int_at`].
    pub fn int_at(&self, index: usize) -> CaprockResult<i32> {
        self.data.int_at(index)
    }

    /// See [`RecordData::f64_at`].
    pub fn f64_at(&self, index: usize) -> CaprockResult<f64> {
        self.data.f64_at(index)
    }

    /// See [`RecordData::str_at`].
    pub fn str_at(&self, index: usize) -> CaprockResult<&str> {
        self.data.str_at(index)
    }

    /// See [`RecordData::bool_at`].
    pub fn bool_at(&self, index: usize) -> CaprockResult<bool> {
        self.data.bool_at(index)
    }

    /// Read the next record from `stream`, header and payload. Returns
    /// `None` at a clean end of stream.
    pub fn read_from(stream: &mut dyn RecordStream) -> CaprockResult<Option<Record>> {
        let Some(header) = stream.read_header()? else {
            return Ok(None);
        };
        let data = stream.read_payload(header.data_type, header.count)?;
        Ok(Some(Record {
            name: header.name,
            data,
        }))
    }

    /// Append this record to `stream` at its current position.
    pub fn write_to(&self, stream: &mut dyn RecordStream) -> CaprockResult<()> {
        stream.write_record(self)
    }
}

#[cfg(test)]
mod tests {
    use caprock_error::CaprockError;

    use super::{Record, RecordData, RecordName};

    #[test]
    fn name_is_trimmed_and_truncated() {
        assert_eq!(RecordName::new("SEQHDR  ").as_str(), "SEQHDR");
        assert_eq!(RecordName::new("LONGKEYWORD").as_str(), "LONGKEYW");
        assert_eq!(RecordName::new("WOPR").padded(), *b"WOPR    ");
    }

    #[test]
    fn typed_getters_enforce_type_and_bounds() {
        let rec = Record::new("PARAMS", RecordData::Float(vec![1.0, 2.5]));
        assert_eq!(rec.f64_at(1).unwrap(), 2.5);
        assert!(matches!(
            rec.int_at(0).unwrap_err(),
            CaprockError::SchemaMismatch(..)
        ));
        assert!(matches!(
            rec.f64_at(2).unwrap_err(),
            CaprockError::IndexOutOfRange(..)
        ));
    }
}
