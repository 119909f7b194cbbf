use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use caprock_error::{CaprockResult, caprock_bail, caprock_err};

use crate::{DataType, NAME_LEN, Record, RecordData, RecordHeader, RecordName};

/// Formatted (text) vs. unformatted (binary) rendition of a file. The
/// two are interchangeable behind [`RecordStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Length-framed binary records.
    Unformatted,
    /// Whitespace-delimited text records.
    Formatted,
}

/// Positioned, blocking read/write access to one stream of records.
///
/// Every method takes `&mut self`: the implementation owns the stream
/// position, and a caller holding the exclusive borrow is the single
/// reader for the duration of the operation.
pub trait RecordStream {
    /// The current byte offset.
    fn offset(&mut self) -> CaprockResult<u64>;

    /// Reposition to an absolute byte offset.
    fn seek(&mut self, offset: u64) -> CaprockResult<()>;

    /// Read the next record header. `None` at a clean end of stream; a
    /// stream ending inside a header is an error.
    fn read_header(&mut self) -> CaprockResult<Option<RecordHeader>>;

    /// Read a payload of `count` elements of `data_type`, immediately
    /// following a header.
    fn read_payload(&mut self, data_type: DataType, count: usize) -> CaprockResult<RecordData>;

    /// Skip over a payload without decoding it.
    fn skip_payload(&mut self, data_type: DataType, count: usize) -> CaprockResult<()>;

    /// Write one record, header and payload, at the current position.
    fn write_record(&mut self, record: &Record) -> CaprockResult<()>;
}

/// Open an existing file for record reads.
pub fn open_stream(
    path: &Path,
    format: Format,
    endian_convert: bool,
) -> CaprockResult<Box<dyn RecordStream>> {
    let file = File::open(path)?;
    Ok(wrap(file, format, endian_convert))
}

/// Open an existing file for record reads and in-place writes
/// (lazy-record replacement).
pub fn edit_stream(
    path: &Path,
    format: Format,
    endian_convert: bool,
) -> CaprockResult<Box<dyn RecordStream>> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    Ok(wrap(file, format, endian_convert))
}

/// Create (or truncate) a file for record writes.
pub fn create_stream(
    path: &Path,
    format: Format,
    endian_convert: bool,
) -> CaprockResult<Box<dyn RecordStream>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    Ok(wrap(file, format, endian_convert))
}

fn wrap(file: File, format: Format, endian_convert: bool) -> Box<dyn RecordStream> {
    match format {
        Format::Unformatted => Box::new(BinaryStream::new(file, endian_convert)),
        Format::Formatted => Box::new(FormattedStream::new(file)),
    }
}

/// Length of the fixed part of a binary record header:
/// 8-byte name + 4-byte count + 4-byte type tag.
const HEADER_LEN: u32 = 16;

// The unformatted framing is defined relative to the writing host's
// byte order; `convert` marks a foreign-order file.
#[allow(clippy::host_endian_bytes)]
fn decode_u32(bytes: [u8; 4], convert: bool) -> u32 {
    let value = u32::from_ne_bytes(bytes);
    if convert { value.swap_bytes() } else { value }
}

#[allow(clippy::host_endian_bytes)]
fn encode_u32(value: u32, convert: bool) -> [u8; 4] {
    let value = if convert { value.swap_bytes() } else { value };
    value.to_ne_bytes()
}

#[allow(clippy::host_endian_bytes)]
fn decode_u64(bytes: [u8; 8], convert: bool) -> u64 {
    let value = u64::from_ne_bytes(bytes);
    if convert { value.swap_bytes() } else { value }
}

#[allow(clippy::host_endian_bytes)]
fn encode_u64(value: u64, convert: bool) -> [u8; 8] {
    let value = if convert { value.swap_bytes() } else { value };
    value.to_ne_bytes()
}

/// The unformatted codec: every record is a length-framed header
/// followed by a length-framed payload, each frame carrying its byte
/// length before and after the content. With `endian_convert` set, all
/// numeric content (frame lengths, counts, elements) is byte-swapped
/// relative to native order.
pub struct BinaryStream<S> {
    inner: S,
    endian_convert: bool,
}

impl<S: Read + Write + Seek> BinaryStream<S> {
    /// Wrap a raw byte stream.
    pub fn new(inner: S, endian_convert: bool) -> Self {
        BinaryStream {
            inner,
            endian_convert,
        }
    }

    /// Recover the underlying stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn read_exact(&mut self, buf: &mut [u8], what: &str) -> CaprockResult<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                caprock_err!(UnexpectedEof: "stream ended while reading {}", what)
            } else {
                e.into()
            }
        })
    }

    fn read_frame_len(&mut self, what: &str) -> CaprockResult<u32> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes, what)?;
        Ok(decode_u32(bytes, self.endian_convert))
    }

    fn check_trailing_len(&mut self, leading: u32, what: &str) -> CaprockResult<()> {
        let trailing = self.read_frame_len(what)?;
        if trailing != leading {
            caprock_bail!(
                "frame length mismatch in {}: leading {}, trailing {}",
                what,
                leading,
                trailing
            );
        }
        Ok(())
    }

    fn write_frame_len(&mut self, len: u32) -> CaprockResult<()> {
        self.inner.write_all(&encode_u32(len, self.endian_convert))?;
        Ok(())
    }
}

impl<S: Read + Write + Seek> RecordStream for BinaryStream<S> {
    fn offset(&mut self) -> CaprockResult<u64> {
        Ok(self.inner.stream_position()?)
    }

    fn seek(&mut self, offset: u64) -> CaprockResult<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn read_header(&mut self) -> CaprockResult<Option<RecordHeader>> {
        // Distinguish a clean EOF (nothing left) from a torn header.
        let mut len_bytes = [0u8; 4];
        let first = self.inner.read(&mut len_bytes)?;
        if first == 0 {
            return Ok(None);
        }
        if first < 4 {
            self.read_exact(&mut len_bytes[first..], "record header frame")?;
        }
        let frame_len = decode_u32(len_bytes, self.endian_convert);
        if frame_len != HEADER_LEN {
            caprock_bail!("record header frame of {} bytes, expected {}", frame_len, HEADER_LEN);
        }

        let mut header = [0u8; HEADER_LEN as usize];
        self.read_exact(&mut header, "record header")?;
        let name = RecordName::new(&String::from_utf8_lossy(&header[..NAME_LEN]));
        let mut count_bytes = [0u8; 4];
        count_bytes.copy_from_slice(&header[8..12]);
        let count = decode_u32(count_bytes, self.endian_convert) as usize;
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&header[12..16]);
        let data_type = DataType::from_tag(tag)?;

        self.check_trailing_len(HEADER_LEN, "record header frame")?;
        Ok(Some(RecordHeader {
            name,
            data_type,
            count,
        }))
    }

    fn read_payload(&mut self, data_type: DataType, count: usize) -> CaprockResult<RecordData> {
        let frame_len = self.read_frame_len("payload frame")?;
        let expected = count * data_type.element_size();
        if frame_len as usize != expected {
            caprock_bail!(
                SchemaMismatch: "payload frame holds {} bytes, header declares {} {} elements ({} bytes)",
                frame_len,
                count,
                data_type,
                expected
            );
        }

        let mut raw = vec![0u8; expected];
        self.read_exact(&mut raw, "record payload")?;
        self.check_trailing_len(frame_len, "payload frame")?;

        let convert = self.endian_convert;
        let words = |width: usize| raw.chunks_exact(width);
        let data = match data_type {
            DataType::Int => RecordData::Int(
                words(4)
                    .map(|c| decode_u32([c[0], c[1], c[2], c[3]], convert) as i32)
                    .collect(),
            ),
            DataType::Float => RecordData::Float(
                words(4)
                    .map(|c| f32::from_bits(decode_u32([c[0], c[1], c[2], c[3]], convert)))
                    .collect(),
            ),
            DataType::Double => RecordData::Double(
                words(8)
                    .map(|c| {
                        let mut bytes = [0u8; 8];
                        bytes.copy_from_slice(c);
                        f64::from_bits(decode_u64(bytes, convert))
                    })
                    .collect(),
            ),
            DataType::Bool => RecordData::Bool(
                words(4)
                    .map(|c| decode_u32([c[0], c[1], c[2], c[3]], convert) != 0)
                    .collect(),
            ),
            DataType::Str => RecordData::Str(
                words(8)
                    .map(|c| String::from_utf8_lossy(c).trim_end().to_string())
                    .collect(),
            ),
            DataType::Byte => RecordData::Byte(raw),
        };
        Ok(data)
    }

    fn skip_payload(&mut self, data_type: DataType, count: usize) -> CaprockResult<()> {
        let frame_len = self.read_frame_len("payload frame")?;
        let expected = count * data_type.element_size();
        if frame_len as usize != expected {
            caprock_bail!(
                SchemaMismatch: "payload frame holds {} bytes, header declares {} {} elements",
                frame_len,
                count,
                data_type
            );
        }
        self.inner.seek(SeekFrom::Current(i64::from(frame_len)))?;
        self.check_trailing_len(frame_len, "payload frame")?;
        Ok(())
    }

    fn write_record(&mut self, record: &Record) -> CaprockResult<()> {
        let convert = self.endian_convert;

        self.write_frame_len(HEADER_LEN)?;
        self.inner.write_all(&record.name().padded())?;
        let count = u32::try_from(record.len())
            .map_err(|_| caprock_err!("record {} too large to frame", record.name()))?;
        self.inner.write_all(&encode_u32(count, convert))?;
        self.inner.write_all(&record.data_type().tag())?;
        self.write_frame_len(HEADER_LEN)?;

        let payload_len = u32::try_from(record.len() * record.data_type().element_size())
            .map_err(|_| caprock_err!("record {} too large to frame", record.name()))?;
        self.write_frame_len(payload_len)?;
        match record.data() {
            RecordData::Int(v) => {
                for x in v {
                    self.inner.write_all(&encode_u32(*x as u32, convert))?;
                }
            }
            RecordData::Float(v) => {
                for x in v {
                    self.inner.write_all(&encode_u32(x.to_bits(), convert))?;
                }
            }
            RecordData::Double(v) => {
                for x in v {
                    self.inner.write_all(&encode_u64(x.to_bits(), convert))?;
                }
            }
            RecordData::Bool(v) => {
                for x in v {
                    self.inner.write_all(&encode_u32(u32::from(*x), convert))?;
                }
            }
            RecordData::Str(v) => {
                for x in v {
                    let mut padded = [b' '; 8];
                    let bytes = x.as_bytes();
                    let n = bytes.len().min(8);
                    padded[..n].copy_from_slice(&bytes[..n]);
                    self.inner.write_all(&padded)?;
                }
            }
            RecordData::Byte(v) => self.inner.write_all(v)?,
        }
        self.write_frame_len(payload_len)?;
        self.inner.flush()?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
}

/// The formatted codec: a header line carrying a quoted name, an element
/// count and a quoted type tag, followed by whitespace-delimited values.
///
/// Reads are unbuffered so that [`RecordStream::offset`] and
/// [`RecordStream::seek`] stay exact; throughput is not a concern for
/// the text rendition.
pub struct FormattedStream<S> {
    inner: S,
}

impl<S: Read + Write + Seek> FormattedStream<S> {
    /// Wrap a raw byte stream.
    pub fn new(inner: S) -> Self {
        FormattedStream { inner }
    }

    /// Recover the underlying stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn next_byte(&mut self) -> CaprockResult<Option<u8>> {
        let mut byte = [0u8; 1];
        let n = self.inner.read(&mut byte)?;
        if n == 0 { Ok(None) } else { Ok(Some(byte[0])) }
    }

    /// The next token, skipping whitespace. `None` at end of stream.
    fn next_token(&mut self) -> CaprockResult<Option<Token>> {
        let mut byte = loop {
            match self.next_byte()? {
                None => return Ok(None),
                Some(b) if b.is_ascii_whitespace() => {}
                Some(b) => break b,
            }
        };

        if byte == b'\'' {
            let mut content = Vec::new();
            loop {
                match self.next_byte()? {
                    None => caprock_bail!(UnexpectedEof: "stream ended inside a quoted token"),
                    Some(b'\'') => break,
                    Some(b) => content.push(b),
                }
            }
            return Ok(Some(Token::Quoted(
                String::from_utf8_lossy(&content).trim_end().to_string(),
            )));
        }

        let mut word = Vec::new();
        loop {
            word.push(byte);
            match self.next_byte()? {
                None => break,
                Some(b) if b.is_ascii_whitespace() => break,
                Some(b) => byte = b,
            }
        }
        Ok(Some(Token::Word(
            String::from_utf8_lossy(&word).to_string(),
        )))
    }

    fn require_token(&mut self, what: &str) -> CaprockResult<Token> {
        self.next_token()?
            .ok_or_else(|| caprock_err!(UnexpectedEof: "stream ended while reading {}", what))
    }

    fn parse_word<T: std::str::FromStr>(&mut self, what: &str) -> CaprockResult<T> {
        match self.require_token(what)? {
            Token::Word(w) => w
                .parse()
                .map_err(|_| caprock_err!("cannot parse '{}' as {}", w, what)),
            Token::Quoted(q) => caprock_bail!("expected {}, found quoted '{}'", what, q),
        }
    }

    fn parse_quoted(&mut self, what: &str) -> CaprockResult<String> {
        match self.require_token(what)? {
            Token::Quoted(q) => Ok(q),
            Token::Word(w) => caprock_bail!("expected quoted {}, found '{}'", what, w),
        }
    }
}

impl<S: Read + Write + Seek> RecordStream for FormattedStream<S> {
    fn offset(&mut self) -> CaprockResult<u64> {
        Ok(self.inner.stream_position()?)
    }

    fn seek(&mut self, offset: u64) -> CaprockResult<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn read_header(&mut self) -> CaprockResult<Option<RecordHeader>> {
        let name = match self.next_token()? {
            None => return Ok(None),
            Some(Token::Quoted(q)) => RecordName::new(&q),
            Some(Token::Word(w)) => caprock_bail!("expected quoted record name, found '{}'", w),
        };
        let count: usize = self.parse_word("element count")?;
        let tag = self.parse_quoted("type tag")?;
        let tag_bytes: [u8; 4] = tag
            .as_bytes()
            .try_into()
            .map_err(|_| caprock_err!("type tag '{}' is not four characters", tag))?;
        Ok(Some(RecordHeader {
            name,
            data_type: DataType::from_tag(tag_bytes)?,
            count,
        }))
    }

    fn read_payload(&mut self, data_type: DataType, count: usize) -> CaprockResult<RecordData> {
        let data = match data_type {
            DataType::Int => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    v.push(self.parse_word::<i32>("INTE element")?);
                }
                RecordData::Int(v)
            }
            DataType::Float => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    v.push(self.parse_word::<f32>("REAL element")?);
                }
                RecordData::Float(v)
            }
            DataType::Double => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    v.push(self.parse_word::<f64>("DOUB element")?);
                }
                RecordData::Double(v)
            }
            DataType::Bool => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    match self.require_token("LOGI element")? {
                        Token::Word(w) if w == "T" => v.push(true),
                        Token::Word(w) if w == "F" => v.push(false),
                        Token::Word(w) => caprock_bail!("expected T or F, found '{}'", w),
                        Token::Quoted(q) => {
                            caprock_bail!("expected T or F, found quoted '{}'", q)
                        }
                    }
                }
                RecordData::Bool(v)
            }
            DataType::Str => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    v.push(self.parse_quoted("CHAR element")?);
                }
                RecordData::Str(v)
            }
            DataType::Byte => {
                let mut v = Vec::with_capacity(count);
                for _ in 0..count {
                    v.push(self.parse_word::<u8>("BYTE element")?);
                }
                RecordData::Byte(v)
            }
        };
        Ok(data)
    }

    fn skip_payload(&mut self, data_type: DataType, count: usize) -> CaprockResult<()> {
        // Text payloads have no frame to hop over; decode and discard.
        self.read_payload(data_type, count).map(|_| ())
    }

    fn write_record(&mut self, record: &Record) -> CaprockResult<()> {
        let name = String::from_utf8_lossy(&record.name().padded()).to_string();
        let tag = String::from_utf8_lossy(&record.data_type().tag()).to_string();
        writeln!(self.inner, "'{}' {:11} '{}'", name, record.len(), tag)?;

        const PER_LINE: usize = 6;
        let mut column = 0;
        let mut put = |inner: &mut S, text: String| -> CaprockResult<()> {
            write!(inner, " {text}")?;
            column += 1;
            if column == PER_LINE {
                writeln!(inner)?;
                column = 0;
            }
            Ok(())
        };
        match record.data() {
            RecordData::Int(v) => {
                for x in v {
                    put(&mut self.inner, format!("{x}"))?;
                }
            }
            RecordData::Float(v) => {
                for x in v {
                    put(&mut self.inner, format!("{x:.8E}"))?;
                }
            }
            RecordData::Double(v) => {
                for x in v {
                    put(&mut self.inner, format!("{x:.16E}"))?;
                }
            }
            RecordData::Bool(v) => {
                for x in v {
                    put(&mut self.inner, if *x { "T".into() } else { "F".into() })?;
                }
            }
            RecordData::Str(v) => {
                for x in v {
                    put(&mut self.inner, format!("'{x:<8}'"))?;
                }
            }
            RecordData::Byte(v) => {
                for x in v {
                    put(&mut self.inner, format!("{x}"))?;
                }
            }
        }
        if column != 0 {
            writeln!(self.inner)?;
        }
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use caprock_error::CaprockError;
    use rstest::rstest;

    use super::{BinaryStream, FormattedStream, RecordStream};
    use crate::{Record, RecordData};

    fn sample_records() -> Vec<Record> {
        vec![
            Record::new("SEQNUM", RecordData::Int(vec![7])),
            Record::new("PARAMS", RecordData::Float(vec![0.0, 1.5, -3.25])),
            Record::new("DOUBLES", RecordData::Double(vec![1.0e10, -2.5])),
            Record::new("FLAGS", RecordData::Bool(vec![true, false, true])),
            Record::new("WGNAMES", RecordData::Str(vec!["OP_1".into(), "GI-1".into()])),
            Record::new("RAW", RecordData::Byte(vec![0, 255, 7])),
        ]
    }

    fn round_trip(stream: &mut dyn RecordStream) {
        for rec in sample_records() {
            rec.write_to(stream).unwrap();
        }
        stream.seek(0).unwrap();
        for expected in sample_records() {
            let rec = Record::read_from(stream).unwrap().unwrap();
            assert_eq!(rec, expected);
        }
        assert!(Record::read_from(stream).unwrap().is_none());
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn binary_round_trip(#[case] endian_convert: bool) {
        let mut stream = BinaryStream::new(Cursor::new(Vec::new()), endian_convert);
        round_trip(&mut stream);
    }

    #[test]
    fn formatted_round_trip() {
        let mut stream = FormattedStream::new(Cursor::new(Vec::new()));
        round_trip(&mut stream);
    }

    #[test]
    fn endian_convert_swaps_bytes() {
        let mut stream = BinaryStream::new(Cursor::new(Vec::new()), true);
        Record::new("SEQNUM", RecordData::Int(vec![1]))
            .write_to(&mut stream)
            .unwrap();
        let bytes = stream.into_inner().into_inner();
        // Trailing payload frame: [len=4][value=1][len=4], all swapped
        // relative to native order.
        let payload = &bytes[bytes.len() - 12..];
        assert_eq!(payload[..4], 4u32.swap_bytes().to_ne_bytes());
        assert_eq!(payload[4..8], 1u32.swap_bytes().to_ne_bytes());
    }

    #[test]
    fn truncated_payload_is_unexpected_eof() {
        let mut stream = BinaryStream::new(Cursor::new(Vec::new()), false);
        Record::new("KW", RecordData::Int(vec![1, 2, 3, 4]))
            .write_to(&mut stream)
            .unwrap();
        let mut bytes = stream.into_inner().into_inner();
        bytes.truncate(bytes.len() - 10);

        let mut stream = BinaryStream::new(Cursor::new(bytes), false);
        let header = stream.read_header().unwrap().unwrap();
        let err = stream
            .read_payload(header.data_type, header.count)
            .unwrap_err();
        assert!(matches!(err, CaprockError::UnexpectedEof(..)));
    }

    #[test]
    fn short_payload_frame_is_schema_mismatch() {
        // Header declares 10 elements; the frame only holds 8.
        let mut stream = BinaryStream::new(Cursor::new(Vec::new()), false);
        Record::new("KW", RecordData::Int((0..8).collect()))
            .write_to(&mut stream)
            .unwrap();
        let mut bytes = stream.into_inner().into_inner();
        // Patch the header's count field (offset 4 + 8 = 12).
        bytes[12..16].copy_from_slice(&10u32.to_ne_bytes());

        let mut stream = BinaryStream::new(Cursor::new(bytes), false);
        let header = stream.read_header().unwrap().unwrap();
        assert_eq!(header.count, 10);
        let err = stream
            .read_payload(header.data_type, header.count)
            .unwrap_err();
        assert!(matches!(err, CaprockError::SchemaMismatch(..)));
    }

    #[test]
    fn skip_payload_lands_on_next_header() {
        let mut stream = BinaryStream::new(Cursor::new(Vec::new()), false);
        for rec in sample_records() {
            rec.write_to(&mut stream).unwrap();
        }
        stream.seek(0).unwrap();
        let first = stream.read_header().unwrap().unwrap();
        stream.skip_payload(first.data_type, first.count).unwrap();
        let second = stream.read_header().unwrap().unwrap();
        assert_eq!(second.name.as_str(), "PARAMS");
    }

    #[test]
    fn torn_header_is_unexpected_eof() {
        let mut stream = BinaryStream::new(Cursor::new(Vec::new()), false);
        Record::new("KW", RecordData::Int(vec![1]))
            .write_to(&mut stream)
            .unwrap();
        let mut bytes = stream.into_inner().into_inner();
        bytes.truncate(9);

        let mut stream = BinaryStream::new(Cursor::new(bytes), false);
        let err = stream.read_header().unwrap_err();
        assert!(matches!(err, CaprockError::UnexpectedEof(..)));
    }
}
