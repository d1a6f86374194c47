//! BAM optional tags (auxiliary data).
//!
//! # Format
//!
//! Each tag is encoded as:
//! - 2 bytes: tag name (e.g., "NM")
//! - 1 byte: value type (`A c C s S i I f Z H B`)
//! - N bytes: value (format depends on type)
//!
//! `B` arrays carry a subtype byte (`c C s S i I f`) and an `i32` element
//! count before the elements. `Z` and `H` values are NUL-terminated.

use crate::error::{Error, Result};

/// Typed array payload of a `B` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float(Vec<f32>),
}

impl ArrayValue {
    fn subtype(&self) -> u8 {
        match self {
            ArrayValue::Int8(_) => b'c',
            ArrayValue::UInt8(_) => b'C',
            ArrayValue::Int16(_) => b's',
            ArrayValue::UInt16(_) => b'S',
            ArrayValue::Int32(_) => b'i',
            ArrayValue::UInt32(_) => b'I',
            ArrayValue::Float(_) => b'f',
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Int8(v) => v.len(),
            ArrayValue::UInt8(v) => v.len(),
            ArrayValue::Int16(v) => v.len(),
            ArrayValue::UInt16(v) => v.len(),
            ArrayValue::Int32(v) => v.len(),
            ArrayValue::UInt32(v) => v.len(),
            ArrayValue::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Typed tag value.
///
/// `String` and `Hex` keep the raw bytes without the NUL terminator.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Char(u8),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float(f32),
    String(Vec<u8>),
    Hex(Vec<u8>),
    Array(ArrayValue),
}

impl TagValue {
    /// The BAM type code of this value.
    pub fn type_code(&self) -> u8 {
        match self {
            TagValue::Char(_) => b'A',
            TagValue::Int8(_) => b'c',
            TagValue::UInt8(_) => b'C',
            TagValue::Int16(_) => b's',
            TagValue::UInt16(_) => b'S',
            TagValue::Int32(_) => b'i',
            TagValue::UInt32(_) => b'I',
            TagValue::Float(_) => b'f',
            TagValue::String(_) => b'Z',
            TagValue::Hex(_) => b'H',
            TagValue::Array(_) => b'B',
        }
    }

    /// Integer value, for any of the six integer encodings.
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            TagValue::Int8(v) => Some(v as i64),
            TagValue::UInt8(v) => Some(v as i64),
            TagValue::Int16(v) => Some(v as i64),
            TagValue::UInt16(v) => Some(v as i64),
            TagValue::Int32(v) => Some(v as i64),
            TagValue::UInt32(v) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match *self {
            TagValue::Float(v) => Some(v),
            _ => None,
        }
    }

    /// String value of a `Z` tag, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::String(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

/// A single named tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: [u8; 2],
    pub value: TagValue,
}

impl Tag {
    pub fn new(name: [u8; 2], value: TagValue) -> Self {
        Self { name, value }
    }
}

/// Tags of one record, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tags {
    tags: Vec<Tag>,
}

impl Tags {
    /// Create empty tags.
    pub fn new() -> Self {
        Self { tags: Vec::new() }
    }

    /// Look up a tag value by name.
    pub fn get(&self, name: &[u8; 2]) -> Option<&TagValue> {
        self.tags.iter().find(|t| &t.name == name).map(|t| &t.value)
    }

    /// Look up an integer tag.
    ///
    /// Returns `Ok(None)` when the tag is absent and an `InvalidRecord`
    /// error when it is present with a non-integer type.
    ///
    /// # Example
    ///
    /// ```
    /// use bamtally::io::bam::{TagValue, Tags};
    ///
    /// let mut tags = Tags::new();
    /// tags.insert(*b"NM", TagValue::UInt8(0));
    /// assert_eq!(tags.integer(b"NM").unwrap(), Some(0));
    /// assert_eq!(tags.integer(b"AS").unwrap(), None);
    /// ```
    pub fn integer(&self, name: &[u8; 2]) -> Result<Option<i64>> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value.as_int().map(Some).ok_or_else(|| {
                Error::InvalidRecord(format!(
                    "tag {} has type '{}', expected an integer",
                    tag_name(name),
                    value.type_code() as char
                ))
            }),
        }
    }

    /// Set a tag, replacing an existing value of the same name in place.
    pub fn insert(&mut self, name: [u8; 2], value: TagValue) {
        match self.tags.iter_mut().find(|t| t.name == name) {
            Some(tag) => tag.value = value,
            None => self.tags.push(Tag::new(name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

fn tag_name(name: &[u8; 2]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn take<'a>(data: &'a [u8], cursor: &mut usize, n: usize, what: &str) -> Result<&'a [u8]> {
    let end = cursor.checked_add(n).filter(|&end| end <= data.len());
    match end {
        Some(end) => {
            let bytes = &data[*cursor..end];
            *cursor = end;
            Ok(bytes)
        }
        None => Err(Error::InvalidRecord(format!(
            "truncated {} at tag offset {}: need {} bytes, {} remain",
            what,
            *cursor,
            n,
            data.len() - *cursor
        ))),
    }
}

fn take_array<const N: usize>(data: &[u8], cursor: &mut usize, what: &str) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(take(data, cursor, N, what)?);
    Ok(out)
}

fn take_nul_terminated(data: &[u8], cursor: &mut usize, name: &[u8; 2]) -> Result<Vec<u8>> {
    let rest = &data[*cursor..];
    match rest.iter().position(|&b| b == 0) {
        Some(len) => {
            *cursor += len + 1;
            Ok(rest[..len].to_vec())
        }
        None => Err(Error::InvalidRecord(format!(
            "tag {} string is not NUL-terminated",
            tag_name(name)
        ))),
    }
}

fn decode_elements<T, const N: usize>(
    data: &[u8],
    cursor: &mut usize,
    count: usize,
    convert: fn([u8; N]) -> T,
) -> Result<Vec<T>> {
    let len = count
        .checked_mul(N)
        .ok_or_else(|| Error::InvalidRecord(format!("array of {} elements too large", count)))?;
    let bytes = take(data, cursor, len, "array")?;
    Ok(bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut raw = [0u8; N];
            raw.copy_from_slice(chunk);
            convert(raw)
        })
        .collect())
}

fn decode_array(data: &[u8], cursor: &mut usize, name: &[u8; 2]) -> Result<ArrayValue> {
    let [subtype] = take_array::<1>(data, cursor, "array subtype")?;
    let count = i32::from_le_bytes(take_array(data, cursor, "array length")?);
    if count < 0 {
        return Err(Error::InvalidRecord(format!(
            "tag {} has negative array length {}",
            tag_name(name),
            count
        )));
    }
    let count = count as usize;

    let array = match subtype {
        b'c' => ArrayValue::Int8(decode_elements(data, cursor, count, i8::from_le_bytes)?),
        b'C' => ArrayValue::UInt8(decode_elements(data, cursor, count, u8::from_le_bytes)?),
        b's' => ArrayValue::Int16(decode_elements(data, cursor, count, i16::from_le_bytes)?),
        b'S' => ArrayValue::UInt16(decode_elements(data, cursor, count, u16::from_le_bytes)?),
        b'i' => ArrayValue::Int32(decode_elements(data, cursor, count, i32::from_le_bytes)?),
        b'I' => ArrayValue::UInt32(decode_elements(data, cursor, count, u32::from_le_bytes)?),
        b'f' => ArrayValue::Float(decode_elements(data, cursor, count, f32::from_le_bytes)?),
        other => {
            return Err(Error::InvalidRecord(format!(
                "tag {} has unknown array subtype '{}'",
                tag_name(name),
                other as char
            )))
        }
    };
    Ok(array)
}

fn decode_value(data: &[u8], cursor: &mut usize, name: &[u8; 2], code: u8) -> Result<TagValue> {
    let value = match code {
        b'A' => TagValue::Char(take_array::<1>(data, cursor, "char")?[0]),
        b'c' => TagValue::Int8(i8::from_le_bytes(take_array(data, cursor, "int8")?)),
        b'C' => TagValue::UInt8(take_array::<1>(data, cursor, "uint8")?[0]),
        b's' => TagValue::Int16(i16::from_le_bytes(take_array(data, cursor, "int16")?)),
        b'S' => TagValue::UInt16(u16::from_le_bytes(take_array(data, cursor, "uint16")?)),
        b'i' => TagValue::Int32(i32::from_le_bytes(take_array(data, cursor, "int32")?)),
        b'I' => TagValue::UInt32(u32::from_le_bytes(take_array(data, cursor, "uint32")?)),
        b'f' => TagValue::Float(f32::from_le_bytes(take_array(data, cursor, "float")?)),
        b'Z' => TagValue::String(take_nul_terminated(data, cursor, name)?),
        b'H' => TagValue::Hex(take_nul_terminated(data, cursor, name)?),
        b'B' => TagValue::Array(decode_array(data, cursor, name)?),
        other => {
            return Err(Error::InvalidRecord(format!(
                "tag {} has unknown type '{}'",
                tag_name(name),
                other as char
            )))
        }
    };
    Ok(value)
}

/// Decode the tag section at the end of a record.
///
/// The whole of `data` must be consumed by well-formed tags.
pub fn decode_tags(data: &[u8]) -> Result<Tags> {
    let mut tags = Tags::new();
    let mut cursor = 0;

    while cursor < data.len() {
        let name = take_array::<2>(data, &mut cursor, "tag name")?;
        let [code] = take_array::<1>(data, &mut cursor, "tag type")?;
        let value = decode_value(data, &mut cursor, &name, code)?;

        if tags.get(&name).is_some() {
            return Err(Error::InvalidRecord(format!(
                "duplicate tag {}",
                tag_name(&name)
            )));
        }
        tags.tags.push(Tag::new(name, value));
    }

    Ok(tags)
}

/// Append the binary encoding of `tags` to `out`.
pub fn encode_tags(tags: &Tags, out: &mut Vec<u8>) {
    for tag in tags.iter() {
        out.extend_from_slice(&tag.name);
        out.push(tag.value.type_code());
        match &tag.value {
            TagValue::Char(v) | TagValue::UInt8(v) => out.push(*v),
            TagValue::Int8(v) => out.extend_from_slice(&v.to_le_bytes()),
            TagValue::Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
            TagValue::UInt16(v) => out.extend_from_slice(&v.to_le_bytes()),
            TagValue::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
            TagValue::UInt32(v) => out.extend_from_slice(&v.to_le_bytes()),
            TagValue::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
            TagValue::String(bytes) | TagValue::Hex(bytes) => {
                out.extend_from_slice(bytes);
                out.push(0);
            }
            TagValue::Array(array) => {
                out.push(array.subtype());
                out.extend_from_slice(&(array.len() as i32).to_le_bytes());
                match array {
                    ArrayValue::Int8(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
                    ArrayValue::UInt8(v) => out.extend_from_slice(v),
                    ArrayValue::Int16(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
                    ArrayValue::UInt16(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
                    ArrayValue::Int32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
                    ArrayValue::UInt32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
                    ArrayValue::Float(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tags() {
        let tags = decode_tags(&[]).unwrap();
        assert!(tags.is_empty());
        assert_eq!(tags.get(b"NM"), None);
    }

    #[test]
    fn test_decode_nm_int() {
        let data = vec![b'N', b'M', b'i', 0x01, 0x00, 0x00, 0x00]; // NM:i:1
        let tags = decode_tags(&data).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get(b"NM"), Some(&TagValue::Int32(1)));
        assert_eq!(tags.integer(b"NM").unwrap(), Some(1));
    }

    #[test]
    fn test_decode_mixed_types() {
        let mut data = Vec::new();
        data.extend_from_slice(b"NMC\x05");
        data.extend_from_slice(b"RGZgroup1\0");
        data.extend_from_slice(b"XAAx");
        data.extend_from_slice(b"XFf");
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(b"XHH1AE3\0");
        data.extend_from_slice(b"XSs");
        data.extend_from_slice(&(-300i16).to_le_bytes());

        let tags = decode_tags(&data).unwrap();
        assert_eq!(tags.len(), 6);
        assert_eq!(tags.integer(b"NM").unwrap(), Some(5));
        assert_eq!(tags.get(b"RG").and_then(|v| v.as_str()), Some("group1"));
        assert_eq!(tags.get(b"XA"), Some(&TagValue::Char(b'x')));
        assert_eq!(tags.get(b"XF").and_then(|v| v.as_float()), Some(1.5));
        assert_eq!(tags.get(b"XH"), Some(&TagValue::Hex(b"1AE3".to_vec())));
        assert_eq!(tags.integer(b"XS").unwrap(), Some(-300));
    }

    #[test]
    fn test_decode_arrays() {
        let mut data = Vec::new();
        data.extend_from_slice(b"CGBI");
        data.extend_from_slice(&2i32.to_le_bytes());
        data.extend_from_slice(&0x640u32.to_le_bytes());
        data.extend_from_slice(&0x54u32.to_le_bytes());
        data.extend_from_slice(b"XBBc");
        data.extend_from_slice(&3i32.to_le_bytes());
        data.extend_from_slice(&[0xFF, 0x00, 0x01]);

        let tags = decode_tags(&data).unwrap();
        assert_eq!(
            tags.get(b"CG"),
            Some(&TagValue::Array(ArrayValue::UInt32(vec![0x640, 0x54])))
        );
        assert_eq!(
            tags.get(b"XB"),
            Some(&TagValue::Array(ArrayValue::Int8(vec![-1, 0, 1])))
        );
    }

    #[test]
    fn test_absent_versus_zero() {
        let tags = decode_tags(b"NMC\x00").unwrap();
        assert_eq!(tags.integer(b"NM").unwrap(), Some(0));
        assert_eq!(tags.integer(b"MD").unwrap(), None);
    }

    #[test]
    fn test_non_integer_lookup_is_error() {
        let tags = decode_tags(b"NMZfive\0").unwrap();
        assert!(matches!(tags.integer(b"NM"), Err(Error::InvalidRecord(_))));
    }

    #[test]
    fn test_truncated_value() {
        let err = decode_tags(&[b'N', b'M', b'i', 0x01, 0x00]).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }

    #[test]
    fn test_unterminated_string() {
        let err = decode_tags(b"RGZabc").unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }

    #[test]
    fn test_unknown_type() {
        let err = decode_tags(b"XXq\x01").unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }

    #[test]
    fn test_unknown_array_subtype() {
        let mut data = b"XBBq".to_vec();
        data.extend_from_slice(&1i32.to_le_bytes());
        data.push(0);
        assert!(decode_tags(&data).is_err());
    }

    #[test]
    fn test_array_length_past_end() {
        let mut data = b"XBBi".to_vec();
        data.extend_from_slice(&100i32.to_le_bytes());
        data.extend_from_slice(&[0; 8]);
        assert!(matches!(decode_tags(&data), Err(Error::InvalidRecord(_))));
    }

    #[test]
    fn test_duplicate_tag() {
        let err = decode_tags(b"NMC\x01NMC\x02").unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }

    #[test]
    fn test_encode_is_byte_identical() {
        let mut data = Vec::new();
        data.extend_from_slice(b"NMi");
        data.extend_from_slice(&7i32.to_le_bytes());
        data.extend_from_slice(b"RGZrg\0");
        data.extend_from_slice(b"XBBf");
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&0.25f32.to_le_bytes());
        data.extend_from_slice(b"XcC\xff");

        let tags = decode_tags(&data).unwrap();
        let mut encoded = Vec::new();
        encode_tags(&tags, &mut encoded);
        assert_eq!(encoded, data);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut tags = Tags::new();
        tags.insert(*b"NM", TagValue::UInt8(1));
        tags.insert(*b"AS", TagValue::UInt8(50));
        tags.insert(*b"NM", TagValue::Int32(3));

        let names: Vec<[u8; 2]> = tags.iter().map(|t| t.name).collect();
        assert_eq!(names, vec![*b"NM", *b"AS"]);
        assert_eq!(tags.integer(b"NM").unwrap(), Some(3));
    }
}
