//! # Encoding Subsystem
//!
//! Converts the relational layer's structures (rows, index mappings, intent records)
//! into the single string `value` field that a document in the store can hold.
//!
//! ## Key Components
//!
//! ### `Encodable` / `Decodable`
//!
//! ```rust
//! use common::traits::encode::EncodingError;
//!
//! trait Encodable {
//!    fn encode(&self) -> Result<String, EncodingError>;
//! }
//! ```
//!
//! ### Field lists
//!
//! [`encode_fields`] and [`decode_fields`] implement a self-describing,
//! length-prefixed field list: every field is written as `<byte length>:<bytes>`.
//! Because the reader never scans for a delimiter, fields may contain any
//! character, including `:`, `#` or `&`.
//!
//! ```rust
//! use common::traits::encode::{decode_fields, encode_fields};
//!
//! let encoded = encode_fields(["name", "a#b&c"]);
//! assert_eq!(encoded, "4:name5:a#b&c");
//! assert_eq!(decode_fields(&encoded).unwrap(), vec!["name", "a#b&c"]);
//! ```

use thiserror::Error;

/// Separates the length prefix from the field bytes.
const LENGTH_SEPARATOR: char = ':';

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("malformed length prefix at byte {offset}")]
    InvalidLength { offset: usize },

    #[error("field at byte {offset} runs past the end of the input")]
    Truncated { offset: usize },

    #[error("malformed field: {0}")]
    MalformedField(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub trait Encodable {
    fn encode(&self) -> Result<String, EncodingError>;
}

pub trait Decodable: Sized {
    fn decode(input: &str) -> Result<Self, EncodingError>;
}

/// Appends a single length-prefixed field to `buffer`.
pub fn write_field(buffer: &mut String, field: &str) {
    buffer.push_str(&field.len().to_string());
    buffer.push(LENGTH_SEPARATOR);
    buffer.push_str(field);
}

/// Encodes a sequence of fields as a length-prefixed field list.
pub fn encode_fields<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut buffer = String::new();
    for field in fields {
        write_field(&mut buffer, field.as_ref());
    }
    buffer
}

/// Decodes a length-prefixed field list produced by [`encode_fields`].
pub fn decode_fields(input: &str) -> Result<Vec<String>, EncodingError> {
    let mut fields = Vec::new();
    let mut offset = 0;

    while offset < input.len() {
        let rest = &input[offset..];
        let separator = rest
            .find(LENGTH_SEPARATOR)
            .ok_or(EncodingError::InvalidLength { offset })?;
        let length: usize = rest[..separator]
            .parse()
            .map_err(|_| EncodingError::InvalidLength { offset })?;

        let start = offset + separator + LENGTH_SEPARATOR.len_utf8();
        let field = start
            .checked_add(length)
            .and_then(|end| input.get(start..end))
            .ok_or(EncodingError::Truncated { offset })?;

        fields.push(field.to_string());
        offset = start + length;
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;

    #[test]
    fn fields_may_contain_separators() {
        let fields = vec!["1:2".to_string(), "#".to_string(), "".to_string(), "é&".to_string()];
        let encoded = encode_fields(&fields);

        assert_eq!(decode_fields(&encoded).unwrap(), fields);
    }

    #[test]
    fn empty_input_has_no_fields() {
        assert!(decode_fields("").unwrap().is_empty());
    }

    #[test]
    fn rejects_truncated_field() {
        let err = decode_fields("10:short").unwrap_err();
        assert!(matches!(err, EncodingError::Truncated { offset: 0 }));
    }

    #[test]
    fn rejects_missing_length() {
        let err = decode_fields("3:abcxyz").unwrap_err();
        assert!(matches!(err, EncodingError::InvalidLength { offset: 5 }));
    }

    #[test]
    fn rejects_split_multibyte_character() {
        // "é" is two bytes; a length of one would cut it in half.
        assert!(decode_fields("1:é").is_err());
    }
}
