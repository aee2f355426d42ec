//! # Record Codec
//!
//! Maps rows and index bookkeeping onto the `(id, value)` shape of a document.
//!
//! A row becomes a document whose id is the primary-key value and whose value is
//! a length-prefixed field list of `name, cell` pairs for every other column, in
//! declaration order. A cell is `=` followed by the value's text, or `!` for
//! `NULL`, so `NULL` and the text `"NULL"` stay distinguishable.
//!
//! ```text
//! row      {id: 7, name: "a#b", note: NULL}
//! document id = "7", value = "4:name4:=a#b4:note1:!"
//! ```

use crate::document::Document;
use catalog::TableSchema;
use common::traits::encode::{
    decode_fields, encode_fields, Decodable, Encodable, EncodingError,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use ty::{Row, TypeError, Value};

const VALUE_MARKER: char = '=';
const NULL_MARKER: &str = "!";

#[derive(Error, Debug)]
pub enum CodecError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("stored value does not match its declared type: {0}")]
    Type(#[from] TypeError),
    #[error("table `{0}` has no primary key")]
    MissingPrimaryKey(String),
    #[error("primary key `{0}` cannot be NULL")]
    NullPrimaryKey(String),
}

/// Textual form of a non-null value. Negative zero is written as zero so the two
/// land on the same document id and index tuple.
fn encode_value(value: &Value) -> String {
    match value {
        Value::Float(f) if *f == 0.0 => Value::Float(0.0).to_string(),
        other => other.to_string(),
    }
}

fn encode_cell(value: &Value) -> String {
    match value {
        Value::Null => NULL_MARKER.to_string(),
        other => format!("{}{}", VALUE_MARKER, encode_value(other)),
    }
}

fn decode_cell(cell: &str) -> Result<Option<&str>, EncodingError> {
    if cell == NULL_MARKER {
        return Ok(None);
    }
    cell.strip_prefix(VALUE_MARKER)
        .map(Some)
        .ok_or_else(|| EncodingError::MalformedField(cell.to_string()))
}

/// Document id for a primary-key value.
pub fn encode_key(value: &Value) -> Option<String> {
    (!value.is_null()).then(|| encode_value(value))
}

/// Encodes a row as a document. The row is expected to already hold one value per
/// declared column, coerced to its type.
pub fn encode_row(schema: &TableSchema, row: &Row) -> Result<Document, CodecError> {
    let primary_key = schema
        .primary_key()
        .ok_or_else(|| CodecError::MissingPrimaryKey(schema.name().clone()))?;
    let key_name = primary_key.column_name();

    let id = row
        .get(key_name)
        .and_then(encode_key)
        .ok_or_else(|| CodecError::NullPrimaryKey(key_name.clone()))?;

    let mut fields = Vec::with_capacity(2 * schema.columns().len());
    for column in schema.columns() {
        if column.is_primary_key() {
            continue;
        }
        let value = row.get(column.column_name()).unwrap_or(&Value::Null);
        fields.push(column.column_name().clone());
        fields.push(encode_cell(value));
    }

    Ok(Document::new(id, encode_fields(fields)))
}

/// Rebuilds a row from its document, typed by the declared column types and in
/// declaration order. A column absent from the stored fields decodes as `NULL`.
pub fn decode_row(schema: &TableSchema, document: &Document) -> Result<Row, CodecError> {
    let fields = decode_fields(document.value())?;
    if fields.len() % 2 != 0 {
        return Err(EncodingError::MalformedField(document.value().clone()).into());
    }

    let mut cells: HashMap<&str, &str> = HashMap::with_capacity(fields.len() / 2);
    for pair in fields.chunks(2) {
        cells.insert(pair[0].as_str(), pair[1].as_str());
    }

    let mut row = Row::with_capacity(schema.columns().len());
    for column in schema.columns() {
        let value = if column.is_primary_key() {
            Value::parse_as(document.id(), &column.column_type())?
        } else {
            match cells.get(column.column_name().as_str()) {
                Some(cell) => match decode_cell(cell)? {
                    Some(raw) => Value::parse_as(raw, &column.column_type())?,
                    None => Value::Null,
                },
                None => Value::Null,
            }
        };
        row.insert(column.column_name().clone(), value);
    }

    Ok(row)
}

/// Encodes the values of `columns` in `row` as an index tuple.
pub fn encode_tuple(row: &Row, columns: &[String]) -> String {
    encode_fields(
        columns
            .iter()
            .map(|column| encode_cell(row.get(column).unwrap_or(&Value::Null))),
    )
}

/// Whether any of `columns` is `NULL` in `row`. Such tuples never collide.
pub fn tuple_has_null(row: &Row, columns: &[String]) -> bool {
    columns
        .iter()
        .any(|column| row.get(column).map_or(true, Value::is_null))
}

/// Aggregate index document: encoded tuple to the primary keys carrying it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntries {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl IndexEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_tuple(&self, tuple: &str) -> bool {
        self.entries.contains_key(tuple)
    }

    pub fn ids(&self, tuple: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(tuple)
    }

    /// Returns `false` if the pair was already present.
    pub fn insert(&mut self, tuple: String, id: String) -> bool {
        self.entries.entry(tuple).or_default().insert(id)
    }

    pub fn remove(&mut self, tuple: &str, id: &str) -> bool {
        let Some(ids) = self.entries.get_mut(tuple) else {
            return false;
        };
        let removed = ids.remove(id);
        if ids.is_empty() {
            self.entries.remove(tuple);
        }
        removed
    }

    /// Removes `id` from every tuple. Used when the row's values are unknown.
    pub fn remove_id(&mut self, id: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, ids| {
            if ids.remove(id) {
                removed += 1;
            }
            !ids.is_empty()
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Encodable for IndexEntries {
    fn encode(&self) -> Result<String, EncodingError> {
        Ok(serde_json::to_string(&self.entries)?)
    }
}

impl Decodable for IndexEntries {
    fn decode(input: &str) -> Result<Self, EncodingError> {
        Ok(Self {
            entries: serde_json::from_str(input)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    Insert,
    Delete,
}

/// Pending mutation of one row, written before the row and its index entries are
/// touched and removed once both are consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub id: String,
    pub row: String,
}

impl Intent {
    pub fn insert(document: &Document) -> Self {
        Self {
            kind: IntentKind::Insert,
            id: document.id().clone(),
            row: document.value().clone(),
        }
    }

    pub fn delete(document: &Document) -> Self {
        Self {
            kind: IntentKind::Delete,
            id: document.id().clone(),
            row: document.value().clone(),
        }
    }

    /// Intent documents are keyed by kind and row id so an insert and a delete of
    /// the same key never overwrite each other.
    pub fn document_id(&self) -> String {
        let kind = match self.kind {
            IntentKind::Insert => "insert",
            IntentKind::Delete => "delete",
        };
        encode_fields([kind, self.id.as_str()])
    }

    /// The row document this intent describes.
    pub fn row_document(&self) -> Document {
        Document::new(self.id.clone(), self.row.clone())
    }

    pub fn to_document(&self) -> Result<Document, EncodingError> {
        Ok(Document::new(self.document_id(), self.encode()?))
    }
}

impl Encodable for Intent {
    fn encode(&self) -> Result<String, EncodingError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Decodable for Intent {
    fn decode(input: &str) -> Result<Self, EncodingError> {
        Ok(serde_json::from_str(input)?)
    }
}
