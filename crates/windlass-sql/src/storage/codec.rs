//! Binary row codec.
//!
//! Converts between a schema-ordered tuple of values and the row buffer
//! format shared by the table store and compiled callables.
//!
//! # Row Format
//!
//! ```text
//! ┌─────────┬────────────┬──────────────┬──────────────────┬──────────────────┐
//! │ version │ total size │ null bitmap  │ fixed region     │ variable region  │
//! │ 2 bytes │ u32 LE     │ ceil(n/8) B  │ one slot per col │ varchar payloads │
//! └─────────┴────────────┴──────────────┴──────────────────┴──────────────────┘
//! ```
//!
//! - Fixed-width columns store their little-endian value in their slot.
//! - Varchar slots store a `u32` absolute offset into the variable region.
//!   Payloads are written back-to-back in column order, so a payload's
//!   length is the gap to the next varchar offset, or to the total size
//!   for the last one.
//! - Bitmap bits are 1 for present columns. Nulls are not produced, so every
//!   bit for an existing column is set on write.

use thiserror::Error;

use crate::logical::Schema;
use crate::parser::DataType;

use super::value::Value;

/// Row format tag, first header byte.
pub const FORMAT_VERSION: u8 = 1;
/// Schema layout tag, second header byte.
pub const SCHEMA_VERSION: u8 = 1;
/// Bytes used by the version tag.
pub const VERSION_LENGTH: usize = 2;
/// Bytes used by the total-size field.
pub const SIZE_LENGTH: usize = 4;
/// Fixed header length (version tag + total size).
pub const HEADER_LENGTH: usize = VERSION_LENGTH + SIZE_LENGTH;

/// Errors raised by the row codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Appended value type does not match the next column.
    #[error("column {column} expects {expected}, got {found}")]
    TypeMismatch {
        /// Column index.
        column: usize,
        /// Type declared by the schema.
        expected: DataType,
        /// Type supplied by the caller.
        found: DataType,
    },

    /// More values appended than the schema has columns.
    #[error("row already holds all {count} columns")]
    TooManyColumns {
        /// Column count of the schema.
        count: usize,
    },

    /// Row finished before every column was appended.
    #[error("row incomplete: {appended} of {expected} columns appended")]
    Incomplete {
        /// Columns appended so far.
        appended: usize,
        /// Column count of the schema.
        expected: usize,
    },

    /// Writes would run past the declared total length.
    #[error("row overflow: {needed} bytes needed, buffer holds {capacity}")]
    Overflow {
        /// Bytes needed.
        needed: usize,
        /// Declared buffer length.
        capacity: usize,
    },

    /// Declared total length was not filled exactly.
    #[error("row underfilled: {written} of {capacity} bytes written")]
    Underfilled {
        /// Bytes written.
        written: usize,
        /// Declared buffer length.
        capacity: usize,
    },

    /// Buffer too short for the layout.
    #[error("row truncated: {len} bytes, layout needs at least {needed}")]
    Truncated {
        /// Buffer length.
        len: usize,
        /// Minimum length the failed check required.
        needed: usize,
    },

    /// Header size field disagrees with the buffer length.
    #[error("row size field says {declared} bytes, buffer has {actual}")]
    SizeMismatch {
        /// Size stored in the header.
        declared: u32,
        /// Actual buffer length.
        actual: usize,
    },

    /// Unknown format tag.
    #[error("unsupported row format version {0}")]
    UnsupportedVersion(u8),

    /// Row would exceed the `u32` size field.
    #[error("row of {0} bytes exceeds the u32 size field")]
    TooLarge(usize),

    /// Column index outside the schema.
    #[error("column {column} out of range for {count} columns")]
    ColumnOutOfRange {
        /// Requested column.
        column: usize,
        /// Column count of the schema.
        count: usize,
    },

    /// Varchar offsets point outside the variable region.
    #[error("varchar column {column} has invalid offsets")]
    InvalidOffset {
        /// Column index.
        column: usize,
    },

    /// Varchar payload is not valid UTF-8.
    #[error("varchar column {column} is not valid UTF-8")]
    InvalidString {
        /// Column index.
        column: usize,
    },
}

/// Codec result type.
pub type CodecResult<T> = Result<T, CodecError>;

/// Precomputed byte layout of a schema.
///
/// Slot offsets are constant per schema, so every read and write is a
/// table lookup plus a fixed-width copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    types: Vec<DataType>,
    offsets: Vec<usize>,
    /// For each varchar column, the next varchar column in schema order.
    next_varchar: Vec<Option<usize>>,
    bitmap_len: usize,
    fixed_end: usize,
}

impl RowLayout {
    /// Computes the layout for a sequence of column types.
    pub fn new(types: impl IntoIterator<Item = DataType>) -> Self {
        let types: Vec<DataType> = types.into_iter().collect();
        let bitmap_len = (types.len() + 7) / 8;

        let mut offsets = Vec::with_capacity(types.len());
        let mut cursor = HEADER_LENGTH + bitmap_len;
        for ty in &types {
            offsets.push(cursor);
            cursor += ty.slot_width();
        }

        let mut next_varchar = vec![None; types.len()];
        let mut following = None;
        for (i, ty) in types.iter().enumerate().rev() {
            if *ty == DataType::Varchar {
                next_varchar[i] = following;
                following = Some(i);
            }
        }

        Self {
            types,
            offsets,
            next_varchar,
            bitmap_len,
            fixed_end: cursor,
        }
    }

    /// Computes the layout of a schema.
    pub fn from_schema(schema: &Schema) -> Self {
        Self::new(schema.data_types())
    }

    /// Returns the number of columns.
    pub fn column_count(&self) -> usize {
        self.types.len()
    }

    /// Returns the column types.
    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    /// Returns the type of a column.
    pub fn data_type(&self, column: usize) -> Option<DataType> {
        self.types.get(column).copied()
    }

    /// Returns the fixed-region slot offset of a column.
    pub fn offset(&self, column: usize) -> Option<usize> {
        self.offsets.get(column).copied()
    }

    /// Returns the null bitmap length in bytes.
    pub fn bitmap_len(&self) -> usize {
        self.bitmap_len
    }

    /// Returns the size of header, bitmap, and fixed region together.
    pub fn fixed_len(&self) -> usize {
        self.fixed_end
    }

    /// Returns true if no column is variable-width.
    pub fn is_fixed_width(&self) -> bool {
        !self.types.contains(&DataType::Varchar)
    }

    /// Computes the total buffer length for a row whose varchar payloads
    /// sum to `var_len` bytes.
    pub fn total_length(&self, var_len: usize) -> CodecResult<u32> {
        let total = self.fixed_end + var_len;
        u32::try_from(total).map_err(|_| CodecError::TooLarge(total))
    }

    /// Computes the total buffer length needed to encode `values`.
    pub fn total_length_for(&self, values: &[Value]) -> CodecResult<u32> {
        self.total_length(values.iter().map(Value::var_len).sum())
    }
}

#[inline]
fn read_bytes<const N: usize>(buf: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[at..at + N]);
    out
}

// =============================================================================
// Writer
// =============================================================================

/// Writes one row, column by column, into a pre-sized buffer.
///
/// Values must be appended strictly in schema order with matching types.
/// The buffer is allocated once at construction and never grows.
///
/// # Example
///
/// ```rust
/// use windlass_sql::parser::DataType;
/// use windlass_sql::storage::{RowBuilder, RowLayout, RowView};
///
/// let layout = RowLayout::new([DataType::Int32, DataType::Varchar]);
/// let total = layout.total_length(2).unwrap();
/// let mut builder = RowBuilder::new(&layout, total).unwrap();
/// builder.append_i32(32).unwrap();
/// builder.append_str("hi").unwrap();
/// let row = builder.finish().unwrap();
///
/// let view = RowView::new(&layout, &row).unwrap();
/// assert_eq!(view.get_i32(0).unwrap(), 32);
/// assert_eq!(view.get_str(1).unwrap(), "hi");
/// ```
#[derive(Debug)]
pub struct RowBuilder<'a> {
    layout: &'a RowLayout,
    buf: Vec<u8>,
    column: usize,
    str_cursor: usize,
}

impl<'a> RowBuilder<'a> {
    /// Creates a builder for a row of exactly `total_length` bytes.
    ///
    /// The header and bitmap are written immediately.
    pub fn new(layout: &'a RowLayout, total_length: u32) -> CodecResult<Self> {
        let total = total_length as usize;
        if total < layout.fixed_end {
            return Err(CodecError::Truncated {
                len: total,
                needed: layout.fixed_end,
            });
        }

        let mut buf = vec![0u8; total];
        buf[0] = FORMAT_VERSION;
        buf[1] = SCHEMA_VERSION;
        buf[VERSION_LENGTH..HEADER_LENGTH].copy_from_slice(&total_length.to_le_bytes());
        for i in 0..layout.column_count() {
            buf[HEADER_LENGTH + i / 8] |= 1 << (i % 8);
        }

        Ok(Self {
            layout,
            buf,
            column: 0,
            str_cursor: layout.fixed_end,
        })
    }

    fn next_slot(&mut self, found: DataType) -> CodecResult<usize> {
        let count = self.layout.column_count();
        if self.column >= count {
            return Err(CodecError::TooManyColumns { count });
        }
        let expected = self.layout.types[self.column];
        if expected != found {
            return Err(CodecError::TypeMismatch {
                column: self.column,
                expected,
                found,
            });
        }
        let offset = self.layout.offsets[self.column];
        self.column += 1;
        Ok(offset)
    }

    /// Appends an int16 column.
    pub fn append_i16(&mut self, v: i16) -> CodecResult<()> {
        let at = self.next_slot(DataType::Int16)?;
        self.buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Appends an int32 column.
    pub fn append_i32(&mut self, v: i32) -> CodecResult<()> {
        let at = self.next_slot(DataType::Int32)?;
        self.buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Appends an int64 column.
    pub fn append_i64(&mut self, v: i64) -> CodecResult<()> {
        let at = self.next_slot(DataType::Int64)?;
        self.buf[at..at + 8].copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Appends a float column.
    pub fn append_f32(&mut self, v: f32) -> CodecResult<()> {
        let at = self.next_slot(DataType::Float)?;
        self.buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Appends a double column.
    pub fn append_f64(&mut self, v: f64) -> CodecResult<()> {
        let at = self.next_slot(DataType::Double)?;
        self.buf[at..at + 8].copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Appends a varchar column.
    pub fn append_str(&mut self, s: &str) -> CodecResult<()> {
        let end = self.str_cursor + s.len();
        if end > self.buf.len() {
            return Err(CodecError::Overflow {
                needed: end,
                capacity: self.buf.len(),
            });
        }
        let at = self.next_slot(DataType::Varchar)?;
        // str_cursor <= buf.len() <= u32::MAX, checked in `new`.
        let offset = self.str_cursor as u32;
        self.buf[at..at + 4].copy_from_slice(&offset.to_le_bytes());
        self.buf[self.str_cursor..end].copy_from_slice(s.as_bytes());
        self.str_cursor = end;
        Ok(())
    }

    /// Appends a tagged value.
    pub fn append_value(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Int16(v) => self.append_i16(*v),
            Value::Int32(v) => self.append_i32(*v),
            Value::Int64(v) => self.append_i64(*v),
            Value::Float(v) => self.append_f32(*v),
            Value::Double(v) => self.append_f64(*v),
            Value::Varchar(s) => self.append_str(s),
        }
    }

    /// Returns the finished row buffer.
    ///
    /// Fails unless every column was appended and the declared length was
    /// filled exactly.
    pub fn finish(self) -> CodecResult<Vec<u8>> {
        let expected = self.layout.column_count();
        if self.column != expected {
            return Err(CodecError::Incomplete {
                appended: self.column,
                expected,
            });
        }
        if self.str_cursor != self.buf.len() {
            return Err(CodecError::Underfilled {
                written: self.str_cursor,
                capacity: self.buf.len(),
            });
        }
        Ok(self.buf)
    }
}

/// Encodes a full tuple in one call.
pub fn encode_row(layout: &RowLayout, values: &[Value]) -> CodecResult<Vec<u8>> {
    let total = layout.total_length_for(values)?;
    let mut builder = RowBuilder::new(layout, total)?;
    for value in values {
        builder.append_value(value)?;
    }
    builder.finish()
}

// =============================================================================
// Reader
// =============================================================================

/// Read-only view over an encoded row.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    layout: &'a RowLayout,
    buf: &'a [u8],
}

impl<'a> RowView<'a> {
    /// Validates the header and wraps `buf`.
    pub fn new(layout: &'a RowLayout, buf: &'a [u8]) -> CodecResult<Self> {
        if buf.len() < HEADER_LENGTH {
            return Err(CodecError::Truncated {
                len: buf.len(),
                needed: HEADER_LENGTH,
            });
        }
        if buf[0] != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(buf[0]));
        }
        let declared = u32::from_le_bytes(read_bytes(buf, VERSION_LENGTH));
        if declared as usize != buf.len() {
            return Err(CodecError::SizeMismatch {
                declared,
                actual: buf.len(),
            });
        }
        if buf.len() < layout.fixed_end {
            return Err(CodecError::Truncated {
                len: buf.len(),
                needed: layout.fixed_end,
            });
        }
        Ok(Self { layout, buf })
    }

    /// Returns the total row size from the header.
    pub fn size(&self) -> u32 {
        self.buf.len() as u32
    }

    /// Returns the raw buffer.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    /// Returns the validity bit of a column.
    pub fn is_present(&self, column: usize) -> bool {
        column < self.layout.column_count()
            && self.buf[HEADER_LENGTH + column / 8] & (1 << (column % 8)) != 0
    }

    fn slot(&self, column: usize, requested: DataType) -> CodecResult<usize> {
        let declared = self
            .layout
            .data_type(column)
            .ok_or(CodecError::ColumnOutOfRange {
                column,
                count: self.layout.column_count(),
            })?;
        if declared != requested {
            return Err(CodecError::TypeMismatch {
                column,
                expected: declared,
                found: requested,
            });
        }
        Ok(self.layout.offsets[column])
    }

    /// Reads an int16 column.
    pub fn get_i16(&self, column: usize) -> CodecResult<i16> {
        let at = self.slot(column, DataType::Int16)?;
        Ok(i16::from_le_bytes(read_bytes(self.buf, at)))
    }

    /// Reads an int32 column.
    pub fn get_i32(&self, column: usize) -> CodecResult<i32> {
        let at = self.slot(column, DataType::Int32)?;
        Ok(i32::from_le_bytes(read_bytes(self.buf, at)))
    }

    /// Reads an int64 column.
    pub fn get_i64(&self, column: usize) -> CodecResult<i64> {
        let at = self.slot(column, DataType::Int64)?;
        Ok(i64::from_le_bytes(read_bytes(self.buf, at)))
    }

    /// Reads a float column.
    pub fn get_f32(&self, column: usize) -> CodecResult<f32> {
        let at = self.slot(column, DataType::Float)?;
        Ok(f32::from_le_bytes(read_bytes(self.buf, at)))
    }

    /// Reads a double column.
    pub fn get_f64(&self, column: usize) -> CodecResult<f64> {
        let at = self.slot(column, DataType::Double)?;
        Ok(f64::from_le_bytes(read_bytes(self.buf, at)))
    }

    /// Reads a varchar column.
    pub fn get_str(&self, column: usize) -> CodecResult<&'a str> {
        let at = self.slot(column, DataType::Varchar)?;
        let start = u32::from_le_bytes(read_bytes(self.buf, at)) as usize;
        let end = match self.layout.next_varchar[column] {
            Some(next) => {
                u32::from_le_bytes(read_bytes(self.buf, self.layout.offsets[next])) as usize
            }
            None => self.buf.len(),
        };
        if start < self.layout.fixed_end || start > end || end > self.buf.len() {
            return Err(CodecError::InvalidOffset { column });
        }
        std::str::from_utf8(&self.buf[start..end]).map_err(|_| CodecError::InvalidString { column })
    }

    /// Reads any column as a tagged value.
    pub fn get_value(&self, column: usize) -> CodecResult<Value> {
        let ty = self
            .layout
            .data_type(column)
            .ok_or(CodecError::ColumnOutOfRange {
                column,
                count: self.layout.column_count(),
            })?;
        Ok(match ty {
            DataType::Int16 => Value::Int16(self.get_i16(column)?),
            DataType::Int32 => Value::Int32(self.get_i32(column)?),
            DataType::Int64 => Value::Int64(self.get_i64(column)?),
            DataType::Float => Value::Float(self.get_f32(column)?),
            DataType::Double => Value::Double(self.get_f64(column)?),
            DataType::Varchar => Value::Varchar(self.get_str(column)?.to_string()),
        })
    }
}

/// Decodes every column of a row.
pub fn decode_row(layout: &RowLayout, buf: &[u8]) -> CodecResult<Vec<Value>> {
    let view = RowView::new(layout, buf)?;
    (0..layout.column_count()).map(|i| view.get_value(i)).collect()
}
