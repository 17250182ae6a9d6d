//! Generic, table driven structure decoder.
//!
//! [`decode_record`] is the only place that knows how to walk a [`Layout`]. For every field it
//! reads `kind` at `base + offset` and appends the result to a [`Record`], preserving the
//! declaration order of the layout. Typed structures implement [`Structure`] and pull their
//! fields back out of the record in the same order through [`Fields`].
//!
//! # Examples
//!
//! ```rust
//! use pescope::pe::{decoder::decode_record, schema::DATA_DIRECTORY, DataDirectory, Structure};
//!
//! let data = [0x00, 0x20, 0x00, 0x00, 0x48, 0x00, 0x00, 0x00];
//! let record = decode_record(&data, 0, &DATA_DIRECTORY)?;
//! assert_eq!(record.len(), 2);
//!
//! let directory = DataDirectory::from_record(record)?;
//! assert_eq!(directory.virtual_address, 0x2000);
//! assert_eq!(directory.size, 0x48);
//! # Ok::<(), pescope::Error>(())
//! ```

use crate::{
    file::io::{read_fixed_string8, read_uint},
    pe::schema::{Field, FieldKind, Layout},
    Error::OutOfBounds,
    Result,
};

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Any integer field, widened to 64 bits
    Uint(u64),
    /// A fixed length name
    Name(String),
    /// A nested structure
    Record(Record),
    /// A list of nested structures
    List(Vec<Record>),
}

/// The untyped result of applying a [`Layout`] to a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    layout: &'static Layout,
    values: Vec<Value>,
}

impl Record {
    /// The layout this record was decoded with
    #[must_use]
    pub fn layout(&self) -> &'static Layout {
        self.layout
    }

    /// Number of decoded values
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the layout declared no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decoded values, in layout declaration order
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Looks up a value by its field name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.layout
            .fields
            .iter()
            .position(|field| field.name == name)
            .and_then(|index| self.values.get(index))
    }

    /// Consumes the record and returns an in-order cursor over its values.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        Fields {
            layout: self.layout,
            values: self.values.into_iter(),
            index: 0,
        }
    }
}

/// In-order cursor over the values of a [`Record`].
///
/// Each accessor consumes exactly one value and checks that it has the expected shape. A
/// mismatch means the [`Structure`] implementation disagrees with its layout, which is
/// reported as [`crate::Error::Malformed`].
#[derive(Debug)]
pub struct Fields {
    layout: &'static Layout,
    values: std::vec::IntoIter<Value>,
    index: usize,
}

impl Fields {
    fn next_value(&mut self) -> Result<(&'static Field, Value)> {
        let Some(field) = self.layout.fields.get(self.index) else {
            return Err(malformed_error!(
                "{} has no field at position {}",
                self.layout.name,
                self.index
            ));
        };

        let Some(value) = self.values.next() else {
            return Err(malformed_error!(
                "{}.{} was not decoded",
                self.layout.name,
                field.name
            ));
        };

        self.index += 1;
        Ok((field, value))
    }

    /// Takes the next value as an integer of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the next value is not an integer or does not fit.
    pub fn uint<T: TryFrom<u64>>(&mut self) -> Result<T> {
        let layout = self.layout;
        match self.next_value()? {
            (field, Value::Uint(value)) => T::try_from(value).map_err(|_| {
                malformed_error!(
                    "{}.{} does not fit the target type - 0x{:X}",
                    layout.name,
                    field.name,
                    value
                )
            }),
            (field, other) => Err(malformed_error!(
                "{}.{} is not an integer - {:?}",
                layout.name,
                field.name,
                other
            )),
        }
    }

    /// Takes the next value as a name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the next value is not a name.
    pub fn name(&mut self) -> Result<String> {
        let layout = self.layout;
        match self.next_value()? {
            (_, Value::Name(name)) => Ok(name),
            (field, other) => Err(malformed_error!(
                "{}.{} is not a name - {:?}",
                layout.name,
                field.name,
                other
            )),
        }
    }

    /// Takes the next value as a nested structure.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the next value is not a record of `S`'s layout.
    pub fn structure<S: Structure>(&mut self) -> Result<S> {
        let layout = self.layout;
        match self.next_value()? {
            (_, Value::Record(record)) => S::from_record(record),
            (field, other) => Err(malformed_error!(
                "{}.{} is not a structure - {:?}",
                layout.name,
                field.name,
                other
            )),
        }
    }

    /// Takes the next value as a list of nested structures.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the next value is not a list of `S`'s layout.
    pub fn list<S: Structure>(&mut self) -> Result<Vec<S>> {
        let layout = self.layout;
        match self.next_value()? {
            (_, Value::List(records)) => records.into_iter().map(S::from_record).collect(),
            (field, other) => Err(malformed_error!(
                "{}.{} is not a list - {:?}",
                layout.name,
                field.name,
                other
            )),
        }
    }

    /// Verifies that every value has been consumed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if values are left over.
    pub fn finish(mut self) -> Result<()> {
        if self.values.next().is_some() {
            return Err(malformed_error!(
                "{} has unconsumed fields after position {}",
                self.layout.name,
                self.index
            ));
        }

        Ok(())
    }
}

/// A typed structure backed by a static [`Layout`].
pub trait Structure: Sized {
    /// The field table describing this structure on disk.
    fn layout() -> &'static Layout;

    /// Builds the structure from its fields, in layout declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the fields do not match the expected shape.
    fn from_fields(fields: &mut Fields) -> Result<Self>;

    /// Builds the structure from a record decoded with [`Structure::layout`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the record was decoded with a different layout
    /// or does not match the expected shape.
    fn from_record(record: Record) -> Result<Self> {
        if !std::ptr::eq(record.layout(), Self::layout()) {
            return Err(malformed_error!(
                "Expected a {} record, got {}",
                Self::layout().name,
                record.layout().name
            ));
        }

        let mut fields = record.into_fields();
        let structure = Self::from_fields(&mut fields)?;
        fields.finish()?;

        Ok(structure)
    }

    /// Decodes the structure at `offset` of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the structure does not fit into `data`.
    fn decode(data: &[u8], offset: usize) -> Result<Self> {
        Self::from_record(decode_record(data, offset, Self::layout())?)
    }
}

/// Applies `layout` at `base` and returns the decoded values in declaration order.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] as soon as any field would be read past the end of
/// `data`. No partial record is returned.
pub fn decode_record(data: &[u8], base: usize, layout: &'static Layout) -> Result<Record> {
    let mut values = Vec::with_capacity(layout.fields.len());
    for field in layout.fields {
        let Some(offset) = base.checked_add(field.offset) else {
            return Err(OutOfBounds);
        };

        values.push(decode_field(data, offset, field.kind)?);
    }

    Ok(Record { layout, values })
}

/// Decodes `count` consecutive records of `layout`, starting at `base` and `stride` bytes
/// apart.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if any element does not fit into `data`.
pub fn decode_array(
    data: &[u8],
    base: usize,
    layout: &'static Layout,
    count: usize,
    stride: usize,
) -> Result<Vec<Record>> {
    (0..count)
        .map(|index| {
            let Some(offset) = index
                .checked_mul(stride)
                .and_then(|distance| base.checked_add(distance))
            else {
                return Err(OutOfBounds);
            };

            decode_record(data, offset, layout)
        })
        .collect()
}

fn decode_field(data: &[u8], offset: usize, kind: FieldKind) -> Result<Value> {
    match kind {
        FieldKind::Byte | FieldKind::Word | FieldKind::Dword | FieldKind::Qword => {
            Ok(Value::Uint(read_uint(data, offset, kind.width())?))
        }
        FieldKind::Name8 => Ok(Value::Name(read_fixed_string8(data, offset)?)),
        FieldKind::Struct(layout) => Ok(Value::Record(decode_record(data, offset, layout)?)),
        FieldKind::Array {
            layout,
            count,
            stride,
        } => Ok(Value::List(decode_array(data, offset, layout, count, stride)?)),
    }
}
