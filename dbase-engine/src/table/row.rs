//! Borrowed views over one record of a table

use crate::error::{DbfError, DbfResult};
use crate::storage::field::Field;
use crate::storage::record::{Record, RecordMarker};
use crate::storage::value::Value;

/// Default separator for [`Row::to_delimited_string`]
pub const DEFAULT_SEPARATOR: &str = ",";

/// Default per-field mask for [`Row::to_delimited_string`]
pub const DEFAULT_MASK: &str = "{name}={value}";

fn position(fields: &[Field], name: &str) -> Option<usize> {
    fields.iter().position(|f| f.name == name)
}

/// Read-only row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    fields: &'a [Field],
    record: &'a Record,
}

impl<'a> Row<'a> {
    pub(crate) fn new(fields: &'a [Field], record: &'a Record) -> Self {
        Row { fields, record }
    }

    /// Value of the first field called `name`; `None` when absent or unknown
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        position(self.fields, name).and_then(|i| self.record.value(i))
    }

    pub fn get_at(&self, index: usize) -> Option<&'a Value> {
        self.record.value(index)
    }

    /// Block offset last read or written for a memo field
    pub fn memo_offset(&self, name: &str) -> Option<u32> {
        let index = position(self.fields, name)?;
        self.fields[index]
            .is_memo()
            .then(|| self.record.memo_offset(index))
    }

    pub fn is_deleted(&self) -> bool {
        self.record.is_deleted()
    }

    pub fn record(&self) -> &'a Record {
        self.record
    }

    /// Render every field through `mask` and join with `separator`.
    /// `{name}` and `{value}` in the mask are substituted; absent values
    /// render empty.
    pub fn to_delimited_string(&self, separator: &str, mask: &str) -> String {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let value = self
                    .record
                    .value(i)
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                mask.replace("{name}", &field.name).replace("{value}", &value)
            })
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl std::fmt::Display for Row<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_delimited_string(DEFAULT_SEPARATOR, DEFAULT_MASK))
    }
}

/// Mutable row
#[derive(Debug)]
pub struct RowMut<'a> {
    fields: &'a [Field],
    record: &'a mut Record,
}

impl<'a> RowMut<'a> {
    pub(crate) fn new(fields: &'a [Field], record: &'a mut Record) -> Self {
        RowMut { fields, record }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        position(self.fields, name).and_then(|i| self.record.value(i))
    }

    /// Set the first field called `name`; `None` clears it
    pub fn set(&mut self, name: &str, value: Option<Value>) -> DbfResult<()> {
        let index = position(self.fields, name)
            .ok_or_else(|| DbfError::invalid(format!("no field named '{}'", name)))?;
        self.set_at(index, value)
    }

    pub fn set_at(&mut self, index: usize, value: Option<Value>) -> DbfResult<()> {
        let field = self
            .fields
            .get(index)
            .ok_or_else(|| DbfError::invalid(format!("field index {} out of range", index)))?;

        // Memo slots always hold memo text, whatever string variant came in.
        let value = match value {
            Some(Value::Character(s)) if field.is_memo() => Some(Value::Memo(s)),
            Some(Value::Memo(s)) if !field.is_memo() => Some(Value::Character(s)),
            other => other,
        };
        self.record.set_value(index, value)
    }

    pub fn mark_deleted(&mut self) {
        self.record.marker = RecordMarker::Deleted;
    }

    pub fn undelete(&mut self) {
        self.record.marker = RecordMarker::Valid;
    }

    pub fn is_deleted(&self) -> bool {
        self.record.is_deleted()
    }

    pub fn as_row(&self) -> Row<'_> {
        Row::new(self.fields, self.record)
    }
}
