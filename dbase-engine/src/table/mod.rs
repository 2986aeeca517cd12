//! Table orchestrator
//!
//! A [`Table`] owns one header, the field list and every record of a .dbf
//! file, loaded wholesale. Saving encodes the whole table and lays out its
//! memo blocks in memory first, then writes the memo file and the table.

mod options;
mod row;

pub use options::SaveOptions;
pub use row::{Row, RowMut, DEFAULT_MASK, DEFAULT_SEPARATOR};

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::{DbfError, DbfResult};
use crate::storage::field::{read_fields, write_fields, Field};
use crate::storage::header::{read_header, select_header, DbfVersion, Header, TableFlags};
use crate::storage::encoders::memo_content;
use crate::storage::memo::{MemoAllocator, MemoFormat, MemoStore, MemoWriter};
use crate::storage::record::{encode_record, read_records, Record, END_OF_FILE};
use crate::text::{Latin1, TextCodec};

/// Memo file extensions probed on open, in order
const MEMO_CANDIDATES: [(&str, MemoFormat); 4] = [
    ("fpt", MemoFormat::Fpt),
    ("FPT", MemoFormat::Fpt),
    ("dbt", MemoFormat::Dbt),
    ("DBT", MemoFormat::Dbt),
];

/// Find the memo file that belongs to a table path
pub fn find_memo_file(path: &Path) -> Option<(PathBuf, MemoFormat)> {
    MEMO_CANDIDATES
        .iter()
        .map(|(ext, format)| (path.with_extension(ext), *format))
        .find(|(candidate, _)| candidate.is_file())
}

/// An in-memory dBASE table
#[derive(Debug, Clone)]
pub struct Table {
    header: Header,
    fields: Vec<Field>,
    records: Vec<Record>,
    text: Arc<dyn TextCodec>,
    /// Whether the last load stopped at a truncated record
    truncated: bool,
}

/// Fully encoded output of a save, built before anything is written
struct SavePlan {
    header: Header,
    dbf: Vec<u8>,
    memo: Option<MemoPlan>,
}

/// Memo blocks of a save in allocation order
struct MemoPlan {
    block_size: u32,
    contents: Vec<Vec<u8>>,
    offsets: Vec<MemoSlot>,
}

#[derive(Debug, Clone, Copy)]
struct MemoSlot {
    record: usize,
    field: usize,
    offset: u32,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    /// Empty FoxBase/dBASE III table using Latin-1 text
    pub fn new() -> Self {
        Self::with_codec(Arc::new(Latin1))
    }

    pub fn with_codec(text: Arc<dyn TextCodec>) -> Self {
        Table {
            header: Header::new(DbfVersion::FoxBaseDBase3NoMemo),
            fields: Vec::new(),
            records: Vec::new(),
            text,
            truncated: false,
        }
    }

    /// Open a .dbf file and its memo file, if one sits next to it
    pub fn open(path: impl AsRef<Path>) -> DbfResult<Self> {
        Self::open_with_codec(path, Arc::new(Latin1))
    }

    pub fn open_with_codec(path: impl AsRef<Path>, text: Arc<dyn TextCodec>) -> DbfResult<Self> {
        let path = path.as_ref();
        let dbf = BufReader::new(File::open(path)?);

        let memo = match find_memo_file(path) {
            Some((memo_path, format)) => {
                debug!("using memo file {}", memo_path.display());
                let mut file = File::open(&memo_path)?;
                Some(MemoStore::read_from(&mut file, format)?)
            }
            None => None,
        };

        Self::read_from(dbf, memo, text)
    }

    /// Load a table from any seekable stream
    pub fn read_from<R: Read + Seek>(
        mut dbf: R,
        memo: Option<MemoStore>,
        text: Arc<dyn TextCodec>,
    ) -> DbfResult<Self> {
        dbf.seek(SeekFrom::Start(0))?;
        let header = read_header(&mut dbf)?;
        let fields = read_fields(&mut dbf, text.as_ref())?;

        let table_start = header.header_length as u64;
        let position = dbf.stream_position()?;
        if table_start >= position {
            dbf.seek(SeekFrom::Start(table_start))?;
        } else {
            warn!(
                "header length {} ends inside the field table; reading records from {}",
                table_start, position
            );
        }

        if memo.is_none() && fields.iter().any(Field::is_memo) {
            debug!("table has memo fields but no memo file; memo values will be absent");
        }

        let scan = read_records(&mut dbf, &header, &fields, memo.as_ref(), text.as_ref())?;
        if scan.records.len() != header.num_records as usize {
            warn!(
                "header declares {} records, read {}",
                header.num_records,
                scan.records.len()
            );
        }

        debug!(
            "loaded {} table: {} fields, {} records",
            header.version,
            fields.len(),
            scan.records.len()
        );

        Ok(Table {
            header,
            fields,
            truncated: scan.truncated.is_some(),
            records: scan.records,
            text,
        })
    }

    /// Write the table to `path` and, when the schema has memo fields, its
    /// .fpt file next to it.
    ///
    /// Every value is validated and encoded before either file is opened, so
    /// a failed save leaves the files on disk and the table as they were.
    pub fn save(&mut self, path: impl AsRef<Path>, options: &SaveOptions) -> DbfResult<()> {
        let path = path.as_ref();
        let plan = self.plan_save(options)?;

        let dbf = BufWriter::new(File::create(path)?);
        if plan.memo.is_some() {
            let memo_path = path.with_extension(MemoFormat::Fpt.extension());
            let memo = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&memo_path)?;
            self.commit_save(dbf, Some(BufWriter::new(memo)), plan)
        } else {
            self.commit_save(dbf, None::<File>, plan)
        }
    }

    /// Write the table to `dbf` and its memo blocks to `memo`
    pub fn write_to<W: Write, M: Write + Seek>(
        &mut self,
        dbf: W,
        memo: Option<M>,
        options: &SaveOptions,
    ) -> DbfResult<()> {
        let plan = self.plan_save(options)?;
        if plan.memo.is_some() && memo.is_none() {
            return Err(DbfError::invalid("table has memo fields but no memo writer was given"));
        }
        self.commit_save(dbf, memo, plan)
    }

    /// Build the complete output of a save without touching `self`
    fn plan_save(&self, options: &SaveOptions) -> DbfResult<SavePlan> {
        self.check_unique_names()?;

        let mut header = self.header.clone();
        if let Some(version) = options.version {
            header.version = version;
        }
        if let Some(flag) = options.flag {
            header.flags = TableFlags::from_bits_retain(flag);
        } else if self.has_memo_fields() {
            header.flags.insert(TableFlags::WITH_MEMO);
        }
        if let Some(codepage) = options.codepage {
            header.codepage = codepage;
        }
        header.last_update = options
            .last_update
            .unwrap_or_else(|| chrono::Local::now().date_naive());

        let memo = if self.has_memo_fields() {
            if !header.layout().memo {
                header.version = Self::memo_dialect(header.version, options)?;
            }
            Some(self.plan_memos(options.effective_block_size())?)
        } else {
            None
        };

        let handler = select_header(header.version.as_raw())?;
        let capacity = handler.layout().header_length(self.fields.len())
            + self.records.len() * (header.record_length as usize)
            + 1;
        let mut dbf = Vec::with_capacity(capacity);
        handler.write(&mut dbf, &mut header, &self.fields, self.records.len())?;
        write_fields(&mut dbf, &self.fields, handler.layout(), self.text.as_ref())?;

        let mut offsets = memo.as_ref().map(|m| m.offsets.iter().peekable());
        for (index, record) in self.records.iter().enumerate() {
            let pending = offsets
                .as_mut()
                .is_some_and(|o| o.peek().is_some_and(|slot| slot.record == index));
            if !pending {
                encode_record(&mut dbf, record, &self.fields, self.text.as_ref())?;
                continue;
            }

            // Encode a copy carrying the offsets the memo file will hand out.
            let mut planned = record.clone();
            if let Some(o) = offsets.as_mut() {
                while let Some(slot) = o.next_if(|slot| slot.record == index) {
                    planned.set_memo_offset(slot.field, slot.offset)?;
                }
            }
            encode_record(&mut dbf, &planned, &self.fields, self.text.as_ref())?;
        }
        dbf.push(END_OF_FILE);

        Ok(SavePlan { header, dbf, memo })
    }

    /// Version to write when the chosen dialect has no memo file
    fn memo_dialect(version: DbfVersion, options: &SaveOptions) -> DbfResult<DbfVersion> {
        match version.memo_twin() {
            Some(twin) => {
                if options.version.is_some() {
                    warn!("{} has no memo file; writing {} instead", version, twin);
                } else {
                    debug!("table has memo fields; writing {} instead of {}", twin, version);
                }
                Ok(twin)
            }
            None => Err(DbfError::invalid(format!(
                "{} cannot store memo fields",
                version
            ))),
        }
    }

    /// Check every memo value and lay out its block in a fresh memo file
    fn plan_memos(&self, block_size: u32) -> DbfResult<MemoPlan> {
        let mut allocator = MemoAllocator::new(block_size)?;
        let mut contents = Vec::new();
        let mut offsets = Vec::new();

        for (record_index, record) in self.records.iter().enumerate() {
            for (field_index, field) in self.fields.iter().enumerate() {
                if !field.is_memo() {
                    continue;
                }
                let content = memo_content(field, record.value(field_index), self.text.as_ref())?;
                let offset = if content.is_empty() {
                    0
                } else {
                    allocator.allocate(content.len())?.0
                };
                offsets.push(MemoSlot {
                    record: record_index,
                    field: field_index,
                    offset,
                });
                contents.push(content);
            }
        }

        Ok(MemoPlan {
            block_size,
            contents,
            offsets,
        })
    }

    /// Write a planned save and adopt its header and memo offsets
    fn commit_save<W: Write, M: Write + Seek>(
        &mut self,
        mut dbf: W,
        memo: Option<M>,
        plan: SavePlan,
    ) -> DbfResult<()> {
        let SavePlan { header, dbf: bytes, memo: memo_plan } = plan;

        if let (Some(memo_plan), Some(memo)) = (&memo_plan, memo) {
            let mut writer = MemoWriter::new(memo, memo_plan.block_size)?;
            let mut written = 0usize;
            for (content, slot) in memo_plan.contents.iter().zip(&memo_plan.offsets) {
                let (offset, padded) = writer.append(content)?;
                debug_assert_eq!(offset, slot.offset);
                written += padded;
            }
            let blocks = writer.blocks_written();
            writer.finish()?;
            debug!("memo file written: {} memos, {} bytes of blocks", blocks, written);
        }

        dbf.write_all(&bytes)?;
        dbf.flush()?;

        if let Some(memo_plan) = memo_plan {
            for slot in memo_plan.offsets {
                self.records[slot.record].set_memo_offset(slot.field, slot.offset)?;
            }
        }
        self.header = header;

        debug!(
            "wrote {} table: {} fields, {} records, {} bytes",
            self.header.version,
            self.fields.len(),
            self.records.len(),
            bytes.len()
        );
        Ok(())
    }

    fn check_unique_names(&self) -> DbfResult<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(DbfError::invalid(format!("duplicate field name '{}'", field.name)));
            }
        }
        Ok(())
    }

    fn has_memo_fields(&self) -> bool {
        self.fields.iter().any(Field::is_memo)
    }

    // Fields

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// First field called `name`
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Append a field; existing records get an absent value for it
    pub fn add_field(&mut self, field: Field) -> DbfResult<usize> {
        if self.field(&field.name).is_some() {
            return Err(DbfError::invalid(format!("duplicate field name '{}'", field.name)));
        }
        self.fields.push(field);
        for record in &mut self.records {
            record.push_slot();
        }
        Ok(self.fields.len() - 1)
    }

    /// Remove a field and its value from every record
    pub fn remove_field(&mut self, name: &str) -> DbfResult<Field> {
        let index = self
            .field_index(name)
            .ok_or_else(|| DbfError::invalid(format!("no field named '{}'", name)))?;
        for record in &mut self.records {
            record.remove_slot(index);
        }
        Ok(self.fields.remove(index))
    }

    // Records

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// True when loading dropped a partial last record
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.records
            .get(index)
            .map(|record| Row::new(&self.fields, record))
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.records
            .iter()
            .map(move |record| Row::new(&self.fields, record))
    }

    pub fn row_mut(&mut self, index: usize) -> Option<RowMut<'_>> {
        let fields = &self.fields;
        self.records
            .get_mut(index)
            .map(|record| RowMut::new(fields, record))
    }

    /// Append an empty record and return it for filling in
    pub fn create_record(&mut self) -> RowMut<'_> {
        self.records.push(Record::new(self.fields.len()));
        let index = self.records.len() - 1;
        RowMut::new(&self.fields, &mut self.records[index])
    }

    // Header

    /// Header as last read or written; lengths and counts are refreshed on save
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn version(&self) -> DbfVersion {
        self.header.version
    }

    pub fn flag(&self) -> TableFlags {
        self.header.flags
    }

    pub fn codepage(&self) -> u8 {
        self.header.codepage
    }

    pub fn last_update(&self) -> NaiveDate {
        self.header.last_update
    }

    pub fn text_codec(&self) -> &dyn TextCodec {
        self.text.as_ref()
    }
}
