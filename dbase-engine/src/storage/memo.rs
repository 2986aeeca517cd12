//! Memo block store (.fpt, and read-only legacy .dbt)
//!
//! The memo file is a sequence of fixed-size blocks. The first 512 bytes hold
//! the header:
//! - Offset 0x00: next available block (u32, big-endian)
//! - Offset 0x04: block size (u32, big-endian; FoxPro reads the low half at 0x06)
//! - Rest: reserved, zero
//!
//! Each memo starts on a block boundary with an 8-byte sub-header (type tag and
//! content length, both big-endian) followed by the content, zero-padded to a
//! whole number of blocks. Block numbers count from the start of the file, so
//! block 0 always lies inside the header and offset 0 means "no memo".

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{DbfError, DbfResult};
use crate::text::TextCodec;

use super::codec;

/// Memo file flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoFormat {
    /// FoxPro block format with typed sub-headers
    Fpt,
    /// dBASE III/IV block format
    Dbt,
}

impl MemoFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            MemoFormat::Fpt => "fpt",
            MemoFormat::Dbt => "dbt",
        }
    }
}

/// Memo file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoHeader {
    /// First block past the last written memo
    pub next_available_block: u32,
    pub block_size: u32,
}

impl MemoHeader {
    /// Header block size in bytes
    pub const SIZE: usize = 512;

    pub const DEFAULT_BLOCK_SIZE: u32 = 64;

    /// dBASE .dbt block size
    pub const DBT_BLOCK_SIZE: u32 = 512;

    pub fn new(block_size: u32) -> Self {
        MemoHeader {
            next_available_block: MemoAllocator::first_block(block_size),
            block_size,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        codec::put_be_u32(&mut buf[0..4], self.next_available_block);
        codec::put_be_u32(&mut buf[4..8], self.block_size);
        buf
    }

    /// Parse the header of a memo file; short or zero-sized headers fall back
    /// to the format's default block size.
    pub fn from_bytes(data: &[u8], format: MemoFormat) -> Self {
        match format {
            MemoFormat::Fpt => {
                let next_available_block = if data.len() >= 4 { codec::be_u32(&data[0..4]) } else { 0 };
                let block_size = if data.len() >= 8 { codec::be_u32(&data[4..8]) } else { 0 };
                let block_size = if block_size == 0 {
                    tracing::debug!("memo header has no block size, assuming {}", Self::DEFAULT_BLOCK_SIZE);
                    Self::DEFAULT_BLOCK_SIZE
                } else {
                    block_size
                };
                MemoHeader { next_available_block, block_size }
            }
            MemoFormat::Dbt => {
                let next_available_block = if data.len() >= 4 { codec::le_u32(&data[0..4]) } else { 0 };
                // dBASE IV records its block length at 0x14; dBASE III leaves it zero.
                let block_size = if data.len() >= 22 { codec::le_u16(&data[20..22]) as u32 } else { 0 };
                let block_size = if block_size == 0 { Self::DBT_BLOCK_SIZE } else { block_size };
                MemoHeader { next_available_block, block_size }
            }
        }
    }
}

/// Sub-header type tag for text content
pub const MEMO_TYPE_TEXT: u32 = 1;

/// Size of the per-memo sub-header
pub const SUB_HEADER_SIZE: usize = 8;

/// dBASE IV block signature
const DBT4_SIGNATURE: [u8; 4] = [0xFF, 0xFF, 0x08, 0x00];

/// dBASE III end-of-memo byte
const DBT_END_MARKER: u8 = 0x1A;

/// An in-memory memo file used to resolve record offsets
#[derive(Debug, Clone)]
pub struct MemoStore {
    format: MemoFormat,
    header: MemoHeader,
    data: Vec<u8>,
}

impl MemoStore {
    /// Load an entire memo file
    pub fn read_from<R: Read + ?Sized>(reader: &mut R, format: MemoFormat) -> DbfResult<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self::from_bytes(data, format))
    }

    pub fn from_bytes(data: Vec<u8>, format: MemoFormat) -> Self {
        let header = MemoHeader::from_bytes(&data, format);
        tracing::debug!(
            "loaded {:?} memo file: {} bytes, block size {}",
            format,
            data.len(),
            header.block_size
        );
        MemoStore { format, header, data }
    }

    pub fn format(&self) -> MemoFormat {
        self.format
    }

    pub fn header(&self) -> &MemoHeader {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resolve a block offset to its text. Offset 0 and every malformed
    /// reference resolve to `None`; failures are logged, never raised.
    pub fn resolve(&self, offset: u32, text: &dyn TextCodec) -> Option<String> {
        if offset == 0 {
            return None;
        }
        match self.try_resolve(offset) {
            Ok(bytes) => Some(text.decode(bytes)),
            Err(e) => {
                tracing::debug!("{}", e);
                None
            }
        }
    }

    /// Content bytes addressed by `offset`
    pub fn try_resolve(&self, offset: u32) -> DbfResult<&[u8]> {
        let fail = |reason| DbfError::MemoResolution { offset, reason };

        let start = offset as u64 * self.header.block_size as u64;
        if start + SUB_HEADER_SIZE as u64 > self.data.len() as u64 && self.format == MemoFormat::Fpt {
            return Err(fail("block lies past the end of the memo file"));
        }
        let start = start as usize;

        match self.format {
            MemoFormat::Fpt => {
                let memo_type = codec::be_u32(&self.data[start..start + 4]);
                let length = codec::be_u32(&self.data[start + 4..start + 8]) as usize;
                if memo_type != MEMO_TYPE_TEXT {
                    return Err(fail("block is not text content"));
                }
                let content = start + SUB_HEADER_SIZE;
                if length == 0 {
                    return Err(fail("block declares no content"));
                }
                if content + length > self.data.len() {
                    return Err(fail("content runs past the end of the memo file"));
                }
                Ok(&self.data[content..content + length])
            }
            MemoFormat::Dbt => {
                if start >= self.data.len() {
                    return Err(fail("block lies past the end of the memo file"));
                }
                let block = &self.data[start..];
                if block.len() >= SUB_HEADER_SIZE && block[..4] == DBT4_SIGNATURE {
                    // dBASE IV: the length includes the 8-byte block header.
                    let length = codec::le_u32(&block[4..8]) as usize;
                    if length < SUB_HEADER_SIZE || length > block.len() {
                        return Err(fail("dBASE IV block length out of range"));
                    }
                    return Ok(&block[SUB_HEADER_SIZE..length]);
                }
                let end = block
                    .iter()
                    .position(|&b| b == DBT_END_MARKER)
                    .unwrap_or(block.len());
                if end == 0 {
                    return Err(fail("block declares no content"));
                }
                Ok(&block[..end])
            }
        }
    }
}

/// Block allocator threaded through a save pass.
///
/// Tracks the byte cursor of the next free block; every allocation returns the
/// block offset to store in the record and the padded size it occupies.
#[derive(Debug, Clone)]
pub struct MemoAllocator {
    block_size: u32,
    cursor: u64,
}

impl MemoAllocator {
    pub fn new(block_size: u32) -> DbfResult<Self> {
        if block_size == 0 || block_size > u16::MAX as u32 {
            return Err(DbfError::invalid(format!("memo block size {} out of range", block_size)));
        }
        Ok(MemoAllocator {
            block_size,
            cursor: Self::first_block(block_size) as u64 * block_size as u64,
        })
    }

    /// First block at or after the end of the header
    pub fn first_block(block_size: u32) -> u32 {
        let block_size = block_size.max(1) as usize;
        MemoHeader::SIZE.div_ceil(block_size) as u32
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Byte position of the next allocation
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Block number the next allocation will receive
    pub fn next_block(&self) -> u32 {
        (self.cursor / self.block_size as u64) as u32
    }

    /// Reserve room for `content_len` bytes of content plus the sub-header.
    /// Returns `(block_offset, padded_length)`.
    pub fn allocate(&mut self, content_len: usize) -> DbfResult<(u32, usize)> {
        let block_size = self.block_size as usize;
        let padded = (content_len + SUB_HEADER_SIZE).div_ceil(block_size) * block_size;

        let offset = u32::try_from(self.cursor / self.block_size as u64)
            .map_err(|_| DbfError::invalid("memo file exceeds the addressable block range"))?;
        self.cursor += padded as u64;
        Ok((offset, padded))
    }
}

/// Build one padded memo block: sub-header, content, zero padding
pub fn encode_block(content: &[u8], padded_len: usize) -> DbfResult<Vec<u8>> {
    let length = u32::try_from(content.len())
        .map_err(|_| DbfError::invalid("memo content exceeds 4 GiB"))?;
    let mut block = vec![0u8; padded_len.max(SUB_HEADER_SIZE + content.len())];
    codec::put_be_u32(&mut block[0..4], MEMO_TYPE_TEXT);
    codec::put_be_u32(&mut block[4..8], length);
    block[SUB_HEADER_SIZE..SUB_HEADER_SIZE + content.len()].copy_from_slice(content);
    Ok(block)
}

/// Writer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    Empty,
    HeaderWritten,
    Allocating,
    Closed,
}

/// Writes a fresh .fpt file: header first, then blocks in allocation order.
pub struct MemoWriter<W: Write + Seek> {
    writer: W,
    allocator: MemoAllocator,
    state: MemoState,
    blocks_written: usize,
}

impl<W: Write + Seek> MemoWriter<W> {
    /// Write the header block and get ready to allocate
    pub fn new(mut writer: W, block_size: u32) -> DbfResult<Self> {
        let allocator = MemoAllocator::new(block_size)?;

        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&MemoHeader::new(block_size).to_bytes())?;

        // Pad up to the first block boundary when blocks are larger than the header.
        let gap = allocator.cursor() as usize - MemoHeader::SIZE;
        if gap > 0 {
            writer.write_all(&vec![0u8; gap])?;
        }

        Ok(MemoWriter {
            writer,
            allocator,
            state: MemoState::HeaderWritten,
            blocks_written: 0,
        })
    }

    pub fn state(&self) -> MemoState {
        self.state
    }

    pub fn blocks_written(&self) -> usize {
        self.blocks_written
    }

    /// Store one memo and return `(block_offset, bytes_written)`.
    /// Empty content is not stored and yields offset 0.
    pub fn append(&mut self, content: &[u8]) -> DbfResult<(u32, usize)> {
        if content.is_empty() {
            return Ok((0, 0));
        }

        let (offset, padded) = self.allocator.allocate(content.len())?;
        let block = encode_block(content, padded)?;
        self.writer.write_all(&block)?;

        self.state = MemoState::Allocating;
        self.blocks_written += 1;
        Ok((offset, padded))
    }

    /// Record the final next-available counter and hand back the writer
    pub fn finish(mut self) -> DbfResult<W> {
        let next = self.allocator.next_block();
        self.writer.seek(SeekFrom::Start(0))?;
        let mut counter = [0u8; 4];
        codec::put_be_u32(&mut counter, next);
        self.writer.write_all(&counter)?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()?;

        self.state = MemoState::Closed;
        tracing::debug!(
            "memo file closed: {} memos, next block {}",
            self.blocks_written,
            next
        );
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::Latin1;
    use std::io::Cursor;

    fn write_memos(contents: &[&str], block_size: u32) -> (Vec<u8>, Vec<u32>) {
        let mut writer = MemoWriter::new(Cursor::new(Vec::new()), block_size).unwrap();
        assert_eq!(writer.state(), MemoState::HeaderWritten);
        let offsets = contents
            .iter()
            .map(|c| writer.append(c.as_bytes()).unwrap().0)
            .collect();
        (writer.finish().unwrap().into_inner(), offsets)
    }

    #[test]
    fn test_header_roundtrip() {
        let header = MemoHeader { next_available_block: 17, block_size: 64 };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), 512);
        assert_eq!(&bytes[0..8], &[0, 0, 0, 17, 0, 0, 0, 64]);
        assert_eq!(MemoHeader::from_bytes(&bytes, MemoFormat::Fpt), header);
    }

    #[test]
    fn test_allocation_is_block_aligned() {
        let mut alloc = MemoAllocator::new(64).unwrap();
        assert_eq!(alloc.cursor(), 512);
        assert_eq!(alloc.allocate(5).unwrap(), (8, 64));
        assert_eq!(alloc.allocate(56).unwrap(), (9, 64));
        assert_eq!(alloc.allocate(57).unwrap(), (10, 128));
        assert_eq!(alloc.next_block(), 12);
    }

    #[test]
    fn test_large_blocks_start_after_header() {
        let mut alloc = MemoAllocator::new(1024).unwrap();
        assert_eq!(alloc.allocate(10).unwrap(), (1, 1024));
        assert!(MemoAllocator::new(0).is_err());
    }

    #[test]
    fn test_write_then_resolve() {
        let (file, offsets) = write_memos(&["hello", "", "second memo"], 64);
        assert_eq!(offsets, vec![8, 0, 9]);
        assert_eq!(file.len(), 512 + 64 + 64);

        let store = MemoStore::from_bytes(file, MemoFormat::Fpt);
        assert_eq!(store.header().next_available_block, 10);
        assert_eq!(store.resolve(8, &Latin1).as_deref(), Some("hello"));
        assert_eq!(store.resolve(9, &Latin1).as_deref(), Some("second memo"));
        assert_eq!(store.resolve(0, &Latin1), None);
    }

    #[test]
    fn test_malformed_references_resolve_to_none() {
        let (mut file, _) = write_memos(&["hello"], 64);
        let store = MemoStore::from_bytes(file.clone(), MemoFormat::Fpt);
        // Past the end of the file.
        assert_eq!(store.resolve(500, &Latin1), None);
        // Inside the header: type tag is not text.
        assert_eq!(store.resolve(1, &Latin1), None);

        // Declared length runs past the end.
        codec::put_be_u32(&mut file[512 + 4..512 + 8], 1000);
        let store = MemoStore::from_bytes(file, MemoFormat::Fpt);
        assert!(matches!(
            store.try_resolve(8),
            Err(DbfError::MemoResolution { offset: 8, .. })
        ));
        assert_eq!(store.resolve(8, &Latin1), None);
    }

    #[test]
    fn test_dbt3_block() {
        let mut file = vec![0u8; 1024];
        file[512..517].copy_from_slice(b"notes");
        file[517] = 0x1A;
        file[518] = 0x1A;
        let store = MemoStore::from_bytes(file, MemoFormat::Dbt);
        assert_eq!(store.header().block_size, 512);
        assert_eq!(store.resolve(1, &Latin1).as_deref(), Some("notes"));
        assert_eq!(store.resolve(2, &Latin1), None);
    }

    #[test]
    fn test_dbt4_block() {
        let mut file = vec![0u8; 1024];
        file[512..516].copy_from_slice(&DBT4_SIGNATURE);
        codec::put_le_u32(&mut file[516..520], 8 + 3);
        file[520..523].copy_from_slice(b"abc");
        let store = MemoStore::from_bytes(file, MemoFormat::Dbt);
        assert_eq!(store.resolve(1, &Latin1).as_deref(), Some("abc"));
    }
}
