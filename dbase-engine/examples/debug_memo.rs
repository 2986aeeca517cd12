//! Debug tool to inspect memo references of a table directly

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use dbase_engine::storage::field::read_fields;
use dbase_engine::storage::header::read_header;
use dbase_engine::table::find_memo_file;
use dbase_engine::{Latin1, MemoStore, Table};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        println!("Usage: debug_memo <table.dbf>");
        return Ok(());
    }

    let path = PathBuf::from(&args[1]);
    println!("=== Memo references in {} ===\n", path.display());

    let mut reader = BufReader::new(File::open(&path)?);
    let header = read_header(&mut reader)?;
    let fields = read_fields(&mut reader, &Latin1)?;
    println!("Header:");
    println!("  Version: {}", header.version);
    println!("  Records: {}", header.num_records);
    println!("  Header length: {}", header.header_length);
    println!("  Record length: {}", header.record_length);
    println!("  Memo fields: {:?}", fields.iter().filter(|f| f.is_memo()).map(|f| &f.name).collect::<Vec<_>>());

    let Some((memo_path, format)) = find_memo_file(&path) else {
        println!("\nNo memo file found");
        return Ok(());
    };
    let store = MemoStore::read_from(&mut File::open(&memo_path)?, format)?;
    println!("\nMemo file {} ({:?}):", memo_path.display(), format);
    println!("  Size: {} bytes", store.len());
    println!("  Block size: {}", store.header().block_size);
    println!("  Next available block: {}", store.header().next_available_block);

    let table = Table::open(&path)?;
    for (i, row) in table.rows().enumerate() {
        for field in table.fields().iter().filter(|f| f.is_memo()) {
            let offset = row.memo_offset(&field.name).unwrap_or(0);
            if offset == 0 {
                continue;
            }
            match store.try_resolve(offset) {
                Ok(bytes) => println!(
                    "  #{} {} -> block {}: {} bytes, first {:02x?}",
                    i,
                    field.name,
                    offset,
                    bytes.len(),
                    &bytes[..16.min(bytes.len())]
                ),
                Err(e) => println!("  #{} {} -> block {}: {}", i, field.name, offset, e),
            }
        }
    }

    Ok(())
}
