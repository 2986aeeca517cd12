//! dbftool - inspect, dump and convert dBASE / FoxPro tables

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use dbase_engine::table::{DEFAULT_MASK, DEFAULT_SEPARATOR};
use dbase_engine::{codec_by_name, DbfVersion, FoxProCodepage, SaveOptions, Table, TextCodec};

mod config;

use config::ToolConfig;

/// dBASE / FoxPro table tool
#[derive(Parser, Debug)]
#[command(name = "dbftool")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Text encoding for character data (latin1, utf8)
    #[arg(long, global = true)]
    encoding: Option<String>,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show header and field information
    Info {
        path: PathBuf,
    },

    /// Print one delimited line per record
    Dump {
        path: PathBuf,

        /// Separator between fields
        #[arg(short, long, default_value = DEFAULT_SEPARATOR)]
        separator: String,

        /// Per-field mask; {name} and {value} are substituted
        #[arg(short, long, default_value = DEFAULT_MASK)]
        mask: String,

        /// Include records marked as deleted
        #[arg(long)]
        deleted: bool,
    },

    /// Load a table and write it back, optionally in another dialect
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// Target dialect (vfp, dbase3, foxpro2, ... or a version byte like 0x30)
        #[arg(long)]
        version: Option<DbfVersion>,

        /// Code page byte (e.g. 0x03)
        #[arg(long, value_parser = parse_byte)]
        codepage: Option<u8>,

        /// Table flag byte (e.g. 0x02)
        #[arg(long, value_parser = parse_byte)]
        flag: Option<u8>,

        /// Memo block size in bytes
        #[arg(long)]
        block_size: Option<u32>,

        /// Last-update date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    }
    .map_err(|e| format!("'{}' is not a byte: {}", s, e))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => ToolConfig::load(path)?,
        None => ToolConfig::default(),
    };
    debug!("config: {:?}", config);

    let encoding = args
        .encoding
        .clone()
        .or_else(|| config.encoding.clone())
        .unwrap_or_else(|| "latin1".to_string());
    let text = codec_by_name(&encoding).ok_or_else(|| anyhow!("unknown encoding '{}'", encoding))?;

    match args.command {
        Command::Info { path } => info_cmd(&path, text),
        Command::Dump {
            path,
            separator,
            mask,
            deleted,
        } => dump_cmd(&path, text, &separator, &mask, deleted),
        Command::Convert {
            input,
            output,
            version,
            codepage,
            flag,
            block_size,
            date,
        } => {
            let overrides = SaveOptions {
                version,
                flag,
                codepage,
                last_update: date,
                block_size,
            };
            convert_cmd(&input, &output, text, config.save.merge(overrides))
        }
    }
}

fn info_cmd(path: &Path, text: Arc<dyn TextCodec>) -> Result<()> {
    let table = Table::open_with_codec(path, text)?;
    let header = table.header();

    println!("File:          {}", path.display());
    println!("Version:       {}", header.version);
    println!("Last update:   {}", header.last_update.format("%Y-%m-%d"));
    println!("Records:       {} (header says {})", table.len(), header.num_records);
    println!("Header length: {}", header.header_length);
    println!("Record length: {}", header.record_length);
    println!("Flags:         0x{:02X} {:?}", header.flags.bits(), header.flags);
    match FoxProCodepage::from_raw(header.codepage) {
        Some(cp) => println!("Code page:     0x{:02X} {}", header.codepage, cp),
        None => println!("Code page:     0x{:02X}", header.codepage),
    }
    println!("Deleted:       {}", table.rows().filter(|r| r.is_deleted()).count());
    println!();
    println!("{:<12} {:<4} {:>6} {:>4}", "Field", "Type", "Length", "Dec");
    for field in table.fields() {
        println!(
            "{:<12} {:<4} {:>6} {:>4}",
            field.name, field.field_type.to_string(), field.length, field.decimals
        );
    }
    Ok(())
}

fn dump_cmd(
    path: &Path,
    text: Arc<dyn TextCodec>,
    separator: &str,
    mask: &str,
    deleted: bool,
) -> Result<()> {
    let table = Table::open_with_codec(path, text)?;
    for row in table.rows().filter(|r| deleted || !r.is_deleted()) {
        println!("{}", row.to_delimited_string(separator, mask));
    }
    Ok(())
}

fn convert_cmd(
    input: &Path,
    output: &Path,
    text: Arc<dyn TextCodec>,
    options: SaveOptions,
) -> Result<()> {
    let mut table = Table::open_with_codec(input, text)?;
    let from = table.version();
    table.save(output, &options)?;

    info!(
        "Converted {} ({}) to {} ({}), {} records",
        input.display(),
        from,
        output.display(),
        table.version(),
        table.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_byte() {
        assert_eq!(parse_byte("0x30"), Ok(0x30));
        assert_eq!(parse_byte("0XCB"), Ok(0xCB));
        assert_eq!(parse_byte("3"), Ok(3));
        assert!(parse_byte("0x100").is_err());
        assert!(parse_byte("abc").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "dbftool",
            "--encoding",
            "utf8",
            "convert",
            "a.dbf",
            "b.dbf",
            "--version",
            "vfp",
            "--codepage",
            "0x03",
        ])
        .unwrap();
        assert_eq!(args.encoding.as_deref(), Some("utf8"));
        match args.command {
            Command::Convert {
                version, codepage, ..
            } => {
                assert_eq!(version, Some(DbfVersion::VisualFoxPro));
                assert_eq!(codepage, Some(0x03));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
