//! Implementation of each subcommand. Output goes to the given writer so the
//! commands can be exercised without spawning the binary.

use anyhow::{bail, Context, Result};
use memtable::Memtable;
use sstable::{Iter, Merger, ReaderOptions, SSTableReader, SSTableWriter, Source, Trailer};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;

fn open(path: &str) -> Result<SSTableReader> {
    SSTableReader::open(path, ReaderOptions::default())
        .with_context(|| format!("opening {}", path))
}

/// Opens every table and wraps them in one merger.
fn open_merged(paths: &[String], cfg: &Config) -> Result<Merger> {
    let mut merger = Merger::new(cfg.merge.merge_fn());
    for path in paths {
        merger.add_source(open(path)?);
    }
    debug!(tables = paths.len(), mode = %cfg.merge, "opened merge inputs");
    Ok(merger)
}

fn print_records(it: Option<Iter>, out: &mut impl Write) -> Result<usize> {
    let mut n = 0;
    for rec in it.into_iter().flatten() {
        let (k, v) = rec?;
        writeln!(out, "{}\t{}", k.escape_ascii(), v.escape_ascii())?;
        n += 1;
    }
    Ok(n)
}

fn print_scan(it: Option<Iter>, out: &mut impl Write) -> Result<()> {
    match print_records(it, out)? {
        0 => writeln!(out, "(empty)")?,
        n => writeln!(out, "({} entries)", n)?,
    }
    Ok(())
}

fn print_trailer(path: &str, reader: &SSTableReader, out: &mut impl Write) -> Result<()> {
    let t: &Trailer = reader.trailer();
    writeln!(out, "file: {}", path)?;
    writeln!(out, "  index_block_offset: {}", t.index_block_offset)?;
    writeln!(out, "  data_block_size: {}", t.data_block_size)?;
    writeln!(out, "  compression: {}", reader.compression())?;
    writeln!(out, "  count_entries: {}", t.count_entries)?;
    writeln!(out, "  count_data_blocks: {}", t.count_data_blocks)?;
    writeln!(out, "  bytes_data_blocks: {}", t.bytes_data_blocks)?;
    writeln!(out, "  bytes_index_block: {}", t.bytes_index_block)?;
    writeln!(out, "  bytes_keys: {}", t.bytes_keys)?;
    writeln!(out, "  bytes_values: {}", t.bytes_values)?;
    Ok(())
}

/// `create <out>`: reads `key<TAB>value` lines and writes them as a table.
///
/// Input need not be sorted. A repeated key keeps its last value; a line
/// without a tab is a key with an empty value.
pub fn create(
    out_path: &str,
    input: impl BufRead,
    cfg: &Config,
    out: &mut impl Write,
) -> Result<()> {
    let mut mem = Memtable::new();
    for line in input.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (k, v) = line.split_once('\t').unwrap_or((line.as_str(), ""));
        mem.put(k.as_bytes().to_vec(), v.as_bytes().to_vec());
    }

    let mut writer = SSTableWriter::create(out_path, cfg.writer)
        .with_context(|| format!("creating {}", out_path))?;
    for (k, v) in mem.iter() {
        writer.add(k, v)?;
    }
    let trailer = writer.finish()?;
    info!(path = out_path, entries = trailer.count_entries, "created table");
    writeln!(out, "wrote {} entries to {}", trailer.count_entries, out_path)?;
    Ok(())
}

/// `info <file>...`
pub fn info(paths: &[String], out: &mut impl Write) -> Result<()> {
    for path in paths {
        let reader = open(path)?;
        print_trailer(path, &reader, out)?;
    }
    Ok(())
}

/// `dump <file>`
pub fn dump(path: &str, out: &mut impl Write) -> Result<()> {
    let reader = open(path)?;
    print_records(reader.iter()?, out)?;
    Ok(())
}

/// `get <key> <file>...`
pub fn get(key: &str, paths: &[String], cfg: &Config, out: &mut impl Write) -> Result<()> {
    let merger = open_merged(paths, cfg)?;
    match merger.get(key.as_bytes())?.and_then(|mut it| it.next()) {
        Some(rec) => writeln!(out, "{}", rec?.1.escape_ascii())?,
        None => writeln!(out, "(nil)")?,
    }
    Ok(())
}

/// `prefix <prefix> <file>...`
pub fn prefix(prefix: &str, paths: &[String], cfg: &Config, out: &mut impl Write) -> Result<()> {
    let merger = open_merged(paths, cfg)?;
    print_scan(merger.get_prefix(prefix.as_bytes())?, out)
}

/// `range <low> <high> <file>...`
pub fn range(
    low: &str,
    high: &str,
    paths: &[String],
    cfg: &Config,
    out: &mut impl Write,
) -> Result<()> {
    let merger = open_merged(paths, cfg)?;
    print_scan(merger.get_range(low.as_bytes(), high.as_bytes())?, out)
}

/// `verify <file>...`: checks every file and fails if any is damaged.
pub fn verify(paths: &[String], out: &mut impl Write) -> Result<()> {
    let mut failed = 0;
    for path in paths {
        let result = open(path).and_then(|r| Ok(r.verify()?));
        match result {
            Ok(()) => writeln!(out, "OK {}", path)?,
            Err(e) => {
                failed += 1;
                writeln!(out, "FAILED {}: {:#}", path, e)?;
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} tables failed verification", failed, paths.len());
    }
    Ok(())
}

/// `merge <out> <file>...`
pub fn merge(out_path: &str, paths: &[String], cfg: &Config, out: &mut impl Write) -> Result<()> {
    if paths.iter().any(|p| Path::new(p) == Path::new(out_path)) {
        bail!("output {} is also an input", out_path);
    }
    let merger = open_merged(paths, cfg)?;
    let mut writer = SSTableWriter::create(out_path, cfg.writer)
        .with_context(|| format!("creating {}", out_path))?;
    writer.add_all(merger.iter()?.into_iter().flatten())?;
    let trailer = writer.finish()?;
    info!(
        path = out_path,
        inputs = paths.len(),
        entries = trailer.count_entries,
        "merged tables"
    );
    writeln!(
        out,
        "merged {} tables into {} ({} entries)",
        paths.len(),
        out_path,
        trailer.count_entries
    )?;
    Ok(())
}
