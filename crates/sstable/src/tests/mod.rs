mod merge_tests;

use crate::*;

/// Writes `entries` (already sorted) into an in-memory table and opens it.
pub(crate) fn table_from<K, V>(
    entries: impl IntoIterator<Item = (K, V)>,
    opts: WriterOptions,
) -> Result<SSTableReader>
where
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let mut w = SSTableWriter::new(Vec::new(), opts);
    for (k, v) in entries {
        w.add(k.as_ref(), v.as_ref())?;
    }
    let (bytes, _) = w.into_inner()?;
    SSTableReader::from_bytes(bytes, ReaderOptions::default().verify_checksums(true))
}

/// Collects every record from an optional iterator.
pub(crate) fn collect(it: Option<Iter>) -> Result<Vec<Record>> {
    match it {
        Some(it) => it.collect(),
        None => Ok(Vec::new()),
    }
}

/// Lossy UTF-8 view of records, for readable assertions.
pub(crate) fn strings(records: &[Record]) -> Vec<(String, String)> {
    records
        .iter()
        .map(|(k, v)| {
            (
                String::from_utf8_lossy(k).into_owned(),
                String::from_utf8_lossy(v).into_owned(),
            )
        })
        .collect()
}
