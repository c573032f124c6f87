use super::{collect, strings, table_from};
use crate::*;
use anyhow::Result;
use memtable::Memtable;
use std::sync::Arc;

fn concat(_key: &[u8], a: &[u8], b: &[u8]) -> Option<Vec<u8>> {
    Some([a, b].concat())
}

fn table(entries: &[(&str, &str)]) -> Result<SSTableReader> {
    Ok(table_from(
        entries.iter().map(|(k, v)| (k.as_bytes(), v.as_bytes())),
        WriterOptions::default(),
    )?)
}

fn sorted_bytes(s: &str) -> String {
    let mut b = s.as_bytes().to_vec();
    b.sort_unstable();
    String::from_utf8(b).unwrap_or_default()
}

// -------------------- Basic merge --------------------

#[test]
fn no_sources_means_no_iterator() -> Result<()> {
    let m = Merger::new(concat);
    assert!(m.is_empty());
    assert!(m.iter()?.is_none());
    assert!(m.get(b"a")?.is_none());
    assert!(m.get_prefix(b"a")?.is_none());
    assert!(m.get_range(b"a", b"z")?.is_none());
    Ok(())
}

#[test]
fn sources_with_nothing_in_range_mean_no_iterator() -> Result<()> {
    let mut m = Merger::new(concat);
    m.add_source(table(&[("a", "1")])?);
    m.add_source(table(&[])?);
    assert_eq!(m.len(), 2);
    assert!(m.get(b"b")?.is_none());
    assert!(m.get_prefix(b"x")?.is_none());
    Ok(())
}

#[test]
fn single_source_passes_through() -> Result<()> {
    let mut m = Merger::new(concat);
    m.add_source(table(&[("a", "1"), ("b", "2"), ("c", "3")])?);
    let got = strings(&collect(m.iter()?)?);
    assert_eq!(
        got,
        vec![
            ("a".into(), "1".into()),
            ("b".into(), "2".into()),
            ("c".into(), "3".into()),
        ]
    );
    Ok(())
}

#[test]
fn disjoint_sources_interleave() -> Result<()> {
    let mut m = Merger::new(concat);
    m.add_source(table(&[("a", "1"), ("c", "3"), ("e", "5")])?);
    m.add_source(table(&[("b", "2"), ("d", "4"), ("f", "6")])?);
    let got = strings(&collect(m.iter()?)?);
    let keys: Vec<&str> = got.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["a", "b", "c", "d", "e", "f"]);
    Ok(())
}

// -------------------- Collisions --------------------

#[test]
fn colliding_key_is_merged_once() -> Result<()> {
    let mut m = Merger::new(concat);
    m.add_source(table(&[("a", "1"), ("k", "x")])?);
    m.add_source(table(&[("k", "y"), ("z", "2")])?);
    let got = strings(&collect(m.iter()?)?);

    assert_eq!(got.len(), 3);
    assert_eq!(got[0], ("a".into(), "1".into()));
    assert_eq!(got[1].0, "k");
    // Fold order across sources is unspecified.
    assert!(got[1].1 == "xy" || got[1].1 == "yx", "got {}", got[1].1);
    assert_eq!(got[2], ("z".into(), "2".into()));
    Ok(())
}

#[test]
fn key_in_every_source_folds_all_values() -> Result<()> {
    let mut m = Merger::new(concat);
    for v in ["a", "b", "c", "d"] {
        m.add_source(table(&[(v, v), ("k", v)])?);
    }
    let got = strings(&collect(m.iter()?)?);
    let keys: Vec<&str> = got.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["a", "b", "c", "d", "k"]);
    assert_eq!(sorted_bytes(&got[4].1), "abcd");
    Ok(())
}

#[test]
fn merge_function_sees_the_key() -> Result<()> {
    let mut m = Merger::new(|key: &[u8], a: &[u8], b: &[u8]| {
        let mut out = key.to_vec();
        out.push(b':');
        out.extend_from_slice(a.max(b));
        Some(out)
    });
    m.add_source(table(&[("k", "1")])?);
    m.add_source(table(&[("k", "2")])?);
    let got = strings(&collect(m.get(b"k")?)?);
    assert_eq!(got, vec![("k".into(), "k:2".into())]);
    Ok(())
}

#[test]
fn empty_merged_value_is_valid() -> Result<()> {
    let mut m = Merger::new(|_: &[u8], _: &[u8], _: &[u8]| Some(Vec::new()));
    m.add_source(table(&[("k", "1")])?);
    m.add_source(table(&[("k", "2")])?);
    let got = collect(m.iter()?)?;
    assert_eq!(got, vec![(b"k".to_vec(), Vec::new())]);
    Ok(())
}

#[test]
fn failing_merge_function_stops_the_merge() -> Result<()> {
    let mut m = Merger::new(|_: &[u8], _: &[u8], _: &[u8]| None);
    m.add_source(table(&[("a", "1"), ("k", "x"), ("z", "1")])?);
    m.add_source(table(&[("k", "y"), ("zz", "2")])?);

    let mut it = m.iter()?.expect("sources are not empty");
    assert_eq!(it.next().transpose()?, Some((b"a".to_vec(), b"1".to_vec())));
    match it.next() {
        Some(Err(Error::MergeCallback { key })) => assert_eq!(key, b"k"),
        other => panic!("expected MergeCallback, got {:?}", other),
    }
    assert!(it.next().is_none());
    Ok(())
}

// -------------------- Queries --------------------

#[test]
fn get_prefix_and_range_across_sources() -> Result<()> {
    let mut m = Merger::new(concat);
    m.add_source(table(&[("app", "1"), ("apple", "2"), ("banana", "3")])?);
    m.add_source(table(&[("apple", "X"), ("apricot", "4"), ("cherry", "5")])?);

    let got = strings(&collect(m.get_prefix(b"ap")?)?);
    let keys: Vec<&str> = got.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["app", "apple", "apricot"]);
    assert_eq!(sorted_bytes(&got[1].1), "2X");

    let got = strings(&collect(m.get_range(b"apple", b"banana")?)?);
    let keys: Vec<&str> = got.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["apple", "apricot", "banana"]);

    let got = strings(&collect(m.get(b"cherry")?)?);
    assert_eq!(got, vec![("cherry".into(), "5".into())]);
    Ok(())
}

#[test]
fn large_merge_is_sorted_and_unique() -> Result<()> {
    let mut m = Merger::new(concat);
    for s in 0..5u32 {
        let entries: Vec<Record> = (0..1000u32)
            .filter(|i| i % 5 != s)
            .map(|i| (format!("{:05}", i).into_bytes(), vec![b'a' + s as u8]))
            .collect();
        m.add_source(table_from(
            entries,
            WriterOptions::default().block_size(MIN_BLOCK_SIZE),
        )?);
    }
    let got = collect(m.iter()?)?;
    assert_eq!(got.len(), 1000);
    assert!(got.windows(2).all(|w| w[0].0 < w[1].0));
    // Each key is missing from exactly one of the five sources.
    assert!(got.iter().all(|(_, v)| v.len() == 4));
    Ok(())
}

// -------------------- Composition --------------------

#[test]
fn memtable_and_table_merge() -> Result<()> {
    let mem: Memtable = [("b", "mem"), ("d", "mem")].into_iter().collect();
    let mut m = Merger::new(concat);
    m.add_source(table(&[("a", "disk"), ("b", "disk")])?);
    m.add_source(mem);

    let got = strings(&collect(m.iter()?)?);
    let keys: Vec<&str> = got.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["a", "b", "d"]);
    assert!(got[1].1 == "diskmem" || got[1].1 == "memdisk");
    Ok(())
}

#[test]
fn nested_mergers() -> Result<()> {
    let mut inner = Merger::new(concat);
    inner.add_source(table(&[("a", "1"), ("k", "x")])?);
    inner.add_source(table(&[("b", "2"), ("k", "y")])?);

    let mut outer = Merger::new(concat);
    outer.add_source(inner);
    outer.add_source(table(&[("c", "3"), ("k", "z")])?);

    let got = strings(&collect(outer.iter()?)?);
    let keys: Vec<&str> = got.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, ["a", "b", "c", "k"]);
    assert_eq!(sorted_bytes(&got[3].1), "xyz");

    let got = strings(&collect(outer.get(b"k")?)?);
    assert_eq!(got.len(), 1);
    Ok(())
}

#[test]
fn shared_merger_can_feed_several_merges() -> Result<()> {
    let mut base = Merger::new(concat);
    base.add_source(table(&[("a", "1")])?);
    let base = Arc::new(base);

    let mut left = Merger::new(concat);
    left.add_source(Arc::clone(&base));
    left.add_source(table(&[("b", "L")])?);

    let mut right = Merger::new(concat);
    right.add_source(base);
    right.add_source(table(&[("b", "R")])?);

    assert_eq!(collect(left.iter()?)?.len(), 2);
    assert_eq!(
        strings(&collect(right.get(b"b")?)?),
        vec![("b".into(), "R".into())]
    );
    Ok(())
}

#[test]
fn merge_output_writes_a_table() -> Result<()> {
    let mut m = Merger::new(concat);
    m.add_source(table(&[("a", "1"), ("c", "3")])?);
    m.add_source(table(&[("b", "2"), ("c", "4")])?);

    let mut w = SSTableWriter::new(Vec::new(), WriterOptions::default());
    w.add_all(m.iter()?.into_iter().flatten())?;
    let (bytes, t) = w.into_inner()?;
    assert_eq!(t.count_entries, 3);

    let r = SSTableReader::from_bytes(bytes, ReaderOptions::default())?;
    let c = r.get_value(b"c")?.unwrap_or_default();
    assert_eq!(sorted_bytes(&String::from_utf8(c)?), "34");
    Ok(())
}

#[test]
fn sub_iterator_error_is_reported_then_fused() -> Result<()> {
    let input: Vec<Record> = (0..500)
        .map(|i| (format!("key{:06}", i).into_bytes(), b"value".to_vec()))
        .collect();
    let opts = WriterOptions::default().block_size(MIN_BLOCK_SIZE);
    let mut w = SSTableWriter::new(Vec::new(), opts);
    for (k, v) in &input {
        w.add(k, v)?;
    }
    let (mut bytes, _) = w.into_inner()?;
    let second = SSTableReader::from_bytes(bytes.clone(), ReaderOptions::default())?
        .index_entries()?[1]
        .1 as usize;
    bytes[second + 8] ^= 0x55;
    let bad = SSTableReader::from_bytes(bytes, ReaderOptions::default().verify_checksums(true))?;

    let mut m = Merger::new(concat);
    m.add_source(bad);
    m.add_source(table(&[("zzz", "1")])?);

    let mut it = m.iter()?.expect("first block is intact");
    let err = loop {
        match it.next() {
            Some(Ok(_)) => {}
            Some(Err(e)) => break e,
            None => panic!("merge finished without reporting the corruption"),
        }
    };
    assert!(matches!(err, Error::Checksum { .. }));
    assert!(it.next().is_none());
    Ok(())
}
