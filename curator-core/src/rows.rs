//! Collapsing catalog rows into [`Record`]s.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::{FundingEntry, Record, RecordId, RecordRow};

/// Collapse `(rid, name, value, version)` rows into one [`Record`] per rid.
///
/// Only rows carrying the maximum version seen for a rid contribute. When a
/// name repeats within that version the later row wins. Output is sorted by
/// rid, so the result does not depend on row arrival order.
pub fn collapse_rows(rows: impl IntoIterator<Item = RecordRow>) -> Vec<Record> {
    let mut latest: BTreeMap<RecordId, Record> = BTreeMap::new();
    for row in rows {
        let record = latest
            .entry(row.rid.clone())
            .or_insert_with(|| Record::new(row.rid.clone(), row.version));
        if row.version > record.version {
            record.version = row.version;
            record.attributes.clear();
        }
        if row.version == record.version {
            record.attributes.insert(row.name, row.value);
        }
    }
    latest.into_values().collect()
}

/// Attach funding entries to their records. Entries are sorted so that the
/// order funding rows arrived in never matters downstream.
pub fn attach_funding(records: &mut [Record], mut funding: HashMap<RecordId, Vec<FundingEntry>>) {
    for record in records.iter_mut() {
        if let Some(mut entries) = funding.remove(&record.rid) {
            entries.sort();
            entries.dedup();
            record.funding = entries;
        }
    }
}

/// Drop rows whose attribute name is not in `allowed`.
///
/// An empty whitelist accepts every row. Returns the kept rows and the set
/// of rejected attribute names, for the caller to report.
pub fn retain_allowed(
    rows: Vec<RecordRow>,
    allowed: &[String],
) -> (Vec<RecordRow>, BTreeSet<String>) {
    if allowed.is_empty() {
        return (rows, BTreeSet::new());
    }
    let allowed: BTreeSet<&str> = allowed.iter().map(String::as_str).collect();
    let mut rejected = BTreeSet::new();
    let kept = rows
        .into_iter()
        .filter(|row| {
            if allowed.contains(row.name.as_str()) {
                true
            } else {
                rejected.insert(row.name.clone());
                false
            }
        })
        .collect();
    (kept, rejected)
}
