//! Consumed-quantity state cache.
//!
//! The cache is the full ledger written back out with `Id` and `Used`
//! columns, so a later run over the same report resumes from the previous
//! consumed quantities. Restore joins cache rows onto the current ledger
//! by stable id and requires the join to be one-to-one in both directions:
//! a cache that does not exactly cover the ledger means the report was
//! edited since the cache was written, and matching against stale consumed
//! state would silently corrupt the output.

use crate::ledger::Ledger;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache row {row} ({id}) has no matching ledger transaction")]
    JoinMismatch { row: usize, id: String },
    #[error("duplicate cache entry for transaction {id}")]
    DuplicateId { id: String },
    #[error("ledger transaction {id} ({timestamp}) missing from cache")]
    MissingEntry { id: String, timestamp: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// CSV row of the cache file: the ledger row plus its id and consumed
/// quantity. Only `Id` and `Used` are read back; the rest keeps the cache
/// human-inspectable alongside the source report.
#[derive(Debug, Serialize, Deserialize)]
struct CacheCsvRecord {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Asset")]
    asset: String,
    #[serde(rename = "Transaction Type")]
    kind: String,
    #[serde(rename = "Quantity Transacted")]
    quantity: Decimal,
    #[serde(rename = "Spot Price at Transaction")]
    price: Decimal,
    #[serde(rename = "Used")]
    used: Decimal,
}

/// Restore previously persisted consumed quantities onto a fresh ledger.
pub fn restore<R: Read>(ledger: &mut Ledger, reader: R) -> Result<(), CacheError> {
    let index = ledger.id_index();
    let mut rdr = csv::Reader::from_reader(reader);
    let mut matched: HashSet<usize> = HashSet::new();
    let mut updates: Vec<(usize, Decimal)> = Vec::new();

    for (row, result) in rdr.deserialize().enumerate() {
        let record: CacheCsvRecord = result?;
        let idx = *index
            .get(record.id.as_str())
            .ok_or_else(|| CacheError::JoinMismatch {
                row: row + 1,
                id: record.id.clone(),
            })?;
        if !matched.insert(idx) {
            return Err(CacheError::DuplicateId { id: record.id });
        }
        updates.push((idx, record.used));
    }

    for (idx, tx) in ledger.transactions().iter().enumerate() {
        if !matched.contains(&idx) {
            return Err(CacheError::MissingEntry {
                id: tx.id.clone(),
                timestamp: tx.datetime.to_rfc3339(),
            });
        }
    }

    for (idx, used) in updates {
        ledger.tx_mut(idx).consumed = used;
    }
    Ok(())
}

/// Persist the mutated ledger, including consumed quantities.
pub fn persist<W: Write>(ledger: &Ledger, writer: W) -> Result<(), CacheError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for tx in ledger.transactions() {
        wtr.serialize(CacheCsvRecord {
            id: tx.id.clone(),
            timestamp: tx.datetime.to_rfc3339(),
            asset: tx.asset.clone(),
            kind: tx.kind.as_report().to_string(),
            quantity: tx.quantity,
            price: tx.price,
            used: tx.consumed,
        })?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}
