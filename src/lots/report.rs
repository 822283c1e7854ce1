use crate::ledger::parse_timestamp;
use crate::lots::matcher::DispositionRecord;
use crate::lots::DIGITS;
use crate::warnings::Warning;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("row {row}: invalid timestamp {value:?}")]
    InvalidTimestamp { row: usize, value: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// All dispositions produced by one matching run, in emission order, plus
/// any warnings raised along the way.
#[derive(Debug, Default)]
pub struct DispositionReport {
    pub records: Vec<DispositionRecord>,
    pub warnings: Vec<Warning>,
}

impl DispositionReport {
    pub fn total_proceeds(&self, year: Option<i32>) -> Decimal {
        self.filter_records(year).map(|r| r.proceeds).sum()
    }

    pub fn total_basis(&self, year: Option<i32>) -> Decimal {
        self.filter_records(year).map(|r| r.basis).sum()
    }

    pub fn total_gain(&self, year: Option<i32>) -> Decimal {
        self.filter_records(year).map(|r| r.gain).sum()
    }

    /// Disposal years in order of first appearance.
    pub fn years(&self) -> Vec<i32> {
        let mut years = Vec::new();
        for record in &self.records {
            if !years.contains(&record.year()) {
                years.push(record.year());
            }
        }
        years
    }

    /// Assets disposed in the given year, in order of first appearance.
    pub fn assets(&self, year: Option<i32>) -> Vec<String> {
        let mut assets: Vec<String> = Vec::new();
        for record in self.filter_records(year) {
            if !assets.contains(&record.asset) {
                assets.push(record.asset.clone());
            }
        }
        assets
    }

    pub fn filter_records(&self, year: Option<i32>) -> impl Iterator<Item = &DispositionRecord> {
        self.records
            .iter()
            .filter(move |r| year.is_none_or(|y| r.year() == y))
    }

    /// Write dispositions to CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ReportError> {
        write_records_csv(&self.records, writer)
    }
}

/// Net (long term, short term) gains over a set of dispositions.
pub fn term_gains<'a, I>(records: I) -> (Decimal, Decimal)
where
    I: IntoIterator<Item = &'a DispositionRecord>,
{
    let mut long_term = Decimal::ZERO;
    let mut short_term = Decimal::ZERO;
    for record in records {
        if record.is_long_term() {
            long_term += record.gain;
        } else {
            short_term += record.gain;
        }
    }
    (long_term, short_term)
}

/// CSV row of the disposition report.
#[derive(Debug, Serialize, Deserialize)]
pub struct DispositionCsvRecord {
    #[serde(rename = "Asset")]
    pub asset: String,
    #[serde(rename = "Date Acquired")]
    pub acquired: String,
    #[serde(rename = "Date Disposed")]
    pub disposed: String,
    #[serde(rename = "Quantity")]
    pub quantity: Decimal,
    #[serde(rename = "Sale Price")]
    pub proceeds: Decimal,
    #[serde(rename = "Basis")]
    pub basis: Decimal,
    #[serde(rename = "Gain")]
    pub gain: Decimal,
}

impl From<&DispositionRecord> for DispositionCsvRecord {
    fn from(r: &DispositionRecord) -> Self {
        // Multiplication accumulates scale, so canonicalize before writing.
        let canonical = |d: Decimal| d.round_dp(DIGITS).normalize();
        DispositionCsvRecord {
            asset: r.asset.clone(),
            acquired: r.acquired.to_rfc3339(),
            disposed: r.disposed.to_rfc3339(),
            quantity: canonical(r.quantity),
            proceeds: canonical(r.proceeds),
            basis: canonical(r.basis),
            gain: canonical(r.gain),
        }
    }
}

/// Write a set of disposition records to CSV.
pub fn write_records_csv<W: Write>(
    records: &[DispositionRecord],
    writer: W,
) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        let row: DispositionCsvRecord = record.into();
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Read a previously written disposition report.
pub fn read_records_csv<R: Read>(reader: R) -> Result<Vec<DispositionRecord>, ReportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for (row, result) in rdr.deserialize().enumerate() {
        let record: DispositionCsvRecord = result?;
        let acquired =
            parse_timestamp(&record.acquired).ok_or_else(|| ReportError::InvalidTimestamp {
                row: row + 1,
                value: record.acquired.clone(),
            })?;
        let disposed =
            parse_timestamp(&record.disposed).ok_or_else(|| ReportError::InvalidTimestamp {
                row: row + 1,
                value: record.disposed.clone(),
            })?;
        records.push(DispositionRecord {
            asset: record.asset,
            acquired,
            disposed,
            quantity: record.quantity,
            proceeds: record.proceeds,
            basis: record.basis,
            gain: record.gain,
        });
    }
    Ok(records)
}
