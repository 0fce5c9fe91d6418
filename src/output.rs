use std::{io, path::Path};

use anyhow::Result;
use serde::Serialize;

use crate::base::{Amount, TransactionOutRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Json,
    Csv,
}

// Column layout of the bittytax transaction records import
#[derive(Serialize)]
struct CsvRecord<'a> {
    #[serde(rename = "Type")]
    record_type: String,
    #[serde(rename = "Buy Quantity")]
    buy_quantity: Option<String>,
    #[serde(rename = "Buy Asset")]
    buy_asset: Option<&'a str>,
    #[serde(rename = "Sell Quantity")]
    sell_quantity: Option<String>,
    #[serde(rename = "Sell Asset")]
    sell_asset: Option<&'a str>,
    #[serde(rename = "Fee Quantity")]
    fee_quantity: Option<String>,
    #[serde(rename = "Fee Asset")]
    fee_asset: Option<&'a str>,
    #[serde(rename = "Wallet")]
    wallet: &'a str,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Note")]
    note: Option<&'a str>,
}

fn quantity(amount: &Option<Amount>) -> Option<String> {
    amount.as_ref().map(|amount| amount.quantity.normalize().to_string())
}

fn asset(amount: &Option<Amount>) -> Option<&str> {
    amount.as_ref().map(|amount| amount.asset.as_str())
}

impl<'a> From<&'a TransactionOutRecord> for CsvRecord<'a> {
    fn from(tx: &'a TransactionOutRecord) -> Self {
        Self {
            record_type: tx.record_type.to_string(),
            buy_quantity: quantity(&tx.buy),
            buy_asset: asset(&tx.buy),
            sell_quantity: quantity(&tx.sell),
            sell_asset: asset(&tx.sell),
            fee_quantity: quantity(&tx.fee),
            fee_asset: asset(&tx.fee),
            wallet: &tx.wallet,
            timestamp: tx.timestamp.format("%Y-%m-%dT%H:%M:%S%.f %Z").to_string(),
            note: tx.note.as_deref(),
        }
    }
}

pub(crate) fn write_records_csv<W: io::Write>(records: &[TransactionOutRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for tx in records {
        wtr.serialize(CsvRecord::from(tx))?;
    }
    wtr.flush()?;
    Ok(())
}

pub(crate) fn write_records_json<W: io::Write>(records: &[TransactionOutRecord], mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub(crate) fn write_records<W: io::Write>(records: &[TransactionOutRecord], format: OutputFormat, writer: W) -> Result<()> {
    match format {
        OutputFormat::Json => write_records_json(records, writer),
        OutputFormat::Csv => write_records_csv(records, writer),
    }
}

pub(crate) fn save_records(records: &[TransactionOutRecord], format: OutputFormat, output_path: &Path) -> Result<()> {
    let file = std::fs::File::create(output_path)?;
    write_records(records, format, io::BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn records() -> Vec<TransactionOutRecord> {
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap();
        vec![
            TransactionOutRecord::trade(
                timestamp,
                Amount::new(dec!(2.50), "BTC"),
                Amount::new(dec!(100), "USD"),
                "Kraken",
            )
            .with_fee(Some(Amount::new(dec!(0.25), "USD"))),
            TransactionOutRecord::deposit(timestamp, Amount::new(dec!(10), "ADA"), "ADALITE").with_note("tx1"),
        ]
    }

    #[test]
    fn csv_columns() {
        let mut out = Vec::new();
        write_records(&records(), OutputFormat::Csv, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Type,Buy Quantity,Buy Asset,Sell Quantity,Sell Asset,Fee Quantity,Fee Asset,Wallet,Timestamp,Note"
        );
        assert_eq!(lines[1], "Trade,2.5,BTC,100,USD,0.25,USD,Kraken,2024-01-15T10:30:45 UTC,");
        assert_eq!(lines[2], "Deposit,10,ADA,,,,,ADALITE,2024-01-15T10:30:45 UTC,tx1");
    }

    #[test]
    fn json_array() {
        let mut out = Vec::new();
        write_records(&records(), OutputFormat::Json, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["type"], "Trade");
        assert_eq!(records[0]["buy"]["asset"], "BTC");
        assert_eq!(records[0]["wallet"], "Kraken");
        assert!(records[1].get("sell").is_none());
        assert_eq!(records[1]["note"], "tx1");
    }

    #[test]
    fn saves_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        save_records(&records(), OutputFormat::Csv, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 3);
    }
}
