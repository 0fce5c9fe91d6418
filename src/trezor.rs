use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use strum::EnumString;

use crate::{
    base::{Amount, TransactionOutRecord},
    data_parser::{parse_decimal, CsvSpec, DataParser, DataRow, Handler, HeaderColumn, ParserContext, ParserType, RowResult},
    error::DataRowError,
    time::TimestampHints,
};
use linkme::distributed_slice;

const WALLET: &str = "Trezor";

// Unanchored, like the export's own header check
static FIAT_COLUMN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Fiat \(.*\)").unwrap());

// Receives of tokens have a zero amount, with the real one in the address
// column, like "0x12...ef (3.5 ETH)".
static EMBEDDED_AMOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^()\s]+) ([^()\s]+)\)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, EnumString)]
enum TrezorTransactionType {
    #[strum(serialize = "RECV")]
    Received,
    #[strum(serialize = "SENT")]
    Sent,
    #[strum(serialize = "SELF")]
    SelfTransfer,
    #[strum(serialize = "FAILED")]
    Failed,
}

fn is_fiat_column(column: &str) -> bool {
    FIAT_COLUMN.is_match(column)
}

/// Reads the "(<amount> <symbol>)" part of an address column.
fn embedded_amount(text: &str) -> Option<(Decimal, &str)> {
    let captures = EMBEDDED_AMOUNT.captures(text)?;
    let quantity = parse_decimal(captures.get(1)?.as_str())?;
    Some((quantity, captures.get(2)?.as_str()))
}

// Stores values loaded from CSV file exported by Trezor Suite, with the following header:
// Timestamp,Date,Time,Type,Transaction ID,Fee,Fee unit,Address,Label,Amount,Amount unit,Fiat (EUR),Other
fn parse_trezor_suite(row: &DataRow, ctx: &ParserContext) -> RowResult {
    let hints = TimestampHints {
        dayfirst: true,
        tz: chrono_tz::Europe::London,
    };
    let timestamp = ctx.timestamp_with(row, "Timestamp", &hints)?;
    let symbol = row.get("Amount unit");
    let transaction_type: TrezorTransactionType = row
        .get("Type")
        .parse()
        .map_err(|_| ctx.unexpected_type("Type", row.get("Type")))?;

    let fee = || -> Result<Option<Amount>, DataRowError> {
        Ok(ctx
            .optional_decimal(row, "Fee")?
            .map(|fee| Amount::new(fee.abs(), row.get("Fee unit"))))
    };

    let tx = match transaction_type {
        // The fee of a receive was paid by the sender, so it is ignored
        TrezorTransactionType::Received => {
            let quantity = ctx.decimal(row, "Amount")?;
            let quantity = if quantity.is_zero() {
                let address = match row.row_dict.get("Addresses") {
                    Some(addresses) => addresses.as_str(),
                    None => row.get("Address"),
                };
                let (quantity, symbol_in) = embedded_amount(address).ok_or_else(|| ctx.format_error())?;
                if symbol_in != symbol {
                    return Err(ctx.format_error());
                }
                quantity
            } else {
                quantity
            };
            TransactionOutRecord::deposit(timestamp, Amount::new(quantity.abs(), symbol), WALLET)
        }
        TrezorTransactionType::Sent => {
            let sell = Amount::new(ctx.decimal(row, "Amount")?.abs(), symbol);
            TransactionOutRecord::withdrawal(timestamp, sell, WALLET).with_fee(fee()?.and_then(Amount::non_zero))
        }
        // Only the fee leaves the wallet
        TrezorTransactionType::SelfTransfer => {
            TransactionOutRecord::withdrawal(timestamp, Amount::new(Decimal::ZERO, symbol), WALLET).with_fee(fee()?)
        }
        TrezorTransactionType::Failed => {
            TransactionOutRecord::spend(timestamp, Amount::new(Decimal::ZERO, symbol), WALLET)
                .with_fee(fee()?)
                .with_note("Failure")
        }
    };

    let label = row.get("Label");
    let tx = if tx.note.is_none() && !label.is_empty() {
        tx.with_note(label)
    } else {
        tx
    };

    Ok(Some(tx))
}

const fn trezor_headers(address: &'static str) -> [HeaderColumn; 13] {
    [
        HeaderColumn::Name("Timestamp"),
        HeaderColumn::Name("Date"),
        HeaderColumn::Name("Time"),
        HeaderColumn::Name("Type"),
        HeaderColumn::Name("Transaction ID"),
        HeaderColumn::Name("Fee"),
        HeaderColumn::Name("Fee unit"),
        HeaderColumn::Name(address),
        HeaderColumn::Name("Label"),
        HeaderColumn::Name("Amount"),
        HeaderColumn::Name("Amount unit"),
        HeaderColumn::Predicate(is_fiat_column),
        HeaderColumn::Name("Other"),
    ]
}

const TREZOR_HEADERS: &[HeaderColumn] = &trezor_headers("Address");
const TREZOR_ADDRESSES_HEADERS: &[HeaderColumn] = &trezor_headers("Addresses");

// Trezor Suite used to export with ';' delimiter, but now uses ','
#[distributed_slice(crate::DATA_PARSERS)]
static TREZOR_SUITE_CSV: DataParser = DataParser {
    parser_type: ParserType::Wallet,
    name: "Trezor Suite",
    worksheet_name: "Trezor",
    csv: &[
        CsvSpec {
            headers: TREZOR_HEADERS,
            delimiters: b",;",
        },
        CsvSpec {
            headers: TREZOR_ADDRESSES_HEADERS,
            delimiters: b",;",
        },
    ],
    handler: Handler::Row(parse_trezor_suite),
};
