use strum::EnumString;

use crate::{
    base::{Amount, TransactionOutRecord},
    data_parser::{header_names, CsvSpec, DataParser, DataRow, Handler, HeaderColumn, ParserContext, ParserType, RowResult},
    error::DataRowError,
};
use linkme::distributed_slice;

const WALLET: &str = "ADALITE";

#[derive(Debug, Clone, Copy, PartialEq, EnumString)]
enum AdaliteTransactionType {
    Received,
    Sent,
    #[strum(serialize = "Reward awarded")]
    RewardAwarded,
}

// CSV header (the export ends each line with a separator):
// Date,Transaction ID,Type,Received amount,Received currency,Sent amount,Sent currency,Fee amount,Fee currency,
fn parse_adalite(row: &DataRow, ctx: &ParserContext) -> RowResult {
    let timestamp = ctx.timestamp(row, "Date")?;
    let transaction_type: AdaliteTransactionType = row
        .get("Type")
        .parse()
        .map_err(|_| ctx.unexpected_type("Type", row.get("Type")))?;

    let received = || -> Result<Amount, DataRowError> {
        Ok(Amount::new(
            ctx.decimal(row, "Received amount")?.abs(),
            row.get("Received currency"),
        ))
    };

    let tx = match transaction_type {
        AdaliteTransactionType::Received => TransactionOutRecord::deposit(timestamp, received()?, WALLET),
        AdaliteTransactionType::RewardAwarded => TransactionOutRecord::staking(timestamp, received()?, WALLET),
        AdaliteTransactionType::Sent => {
            let sell = Amount::new(ctx.decimal(row, "Sent amount")?.abs(), row.get("Sent currency"));
            let fee = ctx
                .optional_decimal(row, "Fee amount")?
                .and_then(|fee| Amount::new(fee.abs(), row.get("Fee currency")).non_zero());
            TransactionOutRecord::withdrawal(timestamp, sell, WALLET).with_fee(fee)
        }
    };

    Ok(Some(tx.with_note(row.get("Transaction ID"))))
}

const ADALITE_HEADERS: &[HeaderColumn] = &header_names([
    "Date",
    "Transaction ID",
    "Type",
    "Received amount",
    "Received currency",
    "Sent amount",
    "Sent currency",
    "Fee amount",
    "Fee currency",
    "",
]);

#[distributed_slice(crate::DATA_PARSERS)]
static ADALITE_CSV: DataParser = DataParser {
    parser_type: ParserType::Wallet,
    name: "ADALITE",
    worksheet_name: "ADALITE",
    csv: &[CsvSpec::new(ADALITE_HEADERS)],
    handler: Handler::Row(parse_adalite),
};
