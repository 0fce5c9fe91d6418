use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use strum::EnumString;
use tracing::{debug, warn};

use crate::{
    base::{Amount, TransactionOutRecord},
    data_parser::{
        header_names, CsvSpec, DataParser, DataRow, Handler, HeaderColumn, ParserContext, ParserType,
        RowResult,
    },
    error::DataRowError,
};
use linkme::distributed_slice;

const WALLET: &str = "Kraken";

/// Quote assets Kraken pairs may end with, in descending lexical order so
/// that longer codes sharing a prefix are tried first.
const QUOTE_ASSETS: &[&str] = &[
    "ZUSD", "ZJPY", "ZGBP", "ZEUR", "ZCAD", "ZAUD", "XXBT", "XETH", "XBT", "USDT", "USDC", "USD",
    "JPY", "GBP", "EUR", "ETH", "DOT", "DAI", "CHF", "CAD", "AUD",
];

/// Legitimate base assets shorter than three characters.
const ASSETS_2CHARS: &[&str] = &["SC"];

const ALT_ASSETS: &[(&str, &str)] = &[
    ("ADA.S", "ADA"),
    ("ALGO.S", "ALGO"),
    ("DOT.S", "DOT"),
    ("KFEE", "FEE"),
    ("LUNA.S", "LUNA"),
    ("POL.S", "POL"),
    ("SOL.S", "SOL"),
    ("XETC", "ETC"),
    ("XETH", "ETH"),
    ("XLTC", "LTC"),
    ("XMLN", "MLN"),
    ("XREP", "REP"),
    ("XXBT", "XBT"),
    ("XXDG", "XDG"),
    ("XXLM", "XLM"),
    ("XXMR", "XMR"),
    ("XXRP", "XRP"),
    ("XZEC", "ZEC"),
    ("ZAUD", "AUD"),
    ("ZCAD", "CAD"),
    ("ZEUR", "EUR"),
    ("ZGBP", "GBP"),
    ("ZJPY", "JPY"),
    ("ZUSD", "USD"),
];

/// Normalize Kraken asset codes.
///
/// Kraken prefixes legacy crypto codes with `X` and fiat with `Z`, marks
/// staked balances with a `.S` suffix and calls Bitcoin `XBT`.
pub(crate) fn normalize_asset(asset: &str) -> String {
    let asset = match ALT_ASSETS.binary_search_by(|(alt, _)| (*alt).cmp(asset)) {
        Ok(index) => ALT_ASSETS[index].1,
        Err(_) => asset,
    };
    let asset = asset.strip_suffix(".S").unwrap_or(asset);
    match asset {
        "XBT" => "BTC".to_owned(),
        other => other.to_owned(),
    }
}

/// Split a Kraken trading pair like "XXBTZEUR" into its base and quote.
///
/// Kraken does not delimit the two, so the first known quote suffix which
/// leaves a plausible base (three or more characters, or a known short
/// asset) wins.
pub(crate) fn split_trading_pair(pair: &str) -> Option<(&str, &str)> {
    QUOTE_ASSETS.iter().find_map(|quote| {
        let base = pair.strip_suffix(*quote)?;
        if base.len() >= 3 || ASSETS_2CHARS.iter().any(|short| *short == base) {
            Some((base, *quote))
        } else {
            None
        }
    })
}

#[derive(Debug, Clone, PartialEq, EnumString)]
#[strum(serialize_all = "lowercase")]
enum LedgerType {
    Deposit,
    Withdrawal,
    Trade,
    Spend,
    Receive,
    Transfer,
    Staking,
    Reward,
    Dividend,
    #[strum(default)]
    Other(String),
}

impl LedgerType {
    fn parse(value: &str) -> Self {
        // with a default variant parsing cannot fail
        value.parse().unwrap_or_else(|_| LedgerType::Other(value.to_owned()))
    }

    /// The leg type which completes a trade started by this one.
    fn counterpart(&self) -> Option<LedgerType> {
        match self {
            LedgerType::Trade => Some(LedgerType::Trade),
            LedgerType::Spend => Some(LedgerType::Receive),
            LedgerType::Receive => Some(LedgerType::Spend),
            _ => None,
        }
    }
}

/// One ledger entry, with the values the conversion needs already parsed.
struct Leg {
    asset: String,
    amount: Decimal,
    fee: Decimal,
}

impl Leg {
    fn from_row(row: &DataRow, ctx: &ParserContext) -> Result<Self, DataRowError> {
        Ok(Self {
            asset: normalize_asset(row.get("asset")),
            amount: ctx.decimal(row, "amount")?,
            fee: ctx.optional_decimal(row, "fee")?.unwrap_or_default(),
        })
    }

    fn fee_amount(&self) -> Option<Amount> {
        Amount::new(self.fee.abs(), self.asset.clone()).non_zero()
    }
}

/// Converts a Kraken ledger export, where both sides of a trade are separate
/// rows sharing a reference id.
fn parse_kraken_ledger(rows: &[DataRow], ctx: &ParserContext) -> Vec<RowResult> {
    // rows without a txid had no effect on any balance (e.g. failed withdrawals)
    let mut ref_ids: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        if !row.get("txid").is_empty() {
            ref_ids.entry(row.get("refid")).or_default().push(index);
        }
    }

    let mut processed = HashSet::new();
    let mut results: Vec<RowResult> = rows.iter().map(|_| Ok(None)).collect();

    for (index, row) in rows.iter().enumerate() {
        debug!("conv: row[{}] {}", row.line_num, row);

        // consumed rows keep the result their partner left them
        if !processed.insert(index) {
            continue;
        }

        let result = parse_ledger_row(index, rows, &ref_ids, &mut processed, &mut results, ctx);
        results[index] = result;
    }

    results
}

fn parse_ledger_row(
    index: usize,
    rows: &[DataRow],
    ref_ids: &HashMap<&str, Vec<usize>>,
    processed: &mut HashSet<usize>,
    results: &mut [RowResult],
    ctx: &ParserContext,
) -> RowResult {
    let row = &rows[index];
    if row.get("txid").is_empty() {
        return Ok(None);
    }

    let timestamp = ctx.timestamp(row, "time")?;
    let ledger_type = LedgerType::parse(row.get("type"));

    let tx = match &ledger_type {
        LedgerType::Deposit | LedgerType::Staking | LedgerType::Reward | LedgerType::Dividend => {
            let leg = Leg::from_row(row, ctx)?;
            let buy = Amount::new(leg.amount.abs(), leg.asset.clone());
            let tx = match &ledger_type {
                LedgerType::Deposit => TransactionOutRecord::deposit(timestamp, buy, WALLET),
                LedgerType::Dividend => TransactionOutRecord::dividend(timestamp, buy, WALLET),
                _ => TransactionOutRecord::staking(timestamp, buy, WALLET),
            };
            tx.with_fee(leg.fee_amount())
        }
        LedgerType::Withdrawal => {
            let leg = Leg::from_row(row, ctx)?;
            let sell = Amount::new(leg.amount.abs(), leg.asset.clone());
            TransactionOutRecord::withdrawal(timestamp, sell, WALLET).with_fee(leg.fee_amount())
        }
        LedgerType::Trade | LedgerType::Spend | LedgerType::Receive => {
            let ref_id = row.get("refid");
            let counterpart = ledger_type.counterpart();
            let sibling = ref_ids
                .get(ref_id)
                .into_iter()
                .flatten()
                .copied()
                .find(|i| {
                    !processed.contains(i)
                        && counterpart.as_ref() == Some(&LedgerType::parse(rows[*i].get("type")))
                })
                .ok_or_else(|| ctx.missing_component("refid", ref_id))?;
            processed.insert(sibling);

            let leg1 = Leg::from_row(row, ctx)?;
            let leg2 = match Leg::from_row(&rows[sibling], ctx) {
                Ok(leg) => leg,
                Err(err) => {
                    results[sibling] = Err(err);
                    return Ok(None);
                }
            };
            trade_from_legs(timestamp, ref_id, leg1, leg2, ctx)?
        }
        LedgerType::Transfer => {
            // movements between Kraken's own wallets, e.g. spot to staking
            return Ok(None);
        }
        LedgerType::Other(other) => {
            warn!("Unsupported type: 'Kraken:{}'. Audit will not match.", other);
            return Ok(None);
        }
    };

    Ok(Some(tx))
}

fn trade_from_legs(
    timestamp: DateTime<Utc>,
    ref_id: &str,
    leg1: Leg,
    leg2: Leg,
    ctx: &ParserContext,
) -> Result<TransactionOutRecord, DataRowError> {
    // Kraken charges the fee on one of the legs only
    if !leg1.fee.is_zero() && !leg2.fee.is_zero() {
        return Err(DataRowError::ConflictingFeeLegs {
            refid: ref_id.to_owned(),
            fee1: leg1.fee,
            fee2: leg2.fee,
        });
    }
    let fee = leg1.fee_amount().or_else(|| leg2.fee_amount());

    let (sell, buy) = if leg1.amount.is_sign_negative() && leg2.amount.is_sign_positive() {
        (leg1, leg2)
    } else if leg2.amount.is_sign_negative() && leg1.amount.is_sign_positive() {
        (leg2, leg1)
    } else {
        return Err(ctx.unexpected_content("amount", &leg1.amount.to_string()));
    };

    Ok(TransactionOutRecord::trade(
        timestamp,
        Amount::new(buy.amount.abs(), buy.asset),
        Amount::new(sell.amount.abs(), sell.asset),
        WALLET,
    )
    .with_fee(fee))
}

#[derive(Debug, Clone, Copy, PartialEq, EnumString)]
#[strum(serialize_all = "lowercase")]
enum TradeType {
    Buy,
    Sell,
}

/// Converts one row of a Kraken trades export.
fn parse_kraken_trades(row: &DataRow, ctx: &ParserContext) -> RowResult {
    let timestamp = ctx.timestamp(row, "time")?;

    let pair = row.get("pair");
    let (base, quote) = split_trading_pair(pair).ok_or_else(|| ctx.unexpected_trading_pair("pair", pair))?;
    let (base, quote) = (normalize_asset(base), normalize_asset(quote));

    let trade_type: TradeType = row
        .get("type")
        .parse()
        .map_err(|_| ctx.unexpected_type("type", row.get("type")))?;

    let base_amount = Amount::new(ctx.decimal(row, "vol")?.abs(), base);
    let quote_amount = Amount::new(ctx.decimal(row, "cost")?.abs(), quote.clone());
    let fee = ctx
        .optional_decimal(row, "fee")?
        .and_then(|fee| Amount::new(fee.abs(), quote).non_zero());

    let tx = match trade_type {
        TradeType::Buy => TransactionOutRecord::trade(timestamp, base_amount, quote_amount, WALLET),
        TradeType::Sell => TransactionOutRecord::trade(timestamp, quote_amount, base_amount, WALLET),
    };

    Ok(Some(tx.with_fee(fee)))
}

const LEDGER_HEADERS: &[HeaderColumn] = &header_names([
    "txid", "refid", "time", "type", "subtype", "aclass", "asset", "amount", "fee", "balance",
]);

const LEDGER_WALLET_HEADERS: &[HeaderColumn] = &header_names([
    "txid", "refid", "time", "type", "subtype", "aclass", "asset", "wallet", "amount", "fee", "balance",
]);

const TRADES_HEADERS: &[HeaderColumn] = &header_names([
    "txid", "ordertxid", "pair", "time", "type", "ordertype", "price", "cost", "fee", "vol",
    "margin", "misc", "ledgers",
]);

const TRADES_POSITION_HEADERS: &[HeaderColumn] = &header_names([
    "txid", "ordertxid", "pair", "time", "type", "ordertype", "price", "cost", "fee", "vol",
    "margin", "misc", "ledgers", "postxid", "posstatus", "cprice", "ccost", "cfee", "cvol",
    "cmargin", "net", "trades",
]);

#[distributed_slice(crate::DATA_PARSERS)]
static KRAKEN_LEDGER_CSV: DataParser = DataParser {
    parser_type: ParserType::Exchange,
    name: "Kraken Deposits/Withdrawals",
    worksheet_name: "Kraken D,W",
    csv: &[CsvSpec::new(LEDGER_HEADERS), CsvSpec::new(LEDGER_WALLET_HEADERS)],
    handler: Handler::All(parse_kraken_ledger),
};

#[distributed_slice(crate::DATA_PARSERS)]
static KRAKEN_TRADES_CSV: DataParser = DataParser {
    parser_type: ParserType::Exchange,
    name: "Kraken Trades",
    worksheet_name: "Kraken T",
    csv: &[CsvSpec::new(TRADES_POSITION_HEADERS), CsvSpec::new(TRADES_HEADERS)],
    handler: Handler::Row(parse_kraken_trades),
};
