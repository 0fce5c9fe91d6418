use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    base::TransactionOutRecord,
    error::DataRowError,
    time::{parse_timestamp, TimestampHints},
    DATA_PARSERS,
};

/// Outcome for one row: a record, nothing to record, or the reason it failed.
pub(crate) type RowResult = Result<Option<TransactionOutRecord>, DataRowError>;

pub(crate) type RowHandler = fn(&DataRow, &ParserContext) -> RowResult;

/// Batch handlers return exactly one result per input row, in input order.
pub(crate) type BatchHandler = fn(&[DataRow], &ParserContext) -> Vec<RowResult>;

/// One data row of an export, keyed by the header of its file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DataRow {
    pub line_num: usize,
    pub row: Vec<String>,
    pub row_dict: HashMap<String, String>,
}

impl DataRow {
    pub(crate) fn new(line_num: usize, header: &[String], row: Vec<String>) -> Self {
        let row_dict = header
            .iter()
            .cloned()
            .zip(row.iter().cloned())
            .collect();
        Self {
            line_num,
            row,
            row_dict,
        }
    }

    /// Value of the named column, empty when the row is short.
    pub(crate) fn get(&self, column: &str) -> &str {
        self.row_dict.get(column).map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for DataRow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let quoted: Vec<String> = self.row.iter().map(|value| format!("'{}'", value)).collect();
        write!(f, "[{}]", quoted.join(", "))
    }
}

/// Per-file information handed to every parser call, used for diagnostics.
#[derive(Debug, Clone)]
pub(crate) struct ParserContext {
    pub filename: String,
    pub worksheet: Option<String>,
    pub header: Vec<String>,
    pub hints: TimestampHints,
}

impl ParserContext {
    pub(crate) fn column_index(&self, column: &str) -> usize {
        self.header.iter().position(|c| c == column).unwrap_or_default()
    }

    pub(crate) fn unexpected_type(&self, column: &str, value: &str) -> DataRowError {
        DataRowError::UnexpectedType {
            col_num: self.column_index(column),
            col_name: column.to_owned(),
            value: value.to_owned(),
        }
    }

    pub(crate) fn unexpected_trading_pair(&self, column: &str, value: &str) -> DataRowError {
        DataRowError::UnexpectedTradingPair {
            col_num: self.column_index(column),
            col_name: column.to_owned(),
            value: value.to_owned(),
        }
    }

    pub(crate) fn missing_component(&self, column: &str, value: &str) -> DataRowError {
        DataRowError::MissingComponent {
            col_num: self.column_index(column),
            col_name: column.to_owned(),
            value: value.to_owned(),
        }
    }

    pub(crate) fn unexpected_content(&self, column: &str, value: &str) -> DataRowError {
        DataRowError::UnexpectedContent {
            col_num: self.column_index(column),
            col_name: column.to_owned(),
            value: value.to_owned(),
        }
    }

    pub(crate) fn format_error(&self) -> DataRowError {
        DataRowError::DataParserFormat {
            filename: self.filename.clone(),
            worksheet: self.worksheet.clone(),
        }
    }

    pub(crate) fn decimal(&self, row: &DataRow, column: &str) -> Result<Decimal, DataRowError> {
        let raw = row.get(column);
        parse_decimal(raw).ok_or_else(|| self.unexpected_content(column, raw))
    }

    /// Like [`ParserContext::decimal`], but an empty cell is `None`.
    pub(crate) fn optional_decimal(&self, row: &DataRow, column: &str) -> Result<Option<Decimal>, DataRowError> {
        if row.get(column).trim().is_empty() {
            Ok(None)
        } else {
            self.decimal(row, column).map(Some)
        }
    }

    pub(crate) fn timestamp(&self, row: &DataRow, column: &str) -> Result<DateTime<Utc>, DataRowError> {
        self.timestamp_with(row, column, &self.hints)
    }

    pub(crate) fn timestamp_with(
        &self,
        row: &DataRow,
        column: &str,
        hints: &TimestampHints,
    ) -> Result<DateTime<Utc>, DataRowError> {
        let raw = row.get(column);
        parse_timestamp(raw, hints).ok_or_else(|| self.unexpected_content(column, raw))
    }
}

/// Parses quantities as exported, tolerating thousands separators and
/// scientific notation.
pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    let mut raw = raw.trim();
    let owned: String;
    if raw.contains(',') {
        owned = raw.replace(',', "");
        raw = owned.as_str();
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// A column of a header signature.
#[derive(Clone, Copy)]
pub(crate) enum HeaderColumn {
    Name(&'static str),
    /// For columns whose name varies, like the currency of a fiat value column.
    Predicate(fn(&str) -> bool),
}

impl HeaderColumn {
    fn matches(&self, column: &str) -> bool {
        match self {
            HeaderColumn::Name(name) => *name == column,
            HeaderColumn::Predicate(predicate) => predicate(column),
        }
    }
}

impl fmt::Debug for HeaderColumn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HeaderColumn::Name(name) => write!(f, "{:?}", name),
            HeaderColumn::Predicate(_) => f.write_str("<predicate>"),
        }
    }
}

/// Header signature made of literal column names only.
pub(crate) const fn header_names<const N: usize>(columns: [&'static str; N]) -> [HeaderColumn; N] {
    let mut headers = [HeaderColumn::Name(""); N];
    let mut i = 0;
    while i < N {
        headers[i] = HeaderColumn::Name(columns[i]);
        i += 1;
    }
    headers
}

#[derive(Debug)]
pub(crate) struct CsvSpec {
    pub headers: &'static [HeaderColumn],
    pub delimiters: &'static [u8],
}

impl CsvSpec {
    pub(crate) const fn new(headers: &'static [HeaderColumn]) -> Self {
        Self {
            headers,
            delimiters: b",",
        }
    }

    pub(crate) fn matches(&self, header: &[String]) -> bool {
        self.headers.len() == header.len()
            && self
                .headers
                .iter()
                .zip(header)
                .all(|(expected, actual)| expected.matches(actual))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub(crate) enum ParserType {
    Exchange,
    Wallet,
}

#[derive(Debug)]
pub(crate) enum Handler {
    Row(RowHandler),
    /// For formats where records span several rows.
    All(BatchHandler),
}

#[derive(Debug)]
pub(crate) struct DataParser {
    pub parser_type: ParserType,
    pub name: &'static str,
    pub worksheet_name: &'static str,
    pub csv: &'static [CsvSpec],
    pub handler: Handler,
}

impl DataParser {
    pub(crate) fn matches(&self, header: &[String], delimiter: u8) -> bool {
        self.csv
            .iter()
            .any(|spec| spec.delimiters.contains(&delimiter) && spec.matches(header))
    }

    pub(crate) fn parse(&self, rows: &[DataRow], ctx: &ParserContext) -> Vec<RowResult> {
        match self.handler {
            Handler::Row(handler) => rows.iter().map(|row| handler(row, ctx)).collect(),
            Handler::All(handler) => handler(rows, ctx),
        }
    }
}

/// Finds the registered parser for a header row.
pub(crate) fn find_parser(header: &[String], delimiter: u8) -> Option<&'static DataParser> {
    DATA_PARSERS
        .iter()
        .find(|parser| parser.matches(header, delimiter))
}

/// Every delimiter some registered format may use.
pub(crate) fn known_delimiters() -> Vec<u8> {
    let mut delimiters: Vec<u8> = DATA_PARSERS
        .iter()
        .flat_map(|parser| parser.csv.iter())
        .flat_map(|spec| spec.delimiters.iter().copied())
        .collect();
    delimiters.sort_unstable();
    delimiters.dedup();
    delimiters
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// Builds rows the way the reader does, from an inline CSV export.
    pub(crate) fn rows_from_csv(data: &str) -> (Vec<String>, Vec<DataRow>) {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());
        let header: Vec<String> = rdr.headers().unwrap().iter().map(str::to_owned).collect();
        let rows = rdr
            .records()
            .enumerate()
            .map(|(index, record)| {
                let record = record.unwrap();
                DataRow::new(index + 2, &header, record.iter().map(str::to_owned).collect())
            })
            .collect();
        (header, rows)
    }

    pub(crate) fn context(header: &[String]) -> ParserContext {
        ParserContext {
            filename: "test.csv".to_owned(),
            worksheet: Some("Test".to_owned()),
            header: header.to_vec(),
            hints: TimestampHints::default(),
        }
    }

    fn fiat(column: &str) -> bool {
        column.starts_with("Fiat")
    }

    #[test]
    fn header_signature_with_predicate() {
        const HEADERS: &[HeaderColumn] = &[
            HeaderColumn::Name("Amount"),
            HeaderColumn::Predicate(fiat),
        ];
        let spec = CsvSpec::new(HEADERS);
        let header = |cols: &[&str]| cols.iter().map(|c| c.to_string()).collect::<Vec<_>>();

        assert!(spec.matches(&header(&["Amount", "Fiat (EUR)"])));
        assert!(spec.matches(&header(&["Amount", "Fiat (USD)"])));
        assert!(!spec.matches(&header(&["Amount", "Value"])));
        assert!(!spec.matches(&header(&["Amount"])));
    }

    #[test]
    fn decimals_as_exported() {
        assert_eq!(parse_decimal("10"), Some(dec!(10)));
        assert_eq!(parse_decimal(" -0.5 "), Some(dec!(-0.5)));
        assert_eq!(parse_decimal("1,234.5"), Some(dec!(1234.5)));
        assert_eq!(parse_decimal("1e-8"), Some(dec!(0.00000001)));
        assert_eq!(parse_decimal("ID 42"), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn row_fields_and_errors() {
        let (header, rows) = rows_from_csv("a,b\n1,x\n2\n");
        let ctx = context(&header);

        assert_eq!(rows[0].get("b"), "x");
        assert_eq!(rows[0].to_string(), "['1', 'x']");
        assert_eq!(rows[1].get("b"), "");
        assert_eq!(rows[1].line_num, 3);

        assert_eq!(ctx.decimal(&rows[0], "a"), Ok(dec!(1)));
        assert_eq!(ctx.optional_decimal(&rows[1], "b"), Ok(None));
        assert_eq!(
            ctx.decimal(&rows[0], "b"),
            Err(DataRowError::UnexpectedContent {
                col_num: 1,
                col_name: "b".to_owned(),
                value: "x".to_owned(),
            })
        );
    }

    #[test]
    fn every_registered_parser_is_distinct() {
        for parser in DATA_PARSERS.iter() {
            for spec in parser.csv {
                let header: Vec<String> = spec
                    .headers
                    .iter()
                    .map(|column| match column {
                        HeaderColumn::Name(name) => name.to_string(),
                        HeaderColumn::Predicate(_) => "Fiat (EUR)".to_owned(),
                    })
                    .collect();
                let found = find_parser(&header, spec.delimiters[0]).expect("registered header is found");
                assert_eq!(found.name, parser.name);
            }
        }
        assert!(known_delimiters().contains(&b','));
    }
}
