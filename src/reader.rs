use std::{fmt, path::Path};

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use crate::{
    base::TransactionOutRecord,
    data_parser::{find_parser, known_delimiters, DataParser, DataRow, ParserContext},
    error::DataRowError,
    time::TimestampHints,
};

const UTF8_BOM: char = '\u{feff}';

/// A row that could not be converted, with enough context to find it again.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RowFailure {
    pub filename: String,
    pub worksheet: String,
    pub line_num: usize,
    pub row: String,
    pub error: DataRowError,
}

impl fmt::Display for RowFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({}) line {}: {} {}",
            self.filename, self.worksheet, self.line_num, self.error, self.row
        )
    }
}

#[derive(Debug)]
pub(crate) struct ConvertedFile {
    pub parser: &'static DataParser,
    pub records: Vec<TransactionOutRecord>,
    pub failures: Vec<RowFailure>,
}

fn csv_reader(data: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data.as_bytes())
}

/// Finds the delimiter and parser under which the header row is recognized.
fn detect_format(data: &str) -> Result<(u8, Vec<String>, &'static DataParser)> {
    let mut first_header = None;
    for delimiter in known_delimiters() {
        let mut rdr = csv_reader(data, delimiter);
        let header: Vec<String> = rdr
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, column)| {
                if i == 0 {
                    column.trim_start_matches(UTF8_BOM).to_owned()
                } else {
                    column.to_owned()
                }
            })
            .collect();

        if let Some(parser) = find_parser(&header, delimiter) {
            return Ok((delimiter, header, parser));
        }
        first_header.get_or_insert(header);
    }
    Err(anyhow!("unrecognised header {:?}", first_header.unwrap_or_default()))
}

fn read_rows(data: &str, delimiter: u8, header: &[String]) -> Result<Vec<DataRow>> {
    let mut rdr = csv_reader(data, delimiter);
    let mut rows = Vec::new();
    for (index, record) in rdr.records().enumerate() {
        let record = record?;
        let line_num = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(index + 2);
        rows.push(DataRow::new(line_num, header, record.iter().map(str::to_owned).collect()));
    }
    Ok(rows)
}

/// Converts the contents of one export, named `filename` in diagnostics.
pub(crate) fn convert_data(data: &str, filename: &str, hints: TimestampHints) -> Result<ConvertedFile> {
    let (delimiter, header, parser) = detect_format(data)?;
    info!("\"{}\" matches '{}' ({})", filename, parser.name, parser.parser_type);

    let rows = read_rows(data, delimiter, &header)?;
    let ctx = ParserContext {
        filename: filename.to_owned(),
        worksheet: Some(parser.worksheet_name.to_owned()),
        header,
        hints,
    };

    let mut records = Vec::new();
    let mut failures = Vec::new();
    for (row, result) in rows.iter().zip(parser.parse(&rows, &ctx)) {
        match result {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(error) => {
                let failure = RowFailure {
                    filename: filename.to_owned(),
                    worksheet: parser.worksheet_name.to_owned(),
                    line_num: row.line_num,
                    row: row.to_string(),
                    error,
                };
                warn!("{}", failure);
                failures.push(failure);
            }
        }
    }

    info!(
        "\"{}\": {} rows, {} records, {} failures",
        filename,
        rows.len(),
        records.len(),
        failures.len()
    );

    Ok(ConvertedFile {
        parser,
        records,
        failures,
    })
}

pub(crate) fn convert_file(input_path: &Path, hints: TimestampHints) -> Result<ConvertedFile> {
    let data = std::fs::read_to_string(input_path)
        .with_context(|| format!("failed to read {}", input_path.display()))?;
    let filename = input_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input_path.display().to_string());
    convert_data(&data, &filename, hints).with_context(|| format!("failed to convert {}", input_path.display()))
}
