use std::io::Read;

/// One input row as `(header, cell)` pairs in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRow {
    pub cells: Vec<(String, String)>,
}

impl ImportRow {
    pub fn new<H, V>(cells: impl IntoIterator<Item = (H, V)>) -> Self
    where
        H: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: cells
                .into_iter()
                .map(|(header, value)| (header.into(), value.into()))
                .collect(),
        }
    }
}

/// Reads a headered CSV. Cells are trimmed; short or long rows are accepted and cells
/// beyond the header row are ignored.
pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<ImportRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let cells = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        rows.push(ImportRow { cells });
    }

    Ok(rows)
}
