//! Streaming reader for Excel 2003 XML ("SpreadsheetML") workbooks.
//!
//! Only the structure the importers need is kept: worksheets, their tables,
//! rows and cell text. Element names are matched by local name, so documents
//! with or without the `ss:` prefix read the same.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SpreadsheetError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },
    #[error("{element} ss:Index {index} at byte {position} {reason}")]
    BadIndex {
        element: &'static str,
        index: usize,
        position: u64,
        reason: &'static str,
    },
}

/// Excel 2003 worksheet bounds.
pub const MAX_ROWS: usize = 65_536;
pub const MAX_COLUMNS: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    /// The `ss:Type` of the cell's `Data` element (`String`, `Number`, `DateTime`, ...).
    pub data_type: Option<String>,
    pub text: String,
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn cell_text(&self, idx: usize) -> Option<&str> {
        self.cells.get(idx).map(|c| c.text.trim())
    }

    pub fn first_text(&self) -> Option<&str> {
        self.non_blank_cells().next().map(|c| c.text.trim())
    }

    pub fn non_blank_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| !c.is_blank())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Worksheet {
    pub name: String,
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    pub worksheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn tables(&self) -> impl Iterator<Item = (&Worksheet, &Table)> {
        self.worksheets
            .iter()
            .flat_map(|ws| ws.tables.iter().map(move |t| (ws, t)))
    }
}

pub fn read_workbook(path: &Path) -> Result<Workbook, SpreadsheetError> {
    let file = File::open(path).map_err(|source| SpreadsheetError::Open {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    parse_workbook(BufReader::new(file))
}

pub fn parse_workbook<R: BufRead>(input: R) -> Result<Workbook, SpreadsheetError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut book = Workbook::default();
    let mut table: Option<Table> = None;
    let mut row: Option<Row> = None;
    let mut cell: Option<Cell> = None;
    let mut comment_depth = 0usize;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let event = match reader.read_event_into(&mut buf) {
            Ok(ev) => ev,
            Err(e) => {
                return Err(SpreadsheetError::Xml {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                })
            }
        };
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"Worksheet" => {
                        book.worksheets.push(Worksheet {
                            name: attr(e, b"Name").unwrap_or_default(),
                            tables: Vec::new(),
                        });
                    }
                    b"Table" => {
                        table = Some(Table::default());
                        if is_empty {
                            finish_table(&mut book, table.take());
                        }
                    }
                    b"Row" => {
                        if let Some(t) = table.as_mut() {
                            pad_to_index(
                                &mut t.rows,
                                index_attr(e),
                                MAX_ROWS,
                                "Row",
                                reader.buffer_position() as u64,
                            )?;
                            row = Some(Row::default());
                            if is_empty {
                                t.rows.extend(row.take());
                            }
                        }
                    }
                    b"Cell" => {
                        if let Some(r) = row.as_mut() {
                            pad_to_index(
                                &mut r.cells,
                                index_attr(e),
                                MAX_COLUMNS,
                                "Cell",
                                reader.buffer_position() as u64,
                            )?;
                            cell = Some(Cell::default());
                            if is_empty {
                                r.cells.extend(cell.take());
                            }
                        }
                    }
                    b"Data" if comment_depth == 0 => {
                        if let Some(c) = cell.as_mut() {
                            c.data_type = attr(e, b"Type");
                        }
                    }
                    b"Comment" if !is_empty => comment_depth += 1,
                    _ => {}
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"Cell" => {
                    if let (Some(r), Some(c)) = (row.as_mut(), cell.take()) {
                        r.cells.push(c);
                    }
                }
                b"Row" => {
                    if let (Some(t), Some(r)) = (table.as_mut(), row.take()) {
                        t.rows.push(r);
                    }
                }
                b"Table" => finish_table(&mut book, table.take()),
                b"Comment" => comment_depth = comment_depth.saturating_sub(1),
                _ => {}
            },
            Event::Text(ref t) => {
                if comment_depth == 0 {
                    if let Some(c) = cell.as_mut() {
                        let text = t.unescape().map_err(|e| SpreadsheetError::Xml {
                            position: reader.buffer_position() as u64,
                            message: e.to_string(),
                        })?;
                        c.text.push_str(&text);
                    }
                }
            }
            Event::CData(ref t) => {
                if comment_depth == 0 {
                    if let Some(c) = cell.as_mut() {
                        c.text.push_str(&String::from_utf8_lossy(t.as_ref()));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(book)
}

fn finish_table(book: &mut Workbook, table: Option<Table>) {
    let Some(table) = table else {
        return;
    };
    if book.worksheets.is_empty() {
        book.worksheets.push(Worksheet::default());
    }
    if let Some(ws) = book.worksheets.last_mut() {
        ws.tables.push(table);
    }
}

/// `ss:Index` is 1-based and lets rows and cells skip forward; fill the gap with blanks.
fn pad_to_index<T: Default>(
    items: &mut Vec<T>,
    index: Option<usize>,
    limit: usize,
    element: &'static str,
    position: u64,
) -> Result<(), SpreadsheetError> {
    let Some(idx) = index else {
        return Ok(());
    };
    let bad = |reason| SpreadsheetError::BadIndex {
        element,
        index: idx,
        position,
        reason,
    };
    if idx > limit {
        return Err(bad("is past the worksheet limit"));
    }
    if idx <= items.len() {
        return Err(bad("does not move forward"));
    }
    items.resize_with(idx - 1, T::default);
    Ok(())
}

fn index_attr(e: &BytesStart<'_>) -> Option<usize> {
    attr(e, b"Index").and_then(|v| v.trim().parse::<usize>().ok())
}

fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<Workbook xmlns="urn:schemas-microsoft-com:office:spreadsheet"
 xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
 <Worksheet ss:Name="Belconnen">
  <Table>
   <Row><Cell><Data ss:Type="String">Belconnen</Data></Cell></Row>
   <Row/>
   <Row>
    <Cell ss:Index="2"><Data ss:Type="DateTime">2015-01-01T00:00:00.000</Data></Cell>
    <Cell><Data ss:Type="DateTime">2015-02-01T00:00:00.000</Data></Cell>
   </Row>
   <Row ss:Index="5">
    <Cell><Data ss:Type="String">Fraud &amp; deception</Data><Comment><Data>note</Data></Comment></Cell>
    <Cell/>
    <Cell><Data ss:Type="Number">7</Data></Cell>
   </Row>
  </Table>
 </Worksheet>
 <Worksheet ss:Name="Empty"><Table/></Worksheet>
</Workbook>"#;

    #[test]
    fn reads_tables_rows_and_cells() {
        let book = parse_workbook(SAMPLE.as_bytes()).expect("parse");
        assert_eq!(book.worksheets.len(), 2);
        assert_eq!(book.worksheets[0].name, "Belconnen");
        assert_eq!(book.worksheets[1].tables.len(), 1);
        assert!(book.worksheets[1].tables[0].rows.is_empty());

        let table = &book.worksheets[0].tables[0];
        assert_eq!(table.rows[0].first_text(), Some("Belconnen"));
        assert!(table.rows[1].cells.is_empty());
        assert_eq!(
            table.rows[2].cells[0].data_type.as_deref(),
            None,
            "ss:Index pads the leading label column"
        );
        assert_eq!(
            table.rows[2].cells[1].data_type.as_deref(),
            Some("DateTime")
        );
        assert_eq!(table.rows[2].non_blank_cells().count(), 2);
    }

    #[test]
    fn row_index_inserts_blank_rows_and_comments_are_ignored() {
        let book = parse_workbook(SAMPLE.as_bytes()).expect("parse");
        let table = &book.worksheets[0].tables[0];
        assert_eq!(table.rows.len(), 5);
        assert!(table.rows[3].cells.is_empty());
        let offence = &table.rows[4];
        assert_eq!(offence.cell_text(0), Some("Fraud & deception"));
        assert!(offence.cells[1].is_blank());
        assert_eq!(offence.cell_text(2), Some("7"));
    }

    #[test]
    fn oversized_cell_index_is_rejected() {
        let xml = r#"<Workbook><Worksheet><Table><Row><Cell ss:Index="400000000"><Data>1</Data></Cell></Row></Table></Worksheet></Workbook>"#;
        let err = parse_workbook(xml.as_bytes()).expect_err("index past column limit");
        assert!(matches!(
            err,
            SpreadsheetError::BadIndex {
                element: "Cell",
                index: 400_000_000,
                ..
            }
        ));
    }

    #[test]
    fn oversized_row_index_is_rejected() {
        let xml = format!(
            r#"<Workbook><Worksheet><Table><Row ss:Index="{}"/></Table></Worksheet></Workbook>"#,
            MAX_ROWS + 1
        );
        let err = parse_workbook(xml.as_bytes()).expect_err("index past row limit");
        assert!(matches!(err, SpreadsheetError::BadIndex { element: "Row", .. }));
    }

    #[test]
    fn backwards_index_is_rejected() {
        let xml = r#"<Workbook><Worksheet><Table><Row><Cell><Data>a</Data></Cell><Cell><Data>b</Data></Cell><Cell ss:Index="2"><Data>c</Data></Cell></Row></Table></Worksheet></Workbook>"#;
        let err = parse_workbook(xml.as_bytes()).expect_err("index goes backwards");
        assert!(matches!(
            err,
            SpreadsheetError::BadIndex {
                element: "Cell",
                index: 2,
                ..
            }
        ));
    }

    #[test]
    fn malformed_xml_reports_position() {
        let err = parse_workbook("<Workbook><Worksheet></Workbook>".as_bytes())
            .expect_err("mismatched tags");
        assert!(matches!(err, SpreadsheetError::Xml { .. }));
    }
}
