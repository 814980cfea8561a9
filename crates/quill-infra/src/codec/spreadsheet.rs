//! [`PostCodec`] over calamine (xlsx reading), csv (CSV reading) and
//! rust_xlsxwriter (xlsx writing).

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use quill_core::domain::{Post, PostRow};
use quill_core::ports::{CodecError, PostCodec, SheetFormat};

const TITLE: &str = "title";
const BODY: &str = "body";
const SHEET_NAME: &str = "posts";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Most characters an xlsx cell can hold.
pub const XLSX_CELL_MAX_CHARS: usize = 32_767;

/// A sheet row: its 1-based line number and its cells, blank cells as `None`.
type GridRow = (usize, Vec<Option<String>>);

/// Reads `.xlsx` and `.csv`, writes `.xlsx`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpreadsheetCodec;

impl SpreadsheetCodec {
    pub fn new() -> Self {
        Self
    }

    fn read_xlsx(bytes: &[u8]) -> Result<Vec<GridRow>, CodecError> {
        let malformed = |reason: String| CodecError::Malformed {
            format: SheetFormat::Xlsx,
            reason,
        };

        let mut workbook: Xlsx<_> =
            Xlsx::new(Cursor::new(bytes)).map_err(|e| malformed(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| malformed("workbook has no worksheets".to_string()))?
            .map_err(|e| malformed(e.to_string()))?;

        let first_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
        Ok(range
            .rows()
            .enumerate()
            .map(|(i, cells)| (first_line + i, cells.iter().map(cell_text).collect()))
            .collect())
    }

    fn read_csv(bytes: &[u8]) -> Result<Vec<GridRow>, CodecError> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut grid = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| CodecError::Malformed {
                format: SheetFormat::Csv,
                reason: e.to_string(),
            })?;
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(i + 1);
            grid.push((line, record.iter().map(field_text).collect()));
        }
        Ok(grid)
    }
}

impl PostCodec for SpreadsheetCodec {
    fn decode(&self, bytes: &[u8], format: SheetFormat) -> Result<Vec<PostRow>, CodecError> {
        let grid = match format {
            SheetFormat::Xlsx => Self::read_xlsx(bytes)?,
            SheetFormat::Csv => Self::read_csv(bytes)?,
        };
        let rows = rows_from_grid(grid)?;
        tracing::debug!(rows = rows.len(), %format, "Decoded import file");
        Ok(rows)
    }

    fn encode(&self, posts: &[Post]) -> Result<Vec<u8>, CodecError> {
        write_xlsx(posts).map_err(|e| CodecError::Write(e.to_string()))
    }

    fn export_format(&self) -> SheetFormat {
        SheetFormat::Xlsx
    }
}

fn write_xlsx(posts: &[Post]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let bold = Format::new().set_bold();
    sheet.write_string_with_format(0, 0, TITLE, &bold)?;
    sheet.write_string_with_format(0, 1, BODY, &bold)?;

    for (row, post) in (1u32..).zip(posts) {
        sheet.write_string(row, 0, fit_cell(post.id, TITLE, &post.title))?;
        sheet.write_string(row, 1, fit_cell(post.id, BODY, &post.body))?;
    }

    workbook.save_to_buffer()
}

/// Cut `text` to what an xlsx cell can hold.
fn fit_cell<'a>(post_id: i64, field: &'static str, text: &'a str) -> &'a str {
    match text.char_indices().nth(XLSX_CELL_MAX_CHARS) {
        Some((end, _)) => {
            tracing::warn!(
                post_id,
                field,
                limit = XLSX_CELL_MAX_CHARS,
                "Exported cell truncated"
            );
            &text[..end]
        }
        None => text,
    }
}

/// Turn a grid into record candidates using its first non-blank row as header.
fn rows_from_grid(grid: Vec<GridRow>) -> Result<Vec<PostRow>, CodecError> {
    let mut rows = grid
        .into_iter()
        .filter(|(_, cells)| cells.iter().any(Option::is_some));

    let (_, header) = rows.next().ok_or(CodecError::MissingColumn(TITLE))?;
    let title_col = column(&header, TITLE)?;
    let body_col = column(&header, BODY)?;

    Ok(rows
        .map(|(line, mut cells)| PostRow {
            line,
            title: cells.get_mut(title_col).and_then(Option::take),
            body: cells.get_mut(body_col).and_then(Option::take),
        })
        .collect())
}

fn column(header: &[Option<String>], name: &'static str) -> Result<usize, CodecError> {
    header
        .iter()
        .position(|cell| {
            cell.as_deref()
                .is_some_and(|h| h.trim().eq_ignore_ascii_case(name))
        })
        .ok_or(CodecError::MissingColumn(name))
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => field_text(&unescape_ooxml(s)),
        other => Some(other.to_string()),
    }
}

/// Decode OOXML `_xHHHH_` escapes, which calamine leaves in shared strings.
///
/// Writers emit them for control characters such as `\r`, and escape a
/// literal `_xHHHH_` run as `_x005F_xHHHH_`.
fn unescape_ooxml(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("_x") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .get(2..6)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .filter(|_| tail.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[7..];
            }
            None => {
                out.push_str("_x");
                rest = &tail[2..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn field_text(field: &str) -> Option<String> {
    (!field.is_empty()).then(|| field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use quill_core::domain;

    fn post(id: i64, title: &str, body: &str) -> Post {
        let at = domain::now();
        Post {
            id,
            title: title.to_string(),
            body: body.to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    fn pairs(rows: &[PostRow]) -> Vec<(Option<&str>, Option<&str>)> {
        rows.iter()
            .map(|r| (r.title.as_deref(), r.body.as_deref()))
            .collect()
    }

    #[test]
    fn test_decode_csv() {
        let codec = SpreadsheetCodec::new();
        let rows = codec
            .decode(b"title,body\nA,B\nC,D\n", SheetFormat::Csv)
            .unwrap();

        assert_eq!(pairs(&rows), vec![(Some("A"), Some("B")), (Some("C"), Some("D"))]);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn test_decode_csv_header_is_flexible() {
        let codec = SpreadsheetCodec::new();
        let csv = "\u{feff}id, Body ,TITLE\n1,\"multi\nline\",First\n2,,Second\n";
        let rows = codec.decode(csv.as_bytes(), SheetFormat::Csv).unwrap();

        assert_eq!(
            pairs(&rows),
            vec![(Some("First"), Some("multi\nline")), (Some("Second"), None)]
        );
        assert_eq!(rows[1].line, 4);
    }

    #[test]
    fn test_decode_csv_ragged_row_gives_missing_body() {
        let codec = SpreadsheetCodec::new();
        let rows = codec
            .decode(b"title,body\nonly-title\n", SheetFormat::Csv)
            .unwrap();
        assert_eq!(pairs(&rows), vec![(Some("only-title"), None)]);
    }

    #[test]
    fn test_decode_requires_both_columns() {
        let codec = SpreadsheetCodec::new();
        let err = codec
            .decode(b"title,content\nA,B\n", SheetFormat::Csv)
            .unwrap_err();
        assert!(matches!(err, CodecError::MissingColumn("body")));

        let err = codec.decode(b"", SheetFormat::Csv).unwrap_err();
        assert!(matches!(err, CodecError::MissingColumn("title")));
    }

    #[test]
    fn test_decode_rejects_garbage_xlsx() {
        let codec = SpreadsheetCodec::new();
        let err = codec
            .decode(b"title,body\nA,B\n", SheetFormat::Xlsx)
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::Malformed {
                format: SheetFormat::Xlsx,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_xlsx_written_elsewhere() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Body").unwrap();
        sheet.write_string(0, 1, "Title").unwrap();
        sheet.write_string(1, 0, "text").unwrap();
        sheet.write_number(1, 1, 42).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let rows = SpreadsheetCodec::new()
            .decode(&bytes, SheetFormat::Xlsx)
            .unwrap();
        assert_eq!(pairs(&rows), vec![(Some("42"), Some("text"))]);
        assert_eq!(rows[0].line, 2);
    }

    #[test]
    fn test_export_then_import_keeps_pairs() {
        let codec = SpreadsheetCodec::new();
        let posts = vec![
            post(1, "Hello", "World"),
            post(2, "Second post", "line one\nline two"),
            post(5, "Ünïcødé", "body, with \"quotes\""),
            post(6, "Windows lines", "a\r\nb"),
            post(7, "Escape lookalike", "_x000D_ literal"),
        ];

        let bytes = codec.encode(&posts).unwrap();
        let rows = codec.decode(&bytes, SheetFormat::Xlsx).unwrap();

        let expected: Vec<(Option<&str>, Option<&str>)> = posts
            .iter()
            .map(|p| (Some(p.title.as_str()), Some(p.body.as_str())))
            .collect();
        assert_eq!(pairs(&rows), expected);
    }

    #[test]
    fn test_unescape_ooxml() {
        assert_eq!(unescape_ooxml("a_x000D_\nb"), "a\r\nb");
        assert_eq!(unescape_ooxml("_x005F_x000D_ literal"), "_x000D_ literal");
        assert_eq!(unescape_ooxml("snake_x_case _x12_ _xZZZZ_"), "snake_x_case _x12_ _xZZZZ_");
        assert_eq!(unescape_ooxml("tail_x00"), "tail_x00");
    }

    #[test]
    fn test_export_truncates_oversized_cells() {
        let codec = SpreadsheetCodec::new();
        let long = "é".repeat(40_000);
        let bytes = codec.encode(&[post(1, "t", &long)]).unwrap();

        let rows = codec.decode(&bytes, SheetFormat::Xlsx).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title.as_deref(), Some("t"));
        let body = rows[0].body.as_deref().unwrap();
        assert_eq!(body.chars().count(), XLSX_CELL_MAX_CHARS);
        assert!(body.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_export_of_nothing_is_header_only() {
        let codec = SpreadsheetCodec::new();
        let bytes = codec.encode(&[]).unwrap();
        assert!(codec.decode(&bytes, SheetFormat::Xlsx).unwrap().is_empty());
    }
}
