//! CSV loader: one `column: value` block per row.
//!
//! The first record is the header. Every following record is rendered as
//! `header: value` lines and records are separated by a blank line. Fields
//! may be quoted; quoted fields can contain delimiters, doubled quotes and
//! line breaks.

use super::error::{LoadError, LoadResult};
use super::{DocumentLoader, DocumentType, RawInput, require_upload};

/// Ingest CSV uploads as row-per-block text.
pub struct CsvLoader;

impl DocumentLoader for CsvLoader {
    fn load(&self, input: &RawInput) -> LoadResult<String> {
        let upload = require_upload(DocumentType::Csv, input)?;
        let content = String::from_utf8_lossy(&upload.bytes);
        let content = content.strip_prefix('\u{feff}').unwrap_or(&*content);

        let mut records = parse_records(content, ',')?.into_iter();
        let Some(headers) = records.next() else {
            return Err(LoadError::EmptyDocument {
                origin: upload.file_name.clone(),
            });
        };

        let rows: Vec<String> = records.map(|row| render_row(&headers, &row)).collect();
        if rows.is_empty() {
            return Err(LoadError::EmptyDocument {
                origin: upload.file_name.clone(),
            });
        }
        Ok(rows.join("\n\n"))
    }
}

/// Render one record against the header row. Surplus cells get positional
/// names; missing cells render empty.
fn render_row(headers: &[String], row: &[String]) -> String {
    let width = headers.len().max(row.len());
    (0..width)
        .map(|i| {
            let name = headers
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("column_{}", i + 1));
            let value = row.get(i).map(String::as_str).unwrap_or("");
            format!("{}: {}", name.trim(), value.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split CSV text into records of fields. Blank lines are skipped.
fn parse_records(content: &str, delimiter: char) -> LoadResult<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            c if c == delimiter => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(LoadError::Parse {
            format: "csv".into(),
            message: "unterminated quoted field".into(),
        });
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }
    Ok(records)
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.iter().all(|f| f.trim().is_empty());
    if !blank {
        records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Upload;

    fn load_csv(content: &str) -> LoadResult<String> {
        let input = RawInput::Upload(Upload::new("data.csv", content));
        CsvLoader.load(&input)
    }

    #[test]
    fn rows_render_as_header_value_blocks() {
        let text = load_csv("name,amount\nRent,1200\nFood,300\n").unwrap();
        assert_eq!(text, "name: Rent\namount: 1200\n\nname: Food\namount: 300");
    }

    #[test]
    fn quoted_fields_keep_delimiters_and_quotes() {
        let text = load_csv("item,note\n\"Desk, oak\",\"said \"\"sturdy\"\"\"\n").unwrap();
        assert_eq!(text, "item: Desk, oak\nnote: said \"sturdy\"");
    }

    #[test]
    fn quoted_field_spans_lines() {
        let text = load_csv("id,comment\r\n1,\"line one\nline two\"\r\n").unwrap();
        assert_eq!(text, "id: 1\ncomment: line one\nline two");
    }

    #[test]
    fn ragged_rows() {
        let text = load_csv("a,b\n1\n2,3,4\n").unwrap();
        assert_eq!(text, "a: 1\nb: \n\na: 2\nb: 3\ncolumn_3: 4");
    }

    #[test]
    fn header_without_rows_is_empty_document() {
        assert!(matches!(load_csv("a,b\n\n"), Err(LoadError::EmptyDocument { .. })));
    }

    #[test]
    fn empty_file_is_empty_document() {
        assert!(matches!(load_csv("\n\n"), Err(LoadError::EmptyDocument { .. })));
    }

    #[test]
    fn unterminated_quote_is_parse_error() {
        assert!(matches!(load_csv("a\n\"open"), Err(LoadError::Parse { .. })));
    }
}
