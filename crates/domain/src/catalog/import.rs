//! Category bulk import from semicolon-separated text.
//!
//! The first record is a header and is skipped. Each following record holds
//! a category name and an active flag:
//!
//! ```text
//! name;is_active
//! Books;true
//! "Garden; Outdoor";0
//! ```
//!
//! Fields may be wrapped in double quotes, RFC 4180 style: a quoted field can
//! contain separators and line breaks, and `""` inside it stands for one
//! quote character.

use serde::Serialize;

use crate::error::{DomainError, Result};
use crate::limits::{MAX_NAME_LEN, check_length};

const SEPARATOR: char = ';';
const QUOTE: char = '"';

/// One parsed category row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRow {
    pub name: String,
    pub is_active: bool,
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Categories created by this import.
    pub added: usize,
    /// Rows skipped because a category with that name already existed.
    pub existing: usize,
}

/// Parses every data record of `input`. Blank lines are ignored.
pub fn parse_categories(input: &str) -> Result<Vec<CategoryRow>> {
    split_records(input)?
        .into_iter()
        .skip(1)
        .filter(|record| !record.is_blank())
        .map(parse_row)
        .collect()
}

/// A record and the line it starts on.
struct Record {
    line: usize,
    fields: Vec<String>,
}

impl Record {
    fn is_blank(&self) -> bool {
        self.fields.iter().all(|field| field.is_empty())
    }
}

/// Accumulates one field. Unquoted fields are trimmed; quoted fields keep
/// their content verbatim.
#[derive(Default)]
struct Field {
    text: String,
    quoted: bool,
}

impl Field {
    fn finish(&mut self) -> String {
        let text = std::mem::take(&mut self.text);
        let quoted = std::mem::replace(&mut self.quoted, false);
        if quoted { text } else { text.trim().to_string() }
    }
}

fn split_records(input: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = Field::default();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                QUOTE if chars.peek() == Some(&QUOTE) => {
                    chars.next();
                    field.text.push(QUOTE);
                }
                QUOTE => in_quotes = false,
                _ => {
                    if c == '\n' {
                        line += 1;
                    }
                    field.text.push(c);
                }
            }
            continue;
        }

        match c {
            QUOTE if !field.quoted && field.text.trim().is_empty() => {
                field.text.clear();
                field.quoted = true;
                in_quotes = true;
            }
            SEPARATOR => fields.push(field.finish()),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(field.finish());
                records.push(Record {
                    line: record_line,
                    fields: std::mem::take(&mut fields),
                });
                line += 1;
                record_line = line;
            }
            // Whitespace between a closing quote and the separator.
            c if field.quoted && c.is_whitespace() => {}
            _ => field.text.push(c),
        }
    }

    if in_quotes {
        return Err(DomainError::validation(format!(
            "line {record_line}: unterminated quoted field"
        )));
    }
    if field.quoted || !field.text.is_empty() || !fields.is_empty() {
        fields.push(field.finish());
        records.push(Record {
            line: record_line,
            fields,
        });
    }
    Ok(records)
}

fn parse_row(record: Record) -> Result<CategoryRow> {
    let line_number = record.line;
    let mut columns = record.fields.into_iter();

    let (Some(name), Some(flag)) = (columns.next(), columns.next()) else {
        return Err(DomainError::validation(format!(
            "line {line_number}: expected 'name{SEPARATOR}is_active'"
        )));
    };

    if name.is_empty() {
        return Err(DomainError::validation(format!(
            "line {line_number}: category name is empty"
        )));
    }
    check_length("category name", &name, MAX_NAME_LEN)
        .map_err(|e| DomainError::validation(format!("line {line_number}: {e}")))?;

    Ok(CategoryRow {
        is_active: parse_flag(&flag),
        name,
    })
}

/// Accepts the usual spellings of true; anything else is false.
fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "true" | "TRUE" | "True")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_header_and_blank_lines() {
        let rows = parse_categories("name;is_active\nBooks;true\n\nGarden;0\r\n").unwrap();

        assert_eq!(
            rows,
            vec![
                CategoryRow {
                    name: "Books".to_string(),
                    is_active: true
                },
                CategoryRow {
                    name: "Garden".to_string(),
                    is_active: false
                },
            ]
        );
    }

    #[test]
    fn unparsable_flag_means_inactive() {
        let rows = parse_categories("h;h\nToys;yes\nTools;T\n\"Music\";\"1\"").unwrap();

        assert!(!rows[0].is_active);
        assert!(rows[1].is_active);
        assert_eq!(rows[2].name, "Music");
        assert!(rows[2].is_active);
    }

    #[test]
    fn short_row_names_its_line() {
        let err = parse_categories("name;is_active\nBooks;true\nBroken").unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert!(err.to_string().starts_with("line 3:"));
    }

    #[test]
    fn quoted_fields_keep_separators_and_quotes() {
        let input = "name;is_active\n\"Books; Rare\";true\n\"Say \"\"Hi\"\"\" ; 1\nPlain ; 0\n";
        let rows = parse_categories(input).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].name, "Books; Rare");
        assert!(rows[0].is_active);
        assert_eq!(rows[1].name, "Say \"Hi\"");
        assert!(rows[1].is_active);
        assert_eq!(rows[2].name, "Plain");
        assert!(!rows[2].is_active);
    }

    #[test]
    fn quoted_line_break_counts_toward_later_line_numbers() {
        let input = "name;is_active\n\"Two\nLines\";1\nBroken\n";
        let err = parse_categories(input).unwrap_err();

        assert!(err.to_string().starts_with("line 4:"), "{err}");
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        let err = parse_categories("name;is_active\n\"Books;true\n").unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert!(err.to_string().starts_with("line 2:"));
    }

    #[test]
    fn overlong_name_names_its_line() {
        let input = format!("name;is_active\n{};1\n", "x".repeat(MAX_NAME_LEN + 1));
        let err = parse_categories(&input).unwrap_err();

        assert!(err.to_string().starts_with("line 2: category name"), "{err}");
    }

    #[test]
    fn header_only_yields_nothing() {
        assert!(parse_categories("name;is_active\n").unwrap().is_empty());
        assert!(parse_categories("").unwrap().is_empty());
    }
}
