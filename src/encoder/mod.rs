//! Encode raw COPY rows as INSERT statements.
//!
//! Two steps per row:
//! - tokenize: split on unescaped tabs, honoring the COPY backslash escapes
//!   (\N, \t, \n, \\)
//! - classify: decide per field whether it becomes NULL, a bare numeric
//!   literal, or a quoted string literal
//!
//! Classification is purely lexical. No schema type information is consulted,
//! so a numeric-looking text column comes out unquoted and a string that looks
//! like a timestamp gets the timestamp treatment. That trade-off is inherent
//! to converting dump text without a schema.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extractor::DumpBlock;

/// COPY NULL marker as it appears in the raw data.
const NULL_MARKER: &str = "\\N";

/// Per-row failure during encoding. The row is skipped and reported; the run
/// continues.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// A lone backslash at end of line, with no character to escape.
    UnterminatedEscape,
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::UnterminatedEscape => {
                write!(f, "unterminated escape sequence at end of line")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// Split one raw COPY row into its fields.
///
/// Tabs delimit fields unless preceded by a backslash. `\N` stays as the
/// two-character NULL marker for the classifier; `\t`, `\n` and `\\` decode to
/// the literal character; a backslash before any other character is kept and
/// the next character is processed normally. An empty accumulator at end of
/// line is dropped, so an empty trailing field is lost (known gap in the COPY
/// row contract, kept as-is).
pub fn tokenize_row(line: &str) -> Result<Vec<String>, EncodeError> {
    let mut fields = Vec::new();
    let mut acc = String::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some('N') => {
                    chars.next();
                    acc.push_str(NULL_MARKER);
                }
                Some('t') => {
                    chars.next();
                    acc.push('\t');
                }
                Some('n') => {
                    chars.next();
                    acc.push('\n');
                }
                Some('\\') => {
                    chars.next();
                    acc.push('\\');
                }
                Some(_) => acc.push('\\'),
                None => return Err(EncodeError::UnterminatedEscape),
            },
            '\t' => fields.push(std::mem::take(&mut acc)),
            _ => acc.push(c),
        }
    }

    if !acc.is_empty() {
        fields.push(acc);
    }

    Ok(fields)
}

static RE_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap());

static RE_DATE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap());

/// Render one decoded field as a SQL literal. First match wins:
///
/// 1. `\N` or empty → `NULL`
/// 2. integer/decimal shape → unquoted, as-is
/// 3. `t` / `f` → `'t'` / `'f'`
/// 4. `{...}` / `[...]` (array/JSON textual forms) → quoted, quotes doubled
/// 5. date prefix plus a colon (timestamp heuristic) → quoted, quotes doubled
/// 6. anything else → quoted, quotes doubled, NUL bytes stripped
pub fn format_field(field: &str) -> String {
    if field == NULL_MARKER || field.is_empty() {
        return "NULL".to_string();
    }

    if RE_NUMERIC.is_match(field) {
        return field.to_string();
    }

    if field == "t" || field == "f" {
        return format!("'{field}'");
    }

    let bracketed = (field.starts_with('{') && field.ends_with('}'))
        || (field.starts_with('[') && field.ends_with(']'));
    if bracketed {
        return format!("'{}'", field.replace('\'', "''"));
    }

    if RE_DATE_PREFIX.is_match(field) && field.contains(':') {
        return format!("'{}'", field.replace('\'', "''"));
    }

    format!("'{}'", field.replace('\'', "''").replace('\0', ""))
}

/// Encode one raw row as a full INSERT statement for its block's table.
pub fn encode_row(block: &DumpBlock, line: &str) -> Result<String, EncodeError> {
    let fields = tokenize_row(line)?;
    let values: Vec<String> = fields.iter().map(|f| format_field(f)).collect();
    let columns: Vec<String> = block.columns.iter().map(|c| format!("\"{c}\"")).collect();

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING;",
        block.qualified_name(),
        columns.join(", "),
        values.join(", ")
    ))
}
