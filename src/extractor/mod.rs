//! Extract COPY FROM stdin data blocks from a PostgreSQL textual dump.
//!
//! Only `COPY schema."table" (col1, col2, ...) FROM stdin;` sections and their
//! terminating `\.` line are consumed; everything else in the dump (DDL,
//! session settings, comments) is ignored.

use once_cell::sync::Lazy;
use regex::Regex;

/// One table's worth of COPY data, captured verbatim from the dump.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpBlock {
    /// Schema name (e.g., "public")
    pub schema: String,
    /// Table name, without quotes
    pub table: String,
    /// Column list in declaration order, without quotes
    pub columns: Vec<String>,
    /// Raw tab-separated rows, one per line, untouched
    pub rows: Vec<String>,
}

impl DumpBlock {
    /// Schema-qualified table reference as it appears in generated SQL.
    pub fn qualified_name(&self) -> String {
        format!("{}.\"{}\"", self.schema, self.table)
    }
}

static RE_COPY_HEADER: Lazy<Regex> = Lazy::new(|| {
    // Schema-qualified identifier with the table double-quoted (quotes
    // optional on the schema), column list required, trailing semicolon
    // optional.
    Regex::new(r#"(?i)^COPY\s+"?(\w+)"?\."(\w+)"\s*\(([^)]+)\)\s+FROM\s+stdin;?\s*$"#)
        .unwrap()
});

/// COPY data terminator line.
const END_OF_DATA: &str = "\\.";

enum State {
    Scanning,
    Capturing(DumpBlock),
}

/// Parse a COPY header line into an empty block.
fn parse_header(line: &str) -> Option<DumpBlock> {
    let caps = RE_COPY_HEADER.captures(line)?;

    let schema = caps[1].to_string();
    let table = caps[2].to_string();
    let columns = caps[3]
        .split(',')
        .map(|c| c.trim().trim_matches('"').to_string())
        .collect();

    Some(DumpBlock {
        schema,
        table,
        columns,
        rows: Vec::new(),
    })
}

/// Scan the dump text and collect every terminated COPY block, in order.
///
/// Lines outside an open block are skipped. Rows between a header and its
/// `\.` terminator are kept verbatim, blank lines included. A block still
/// open at EOF is discarded.
pub fn extract_blocks(text: &str) -> Vec<DumpBlock> {
    let mut blocks = Vec::new();
    let mut state = State::Scanning;

    for raw_line in text.split('\n') {
        // Tolerate CRLF dumps
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        state = match state {
            State::Scanning => match parse_header(line) {
                Some(block) => State::Capturing(block),
                None => State::Scanning,
            },
            State::Capturing(mut block) => {
                if line == END_OF_DATA {
                    blocks.push(block);
                    State::Scanning
                } else {
                    block.rows.push(line.to_string());
                    State::Capturing(block)
                }
            }
        };
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_quoted() {
        let block = parse_header(r#"COPY public."media" ("id", "videoId") FROM stdin;"#).unwrap();
        assert_eq!(block.schema, "public");
        assert_eq!(block.table, "media");
        assert_eq!(block.columns, vec!["id", "videoId"]);
    }

    #[test]
    fn test_parse_header_unquoted_schema() {
        let block = parse_header(r#"COPY public."users" (id, name) FROM stdin;"#).unwrap();
        assert_eq!(block.schema, "public");
        assert_eq!(block.table, "users");
        assert_eq!(block.columns, vec!["id", "name"]);
    }

    #[test]
    fn test_parse_header_requires_quoted_table() {
        assert!(parse_header("COPY public.users (id, name) FROM stdin;").is_none());
    }

    #[test]
    fn test_parse_header_requires_schema() {
        assert!(parse_header(r#"COPY "users" (id) FROM stdin;"#).is_none());
    }

    #[test]
    fn test_parse_header_without_semicolon() {
        assert!(parse_header(r#"COPY public."users" (id) FROM stdin"#).is_some());
    }

    #[test]
    fn test_extract_single_block() {
        let dump = "SET client_encoding = 'UTF8';\n\
                    COPY public.\"users\" (id, name) FROM stdin;\n\
                    1\tAlice\n\
                    2\tBob\n\
                    \\.\n\
                    ALTER TABLE public.\"users\" OWNER TO app;\n";
        let blocks = extract_blocks(dump);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].rows, vec!["1\tAlice", "2\tBob"]);
    }

    #[test]
    fn test_blank_lines_inside_block_are_kept() {
        let dump = "COPY public.\"t\" (a) FROM stdin;\nx\n\ny\n\\.\n";
        let blocks = extract_blocks(dump);
        assert_eq!(blocks[0].rows, vec!["x", "", "y"]);
    }

    #[test]
    fn test_unterminated_block_is_discarded() {
        let dump = "COPY public.\"t\" (a) FROM stdin;\n1\n2\n";
        assert!(extract_blocks(dump).is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        let dump = "COPY public.\"t\" (a) FROM stdin;\r\n1\r\n\\.\r\n";
        let blocks = extract_blocks(dump);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].rows, vec!["1"]);
    }

    #[test]
    fn test_multiple_blocks_in_order() {
        let dump = "COPY public.\"a\" (x) FROM stdin;\n1\n\\.\n\
                    COPY public.\"b\" (y) FROM stdin;\n2\n\\.\n";
        let blocks = extract_blocks(dump);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].table, "a");
        assert_eq!(blocks[1].table, "b");
    }

    #[test]
    fn test_qualified_name() {
        let block = parse_header(r#"COPY public."media" ("videoId") FROM stdin;"#).unwrap();
        assert_eq!(block.qualified_name(), "public.\"media\"");
    }
}
