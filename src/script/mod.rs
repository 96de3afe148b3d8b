//! Assemble the generated SQL script.
//!
//! Output order: header banner, trigger-disable block, per-table INSERT
//! sections, trigger-enable block, per-column sequence adjustments, and a
//! trailing comment section listing any skipped rows.

use chrono::Local;

use crate::encoder;
use crate::extractor::DumpBlock;

/// A row that failed to encode. Reported as a trailing SQL comment and echoed
/// to the operator; never aborts the run.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// Qualified table name the row belonged to
    pub table: String,
    /// 1-based row number within that table's COPY block
    pub row: usize,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} row {}: {}", self.table, self.row, self.message)
    }
}

const DISABLE_TRIGGERS: &str = "\
-- Disable foreign-key triggers on every referencing table.
DO $$
DECLARE
    tbl text;
BEGIN
    FOR tbl IN
        SELECT DISTINCT conrelid::regclass::text
        FROM pg_constraint
        WHERE contype = 'f'
    LOOP
        EXECUTE format('ALTER TABLE %s DISABLE TRIGGER ALL', tbl);
    END LOOP;
END $$;
";

const ENABLE_TRIGGERS: &str = "\
-- Re-enable foreign-key triggers.
DO $$
DECLARE
    tbl text;
BEGIN
    FOR tbl IN
        SELECT DISTINCT conrelid::regclass::text
        FROM pg_constraint
        WHERE contype = 'f'
    LOOP
        EXECUTE format('ALTER TABLE %s ENABLE TRIGGER ALL', tbl);
    END LOOP;
END $$;
";

/// Build the full script from the extracted blocks.
///
/// Pure apart from the embedded generation timestamp: running twice over the
/// same blocks differs only on that line.
pub fn assemble(blocks: &[DumpBlock]) -> (String, Vec<RowError>) {
    let mut out = String::new();
    let mut errors = Vec::new();

    out.push_str("-- Generated by pg2inserts\n");
    out.push_str(&format!(
        "-- Generated at: {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    out.push('\n');
    out.push_str(DISABLE_TRIGGERS);

    for block in blocks {
        out.push_str(&format!("\n-- Data for {}\n", block.qualified_name()));

        let mut written = 0usize;
        for (i, line) in block.rows.iter().enumerate() {
            match encoder::encode_row(block, line) {
                Ok(stmt) => {
                    out.push_str(&stmt);
                    out.push('\n');
                    written += 1;
                }
                Err(e) => errors.push(RowError {
                    table: block.qualified_name(),
                    row: i + 1,
                    message: e.to_string(),
                }),
            }
        }

        out.push_str(&format!("-- {written} rows\n"));
    }

    out.push('\n');
    out.push_str(ENABLE_TRIGGERS);

    for block in blocks {
        for column in &block.columns {
            if adjusts_sequence(column) {
                out.push_str(&sequence_block(block, column));
            }
        }
    }

    if !errors.is_empty() {
        out.push_str("\n-- Skipped rows:\n");
        for e in &errors {
            out.push_str(&format!("-- {e}\n"));
        }
    }

    (out, errors)
}

/// Lexical stand-in for "backed by a serial/identity sequence": `id` at the
/// start of the name, or `id` followed by at least one more character. Matches
/// `id`, `videoId` and `invalidation`; does not match `valid`, where `id` is
/// only the bare tail of another word.
fn adjusts_sequence(column: &str) -> bool {
    let lower = column.to_lowercase();
    lower
        .match_indices("id")
        .any(|(i, _)| i == 0 || i + 2 < lower.len())
}

/// Resync the sequence behind one likely-serial column, with every step
/// guarded so the script stays runnable against schemas that drifted.
fn sequence_block(block: &DumpBlock, column: &str) -> String {
    format!(
        r#"
-- Adjust sequence for {qualified}."{column}"
DO $$
DECLARE
    seq text;
    max_val bigint;
BEGIN
    IF EXISTS (
        SELECT 1 FROM information_schema.columns
        WHERE table_schema = '{schema}'
          AND table_name = '{table}'
          AND column_name = '{column}'
    ) THEN
        seq := pg_get_serial_sequence('{qualified}', '{column}');
        IF seq IS NOT NULL THEN
            EXECUTE format('SELECT COALESCE(MAX(%I), 0) FROM {qualified}', '{column}')
                INTO max_val;
            IF max_val > 0 THEN
                PERFORM setval(seq, max_val);
            END IF;
        END IF;
    END IF;
END $$;
"#,
        qualified = block.qualified_name(),
        schema = block.schema,
        table = block.table,
        column = column,
    )
}
