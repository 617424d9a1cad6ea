//! Database schema definitions

/// SQL to create the facts table
///
/// `seq` carries insertion order; `id` is the fact's own identity.
pub const CREATE_FACTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS facts (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    text TEXT NOT NULL
)
"#;

/// Connection pragmas applied before the schema
pub const PRAGMAS: &[&str] = &[
    "PRAGMA foreign_keys = ON",
    "PRAGMA synchronous = NORMAL",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![CREATE_FACTS_TABLE]
}
