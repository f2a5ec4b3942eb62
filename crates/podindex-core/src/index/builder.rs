//! FTS5 statement building.
//!
//! Table and field names are trusted configuration: they are validated once
//! as plain SQL identifiers and then interpolated. The search term is
//! untrusted and only ever travels as a bound parameter.

use crate::{PodindexError, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Plain SQL identifier: no quoting needed, nothing FTS5 would interpret.
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// FTS5 operators that a bareword term must not collide with.
const FTS5_KEYWORDS: &[&str] = &["AND", "OR", "NOT", "NEAR"];

/// Primary key shared by the base table and the index.
pub const ID_COLUMN: &str = "id";

/// Suffix of the derived FTS5 table name.
pub const INDEX_SUFFIX: &str = "_fts";

/// A validated SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !IDENTIFIER.is_match(&name) {
            return Err(PodindexError::config(format!(
                "Invalid identifier {:?}: expected [A-Za-z_][A-Za-z0-9_]*",
                name
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The base table and the ordered columns that take part in full-text search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub fields: Vec<String>,
}

impl TableDescriptor {
    pub fn new<S: Into<String>>(name: impl Into<String>, fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Builds every statement the index session executes.
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    table: Identifier,
    index: Identifier,
    fields: Vec<Identifier>,
}

impl StatementBuilder {
    /// Validate a descriptor once; every statement is derived from it.
    pub fn new(descriptor: &TableDescriptor) -> Result<Self> {
        let table = Identifier::new(descriptor.name.as_str())?;
        let index = Identifier::new(format!("{}{}", table, INDEX_SUFFIX))?;

        if descriptor.fields.is_empty() {
            return Err(PodindexError::config(format!(
                "No search fields configured for table {}",
                table
            )));
        }

        let mut fields: Vec<Identifier> = Vec::with_capacity(descriptor.fields.len());
        for name in &descriptor.fields {
            let field = Identifier::new(name.as_str())?;
            if field.as_str().eq_ignore_ascii_case(ID_COLUMN) {
                return Err(PodindexError::config(format!(
                    "Field {} is the index key and cannot be a search field",
                    field
                )));
            }
            // SQLite column names are case-insensitive
            if fields
                .iter()
                .any(|f| f.as_str().eq_ignore_ascii_case(field.as_str()))
            {
                return Err(PodindexError::config(format!("Duplicate search field {}", field)));
            }
            fields.push(field);
        }

        Ok(Self {
            table,
            index,
            fields,
        })
    }

    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Name of the derived FTS5 table: `<table>_fts`.
    pub fn index_name(&self) -> &str {
        self.index.as_str()
    }

    pub(crate) fn index_identifier(&self) -> &Identifier {
        &self.index
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(Identifier::as_str)
    }

    /// Columns of the index in declaration order: the key, then every field.
    ///
    /// Create and populate statements both read this, so their column
    /// order cannot drift apart.
    pub fn index_columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(ID_COLUMN).chain(self.fields())
    }

    fn column_list(&self) -> String {
        self.index_columns().collect::<Vec<_>>().join(", ")
    }

    pub fn build_create_statement(&self) -> String {
        let columns: Vec<String> = self
            .index_columns()
            .map(|column| {
                if column == ID_COLUMN {
                    format!("{} UNINDEXED", column)
                } else {
                    column.to_string()
                }
            })
            .collect();
        format!(
            "CREATE VIRTUAL TABLE {} USING fts5({})",
            self.index,
            columns.join(", ")
        )
    }

    pub fn build_populate_statement(&self) -> String {
        let columns = self.column_list();
        format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            self.index, columns, columns, self.table
        )
    }

    pub fn build_count_statement(&self) -> String {
        format!("SELECT COUNT(*) FROM {}", self.table)
    }

    /// Build the search query for a subset of the indexed fields.
    ///
    /// `fields` must be a non-empty subset of the configured fields.
    /// `out_fields` are base-table columns and need not be indexed.
    pub fn build_search_statement(
        &self,
        fields: &[&str],
        out_fields: &[&str],
    ) -> Result<SearchStatement> {
        if fields.is_empty() {
            return Err(PodindexError::config("Search needs at least one field"));
        }
        if out_fields.is_empty() {
            return Err(PodindexError::config("Search needs at least one output field"));
        }

        let unknown: Vec<&str> = fields
            .iter()
            .copied()
            .filter(|f| !self.fields().any(|configured| configured == *f))
            .collect();
        if !unknown.is_empty() {
            return Err(PodindexError::FieldSubset {
                requested: fields.iter().map(|f| f.to_string()).collect(),
                configured: self.fields().map(str::to_string).collect(),
            });
        }

        let out_fields = out_fields
            .iter()
            .map(|f| Identifier::new(*f))
            .collect::<Result<Vec<_>>>()?;

        let projection: Vec<String> = out_fields.iter().map(|f| format!("p.{}", f)).collect();
        let sql = format!(
            "SELECT {projection} \
             FROM {table} p INNER JOIN {index} f ON p.{id} = f.{id} \
             WHERE {index} MATCH ('{{{filter}}}: ' || ?1)",
            projection = projection.join(", "),
            table = self.table,
            index = self.index,
            id = ID_COLUMN,
            filter = fields.join(" "),
        );

        Ok(SearchStatement { sql, out_fields })
    }
}

/// A search query with exactly one parameter slot for the term.
#[derive(Debug, Clone)]
pub struct SearchStatement {
    sql: String,
    out_fields: Vec<Identifier>,
}

impl SearchStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn out_fields(&self) -> &[Identifier] {
        &self.out_fields
    }

    /// The value bound to the statement's parameter for `term`.
    pub fn match_parameter(&self, term: &str) -> Result<String> {
        escape_term(term)
    }
}

/// Turn a user term into a single FTS5 string token.
///
/// Plain words are passed through. Anything FTS5 could read as syntax
/// (punctuation, quotes, operator keywords) is wrapped in double quotes
/// with inner quotes doubled, so the term stays one phrase.
pub fn escape_term(term: &str) -> Result<String> {
    let term = term.trim();
    if term.is_empty() {
        return Err(PodindexError::Validation {
            field: "term".to_string(),
            message: "search term is empty".to_string(),
        });
    }

    let bareword = term.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !FTS5_KEYWORDS.contains(&term);
    if bareword {
        Ok(term.to_string())
    } else {
        Ok(format!("\"{}\"", term.replace('"', "\"\"")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn podcasts() -> StatementBuilder {
        StatementBuilder::new(&TableDescriptor::new("podcasts", ["title", "description"])).unwrap()
    }

    #[test]
    fn test_create_statement() {
        assert_eq!(
            podcasts().build_create_statement(),
            "CREATE VIRTUAL TABLE podcasts_fts USING fts5(id UNINDEXED, title, description)"
        );
    }

    #[test]
    fn test_populate_statement() {
        assert_eq!(
            podcasts().build_populate_statement(),
            "INSERT INTO podcasts_fts (id, title, description) \
             SELECT id, title, description FROM podcasts"
        );
    }

    #[test]
    fn test_create_and_populate_column_order_match() {
        let field_sets: &[&[&str]] = &[
            &["title"],
            &["description", "title"],
            &["author", "title", "description", "ownerName"],
        ];
        for fields in field_sets {
            let builder =
                StatementBuilder::new(&TableDescriptor::new("podcasts", fields.iter().copied()))
                    .unwrap();

            let create = builder.build_create_statement();
            let declared = create
                .split_once("fts5(")
                .and_then(|(_, rest)| rest.strip_suffix(')'))
                .unwrap()
                .replace(" UNINDEXED", "");

            let populate = builder.build_populate_statement();
            let inserted = populate
                .split_once('(')
                .and_then(|(_, rest)| rest.split_once(')'))
                .map(|(cols, _)| cols.to_string())
                .unwrap();
            let selected = populate
                .split_once("SELECT ")
                .and_then(|(_, rest)| rest.split_once(" FROM"))
                .map(|(cols, _)| cols.to_string())
                .unwrap();

            assert_eq!(declared, inserted);
            assert_eq!(inserted, selected);
            assert!(declared.starts_with("id, "));
        }
    }

    #[test]
    fn test_count_statement() {
        assert_eq!(podcasts().build_count_statement(), "SELECT COUNT(*) FROM podcasts");
    }

    #[test]
    fn test_search_statement() {
        let stmt = podcasts()
            .build_search_statement(&["title", "description"], &["id", "podcastGuid", "title"])
            .unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT p.id, p.podcastGuid, p.title \
             FROM podcasts p INNER JOIN podcasts_fts f ON p.id = f.id \
             WHERE podcasts_fts MATCH ('{title description}: ' || ?1)"
        );
        assert_eq!(stmt.out_fields().len(), 3);
    }

    #[test]
    fn test_search_statement_never_contains_term() {
        let stmt = podcasts()
            .build_search_statement(&["title"], &["id"])
            .unwrap();
        let param = stmt.match_parameter("x') OR 1=1 --").unwrap();
        assert!(!stmt.sql().contains("OR 1=1"));
        assert_eq!(param, "\"x') OR 1=1 --\"");
    }

    #[test]
    fn test_search_field_subset() {
        let builder = podcasts();
        assert!(builder.build_search_statement(&["title"], &["id"]).is_ok());
        assert!(builder.build_search_statement(&["description"], &["id"]).is_ok());

        let err = builder
            .build_search_statement(&["title", "author"], &["id"])
            .unwrap_err();
        assert!(matches!(err, PodindexError::FieldSubset { .. }));
    }

    #[test]
    fn test_search_rejects_empty_sets() {
        let builder = podcasts();
        assert!(matches!(
            builder.build_search_statement(&[], &["id"]),
            Err(PodindexError::Configuration { .. })
        ));
        assert!(matches!(
            builder.build_search_statement(&["title"], &[]),
            Err(PodindexError::Configuration { .. })
        ));
    }

    #[test]
    fn test_search_rejects_bad_out_field() {
        let err = podcasts()
            .build_search_statement(&["title"], &["id; DROP TABLE podcasts"])
            .unwrap_err();
        assert!(matches!(err, PodindexError::Configuration { .. }));
    }

    #[test]
    fn test_descriptor_validation() {
        let cases: &[(&str, &[&str])] = &[
            ("podcasts", &[]),
            ("podcasts", &["title", "title"]),
            ("podcasts", &["title", "Title"]),
            ("podcasts", &["id"]),
            ("podcasts", &["ti\"tle"]),
            ("podcasts", &["{title}"]),
            ("podcasts", &["title:"]),
            ("podcasts", &["two words"]),
            ("pod-casts", &["title"]),
            ("", &["title"]),
        ];
        for (table, fields) in cases {
            let result = StatementBuilder::new(&TableDescriptor::new(*table, fields.iter().copied()));
            assert!(
                matches!(result, Err(PodindexError::Configuration { .. })),
                "expected configuration error for {table:?} {fields:?}"
            );
        }
    }

    #[test]
    fn test_index_name() {
        let builder = podcasts();
        assert_eq!(builder.table(), "podcasts");
        assert_eq!(builder.index_name(), "podcasts_fts");
    }

    #[test]
    fn test_escape_plain_term() {
        assert_eq!(escape_term("concurrency").unwrap(), "concurrency");
        assert_eq!(escape_term("  rust  ").unwrap(), "rust");
        assert_eq!(escape_term("vae_decoder").unwrap(), "vae_decoder");
        assert_eq!(escape_term("café").unwrap(), "café");
    }

    #[test]
    fn test_escape_special_term() {
        assert_eq!(escape_term("gpt-2").unwrap(), "\"gpt-2\"");
        assert_eq!(escape_term("go time").unwrap(), "\"go time\"");
        assert_eq!(escape_term("say \"hi\"").unwrap(), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_term("title:x").unwrap(), "\"title:x\"");
        assert_eq!(escape_term("NOT").unwrap(), "\"NOT\"");
        assert_eq!(escape_term("not").unwrap(), "not");
    }

    #[test]
    fn test_escape_empty_term() {
        assert!(matches!(
            escape_term("   "),
            Err(PodindexError::Validation { .. })
        ));
    }
}
