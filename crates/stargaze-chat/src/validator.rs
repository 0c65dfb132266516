//! Shape validation for generated queries.
//!
//! There is no SQL/ADQL grammar here. A generated query is trusted only if,
//! ignoring case, it starts with `SELECT` and names the archive's table in a
//! `FROM` clause. Each archive is described once by a [`QuerySchema`], which
//! also supplies the column vocabulary offered to the model.

use stargaze_core::{GeneratedQuery, QueryKind};

use crate::error::ChatError;

/// Declared target of a query generator: dialect, table and allowed columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySchema {
    pub kind: QueryKind,
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

impl QuerySchema {
    /// NASA Exoplanet Archive planetary systems table.
    pub const fn exoplanets() -> Self {
        Self {
            kind: QueryKind::Sql,
            table: "ps",
            columns: &["pl_name", "disc_year", "pl_rade", "pl_bmasse", "discoverymethod"],
        }
    }

    /// Gaia DR3 main source catalog.
    pub const fn gaia() -> Self {
        Self {
            kind: QueryKind::Adql,
            table: "gaiadr3.gaia_source",
            columns: &[
                "source_id",
                "ra",
                "dec",
                "parallax",
                "pmra",
                "pmdec",
                "phot_g_mean_mag",
                "bp_rp",
            ],
        }
    }

    /// Check `text` against the allow-list predicate without modifying it.
    pub fn validate(&self, text: &str) -> Result<GeneratedQuery, ChatError> {
        let lowered = text.to_lowercase();
        let source = format!("from {}", self.table.to_lowercase());

        if !lowered.starts_with("select") || !lowered.contains(&source) {
            return Err(ChatError::InvalidQuery {
                kind: self.kind,
                query: text.to_string(),
            });
        }

        Ok(GeneratedQuery {
            kind: self.kind,
            text: text.to_string(),
        })
    }

    /// Clean a raw completion and validate the result.
    pub fn accept(&self, raw: &str) -> Result<GeneratedQuery, ChatError> {
        self.validate(&clean_completion(raw))
    }
}

/// Keep only the first line of a completion, cut at the first `;`.
///
/// Drops trailing commentary and any second statement the model appended.
pub fn clean_completion(raw: &str) -> String {
    let first_line = raw.trim().lines().next().unwrap_or("").trim();
    match first_line.find(';') {
        Some(idx) => first_line[..idx].trim().to_string(),
        None => first_line.to_string(),
    }
}
