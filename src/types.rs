use crate::constants::{PROVENANCE_ERROR, PROVENANCE_LLM, PROVENANCE_NO_LLM};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a validated value was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Llm,
    NoLlm,
    Error,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Llm => PROVENANCE_LLM,
            Provenance::NoLlm => PROVENANCE_NO_LLM,
            Provenance::Error => PROVENANCE_ERROR,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of validating one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub original: String,
    pub corrected: String,
    pub confidence: f64,
    pub provenance: Provenance,
    pub explanation: String,
}

impl ValidationOutcome {
    /// Outcome when the service is not consulted: value kept, zero confidence
    pub fn unchanged(original: &str) -> Self {
        Self {
            original: original.to_string(),
            corrected: original.to_string(),
            confidence: 0.0,
            provenance: Provenance::NoLlm,
            explanation: String::new(),
        }
    }

    /// Outcome when the service call failed: value kept, zero confidence
    pub fn failed(original: &str, explanation: impl Into<String>) -> Self {
        Self {
            original: original.to_string(),
            corrected: original.to_string(),
            confidence: 0.0,
            provenance: Provenance::Error,
            explanation: explanation.into(),
        }
    }
}

/// Outcome of the identity validator: last name, first name and a shared rationale
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityOutcome {
    pub last_name: ValidationOutcome,
    pub first_name: ValidationOutcome,
    pub explanation: String,
}

impl IdentityOutcome {
    /// Shared provenance of both name fields. They come from one service call
    /// and must agree: the source tag carries a single `nom:` entry.
    pub fn provenance(&self) -> Provenance {
        debug_assert_eq!(
            self.last_name.provenance, self.first_name.provenance,
            "name fields disagree on provenance"
        );
        self.last_name.provenance
    }
}

/// Outcome of the organization validator plus the URLs the service cited
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyOutcome {
    pub company: ValidationOutcome,
    pub citations: Vec<String>,
}

impl CompanyOutcome {
    pub fn without_citations(company: ValidationOutcome) -> Self {
        Self {
            company,
            citations: Vec::new(),
        }
    }
}

/// Plain tabular data as read from and written to disk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Value of `column` in row `row`, empty when the column or cell is missing
    pub fn value(&self, row: usize, column: &str) -> &str {
        self.column_index(column)
            .and_then(|idx| self.rows.get(row).and_then(|r| r.get(idx)))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Removes columns that carry no value in any row, except those named in
    /// `keep`. Returns how many were removed; a table without rows is left as is.
    pub fn drop_empty_columns(&mut self, keep: &[&str]) -> usize {
        if self.rows.is_empty() {
            return 0;
        }
        let retained: Vec<bool> = self
            .headers
            .iter()
            .enumerate()
            .map(|(col, header)| {
                keep.contains(&header.as_str())
                    || self
                        .rows
                        .iter()
                        .any(|row| row.get(col).map_or(false, |v| !v.is_empty()))
            })
            .collect();
        let dropped = retained.iter().filter(|k| !**k).count();
        if dropped == 0 {
            return 0;
        }

        let select = |values: Vec<String>| -> Vec<String> {
            values
                .into_iter()
                .zip(retained.iter())
                .filter_map(|(v, k)| k.then_some(v))
                .collect()
        };
        self.headers = select(std::mem::take(&mut self.headers));
        self.rows = std::mem::take(&mut self.rows).into_iter().map(select).collect();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(last: ValidationOutcome, first: ValidationOutcome) -> IdentityOutcome {
        IdentityOutcome {
            last_name: last,
            first_name: first,
            explanation: String::new(),
        }
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_drop_empty_columns_spares_kept_names() {
        let mut t = table(
            &["nom", "vide", "prenom", "notes"],
            &[&["Dupont", "", "", ""], &["Martin", "", "", "x"]],
        );
        assert_eq!(t.drop_empty_columns(&["prenom"]), 1);
        assert_eq!(t.headers, vec!["nom", "prenom", "notes"]);
        assert_eq!(t.rows[1], vec!["Martin", "", "x"]);
    }

    #[test]
    fn test_drop_empty_columns_leaves_rowless_table() {
        let mut t = table(&["nom", "prenom"], &[]);
        assert_eq!(t.drop_empty_columns(&[]), 0);
        assert_eq!(t.headers.len(), 2);
    }

    #[test]
    fn test_identity_provenance_is_shared() {
        let outcome = identity(
            ValidationOutcome::failed("Dupont", "timeout"),
            ValidationOutcome::failed("Pierre", "timeout"),
        );
        assert_eq!(outcome.provenance(), Provenance::Error);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "name fields disagree on provenance")]
    fn test_identity_provenance_mismatch_is_caught() {
        identity(
            ValidationOutcome::unchanged("Dupont"),
            ValidationOutcome::failed("Pierre", "timeout"),
        )
        .provenance();
    }
}
