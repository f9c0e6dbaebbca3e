use crate::config::ColumnConfig;
use crate::constants::{
    validated_column, validated_company_column, CITATION_SEPARATOR, COMPANY_CITATIONS_COL,
    COMPANY_CONFIDENCE_COL, COMPANY_EXPLANATION_COL, FIRST_NAME_CONFIDENCE_COL,
    LAST_NAME_CONFIDENCE_COL, NAME_EXPLANATION_COL, SOURCE_TAG_COL,
};
use crate::error::{CleanerError, Result};
use crate::types::{CompanyOutcome, IdentityOutcome, Table};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

const EMPTY_CONFIDENCE: &str = "0.0";

/// Input values of one row, copied out of its slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowInput {
    pub index: usize,
    pub last_name: String,
    pub first_name: String,
    pub company: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy)]
struct InputColumns {
    last_name: usize,
    first_name: usize,
    company: usize,
    email: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct ResultColumns {
    last_name: usize,
    first_name: usize,
    company: usize,
    last_name_confidence: usize,
    first_name_confidence: usize,
    company_confidence: usize,
    citations: usize,
    company_explanation: usize,
    name_explanation: usize,
    source_tag: usize,
}

/// Rows of one run, one lock per row.
///
/// Row processors write disjoint slots; the checkpoint scheduler reads the
/// processed counter and copies slots one by one. A row's result cells are
/// written under its slot lock in a single pass, so a snapshot either sees
/// all of them or none.
#[derive(Debug)]
pub struct RecordStore {
    headers: Vec<String>,
    slots: Vec<Mutex<Vec<String>>>,
    inputs: InputColumns,
    results: ResultColumns,
    processed: AtomicUsize,
}

impl RecordStore {
    /// Takes ownership of a loaded table and appends every missing result
    /// column. Rows that already carry a source tag count as processed.
    pub fn from_table(table: Table, columns: &ColumnConfig) -> Result<Self> {
        let Table { mut headers, rows } = table;

        let inputs = InputColumns {
            last_name: required_column(&headers, &columns.last_name)?,
            first_name: required_column(&headers, &columns.first_name)?,
            company: required_column(&headers, &columns.company)?,
            email: headers.iter().position(|h| h == &columns.email),
        };

        let mut defaults: Vec<&'static str> = vec![""; headers.len()];
        let mut ensure = |name: String, default: &'static str| -> usize {
            match headers.iter().position(|h| *h == name) {
                Some(idx) => idx,
                None => {
                    headers.push(name);
                    defaults.push(default);
                    headers.len() - 1
                }
            }
        };
        let results = ResultColumns {
            last_name: ensure(validated_column(&columns.last_name), ""),
            first_name: ensure(validated_column(&columns.first_name), ""),
            company: ensure(validated_company_column(&columns.company), ""),
            last_name_confidence: ensure(LAST_NAME_CONFIDENCE_COL.to_string(), EMPTY_CONFIDENCE),
            first_name_confidence: ensure(FIRST_NAME_CONFIDENCE_COL.to_string(), EMPTY_CONFIDENCE),
            company_confidence: ensure(COMPANY_CONFIDENCE_COL.to_string(), EMPTY_CONFIDENCE),
            citations: ensure(COMPANY_CITATIONS_COL.to_string(), ""),
            company_explanation: ensure(COMPANY_EXPLANATION_COL.to_string(), ""),
            name_explanation: ensure(NAME_EXPLANATION_COL.to_string(), ""),
            source_tag: ensure(SOURCE_TAG_COL.to_string(), ""),
        };

        let width = headers.len();
        let mut processed = 0;
        let slots = rows
            .into_iter()
            .map(|mut row| {
                let present = row.len();
                row.extend(defaults.iter().skip(present).map(|d| d.to_string()));
                row.resize(width, String::new());
                if !row[results.source_tag].is_empty() {
                    processed += 1;
                }
                Mutex::new(row)
            })
            .collect();

        Ok(Self {
            headers,
            slots,
            inputs,
            results,
            processed: AtomicUsize::new(processed),
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rows carrying a source tag
    pub fn processed_count(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    fn slot(&self, index: usize) -> Result<MutexGuard<'_, Vec<String>>> {
        let slot = self
            .slots
            .get(index)
            .ok_or(CleanerError::RowOutOfRange(index))?;
        // A panic while holding the lock cannot leave a half-written row:
        // record_outcome only writes after every value is computed.
        Ok(slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    pub fn is_processed(&self, index: usize) -> bool {
        self.slot(index)
            .map(|row| !row[self.results.source_tag].is_empty())
            .unwrap_or(false)
    }

    /// Indices of rows without a source tag, in table order
    pub fn pending_rows(&self) -> Vec<usize> {
        (0..self.len()).filter(|i| !self.is_processed(*i)).collect()
    }

    pub fn row_input(&self, index: usize) -> Result<RowInput> {
        let row = self.slot(index)?;
        Ok(RowInput {
            index,
            last_name: row[self.inputs.last_name].clone(),
            first_name: row[self.inputs.first_name].clone(),
            company: row[self.inputs.company].clone(),
            email: self
                .inputs
                .email
                .map(|idx| row[idx].clone())
                .unwrap_or_default(),
        })
    }

    /// Writes both outcomes into row `index`. The source tag goes in last and
    /// marks the row processed; a row can be recorded only once.
    pub fn record_outcome(
        &self,
        index: usize,
        identity: &IdentityOutcome,
        company: &CompanyOutcome,
    ) -> Result<()> {
        let tag = source_tag(identity, company);
        let citations = company.citations.join(CITATION_SEPARATOR);
        let r = self.results;

        let mut row = self.slot(index)?;
        if !row[r.source_tag].is_empty() {
            return Err(CleanerError::AlreadyProcessed(index));
        }
        row[r.last_name] = identity.last_name.corrected.clone();
        row[r.first_name] = identity.first_name.corrected.clone();
        row[r.company] = company.company.corrected.clone();
        row[r.last_name_confidence] = format_confidence(identity.last_name.confidence);
        row[r.first_name_confidence] = format_confidence(identity.first_name.confidence);
        row[r.company_confidence] = format_confidence(company.company.confidence);
        row[r.citations] = citations;
        row[r.company_explanation] = company.company.explanation.clone();
        row[r.name_explanation] = identity.explanation.clone();
        row[r.source_tag] = tag;
        self.processed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Copy of the whole table, slot by slot
    pub fn snapshot(&self) -> Table {
        let rows = self
            .slots
            .iter()
            .map(|slot| {
                slot.lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clone()
            })
            .collect();
        Table {
            headers: self.headers.clone(),
            rows,
        }
    }
}

fn required_column(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| CleanerError::UnknownColumn(name.to_string()))
}

/// `nom:<provenance>;entreprise:<provenance>`
pub fn source_tag(identity: &IdentityOutcome, company: &CompanyOutcome) -> String {
    format!(
        "nom:{};entreprise:{}",
        identity.provenance(),
        company.company.provenance
    )
}

/// Confidence cell text; whole numbers keep one decimal ("0.0", "1.0").
pub fn format_confidence(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Provenance, ValidationOutcome};

    fn table(rows: &[[&str; 4]]) -> Table {
        let mut table = Table::new(
            ["nom", "prenom", "raison_sociale", "email"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        for row in rows {
            table.rows.push(row.iter().map(|s| s.to_string()).collect());
        }
        table
    }

    fn llm(original: &str, corrected: &str, confidence: f64) -> ValidationOutcome {
        ValidationOutcome {
            original: original.to_string(),
            corrected: corrected.to_string(),
            confidence,
            provenance: Provenance::Llm,
            explanation: "ok".to_string(),
        }
    }

    fn outcomes() -> (IdentityOutcome, CompanyOutcome) {
        (
            IdentityOutcome {
                last_name: llm("Pierre", "Dupont", 0.8),
                first_name: llm("Dupont", "Pierre", 0.75),
                explanation: "inversion".to_string(),
            },
            CompanyOutcome {
                company: llm("acme sa", "Acme SA", 0.73),
                citations: vec!["https://a.ch".to_string(), "https://b.ch".to_string()],
            },
        )
    }

    #[test]
    fn test_result_columns_are_appended_with_defaults() {
        let store = RecordStore::from_table(
            table(&[["Dupont", "Pierre", "Acme", ""]]),
            &ColumnConfig::default(),
        )
        .unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.headers.len(), 14);
        assert_eq!(snapshot.value(0, "nom_valide"), "");
        assert_eq!(snapshot.value(0, "raison_sociale_validee"), "");
        assert_eq!(snapshot.value(0, "confiance_entreprise"), "0.0");
        assert_eq!(snapshot.value(0, "source_validation"), "");
        assert_eq!(store.processed_count(), 0);
    }

    #[test]
    fn test_missing_required_column_is_rejected() {
        let columns = ColumnConfig {
            company: "societe".to_string(),
            ..Default::default()
        };
        let err = RecordStore::from_table(table(&[]), &columns).unwrap_err();
        assert!(matches!(err, CleanerError::UnknownColumn(c) if c == "societe"));
    }

    #[test]
    fn test_missing_email_column_reads_as_empty() {
        let mut input = table(&[["Dupont", "Pierre", "Acme", "x@y.ch"]]);
        input.headers[3] = "courriel".to_string();
        let store = RecordStore::from_table(input, &ColumnConfig::default()).unwrap();
        assert_eq!(store.row_input(0).unwrap().email, "");
    }

    #[test]
    fn test_record_outcome_writes_every_field_once() {
        let store = RecordStore::from_table(
            table(&[["Pierre", "Dupont", "acme sa", "p@acme.ch"]]),
            &ColumnConfig::default(),
        )
        .unwrap();
        let (identity, company) = outcomes();

        store.record_outcome(0, &identity, &company).unwrap();
        assert!(store.is_processed(0));
        assert_eq!(store.processed_count(), 1);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.value(0, "nom"), "Pierre");
        assert_eq!(snapshot.value(0, "nom_valide"), "Dupont");
        assert_eq!(snapshot.value(0, "prenom_valide"), "Pierre");
        assert_eq!(snapshot.value(0, "raison_sociale_validee"), "Acme SA");
        assert_eq!(snapshot.value(0, "confiance_nom"), "0.8");
        assert_eq!(snapshot.value(0, "confiance_entreprise"), "0.73");
        assert_eq!(snapshot.value(0, "entreprise_citations"), "https://a.ch;https://b.ch");
        assert_eq!(snapshot.value(0, "name_explication"), "inversion");
        assert_eq!(snapshot.value(0, "source_validation"), "nom:llm;entreprise:llm");

        let err = store.record_outcome(0, &identity, &company).unwrap_err();
        assert!(matches!(err, CleanerError::AlreadyProcessed(0)));
        assert_eq!(store.processed_count(), 1);
    }

    #[test]
    fn test_out_of_range_row() {
        let store = RecordStore::from_table(table(&[]), &ColumnConfig::default()).unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.row_input(3), Err(CleanerError::RowOutOfRange(3))));
        assert!(!store.is_processed(3));
    }

    #[test]
    fn test_tagged_rows_count_as_processed() {
        let mut input = table(&[
            ["Dupont", "Pierre", "Acme", ""],
            ["Martin", "Léa", "Globex", ""],
        ]);
        input.headers.push(SOURCE_TAG_COL.to_string());
        input.rows[0].push("nom:llm;entreprise:llm".to_string());
        input.rows[1].push(String::new());

        let store = RecordStore::from_table(input, &ColumnConfig::default()).unwrap();
        assert_eq!(store.processed_count(), 1);
        assert_eq!(store.pending_rows(), vec![1]);
        // existing column is reused, not duplicated
        let tags = store
            .headers()
            .iter()
            .filter(|h| h.as_str() == SOURCE_TAG_COL)
            .count();
        assert_eq!(tags, 1);
    }

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(0.0), "0.0");
        assert_eq!(format_confidence(1.0), "1.0");
        assert_eq!(format_confidence(0.73), "0.73");
        assert_eq!(format_confidence(0.7), "0.7");
    }
}
