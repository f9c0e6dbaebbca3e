use super::checkpoint::CheckpointStats;
use crate::config::ColumnConfig;
use crate::constants::{
    validated_column, validated_company_column, COMPANY_CONFIDENCE_COL,
    FIRST_NAME_CONFIDENCE_COL, LAST_NAME_CONFIDENCE_COL, SOURCE_TAG_COL,
};
use crate::types::Table;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

const MAX_EXAMPLES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionExample {
    pub original: String,
    pub corrected: String,
    pub confidence: f64,
}

/// Statistics of one cleaning run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub last_name_corrections: usize,
    pub first_name_corrections: usize,
    pub company_corrections: usize,
    pub average_last_name_confidence: f64,
    pub average_first_name_confidence: f64,
    pub average_company_confidence: f64,
    pub name_examples: Vec<CorrectionExample>,
    pub company_examples: Vec<CorrectionExample>,
    pub checkpoints: CheckpointStats,
}

/// Per-field tally over processed rows
struct FieldTally {
    corrections: usize,
    confidence_sum: f64,
    examples: Vec<CorrectionExample>,
}

impl FieldTally {
    fn collect(table: &Table, rows: &[usize], original: &str, corrected: &str, confidence: &str) -> Self {
        let mut tally = FieldTally {
            corrections: 0,
            confidence_sum: 0.0,
            examples: Vec::new(),
        };
        for &row in rows {
            let score = table.value(row, confidence).parse::<f64>().unwrap_or(0.0);
            tally.confidence_sum += score;
            let before = table.value(row, original);
            let after = table.value(row, corrected);
            if before != after {
                tally.corrections += 1;
                if tally.examples.len() < MAX_EXAMPLES {
                    tally.examples.push(CorrectionExample {
                        original: before.to_string(),
                        corrected: after.to_string(),
                        confidence: score,
                    });
                }
            }
        }
        tally
    }

    fn average(&self, count: usize) -> f64 {
        if count == 0 {
            0.0
        } else {
            self.confidence_sum / count as f64
        }
    }
}

impl RunSummary {
    /// Builds the summary from the final table
    pub fn from_table(
        table: &Table,
        columns: &ColumnConfig,
        checkpoints: CheckpointStats,
        run_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Self {
        let processed: Vec<usize> = (0..table.len())
            .filter(|&row| !table.value(row, SOURCE_TAG_COL).is_empty())
            .collect();
        let count = processed.len();

        let last = FieldTally::collect(
            table,
            &processed,
            &columns.last_name,
            &validated_column(&columns.last_name),
            LAST_NAME_CONFIDENCE_COL,
        );
        let first = FieldTally::collect(
            table,
            &processed,
            &columns.first_name,
            &validated_column(&columns.first_name),
            FIRST_NAME_CONFIDENCE_COL,
        );
        let company = FieldTally::collect(
            table,
            &processed,
            &columns.company,
            &validated_company_column(&columns.company),
            COMPANY_CONFIDENCE_COL,
        );

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            total_rows: table.len(),
            processed_rows: count,
            last_name_corrections: last.corrections,
            first_name_corrections: first.corrections,
            company_corrections: company.corrections,
            average_last_name_confidence: last.average(count),
            average_first_name_confidence: first.average(count),
            average_company_confidence: company.average(count),
            name_examples: last.examples,
            company_examples: company.examples,
            checkpoints,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    fn share(&self, corrections: usize) -> f64 {
        if self.processed_rows == 0 {
            0.0
        } else {
            corrections as f64 / self.processed_rows as f64 * 100.0
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.processed_rows == 0 {
            return writeln!(f, "=== AUCUNE LIGNE TRAITÉE ===");
        }

        writeln!(f, "=== RÉSUMÉ DU TRAITEMENT ===")?;
        writeln!(f, "Total lignes dans le fichier: {}", self.total_rows)?;
        writeln!(f, "Lignes traitées: {}", self.processed_rows)?;
        writeln!(
            f,
            "Corrections noms: {} ({:.1}%)",
            self.last_name_corrections,
            self.share(self.last_name_corrections)
        )?;
        writeln!(
            f,
            "Corrections prénoms: {} ({:.1}%)",
            self.first_name_corrections,
            self.share(self.first_name_corrections)
        )?;
        writeln!(
            f,
            "Corrections entreprises: {} ({:.1}%)",
            self.company_corrections,
            self.share(self.company_corrections)
        )?;
        writeln!(f, "Confiance moyenne - Noms: {:.2}", self.average_last_name_confidence)?;
        writeln!(f, "Confiance moyenne - Prénoms: {:.2}", self.average_first_name_confidence)?;
        writeln!(f, "Confiance moyenne - Entreprises: {:.2}", self.average_company_confidence)?;
        writeln!(f, "Sauvegardes: {}", self.checkpoints.total())?;

        writeln!(f)?;
        writeln!(f, "=== EXEMPLES DE CORRECTIONS ===")?;
        for (title, examples) in [
            ("Corrections de noms:", &self.name_examples),
            ("Corrections d'entreprises:", &self.company_examples),
        ] {
            if examples.is_empty() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "{title}")?;
            for example in examples {
                writeln!(
                    f,
                    "  {} → {} (confiance: {:.2})",
                    example.original, example.corrected, example.confidence
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        let headers = [
            "nom",
            "prenom",
            "raison_sociale",
            "nom_valide",
            "prenom_valide",
            "raison_sociale_validee",
            "confiance_nom",
            "confiance_prenom",
            "confiance_entreprise",
            "source_validation",
        ];
        let rows = [
            ["Pierre", "Dupont", "acme", "Dupont", "Pierre", "Acme SA", "0.8", "0.75", "0.9", "nom:llm;entreprise:llm"],
            ["Martin", "Léa", "Globex", "Martin", "Léa", "Globex", "1.0", "0.95", "0.5", "nom:llm;entreprise:llm"],
            ["Muller", "Anna", "Initech", "", "", "", "0.0", "0.0", "0.0", ""],
        ];
        let mut table = Table::new(headers.iter().map(|s| s.to_string()).collect());
        for row in rows {
            table.rows.push(row.iter().map(|s| s.to_string()).collect());
        }
        table
    }

    #[test]
    fn test_counts_only_processed_rows() {
        let summary = RunSummary::from_table(
            &table(),
            &ColumnConfig::default(),
            CheckpointStats { intermediate: 1, final_writes: 1 },
            Uuid::new_v4(),
            Utc::now(),
        );
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.processed_rows, 2);
        assert_eq!(summary.last_name_corrections, 1);
        assert_eq!(summary.first_name_corrections, 1);
        assert_eq!(summary.company_corrections, 1);
        assert!((summary.average_last_name_confidence - 0.9).abs() < 1e-9);
        assert!((summary.average_company_confidence - 0.7).abs() < 1e-9);
        assert_eq!(
            summary.name_examples,
            vec![CorrectionExample {
                original: "Pierre".to_string(),
                corrected: "Dupont".to_string(),
                confidence: 0.8,
            }]
        );
    }

    #[test]
    fn test_display_in_french() {
        let summary = RunSummary::from_table(
            &table(),
            &ColumnConfig::default(),
            CheckpointStats::default(),
            Uuid::new_v4(),
            Utc::now(),
        );
        let text = summary.to_string();
        assert!(text.contains("Lignes traitées: 2"));
        assert!(text.contains("Corrections noms: 1 (50.0%)"));
        assert!(text.contains("Confiance moyenne - Entreprises: 0.70"));
        assert!(text.contains("  acme → Acme SA (confiance: 0.90)"));
    }

    #[test]
    fn test_display_without_processed_rows() {
        let mut table = table();
        table.rows.truncate(0);
        let summary = RunSummary::from_table(
            &table,
            &ColumnConfig::default(),
            CheckpointStats::default(),
            Uuid::new_v4(),
            Utc::now(),
        );
        assert_eq!(summary.to_string().trim(), "=== AUCUNE LIGNE TRAITÉE ===");
    }
}
