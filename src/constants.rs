//! Column and tag constants shared by the pipeline, the table adapter and the summary.
//! Result column names keep the French naming of the prospect files so that
//! downstream spreadsheets keep working.

// Default input columns (overridable per run)
pub const DEFAULT_LAST_NAME_COL: &str = "nom";
pub const DEFAULT_FIRST_NAME_COL: &str = "prenom";
pub const DEFAULT_COMPANY_COL: &str = "raison_sociale";
pub const DEFAULT_EMAIL_COL: &str = "email";

// Fixed result columns
pub const LAST_NAME_CONFIDENCE_COL: &str = "confiance_nom";
pub const FIRST_NAME_CONFIDENCE_COL: &str = "confiance_prenom";
pub const COMPANY_CONFIDENCE_COL: &str = "confiance_entreprise";
pub const COMPANY_CITATIONS_COL: &str = "entreprise_citations";
pub const COMPANY_EXPLANATION_COL: &str = "entreprise_explication";
pub const NAME_EXPLANATION_COL: &str = "name_explication";
pub const SOURCE_TAG_COL: &str = "source_validation";

// Suffixes appended to the configured input column names
pub const VALIDATED_SUFFIX: &str = "_valide";
pub const VALIDATED_FEMININE_SUFFIX: &str = "_validee";

// Provenance tags
pub const PROVENANCE_LLM: &str = "llm";
pub const PROVENANCE_NO_LLM: &str = "no_llm";
pub const PROVENANCE_ERROR: &str = "error";

/// Placeholder sent to the model when no email domain is known
pub const UNKNOWN_DOMAIN: &str = "Non fourni";

/// Separator used when joining citation URLs into a single cell
pub const CITATION_SEPARATOR: &str = ";";

/// Column holding the validated person name for a given input column
pub fn validated_column(input_col: &str) -> String {
    format!("{input_col}{VALIDATED_SUFFIX}")
}

/// Column holding the validated company name for a given input column
pub fn validated_company_column(input_col: &str) -> String {
    format!("{input_col}{VALIDATED_FEMININE_SUFFIX}")
}
