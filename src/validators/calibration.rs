//! Confidence calibration.
//!
//! The constants and the upward rounding below are a fixed output contract;
//! changing any of them changes the scores written to existing files.

/// Bonus per citation returned by the web search
pub const CITATION_BONUS: f64 = 0.025;
/// Citations beyond this count earn nothing
pub const MAX_REWARDED_CITATIONS: usize = 4;
/// Bonus when the email domain appears in the corrected company name
pub const DOMAIN_MATCH_BONUS: f64 = 0.1;
/// Multiplier applied when the company could not be identified
pub const UNKNOWN_COMPANY_FACTOR: f64 = 0.3;

/// Similarity at or above which a name correction is considered conservative
pub const HIGH_SIMILARITY: f64 = 0.8;
/// Similarity below which a name correction is considered a rewrite
pub const LOW_SIMILARITY: f64 = 0.5;
pub const HIGH_SIMILARITY_BONUS: f64 = 0.05;
pub const LOW_SIMILARITY_PENALTY: f64 = 0.15;

/// Clamp to [0, 1]; non-finite values count as 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Round up to the next hundredth (0.7231 -> 0.73, 0.70 -> 0.70).
pub fn ceil_hundredth(value: f64) -> f64 {
    (value * 100.0).ceil() / 100.0
}

pub fn calibrate_company(base: f64, citations: usize, domain_match: bool, unknown: bool) -> f64 {
    let mut bonus = citations.min(MAX_REWARDED_CITATIONS) as f64 * CITATION_BONUS;
    if domain_match {
        bonus += DOMAIN_MATCH_BONUS;
    }
    let base = if unknown {
        base * UNKNOWN_COMPANY_FACTOR
    } else {
        base
    };
    ceil_hundredth(clamp_unit(base + bonus))
}

pub fn calibrate_name(model_confidence: f64, similarity: f64) -> f64 {
    let adjusted = if similarity >= HIGH_SIMILARITY {
        model_confidence + HIGH_SIMILARITY_BONUS
    } else if similarity < LOW_SIMILARITY {
        model_confidence - LOW_SIMILARITY_PENALTY
    } else {
        model_confidence
    };
    ceil_hundredth(clamp_unit(adjusted))
}

/// Case-insensitive normalized Levenshtein similarity in [0, 1].
pub fn name_similarity(original: &str, corrected: &str) -> f64 {
    strsim::normalized_levenshtein(
        &original.trim().to_lowercase(),
        &corrected.trim().to_lowercase(),
    )
}

/// Lower-case and keep only ASCII letters and digits.
pub fn normalize_alnum(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Organisation label of an email or domain: `jane@mail.acme.ch` -> `mail`,
/// `acme-corp.com` -> `acmecorp`.
pub fn domain_label(email_or_domain: &str) -> String {
    let lowered = email_or_domain.to_lowercase();
    let domain = lowered.rsplit('@').next().unwrap_or("");
    let label = domain.split('.').next().unwrap_or("");
    normalize_alnum(label)
}

pub fn domain_matches(email_or_domain: &str, company_name: &str) -> bool {
    let label = domain_label(email_or_domain);
    !label.is_empty() && normalize_alnum(company_name).contains(&label)
}
