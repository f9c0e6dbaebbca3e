use super::gate::ConcurrencyGate;
use super::record_store::RecordStore;
use crate::app::ports::{IdentityValidation, OrganizationValidation};
use crate::error::Result;
use crate::metrics;
use crate::types::Provenance;
use std::sync::Arc;
use tracing::{debug, instrument};

/// What happened to one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Processed { name: Provenance, company: Provenance },
    /// Already tagged when the run started
    Skipped,
}

/// Runs both validators for one row and records the outcome.
#[derive(Clone)]
pub struct RowProcessor {
    store: Arc<RecordStore>,
    gate: ConcurrencyGate,
    identity: Arc<dyn IdentityValidation>,
    organization: Arc<dyn OrganizationValidation>,
}

impl RowProcessor {
    pub fn new(
        store: Arc<RecordStore>,
        gate: ConcurrencyGate,
        identity: Arc<dyn IdentityValidation>,
        organization: Arc<dyn OrganizationValidation>,
    ) -> Self {
        Self {
            store,
            gate,
            identity,
            organization,
        }
    }

    #[instrument(skip(self))]
    pub async fn process(&self, index: usize) -> Result<RowStatus> {
        if self.store.is_processed(index) {
            debug!("Row already validated, skipping");
            return Ok(RowStatus::Skipped);
        }
        let input = self.store.row_input(index)?;

        let (identity, company) = {
            let _permit = self.gate.acquire().await?;
            let identity = self
                .identity
                .validate(&input.last_name, &input.first_name, &input.email)
                .await;
            let company = self
                .organization
                .validate(&input.company, email_domain(&input.email))
                .await;
            (identity, company)
        };

        self.store.record_outcome(index, &identity, &company)?;

        let name = identity.provenance();
        let company = company.company.provenance;
        metrics::row_processed(name, company);
        debug!(%name, %company, "Row recorded");
        Ok(RowStatus::Processed { name, company })
    }
}

/// Text after the last `@`, empty when the address has none
pub fn email_domain(email: &str) -> &str {
    match email.trim().rsplit_once('@') {
        Some((_, domain)) => domain.trim(),
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnConfig;
    use crate::types::{CompanyOutcome, IdentityOutcome, Table, ValidationOutcome};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoIdentity;

    #[async_trait]
    impl IdentityValidation for EchoIdentity {
        async fn validate(&self, last: &str, first: &str, _contact: &str) -> IdentityOutcome {
            IdentityOutcome {
                last_name: ValidationOutcome::unchanged(last),
                first_name: ValidationOutcome::unchanged(first),
                explanation: String::new(),
            }
        }
    }

    #[derive(Default)]
    struct RecordingOrganization {
        hints: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl OrganizationValidation for RecordingOrganization {
        async fn validate(&self, company: &str, domain_hint: &str) -> CompanyOutcome {
            self.hints.lock().unwrap().push(domain_hint.to_string());
            CompanyOutcome::without_citations(ValidationOutcome::failed(company, "boom"))
        }
    }

    fn store() -> Arc<RecordStore> {
        let mut table = Table::new(
            ["nom", "prenom", "raison_sociale", "email"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        table.rows.push(
            ["Dupont", "Pierre", "Acme", "pierre@mail.acme.ch"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        Arc::new(RecordStore::from_table(table, &ColumnConfig::default()).unwrap())
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("a@b.ch"), "b.ch");
        assert_eq!(email_domain("odd@name@acme.ch"), "acme.ch");
        assert_eq!(email_domain("no-at-sign"), "");
        assert_eq!(email_domain(""), "");
    }

    #[tokio::test]
    async fn test_process_records_row_and_releases_gate() {
        let store = store();
        let organization = Arc::new(RecordingOrganization::default());
        let gate = ConcurrencyGate::new(1);
        let processor =
            RowProcessor::new(store.clone(), gate.clone(), Arc::new(EchoIdentity), organization.clone());

        let status = processor.process(0).await.unwrap();
        assert_eq!(
            status,
            RowStatus::Processed {
                name: Provenance::NoLlm,
                company: Provenance::Error
            }
        );
        assert_eq!(gate.available(), 1);
        assert_eq!(organization.hints.lock().unwrap().as_slice(), ["mail.acme.ch"]);
        assert_eq!(
            store.snapshot().value(0, "source_validation"),
            "nom:no_llm;entreprise:error"
        );

        // second pass is a no-op
        assert_eq!(processor.process(0).await.unwrap(), RowStatus::Skipped);
        assert_eq!(organization.hints.lock().unwrap().len(), 1);
    }
}
