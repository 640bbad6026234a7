use std::sync::Arc;

use crate::{
    classify::classify,
    domain::{PostalCode, Resolution},
    exclusion::ExclusionAggregator,
    ports::CodeDirectory,
    report, Result,
};

/// Entry point: postal code in, serviceability report (or not-found) out.
///
/// Holds only shared read-only handles; every `resolve` call keeps its state on
/// its own stack, so one resolver can serve many queries concurrently.
pub struct Resolver {
    directory: Arc<dyn CodeDirectory>,
    exclusions: ExclusionAggregator,
}

impl Resolver {
    pub fn new(directory: Arc<dyn CodeDirectory>, exclusions: ExclusionAggregator) -> Self {
        Self {
            directory,
            exclusions,
        }
    }

    pub fn exclusions(&self) -> &ExclusionAggregator {
        &self.exclusions
    }

    /// Fails with `Error::InvalidInput` before touching any storage when `raw`
    /// is not exactly six ASCII digits.
    pub async fn resolve(&self, raw: &str) -> Result<Resolution> {
        let code = PostalCode::parse(raw)?;

        let records = self.directory.lookup_areas(&code).await?;
        if records.is_empty() {
            tracing::debug!(code = %code, "postal code not in directory");
            return Ok(Resolution::NotFound(code));
        }

        if report::has_inconsistent_metadata(&records) {
            tracing::warn!(
                code = %code,
                city = %records[0].city,
                state = %records[0].state,
                rows = records.len(),
                "directory rows disagree on city/state; using first row"
            );
        }

        let (exclusion_set, hard_blocked) = tokio::join!(
            self.exclusions.find_exclusions(&code),
            self.exclusions.is_hard_blocked(&code)
        );

        let verdicts = classify(&records, &exclusion_set);
        let report = report::build(code, &records, verdicts, hard_blocked);

        tracing::info!(
            code = %report.postal_code,
            serviceable = report.serviceable_areas.len(),
            non_serviceable = report.non_serviceable_areas.len(),
            hard_blocked = report.hard_blocked,
            deliverable = report.overall_deliverable,
            "resolved postal code"
        );

        Ok(Resolution::Found(report))
    }
}
