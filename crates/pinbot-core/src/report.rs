use std::cmp::Ordering;

use crate::domain::{AreaRecord, AreaVerdict, PostalCode, ServiceabilityReport};

/// Assemble the per-code report from classified areas.
///
/// Callers must not invoke this with an empty `records` slice; an unknown code
/// is reported as not found instead.
pub fn build(
    postal_code: PostalCode,
    records: &[AreaRecord],
    verdicts: Vec<AreaVerdict>,
    hard_blocked: bool,
) -> ServiceabilityReport {
    // First row wins when rows disagree on city/state.
    let (city, state) = records
        .first()
        .map(|r| (r.city.trim().to_string(), r.state.trim().to_string()))
        .unwrap_or_default();

    let (mut serviceable_areas, mut non_serviceable_areas): (Vec<String>, Vec<String>) = {
        let (yes, no): (Vec<AreaVerdict>, Vec<AreaVerdict>) =
            verdicts.into_iter().partition(|v| v.serviceable);
        (
            yes.into_iter().map(|v| v.area_name).collect(),
            no.into_iter().map(|v| v.area_name).collect(),
        )
    };
    serviceable_areas.sort_by(|a, b| compare_area_names(a, b));
    non_serviceable_areas.sort_by(|a, b| compare_area_names(a, b));

    let overall_deliverable = !serviceable_areas.is_empty() && !hard_blocked;

    ServiceabilityReport {
        postal_code,
        city,
        state,
        serviceable_areas,
        non_serviceable_areas,
        hard_blocked,
        overall_deliverable,
    }
}

/// Case-insensitive ordering with a byte-wise tie-break so output is stable.
pub fn compare_area_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// True when rows registered under one code disagree on city or state.
pub fn has_inconsistent_metadata(records: &[AreaRecord]) -> bool {
    let Some(first) = records.first() else {
        return false;
    };
    records.iter().skip(1).any(|r| {
        !r.city.trim().eq_ignore_ascii_case(first.city.trim())
            || !r.state.trim().eq_ignore_ascii_case(first.state.trim())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeliveryFlag;

    fn row(area: &str, city: &str, state: &str) -> AreaRecord {
        AreaRecord {
            postal_code: "110086".to_string(),
            area_name: area.to_string(),
            delivery_flag: DeliveryFlag::Yes,
            city: city.to_string(),
            state: state.to_string(),
        }
    }

    fn verdict(area: &str, serviceable: bool) -> AreaVerdict {
        AreaVerdict {
            area_name: area.to_string(),
            serviceable,
        }
    }

    #[test]
    fn partitions_and_sorts_case_insensitively() {
        let code = PostalCode::parse("110086").unwrap();
        let records = vec![row("Rohini", "Delhi", "Delhi")];
        let report = build(
            code,
            &records,
            vec![
                verdict("rohini sector 3", true),
                verdict("Pitampura", true),
                verdict("Zeta", false),
                verdict("alpha", false),
            ],
            false,
        );
        assert_eq!(report.serviceable_areas, vec!["Pitampura", "rohini sector 3"]);
        assert_eq!(report.non_serviceable_areas, vec!["alpha", "Zeta"]);
        assert!(report.overall_deliverable);
        assert_eq!(report.city, "Delhi");
    }

    #[test]
    fn hard_block_forces_not_deliverable() {
        let code = PostalCode::parse("560001").unwrap();
        let records = vec![row("Koramangala", "Bengaluru", "Karnataka")];
        let report = build(code, &records, vec![verdict("Koramangala", true)], true);
        assert_eq!(report.serviceable_areas, vec!["Koramangala"]);
        assert!(report.hard_blocked);
        assert!(!report.overall_deliverable);
    }

    #[test]
    fn first_row_wins_for_city_and_state() {
        let records = vec![
            row("A", "Mumbai", "Maharashtra"),
            row("B", "Thane", "Maharashtra"),
        ];
        assert!(has_inconsistent_metadata(&records));
        let report = build(
            PostalCode::parse("400001").unwrap(),
            &records,
            Vec::new(),
            false,
        );
        assert_eq!(report.city, "Mumbai");
        assert!(!report.overall_deliverable);

        assert!(!has_inconsistent_metadata(&[
            row("A", "Delhi", "Delhi"),
            row("B", " delhi ", "DELHI"),
        ]));
    }
}
