use std::collections::HashMap;

use crate::{
    domain::{AreaRecord, AreaVerdict, DeliveryFlag},
    exclusion::ExclusionSet,
};

/// Key used for every area comparison: surrounding whitespace trimmed, lowercased.
pub fn normalize_area_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

struct AreaGroup {
    display: String,
    any_yes: bool,
}

/// One verdict per distinct normalized area name, in first-seen order.
///
/// The display name is the first raw spelling encountered (trimmed). An area is
/// serviceable only when its name is non-blank, no feed excludes it (or the
/// whole code), and at least one of its rows carries a `Yes` flag.
pub fn classify(records: &[AreaRecord], exclusions: &ExclusionSet) -> Vec<AreaVerdict> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, AreaGroup> = HashMap::new();

    for record in records {
        let key = normalize_area_name(&record.area_name);
        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            AreaGroup {
                display: record.area_name.trim().to_string(),
                any_yes: false,
            }
        });
        group.any_yes |= record.delivery_flag == DeliveryFlag::Yes;
    }

    order
        .into_iter()
        .filter_map(|key| {
            let group = groups.remove(&key)?;
            let serviceable = !key.is_empty()
                && !exclusions.whole_code
                && !exclusions.contains(&key)
                && group.any_yes;
            Some(AreaVerdict {
                area_name: group.display,
                serviceable,
            })
        })
        .collect()
}
