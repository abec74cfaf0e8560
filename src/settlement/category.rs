use crate::config::{CategoryDefaults, ParkContext};

/// Resolve the remote ledger category a credit is routed to, through an
/// explicit ordered chain: park-name-suffix override, provider-keyed
/// default, the park's own stored category, then the global default.
pub fn resolve_category_id(park: &ParkContext, defaults: &CategoryDefaults) -> String {
    if let Some((_, category)) = defaults
        .by_park_suffix
        .iter()
        .find(|(suffix, _)| park.name.ends_with(suffix.as_str()))
    {
        return category.clone();
    }
    if let Some(category) = defaults.by_provider.get(&park.provider) {
        return category.clone();
    }
    if let Some(category) = &park.category_id {
        return category.clone();
    }
    defaults.global.clone()
}
