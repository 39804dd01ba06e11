use crate::domain::model::Place;
use caseless::default_case_fold_str;

fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4E00}'..='\u{9FA5}').contains(&c)
}

/// Canonical form of a display name for exact grouping.
///
/// Applies full Unicode case folding (`ß` and `SS` both become `ss`), drops
/// anything that is not a letter or digit (CJK ideographs are always kept) and
/// removes whitespace entirely, so `"Caffè  Gilli!"` and `"caffè gilli"` share
/// a key. Idempotent.
pub fn normalize(name: &str) -> String {
    default_case_fold_str(name)
        .chars()
        .filter(|c| is_cjk_ideograph(*c) || c.is_alphanumeric())
        .collect()
}

/// `normalize(name)_city_country`, with city and country taken verbatim.
pub fn grouping_key(place: &Place) -> String {
    format!(
        "{}_{}_{}",
        normalize(&place.name),
        place.city_or_empty(),
        place.country_or_empty()
    )
}
