use crate::domain::model::Place;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

const AGE_BONUS_PER_DAY: f64 = 0.1;
const AGE_BONUS_CAP: f64 = 10.0;

/// One additive scoring rule.
pub struct PrioritySignal {
    pub name: &'static str,
    pub weight: f64,
    pub applies: fn(&Place) -> bool,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn source_is(place: &Place, tag: &str) -> bool {
    place.source.as_deref() == Some(tag)
}

/// Signals are independent; a place's score is the sum of the ones that fire
/// plus the age bonus.
pub const SIGNALS: &[PrioritySignal] = &[
    PrioritySignal {
        name: "google_place_id",
        weight: 100.0,
        applies: |p| present(&p.google_place_id),
    },
    PrioritySignal {
        name: "source:google_maps",
        weight: 50.0,
        applies: |p| source_is(p, "google_maps"),
    },
    PrioritySignal {
        name: "source:apify_google_places",
        weight: 45.0,
        applies: |p| source_is(p, "apify_google_places"),
    },
    PrioritySignal {
        name: "source:google_maps_link",
        weight: 40.0,
        applies: |p| source_is(p, "google_maps_link"),
    },
    PrioritySignal {
        name: "website",
        weight: 20.0,
        applies: |p| present(&p.website),
    },
    PrioritySignal {
        name: "category",
        weight: 10.0,
        applies: |p| present(&p.category),
    },
    PrioritySignal {
        name: "source_detail",
        weight: 5.0,
        applies: |p| present(&p.source_detail),
    },
];

pub fn age_bonus(place: &Place, now: DateTime<Utc>) -> f64 {
    let days = (now - place.created_at).num_seconds() as f64 / 86_400.0;
    (days.max(0.0) * AGE_BONUS_PER_DAY).min(AGE_BONUS_CAP)
}

/// Survivor ranking score. Only meaningful between members of one group.
pub fn priority(place: &Place, now: DateTime<Utc>) -> f64 {
    SIGNALS
        .iter()
        .filter(|signal| (signal.applies)(place))
        .map(|signal| signal.weight)
        .sum::<f64>()
        + age_bonus(place, now)
}

/// Names of the signals that fired, for audit logs.
pub fn explain(place: &Place) -> Vec<&'static str> {
    SIGNALS
        .iter()
        .filter(|signal| (signal.applies)(place))
        .map(|signal| signal.name)
        .collect()
}

/// Highest priority wins; equal scores fall back to the smallest id.
pub fn select_survivor<'a>(members: &[&'a Place], now: DateTime<Utc>) -> Option<&'a Place> {
    members
        .iter()
        .map(|place| (priority(place, now), *place))
        .max_by(|(score_a, a), (score_b, b)| {
            score_a
                .partial_cmp(score_b)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|(_, place)| place)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn place(id: &str, age_days: i64) -> Place {
        Place {
            id: id.to_string(),
            name: "Caffè Gilli".to_string(),
            latitude: 43.7713,
            longitude: 11.2540,
            city: Some("Florence".to_string()),
            country: None,
            source: None,
            source_detail: None,
            google_place_id: None,
            website: None,
            category: None,
            created_at: now() - Duration::days(age_days),
        }
    }

    #[test]
    fn test_signals_add_up() {
        let mut p = place("a", 0);
        p.google_place_id = Some("ChIJ".to_string());
        p.source = Some("google_maps".to_string());
        p.website = Some("https://gilli.it".to_string());
        p.category = Some("cafe".to_string());
        p.source_detail = Some("text_search".to_string());

        assert_eq!(priority(&p, now()), 185.0);
        assert_eq!(
            explain(&p),
            vec![
                "google_place_id",
                "source:google_maps",
                "website",
                "category",
                "source_detail"
            ]
        );
    }

    #[test]
    fn test_source_trust_order() {
        let mut a = place("a", 0);
        a.source = Some("apify_google_places".to_string());
        let mut b = place("b", 0);
        b.source = Some("google_maps_link".to_string());
        let mut c = place("c", 0);
        c.source = Some("wikidata".to_string());

        assert_eq!(priority(&a, now()), 45.0);
        assert_eq!(priority(&b, now()), 40.0);
        assert_eq!(priority(&c, now()), 0.0);
    }

    #[test]
    fn test_blank_fields_do_not_count() {
        let mut p = place("a", 0);
        p.website = Some("   ".to_string());
        p.google_place_id = Some(String::new());
        assert_eq!(priority(&p, now()), 0.0);
    }

    #[test]
    fn test_age_bonus_is_capped_and_never_negative() {
        assert_eq!(age_bonus(&place("a", 30), now()), 3.0);
        assert_eq!(age_bonus(&place("a", 500), now()), AGE_BONUS_CAP);
        assert_eq!(age_bonus(&place("a", -10), now()), 0.0);
    }

    #[test]
    fn test_survivor_prefers_google_place_id_over_age() {
        let old = place("old", 1000);
        let mut verified = place("verified", 0);
        verified.google_place_id = Some("ChIJ".to_string());

        let survivor = select_survivor(&[&old, &verified], now()).unwrap();
        assert_eq!(survivor.id, "verified");
    }

    #[test]
    fn test_survivor_tie_breaks_on_smallest_id() {
        let b = place("b", 5);
        let a = place("a", 5);
        let c = place("c", 5);

        assert_eq!(select_survivor(&[&b, &a, &c], now()).unwrap().id, "a");
        assert_eq!(select_survivor(&[&c, &b, &a], now()).unwrap().id, "a");
        assert!(select_survivor(&[], now()).is_none());
    }
}
