use caseless::default_case_fold_str;
use std::collections::HashSet;
use strsim::normalized_levenshtein;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Same-city fuzzy duplicate threshold.
pub const SAME_CITY_THRESHOLD: f64 = 0.8;
/// Fuzzy duplicate threshold for places that are next to each other.
pub const NEARBY_THRESHOLD: f64 = 0.6;
/// Below this, two names are different no matter how close the places are.
pub const DISTINCT_THRESHOLD: f64 = 0.5;

const CONTAINMENT_BASE: f64 = 0.75;
const CONTAINMENT_CAP: f64 = 0.95;
const MIN_SIGNIFICANT_LEN: usize = 3;

// Short words are already ignored by MIN_SIGNIFICANT_LEN
const STOPWORDS: &[&str] = &[
    "the", "and", "les", "des", "del", "los", "las", "der", "die", "das", "und", "von", "van",
    "het", "della", "delle", "dei", "degli", "dos", "een", "une", "aux", "sur", "for",
];

/// Maps a folded token to the canonical spelling of its generic category
/// word, so "musée du louvre" and "museum du louvre" fold to the same text.
fn canonical_term(token: &str) -> &str {
    match token {
        "museum" | "musee" | "museo" | "museu" | "muzeum" | "museet" => "museum",
        "church" | "eglise" | "iglesia" | "chiesa" | "kirche" | "igreja" | "kerk" | "kirke" => {
            "church"
        }
        "park" | "parc" | "parque" | "parco" => "park",
        "cafe" | "caffe" => "cafe",
        "palace" | "palais" | "palacio" | "palazzo" | "palast" => "palace",
        "cathedral" | "cathedrale" | "catedral" | "cattedrale" | "kathedrale" => "cathedral",
        "basilica" | "basilique" | "basilika" => "basilica",
        "market" | "marche" | "mercado" | "mercato" | "markt" => "market",
        "garden" | "jardin" | "jardim" | "giardino" | "garten" => "garden",
        "bridge" | "pont" | "puente" | "ponte" | "brucke" => "bridge",
        "tower" | "tour" | "torre" | "turm" => "tower",
        "castle" | "chateau" | "castillo" | "castello" | "castelo" | "schloss" => "castle",
        "library" | "bibliotheque" | "biblioteca" | "bibliothek" => "library",
        "theatre" | "theater" | "teatro" | "teatr" => "theatre",
        "station" | "gare" | "estacion" | "stazione" | "bahnhof" => "station",
        "square" | "plaza" | "piazza" | "platz" | "praca" => "square",
        other => other,
    }
}

/// Accent-free, case-folded, punctuation-free form with generic words canonicalized.
pub fn fold(name: &str) -> String {
    let stripped = default_case_fold_str(
        &name
            .nfkd()
            .filter(|c| !is_combining_mark(*c))
            .collect::<String>(),
    );

    let spaced: String = stripped
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}' | '\u{02BC}' | '`'))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    spaced
        .split_whitespace()
        .map(canonical_term)
        .collect::<Vec<_>>()
        .join(" ")
}

fn significant_tokens(folded: &str) -> Vec<&str> {
    folded
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_SIGNIFICANT_LEN && !STOPWORDS.contains(t))
        .collect()
}

fn containment_score(a: &str, b: &str) -> f64 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    // order by (length, text) so the result does not depend on argument order
    let ((short, short_len), (long, long_len)) = if (a_len, a) <= (b_len, b) {
        ((a, a_len), (b, b_len))
    } else {
        ((b, b_len), (a, a_len))
    };

    if long_len == 0 {
        return 0.0;
    }

    let tokens = significant_tokens(short);
    if tokens.is_empty() || !tokens.iter().all(|t| long.contains(t)) {
        return 0.0;
    }

    let ratio = short_len as f64 / long_len as f64;
    (CONTAINMENT_BASE + 0.25 * ratio).min(CONTAINMENT_CAP)
}

fn blend_score(a: &str, b: &str) -> f64 {
    let a_tokens: HashSet<&str> = a.split_whitespace().collect();
    let b_tokens: HashSet<&str> = b.split_whitespace().collect();
    let union = a_tokens.union(&b_tokens).count();
    let jaccard = if union == 0 {
        0.0
    } else {
        a_tokens.intersection(&b_tokens).count() as f64 / union as f64
    };

    0.5 * jaccard + 0.5 * normalized_levenshtein(a, b)
}

/// Similarity of two place names in `[0, 1]`; symmetric, and 1.0 for a name
/// against itself.
///
/// Best of: accent/translation-insensitive equality (1.0), containment of
/// one name's significant words in the other (0.75..=0.95), and an even blend
/// of token Jaccard overlap and normalized Levenshtein similarity.
pub fn similarity(a: &str, b: &str) -> f64 {
    let fa = fold(a);
    let fb = fold(b);

    if fa == fb {
        return 1.0;
    }

    let score = containment_score(&fa, &fb).max(blend_score(&fa, &fb));
    score.clamp(0.0, 1.0)
}
