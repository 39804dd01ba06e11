use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point of interest as stored upstream. The engine never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, alias = "source_detail")]
    pub source_detail: Option<String>,
    #[serde(default, alias = "google_place_id")]
    pub google_place_id: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

impl Place {
    pub fn city_or_empty(&self) -> &str {
        self.city.as_deref().unwrap_or("")
    }

    pub fn country_or_empty(&self) -> &str {
        self.country.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    ExactDuplicate,
    ChainOrBranch,
    CoincidentalProximity,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::ExactDuplicate => "exact_duplicate",
            Classification::ChainOrBranch => "chain_or_branch",
            Classification::CoincidentalProximity => "coincidental_proximity",
        }
    }
}

/// Which matching rule produced a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRule {
    ExactKey,
    FuzzyMatch,
    NearDistinct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub classification: Classification,
    pub rule: GroupRule,
    /// Member ids in processing order (created_at, then id).
    pub members: Vec<String>,
    /// Only set for `exact_duplicate` groups.
    pub survivor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteEntry {
    pub id: String,
    pub name: String,
    pub reason: Classification,
    pub survivor_id: String,
    pub group_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidRecord {
    pub id: String,
    pub reason: String,
}

/// Everything a store returned: the rows that parsed, and the ones that did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedPlaces {
    pub places: Vec<Place>,
    pub rejected: Vec<InvalidRecord>,
}

/// A place at `(0,0)` that can only be matched by name until someone geocodes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentNote {
    pub id: String,
    pub name: String,
    /// Other places sharing the exact grouping key.
    pub same_key_ids: Vec<String>,
}

/// A name bucket whose spread fell between the exact and chain radii.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguousBucket {
    pub key: String,
    pub members: Vec<String>,
    pub max_anchor_distance_m: f64,
}

/// Places the fuzzy pass refused to merge because the result would join two
/// clearly distinct places. Nothing in it is deleted until someone decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub members: Vec<String>,
    /// Matching pairs whose merge was refused.
    pub blocked_pairs: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub batches: usize,
    pub failed_batches: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationCounts {
    pub groups: usize,
    pub records: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportCounts {
    pub exact_duplicate: ClassificationCounts,
    pub chain_or_branch: ClassificationCounts,
    pub coincidental_proximity: ClassificationCounts,
}

impl ReportCounts {
    pub fn record(&mut self, group: &DuplicateGroup) {
        let slot = match group.classification {
            Classification::ExactDuplicate => &mut self.exact_duplicate,
            Classification::ChainOrBranch => &mut self.chain_or_branch,
            Classification::CoincidentalProximity => &mut self.coincidental_proximity,
        };
        slot.groups += 1;
        slot.records += group.members.len();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub total_scanned: usize,
    pub valid_places: usize,
    pub counts: ReportCounts,
    pub groups: Vec<DuplicateGroup>,
    pub delete_list: Vec<DeleteEntry>,
    pub needs_coordinate_enrichment: Vec<EnrichmentNote>,
    pub ambiguous_buckets: Vec<AmbiguousBucket>,
    pub merge_conflicts: Vec<MergeConflict>,
    pub invalid_records: Vec<InvalidRecord>,
    pub apply: ApplySummary,
}
