use crate::core::clusters::Clusters;
use crate::core::geo::{distance_meters, is_unknown_location, meters_to_lat_degrees, round_coord};
use crate::core::normalize::{grouping_key, normalize};
use crate::core::priority::{explain, priority, select_survivor};
use crate::core::similarity::similarity;
use crate::domain::model::{
    AmbiguousBucket, Classification, DeleteEntry, DuplicateGroup, EnrichmentNote, GroupRule,
    InvalidRecord, MergeConflict, Place,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Distance and similarity cut-offs used by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Exact-key buckets whose members all sit this close to the anchor are duplicates.
    pub exact_radius_m: f64,
    /// Exact-key buckets spreading past this are branches of a chain.
    pub chain_radius_m: f64,
    pub fuzzy_radius_m: f64,
    pub near_distinct_radius_m: f64,
    pub same_city_similarity: f64,
    pub nearby_similarity: f64,
    pub distinct_similarity: f64,
    /// Decimal places for the "same rounded position" rule (4 ≈ 11 m).
    pub coordinate_decimals: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            exact_radius_m: 10.0,
            chain_radius_m: 50.0,
            fuzzy_radius_m: 50.0,
            near_distinct_radius_m: 10.0,
            same_city_similarity: crate::core::similarity::SAME_CITY_THRESHOLD,
            nearby_similarity: crate::core::similarity::NEARBY_THRESHOLD,
            distinct_similarity: crate::core::similarity::DISTINCT_THRESHOLD,
            coordinate_decimals: 4,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassificationResult {
    pub valid_places: usize,
    pub groups: Vec<DuplicateGroup>,
    pub delete_list: Vec<DeleteEntry>,
    pub needs_coordinate_enrichment: Vec<EnrichmentNote>,
    pub ambiguous_buckets: Vec<AmbiguousBucket>,
    pub merge_conflicts: Vec<MergeConflict>,
    pub invalid_records: Vec<InvalidRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BucketVerdict {
    Exact,
    Chain,
    Ambiguous(f64),
}

/// Why a record cannot take part in matching, if it can't.
pub fn screen(place: &Place) -> Option<String> {
    if !place.latitude.is_finite() || !place.longitude.is_finite() {
        return Some("non-finite coordinates".to_string());
    }
    if place.latitude.abs() > 90.0 || place.longitude.abs() > 180.0 {
        return Some(format!(
            "coordinates out of range ({}, {})",
            place.latitude, place.longitude
        ));
    }
    if normalize(&place.name).is_empty() {
        return Some("empty name".to_string());
    }
    None
}

/// Partition `places` into duplicate, chain and near-but-distinct groups and
/// build the delete-list. Pure: the same input always yields the same result,
/// whatever order the places arrive in.
pub fn classify(
    places: &[Place],
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> ClassificationResult {
    let mut result = ClassificationResult::default();

    let mut valid: Vec<&Place> = Vec::with_capacity(places.len());
    for place in places {
        match screen(place) {
            Some(reason) => {
                tracing::warn!(
                    "⚠️ Excluding place {} ({:?}) from matching: {}",
                    place.id,
                    place.name,
                    reason
                );
                result.invalid_records.push(InvalidRecord {
                    id: place.id.clone(),
                    reason,
                });
            }
            None => valid.push(place),
        }
    }

    // 先依建立時間、再依 id 排序，確保每次執行的 anchor 相同
    valid.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    result.valid_places = valid.len();

    let classifier = Classifier {
        places: valid,
        thresholds,
        now,
    };
    classifier.run(&mut result);
    result
}

struct Classifier<'a> {
    places: Vec<&'a Place>,
    thresholds: &'a Thresholds,
    now: DateTime<Utc>,
}

impl<'a> Classifier<'a> {
    fn located(&self, i: usize) -> bool {
        let p = self.places[i];
        !is_unknown_location(p.latitude, p.longitude)
    }

    fn distance(&self, a: usize, b: usize) -> f64 {
        let (pa, pb) = (self.places[a], self.places[b]);
        distance_meters(pa.latitude, pa.longitude, pb.latitude, pb.longitude)
    }

    fn name_similarity(&self, a: usize, b: usize) -> f64 {
        similarity(&self.places[a].name, &self.places[b].name)
    }

    fn same_city(&self, a: usize, b: usize) -> bool {
        match (
            self.places[a].city.as_deref(),
            self.places[b].city.as_deref(),
        ) {
            (Some(ca), Some(cb)) => !ca.trim().is_empty() && ca == cb,
            _ => false,
        }
    }

    fn same_rounded_position(&self, a: usize, b: usize) -> bool {
        let d = self.thresholds.coordinate_decimals;
        let (pa, pb) = (self.places[a], self.places[b]);
        round_coord(pa.latitude, d) == round_coord(pb.latitude, d)
            && round_coord(pa.longitude, d) == round_coord(pb.longitude, d)
    }

    fn is_fuzzy_match(&self, a: usize, b: usize) -> bool {
        let sim = self.name_similarity(a, b);
        if sim >= self.thresholds.same_city_similarity && self.same_city(a, b) {
            return true;
        }
        sim >= self.thresholds.nearby_similarity
            && (self.distance(a, b) <= self.thresholds.fuzzy_radius_m
                || self.same_rounded_position(a, b))
    }

    /// Different names, far apart: these two must never share a group.
    fn clearly_distinct(&self, a: usize, b: usize) -> bool {
        self.name_similarity(a, b) < self.thresholds.distinct_similarity
            && self.distance(a, b) > self.thresholds.chain_radius_m
    }

    fn can_merge(&self, clusters: &mut Clusters, a: usize, b: usize) -> bool {
        let left = clusters.members_of(a).to_vec();
        let right = clusters.members_of(b).to_vec();
        !left
            .iter()
            .any(|&x| right.iter().any(|&y| self.clearly_distinct(x, y)))
    }

    fn exact_key_buckets(&self) -> Vec<(String, Vec<usize>)> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut buckets: Vec<(String, Vec<usize>)> = Vec::new();
        for (i, place) in self.places.iter().enumerate() {
            let key = grouping_key(place);
            match index.get(&key) {
                Some(&b) => buckets[b].1.push(i),
                None => {
                    index.insert(key.clone(), buckets.len());
                    buckets.push((key, vec![i]));
                }
            }
        }
        buckets
    }

    fn confirm_bucket(&self, located: &[usize]) -> BucketVerdict {
        let anchor = located[0];
        let max_distance = located[1..]
            .iter()
            .map(|&other| self.distance(anchor, other))
            .fold(0.0_f64, f64::max);

        if max_distance <= self.thresholds.exact_radius_m {
            BucketVerdict::Exact
        } else if max_distance > self.thresholds.chain_radius_m {
            BucketVerdict::Chain
        } else {
            BucketVerdict::Ambiguous(max_distance)
        }
    }

    /// Index pairs whose latitudes are within `radius_m` plus one rounding
    /// step. Every pair closer than `radius_m` is included.
    fn latitude_pairs(&self, indices: &[usize], radius_m: f64) -> Vec<(usize, usize)> {
        let band = meters_to_lat_degrees(radius_m)
            + 10f64.powi(-(self.thresholds.coordinate_decimals as i32));

        let mut sorted = indices.to_vec();
        sorted.sort_by(|&a, &b| {
            self.places[a]
                .latitude
                .total_cmp(&self.places[b].latitude)
                .then(a.cmp(&b))
        });

        let mut pairs = Vec::new();
        for (pos, &a) in sorted.iter().enumerate() {
            let lat_a = self.places[a].latitude;
            for &b in &sorted[pos + 1..] {
                if self.places[b].latitude - lat_a > band {
                    break;
                }
                pairs.push((a.min(b), a.max(b)));
            }
        }
        pairs
    }

    fn fuzzy_candidate_pairs(&self, indices: &[usize]) -> BTreeSet<(usize, usize)> {
        let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();

        let mut by_city: HashMap<&str, Vec<usize>> = HashMap::new();
        for &i in indices {
            if let Some(city) = self.places[i].city.as_deref() {
                if !city.trim().is_empty() {
                    by_city.entry(city).or_default().push(i);
                }
            }
        }
        for members in by_city.values() {
            for (pos, &a) in members.iter().enumerate() {
                for &b in &members[pos + 1..] {
                    pairs.insert((a.min(b), a.max(b)));
                }
            }
        }

        pairs.extend(self.latitude_pairs(indices, self.thresholds.fuzzy_radius_m));
        pairs
    }

    fn run(&self, result: &mut ClassificationResult) {
        let n = self.places.len();
        let mut clusters = Clusters::new(n);
        let mut in_chain = vec![false; n];
        let mut grouped = vec![false; n];

        // Step 1 + 2: exact grouping key, confirmed by distance to the anchor
        let buckets = self.exact_key_buckets();
        let mut bucket_of = vec![0usize; n];
        for (b, (_, members)) in buckets.iter().enumerate() {
            for &m in members {
                bucket_of[m] = b;
            }
        }

        let mut confirmed_exact = vec![false; buckets.len()];
        let mut chain_groups: Vec<DuplicateGroup> = Vec::new();
        for (b, (key, members)) in buckets.iter().enumerate() {
            let located: Vec<usize> = members
                .iter()
                .copied()
                .filter(|&i| self.located(i))
                .collect();
            if located.len() < 2 {
                continue;
            }

            match self.confirm_bucket(&located) {
                BucketVerdict::Exact => {
                    confirmed_exact[b] = true;
                    for pair in located.windows(2) {
                        clusters.union(pair[0], pair[1]);
                    }
                }
                BucketVerdict::Chain => {
                    for &i in &located {
                        in_chain[i] = true;
                    }
                    tracing::debug!(
                        "🏪 {} places share key {:?} but are spread out, treating as branches",
                        located.len(),
                        key
                    );
                    chain_groups.push(DuplicateGroup {
                        classification: Classification::ChainOrBranch,
                        rule: GroupRule::ExactKey,
                        members: self.ids(&located),
                        survivor: None,
                    });
                }
                BucketVerdict::Ambiguous(max_distance) => {
                    tracing::debug!(
                        "❓ Key {:?} spans {:.1}m, deferring to the fuzzy pass",
                        key,
                        max_distance
                    );
                    result.ambiguous_buckets.push(AmbiguousBucket {
                        key: key.clone(),
                        members: self.ids(&located),
                        max_anchor_distance_m: max_distance,
                    });
                }
            }
        }

        // Step 3: (0,0) places are only ever matched by key, and never deleted
        for i in (0..n).filter(|&i| !self.located(i)) {
            let same_key_ids = buckets[bucket_of[i]]
                .1
                .iter()
                .filter(|&&other| other != i)
                .map(|&other| self.places[other].id.clone())
                .collect();
            result.needs_coordinate_enrichment.push(EnrichmentNote {
                id: self.places[i].id.clone(),
                name: self.places[i].name.clone(),
                same_key_ids,
            });
        }

        // Step 4: fuzzy pass over everything that is located and not a chain branch
        let candidates: Vec<usize> = (0..n)
            .filter(|&i| self.located(i) && !in_chain[i])
            .collect();
        let pairs = self.fuzzy_candidate_pairs(&candidates);
        let mut fuzzy_unions = 0usize;
        let mut blocked: Vec<(usize, usize)> = Vec::new();
        for (a, b) in pairs.iter().copied() {
            if clusters.same(a, b) || !self.is_fuzzy_match(a, b) {
                continue;
            }
            if self.can_merge(&mut clusters, a, b) {
                clusters.union(a, b);
                fuzzy_unions += 1;
            } else {
                tracing::debug!(
                    "🚫 Not merging {} and {}: group would join clearly distinct places",
                    self.places[a].id,
                    self.places[b].id
                );
                blocked.push((a, b));
            }
        }
        tracing::debug!(
            "Fuzzy pass checked {} candidate pairs, {} merges, {} refused",
            pairs.len(),
            fuzzy_unions,
            blocked.len()
        );

        // 被拒絕的合併兩側都不處理：若先刪掉其中一側的重複，下次執行時另一側就會合併進來
        let mut held = clusters.clone();
        let mut conflicted = vec![false; n];
        for &(a, b) in &blocked {
            held.union(a, b);
            conflicted[a] = true;
            conflicted[b] = true;
        }

        for set in held.sets(2) {
            if set.iter().any(|&i| conflicted[i]) {
                self.hold_conflict(&set, &blocked, result);
                for &i in &set {
                    grouped[i] = true;
                }
                continue;
            }

            let first_bucket = bucket_of[set[0]];
            let rule = if confirmed_exact[first_bucket]
                && set.iter().all(|&i| bucket_of[i] == first_bucket)
            {
                GroupRule::ExactKey
            } else {
                GroupRule::FuzzyMatch
            };
            self.resolve_duplicates(&set, rule, result);
            for &i in &set {
                grouped[i] = true;
            }
        }

        for group in chain_groups {
            result.groups.push(group);
        }
        for (i, flag) in in_chain.iter().enumerate() {
            if *flag {
                grouped[i] = true;
            }
        }

        // Step 5: neighbours with unrelated names, informational only
        let loose: Vec<usize> = (0..n)
            .filter(|&i| self.located(i) && !grouped[i])
            .collect();
        let radius = self.thresholds.near_distinct_radius_m;
        let mut near = Clusters::new(n);
        for (a, b) in self.latitude_pairs(&loose, radius) {
            if near.same(a, b)
                || self.distance(a, b) > radius
                || self.name_similarity(a, b) >= self.thresholds.distinct_similarity
            {
                continue;
            }
            if self.can_merge(&mut near, a, b) {
                near.union(a, b);
            }
        }
        for set in near.sets(2) {
            result.groups.push(DuplicateGroup {
                classification: Classification::CoincidentalProximity,
                rule: GroupRule::NearDistinct,
                members: self.ids(&set),
                survivor: None,
            });
        }

        tracing::info!(
            "🔎 Classified {} places: {} groups, {} to delete, {} ambiguous buckets, {} merge conflicts, {} without coordinates",
            n,
            result.groups.len(),
            result.delete_list.len(),
            result.ambiguous_buckets.len(),
            result.merge_conflicts.len(),
            result.needs_coordinate_enrichment.len()
        );
    }

    fn hold_conflict(
        &self,
        set: &[usize],
        blocked: &[(usize, usize)],
        result: &mut ClassificationResult,
    ) {
        let blocked_pairs: Vec<(String, String)> = blocked
            .iter()
            .filter(|(a, _)| set.binary_search(a).is_ok())
            .map(|&(a, b)| (self.places[a].id.clone(), self.places[b].id.clone()))
            .collect();

        tracing::warn!(
            "⚠️ Holding {} places for review, merging them would join clearly distinct places: {:?}",
            set.len(),
            blocked_pairs
        );
        result.merge_conflicts.push(MergeConflict {
            members: self.ids(set),
            blocked_pairs,
        });
    }

    fn resolve_duplicates(&self, set: &[usize], rule: GroupRule, result: &mut ClassificationResult) {
        let members: Vec<&Place> = set.iter().map(|&i| self.places[i]).collect();
        let Some(survivor) = select_survivor(&members, self.now) else {
            return;
        };
        let group_index = result.groups.len();

        tracing::debug!(
            "✅ Keeping {} ({:?}, score {:.1}, signals {:?}) over {} duplicate(s)",
            survivor.id,
            survivor.name,
            priority(survivor, self.now),
            explain(survivor),
            members.len() - 1
        );

        for place in members.iter().filter(|p| p.id != survivor.id) {
            result.delete_list.push(DeleteEntry {
                id: place.id.clone(),
                name: place.name.clone(),
                reason: Classification::ExactDuplicate,
                survivor_id: survivor.id.clone(),
                group_index,
            });
        }

        result.groups.push(DuplicateGroup {
            classification: Classification::ExactDuplicate,
            rule,
            members: self.ids(set),
            survivor: Some(survivor.id.clone()),
        });
    }

    fn ids(&self, indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| self.places[i].id.clone()).collect()
    }
}
