use crate::models::InventoryRecord;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Synthetic environment key holding the union of every environment.
pub const ALL: &str = "all";

/// Filter values derived from a snapshot: the environments, and for each
/// environment (plus [`ALL`]) its sorted stages and tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FacetIndex {
    pub environments: Vec<String>,
    pub stages: BTreeMap<String, Vec<String>>,
    pub tags: BTreeMap<String, Vec<String>>,
}

impl FacetIndex {
    pub fn build(records: &[InventoryRecord]) -> Self {
        let mut stages: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut tags: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for record in records {
            stages
                .entry(record.environment.clone())
                .or_default()
                .insert(record.stage.clone());
            let env_tags = tags.entry(record.environment.clone()).or_default();
            env_tags.extend(record.tags.iter().cloned());
        }

        let environments: Vec<String> = stages.keys().cloned().collect();
        let all_stages: BTreeSet<String> = stages.values().flatten().cloned().collect();
        let all_tags: BTreeSet<String> = tags.values().flatten().cloned().collect();

        let mut stages = into_lists(stages);
        let mut tags = into_lists(tags);
        // an environment literally named "all" is folded into the aggregate
        stages.insert(ALL.to_string(), all_stages.into_iter().collect());
        tags.insert(ALL.to_string(), all_tags.into_iter().collect());

        Self {
            environments,
            stages,
            tags,
        }
    }

    pub fn stages_for(&self, environment: &str) -> &[String] {
        self.stages.get(environment).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tags_for(&self, environment: &str) -> &[String] {
        self.tags.get(environment).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn into_lists(map: BTreeMap<String, BTreeSet<String>>) -> BTreeMap<String, Vec<String>> {
    map.into_iter()
        .map(|(env, values)| (env, values.into_iter().collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(env: &str, stage: &str, tags: &[&str]) -> InventoryRecord {
        InventoryRecord {
            name: format!("{env}-{stage}"),
            environment: env.into(),
            stage: stage.into(),
            url: "https://example.com".into(),
            description: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn sample() -> Vec<InventoryRecord> {
        vec![
            record("staging", "preview", &["b", "shared"]),
            record("prod", "live", &["a", "shared"]),
            record("prod", "canary", &["a"]),
            record("prod", "live", &[]),
        ]
    }

    #[test]
    fn test_two_environment_scenario() {
        let index = FacetIndex::build(&[record("prod", "live", &["a"]), record("staging", "live", &["b"])]);
        assert_eq!(index.tags_for(ALL), ["a", "b"]);
        assert_eq!(index.tags_for("prod"), ["a"]);
        assert_eq!(index.environments, vec!["prod", "staging"]);
    }

    #[test]
    fn test_per_environment_lists_are_sorted_and_deduplicated() {
        let index = FacetIndex::build(&sample());
        assert_eq!(index.stages_for("prod"), ["canary", "live"]);
        assert_eq!(index.tags_for("prod"), ["a", "shared"]);
        assert_eq!(index.stages_for("staging"), ["preview"]);
    }

    #[test]
    fn test_all_is_union_of_every_environment() {
        let index = FacetIndex::build(&sample());
        let mut stages: Vec<String> = index
            .stages
            .iter()
            .filter(|(env, _)| env.as_str() != ALL)
            .flat_map(|(_, v)| v.clone())
            .collect();
        stages.sort();
        stages.dedup();
        assert_eq!(index.stages_for(ALL), stages.as_slice());

        let mut tags: Vec<String> = index
            .tags
            .iter()
            .filter(|(env, _)| env.as_str() != ALL)
            .flat_map(|(_, v)| v.clone())
            .collect();
        tags.sort();
        tags.dedup();
        assert_eq!(index.tags_for(ALL), tags.as_slice());
    }

    #[test]
    fn test_build_is_deterministic_and_order_independent() {
        let records = sample();
        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(FacetIndex::build(&records), FacetIndex::build(&records));
        assert_eq!(FacetIndex::build(&records), FacetIndex::build(&reversed));
    }

    #[test]
    fn test_empty_snapshot_still_has_all_bucket() {
        let index = FacetIndex::build(&[]);
        assert!(index.environments.is_empty());
        assert!(index.stages_for(ALL).is_empty());
        assert!(index.stages.contains_key(ALL));
        assert!(index.tags_for("prod").is_empty());
    }
}
