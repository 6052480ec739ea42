use crate::models::InventoryRecord;
use std::collections::HashSet;

/// Free-text search plus per-field selectors. An empty selector does not
/// restrict its field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    /// Already lower-cased.
    pub search: String,
    pub environments: HashSet<String>,
    pub stages: HashSet<String>,
    pub tags: HashSet<String>,
}

impl FilterQuery {
    /// Builds a query from the `/filter` parameters, where multi-value
    /// selectors are comma-separated.
    pub fn from_params(search: &str, environment: &str, stage: &str, tag: &str) -> Self {
        Self {
            search: search.to_lowercase(),
            environments: split_selector(environment),
            stages: split_selector(stage),
            tags: split_selector(tag),
        }
    }

    pub fn matches(&self, record: &InventoryRecord) -> bool {
        self.matches_search(record)
            && (self.environments.is_empty() || self.environments.contains(&record.environment))
            && (self.stages.is_empty() || self.stages.contains(&record.stage))
            && (self.tags.is_empty() || record.tags.iter().any(|t| self.tags.contains(t)))
    }

    fn matches_search(&self, record: &InventoryRecord) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.as_str();
        record.name.to_lowercase().contains(needle)
            || record.description.to_lowercase().contains(needle)
            || record.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

/// Records of the snapshot accepted by `query`, in snapshot order.
pub fn query(records: &[InventoryRecord], query: &FilterQuery) -> Vec<InventoryRecord> {
    records.iter().filter(|r| query.matches(r)).cloned().collect()
}

fn split_selector(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
