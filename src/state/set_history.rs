use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::models::MatchId;

/// Final score of one closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetScore {
    /// Points of team A.
    pub team_a_score: u16,
    /// Points of team B.
    pub team_b_score: u16,
}

/// Process-local history of closed sets, keyed by match.
///
/// Display aid only: the aggregate sets-won counters live in durable storage,
/// so losing this cache on restart only blanks the per-set column.
#[derive(Debug, Default)]
pub struct SetHistoryCache {
    entries: DashMap<MatchId, Vec<SetScore>>,
}

impl SetHistoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a closed set at the end of the match's history.
    pub fn append(&self, match_id: MatchId, entry: SetScore) {
        self.entries.entry(match_id).or_default().push(entry);
    }

    /// Snapshot the ordered history for a match.
    pub fn list(&self, match_id: MatchId) -> Vec<SetScore> {
        self.entries
            .get(&match_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Forget everything recorded for a match.
    pub fn clear(&self, match_id: MatchId) {
        self.entries.remove(&match_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(a: u16, b: u16) -> SetScore {
        SetScore {
            team_a_score: a,
            team_b_score: b,
        }
    }

    #[test]
    fn keeps_insertion_order_per_match() {
        let cache = SetHistoryCache::new();
        cache.append(7, set(25, 20));
        cache.append(8, set(10, 25));
        cache.append(7, set(18, 25));

        assert_eq!(cache.list(7), vec![set(25, 20), set(18, 25)]);
        assert_eq!(cache.list(8), vec![set(10, 25)]);
        assert_eq!(cache.list(7), cache.list(7));
    }

    #[test]
    fn clear_resets_a_single_match() {
        let cache = SetHistoryCache::new();
        cache.append(1, set(25, 23));
        cache.append(2, set(25, 23));
        cache.clear(1);

        assert!(cache.list(1).is_empty());
        assert_eq!(cache.list(2).len(), 1);
    }
}
