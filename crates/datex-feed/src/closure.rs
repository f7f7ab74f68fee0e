//! Closure classification over decoded situation records.

use datex_xml::SituationRecord;
use serde::Deserialize;

/// Marker tokens looked up in the management type fields of a record.
///
/// Matching is a case-insensitive substring test, so the lists can be
/// extended from configuration when the upstream vocabulary changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClosureVocabulary {
    /// Tokens marking a closed road or carriageway.
    pub full: Vec<String>,
    /// Tokens marking closed lanes.
    pub lane: Vec<String>,
}

impl Default for ClosureVocabulary {
    fn default() -> Self {
        ClosureVocabulary {
            full: vec!["roadClosed".into(), "carriagewayClosed".into()],
            lane: vec!["laneClosures".into()],
        }
    }
}

impl ClosureVocabulary {
    /// Road or carriageway closed, per lane management or network management type.
    pub fn is_full_closure(&self, record: &SituationRecord) -> bool {
        contains_any(
            record.road_or_carriageway_or_lane_management_type.as_deref(),
            &self.full,
        ) || contains_any(record.network_management_type.as_deref(), &self.full)
    }

    /// Lanes closed, per lane management type.
    pub fn is_lane_closure(&self, record: &SituationRecord) -> bool {
        contains_any(
            record.road_or_carriageway_or_lane_management_type.as_deref(),
            &self.lane,
        )
    }

    pub fn is_any_closure(&self, record: &SituationRecord) -> bool {
        self.is_full_closure(record) || self.is_lane_closure(record)
    }
}

/// [`ClosureVocabulary::is_full_closure`] with the default tokens.
pub fn is_full_closure(record: &SituationRecord) -> bool {
    ClosureVocabulary::default().is_full_closure(record)
}

/// [`ClosureVocabulary::is_lane_closure`] with the default tokens.
pub fn is_lane_closure(record: &SituationRecord) -> bool {
    ClosureVocabulary::default().is_lane_closure(record)
}

/// [`ClosureVocabulary::is_any_closure`] with the default tokens.
pub fn is_any_closure(record: &SituationRecord) -> bool {
    ClosureVocabulary::default().is_any_closure(record)
}

fn contains_any(value: Option<&str>, needles: &[String]) -> bool {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return false;
    };
    let haystack = value.to_lowercase();
    needles
        .iter()
        .filter(|needle| !needle.is_empty())
        .any(|needle| haystack.contains(&needle.to_lowercase()))
}
