//! In-memory shape of a decoded situation publication.

use serde::Serialize;
use time::OffsetDateTime;

use crate::location::{AlertCLinear, AlertCPoint, GlobalNetworkLinear, LinearWithinLinearElement};

/// Store `value` into `slot` unless the slot already holds non-blank text.
///
/// Blank values never overwrite anything.
pub(crate) fn fill(slot: &mut Option<String>, value: &str) {
    if slot.as_deref().is_some_and(|current| !current.trim().is_empty()) {
        return;
    }
    let trimmed = value.trim();
    if !trimmed.is_empty() {
        *slot = Some(trimmed.to_string());
    }
}

/// Result of decoding one `SituationPublication` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub publication_time: Option<OffsetDateTime>,
    pub records: Vec<SituationRecord>,
}

/// Header of the enclosing `situation`, copied into each of its records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SituationContext {
    #[serde(rename = "situationId", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "situationVersion", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(
        rename = "situationVersionTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub version_time: Option<String>,
    #[serde(rename = "informationStatus", skip_serializing_if = "Option::is_none")]
    pub information_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
}

/// One reported road event.
///
/// Values are the trimmed text of the feed. Absent fields and empty location
/// lists are left out of the serialized form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SituationRecord {
    #[serde(flatten)]
    pub situation: SituationContext,

    #[serde(rename = "situationRecordId")]
    pub id: String,
    /// Schema type discriminator (`xsi:type`), e.g. `MaintenanceWorks`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability_of_occurrence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_management_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roadworks_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restriction_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub road_or_carriageway_or_lane_management_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_control_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accident_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_obstruction_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority_operation_type: Option<String>,

    #[serde(rename = "road", skip_serializing_if = "Option::is_none")]
    pub road_name_or_number: Option<String>,
    /// Area name when present, otherwise the plain location descriptor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_text: Option<String>,

    #[serde(rename = "alertCLinear", skip_serializing_if = "Vec::is_empty")]
    pub alert_c_linear: Vec<AlertCLinear>,
    #[serde(rename = "alertCPoint", skip_serializing_if = "Vec::is_empty")]
    pub alert_c_point: Vec<AlertCPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub global_network_linear: Vec<GlobalNetworkLinear>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub linear_within_linear_element: Vec<LinearWithinLinearElement>,

    pub is_closure: bool,
}

impl SituationRecord {
    /// Whether either management type mentions a closed road, carriageway or lane.
    pub fn mentions_closed(&self) -> bool {
        [
            &self.road_or_carriageway_or_lane_management_type,
            &self.network_management_type,
        ]
        .into_iter()
        .flatten()
        .any(|value| value.to_ascii_lowercase().contains("closed"))
    }
}

/// Record under construction plus the location labels that are only
/// resolved once the record closes.
#[derive(Debug, Default)]
pub(crate) struct RecordDraft {
    pub record: SituationRecord,
    pub area_name: Option<String>,
    pub location_descriptor: Option<String>,
}

impl RecordDraft {
    pub fn open(id: Option<String>, record_type: Option<String>, situation: SituationContext) -> Self {
        RecordDraft {
            record: SituationRecord {
                situation,
                id: id.unwrap_or_default(),
                record_type,
                ..SituationRecord::default()
            },
            area_name: None,
            location_descriptor: None,
        }
    }

    /// Freeze the draft. Records without an identity yield `None`.
    pub fn finish(self) -> Option<SituationRecord> {
        let RecordDraft {
            mut record,
            area_name,
            location_descriptor,
        } = self;
        if record.id.trim().is_empty() {
            return None;
        }
        record.location_text = area_name.or(location_descriptor);
        record.is_closure = record.mentions_closed();
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_keeps_first_non_blank_value() {
        let mut slot = None;
        fill(&mut slot, "   ");
        assert_eq!(slot, None);
        fill(&mut slot, "  roadClosed ");
        fill(&mut slot, "laneClosures");
        assert_eq!(slot.as_deref(), Some("roadClosed"));

        let mut blank = Some(String::new());
        fill(&mut blank, "value");
        assert_eq!(blank.as_deref(), Some("value"));
    }

    #[test]
    fn draft_without_id_is_dropped() {
        let draft = RecordDraft::open(None, Some("Accident".into()), SituationContext::default());
        assert!(draft.finish().is_none());
        let draft = RecordDraft::open(Some("  ".into()), None, SituationContext::default());
        assert!(draft.finish().is_none());
    }

    #[test]
    fn area_name_preferred_for_location_text() {
        let mut draft = RecordDraft::open(Some("r1".into()), None, SituationContext::default());
        draft.location_descriptor = Some("Brno, D1".into());
        draft.area_name = Some("Jihomoravský kraj".into());
        let record = draft.finish().expect("record");
        assert_eq!(record.location_text.as_deref(), Some("Jihomoravský kraj"));

        let mut draft = RecordDraft::open(Some("r2".into()), None, SituationContext::default());
        draft.location_descriptor = Some("Brno, D1".into());
        let record = draft.finish().expect("record");
        assert_eq!(record.location_text.as_deref(), Some("Brno, D1"));
    }

    #[test]
    fn closure_flag_checks_both_management_fields() {
        let mut draft = RecordDraft::open(Some("r1".into()), None, SituationContext::default());
        draft.record.road_or_carriageway_or_lane_management_type = Some("narrowLanes".into());
        draft.record.network_management_type = Some("roadClosed".into());
        assert!(draft.finish().expect("record").is_closure);

        let draft = RecordDraft::open(Some("r2".into()), None, SituationContext::default());
        assert!(!draft.finish().expect("record").is_closure);
    }

    #[test]
    fn serialization_omits_absent_fields() {
        let situation = SituationContext {
            id: Some("S1".into()),
            urgency: Some("urgent".into()),
            ..SituationContext::default()
        };
        let mut draft = RecordDraft::open(Some("R1".into()), Some("MaintenanceWorks".into()), situation);
        draft.record.roadworks_type = Some("roadworks".into());
        let record = draft.finish().expect("record");
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "situationId": "S1",
                "urgency": "urgent",
                "situationRecordId": "R1",
                "recordType": "MaintenanceWorks",
                "roadworksType": "roadworks",
                "isClosure": false
            })
        );
    }
}
