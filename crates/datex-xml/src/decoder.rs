//! Single-pass state machine turning the XML event stream into records.

use quick_xml::events::BytesStart;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, trace, warn};

use crate::location::{
    AlertCField, AlertCLinear, AlertCPoint, Axis, Bound, Endpoint, GlobalNetworkLinear,
    GlobalNetworkSegment, LinearWithinLinearElement, PointRole,
};
use crate::model::{fill, Publication, RecordDraft, SituationContext, SituationRecord};
use crate::DecodeError;

/// Elements the decoder reacts to, keyed by local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tag {
    PublicationTime,
    Situation,
    SituationVersionTime,
    HeaderInformation,
    InformationStatus,
    Urgency,
    SituationRecord,
    Field(RecordField),
    GeneralPublicComment,
    AreaName,
    Value,
    RoadNumber,
    RoadName,
    LocationDescriptor,
    AlertCLinear,
    AlertCPoint,
    AlertC(AlertCField),
    PrimaryPointLocation,
    SecondaryPointLocation,
    SpecificLocation,
    GlobalNetworkLinear,
    NetworkVersion,
    LinearGeometryType,
    StartPoint,
    EndPoint,
    Coordinate(Axis),
    NetworkSegment,
    SectionId,
    DirectionOnSection,
    OrderOfSection,
    FromPoint,
    ToPoint,
    PercentageDistanceAlong,
    DistanceAlong,
    LinearWithinLinearElement,
}

/// Record-level leaves written straight into the open record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordField {
    ValidityStatus,
    OverallStartTime,
    OverallEndTime,
    ProbabilityOfOccurrence,
    NetworkManagementType,
    RoadworksType,
    RestrictionType,
    LaneManagementType,
    TrafficControlType,
    SpeedLimit,
    AccidentType,
    VehicleObstructionType,
    AuthorityOperationType,
}

impl Tag {
    pub(crate) fn from_local_name(name: &[u8]) -> Option<Tag> {
        let tag = match name {
            b"publicationTime" => Tag::PublicationTime,
            b"situation" => Tag::Situation,
            b"situationVersionTime" => Tag::SituationVersionTime,
            b"headerInformation" => Tag::HeaderInformation,
            b"informationStatus" => Tag::InformationStatus,
            b"urgency" => Tag::Urgency,
            b"situationRecord" => Tag::SituationRecord,
            b"validityStatus" => Tag::Field(RecordField::ValidityStatus),
            b"overallStartTime" => Tag::Field(RecordField::OverallStartTime),
            b"overallEndTime" => Tag::Field(RecordField::OverallEndTime),
            b"probabilityOfOccurrence" => Tag::Field(RecordField::ProbabilityOfOccurrence),
            b"networkManagementType" => Tag::Field(RecordField::NetworkManagementType),
            b"roadMaintenanceType" | b"roadworksType" => Tag::Field(RecordField::RoadworksType),
            b"restrictionType" => Tag::Field(RecordField::RestrictionType),
            b"roadOrCarriagewayOrLaneManagementType" => {
                Tag::Field(RecordField::LaneManagementType)
            }
            b"trafficControlType" => Tag::Field(RecordField::TrafficControlType),
            b"speedLimit" => Tag::Field(RecordField::SpeedLimit),
            b"accidentType" => Tag::Field(RecordField::AccidentType),
            b"vehicleObstructionType" => Tag::Field(RecordField::VehicleObstructionType),
            b"authorityOperationType" => Tag::Field(RecordField::AuthorityOperationType),
            b"generalPublicComment" => Tag::GeneralPublicComment,
            b"areaName" => Tag::AreaName,
            b"value" => Tag::Value,
            b"roadNumber" => Tag::RoadNumber,
            b"roadName" => Tag::RoadName,
            b"locationDescriptor" => Tag::LocationDescriptor,
            b"alertCLinear" => Tag::AlertCLinear,
            b"alertCPoint" => Tag::AlertCPoint,
            b"alertCLocationCountryCode" => Tag::AlertC(AlertCField::CountryCode),
            b"alertCLocationTableNumber" => Tag::AlertC(AlertCField::TableNumber),
            b"alertCLocationTableVersion" => Tag::AlertC(AlertCField::TableVersion),
            b"alertCDirectionCoded" => Tag::AlertC(AlertCField::DirectionCoded),
            b"alertCMethod2PrimaryPointLocation" | b"alertCMethod4PrimaryPointLocation" => {
                Tag::PrimaryPointLocation
            }
            b"alertCMethod2SecondaryPointLocation" | b"alertCMethod4SecondaryPointLocation" => {
                Tag::SecondaryPointLocation
            }
            b"specificLocation" => Tag::SpecificLocation,
            b"globalNetworkLinear" => Tag::GlobalNetworkLinear,
            b"networkVersion" => Tag::NetworkVersion,
            b"linearGeometryType" => Tag::LinearGeometryType,
            b"startPoint" => Tag::StartPoint,
            b"endPoint" => Tag::EndPoint,
            b"sjtskX" => Tag::Coordinate(Axis::X),
            b"sjtskY" => Tag::Coordinate(Axis::Y),
            b"linearWithinLinearGNElement" => Tag::NetworkSegment,
            b"sectionId" => Tag::SectionId,
            b"directionRelativeOnLinearSection" => Tag::DirectionOnSection,
            b"orderOfSection" => Tag::OrderOfSection,
            b"fromPoint" => Tag::FromPoint,
            b"toPoint" => Tag::ToPoint,
            b"percentageDistanceAlong" => Tag::PercentageDistanceAlong,
            b"distanceAlong" => Tag::DistanceAlong,
            b"linearWithinLinearElement" => Tag::LinearWithinLinearElement,
            _ => return None,
        };
        Some(tag)
    }
}

/// Wrapper whose `values/value` descendants currently carry a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum ValueScope {
    #[default]
    None,
    Comment,
    AreaName,
    NetworkVersion,
}

/// All mutable state of one decode call.
#[derive(Debug, Default)]
pub(crate) struct DecoderState {
    publication_time: Option<OffsetDateTime>,
    records: Vec<SituationRecord>,

    situation: Option<SituationContext>,
    in_header: bool,

    record: Option<RecordDraft>,
    value_scope: ValueScope,

    alert_c_linear: Option<AlertCLinear>,
    alert_c_point: Option<AlertCPoint>,
    point_role: PointRole,

    network_linear: Option<GlobalNetworkLinear>,
    network_segment: Option<GlobalNetworkSegment>,
    endpoint: Endpoint,
    segment_bound: Bound,

    element: Option<LinearWithinLinearElement>,
    element_bound: Bound,
}

impl DecoderState {
    pub(crate) fn on_start(&mut self, tag: Tag, event: &BytesStart<'_>) -> Result<(), DecodeError> {
        match tag {
            Tag::Situation => {
                self.situation = Some(SituationContext {
                    id: attribute(event, b"id")?,
                    version: attribute(event, b"version")?,
                    ..SituationContext::default()
                });
                self.in_header = false;
            }
            Tag::HeaderInformation => self.in_header = true,
            Tag::SituationRecord => {
                let id = attribute(event, b"id")?;
                let record_type = attribute(event, b"type")?;
                self.open_record(id, record_type);
            }
            Tag::GeneralPublicComment => self.value_scope = ValueScope::Comment,
            Tag::AreaName => self.value_scope = ValueScope::AreaName,
            Tag::NetworkVersion => self.value_scope = ValueScope::NetworkVersion,
            Tag::AlertCLinear => {
                if self.alert_c_linear.replace(AlertCLinear::default()).is_some() {
                    warn!("discarding alertCLinear that was never closed");
                }
                self.point_role = PointRole::None;
            }
            Tag::AlertCPoint => {
                if self.alert_c_point.replace(AlertCPoint::default()).is_some() {
                    warn!("discarding alertCPoint that was never closed");
                }
            }
            Tag::PrimaryPointLocation => self.point_role = PointRole::Primary,
            Tag::SecondaryPointLocation => self.point_role = PointRole::Secondary,
            Tag::GlobalNetworkLinear => {
                if self
                    .network_linear
                    .replace(GlobalNetworkLinear::default())
                    .is_some()
                {
                    warn!("discarding globalNetworkLinear that was never closed");
                }
                self.network_segment = None;
                self.endpoint = Endpoint::None;
                self.segment_bound = Bound::None;
            }
            Tag::StartPoint => self.endpoint = Endpoint::Start,
            Tag::EndPoint => self.endpoint = Endpoint::End,
            Tag::NetworkSegment => {
                if self
                    .network_segment
                    .replace(GlobalNetworkSegment::default())
                    .is_some()
                {
                    warn!("discarding network segment that was never closed");
                }
                self.segment_bound = Bound::None;
            }
            Tag::FromPoint => self.enter_bound(Bound::From),
            Tag::ToPoint => self.enter_bound(Bound::To),
            Tag::LinearWithinLinearElement => {
                if self
                    .element
                    .replace(LinearWithinLinearElement::default())
                    .is_some()
                {
                    warn!("discarding linearWithinLinearElement that was never closed");
                }
                self.element_bound = Bound::None;
            }
            _ => {}
        }
        Ok(())
    }

    /// Handle a closing tag. `text` is the element's trimmed, non-empty
    /// character data.
    pub(crate) fn on_end(&mut self, tag: Tag, text: Option<&str>) {
        match tag {
            Tag::PublicationTime => self.set_publication_time(text),
            Tag::Situation => {
                self.situation = None;
                self.in_header = false;
            }
            Tag::HeaderInformation => self.in_header = false,
            Tag::SituationVersionTime => {
                if let (Some(situation), Some(text)) = (self.situation.as_mut(), text) {
                    fill(&mut situation.version_time, text);
                }
            }
            Tag::InformationStatus | Tag::Urgency => {
                let (Some(situation), Some(text)) = (self.situation.as_mut(), text) else {
                    return;
                };
                if !self.in_header {
                    return;
                }
                let slot = if tag == Tag::Urgency {
                    &mut situation.urgency
                } else {
                    &mut situation.information_status
                };
                fill(slot, text);
            }
            Tag::SituationRecord => {
                if let Some(draft) = self.record.take() {
                    self.emit(draft);
                }
                self.reset_record_scope();
            }
            Tag::Field(field) => self.set_record_field(field, text),
            Tag::GeneralPublicComment => self.leave_scope(ValueScope::Comment),
            Tag::AreaName => self.leave_scope(ValueScope::AreaName),
            Tag::NetworkVersion => self.leave_scope(ValueScope::NetworkVersion),
            Tag::Value => self.set_scoped_value(text),
            Tag::RoadNumber | Tag::RoadName => self.set_road(tag, text),
            Tag::LocationDescriptor => {
                if let (Some(draft), Some(text)) = (self.record.as_mut(), text) {
                    fill(&mut draft.location_descriptor, text);
                }
            }
            Tag::AlertC(field) => {
                let Some(text) = text else { return };
                if let Some(linear) = self.alert_c_linear.as_mut() {
                    linear.table.set(field, text);
                }
                if let Some(point) = self.alert_c_point.as_mut() {
                    point.table.set(field, text);
                }
            }
            Tag::PrimaryPointLocation => self.leave_role(PointRole::Primary),
            Tag::SecondaryPointLocation => self.leave_role(PointRole::Secondary),
            Tag::SpecificLocation => {
                let Some(text) = text else { return };
                if let Some(linear) = self.alert_c_linear.as_mut() {
                    linear.set_specific_location(self.point_role, text);
                } else if let Some(point) = self.alert_c_point.as_mut() {
                    fill(&mut point.primary_specific_location, text);
                }
            }
            Tag::AlertCLinear => {
                if let Some(linear) = self.alert_c_linear.take() {
                    if let Some(draft) = self.record.as_mut() {
                        draft.record.alert_c_linear.push(linear);
                    }
                }
                self.point_role = PointRole::None;
            }
            Tag::AlertCPoint => {
                if let Some(point) = self.alert_c_point.take() {
                    if let Some(draft) = self.record.as_mut() {
                        draft.record.alert_c_point.push(point);
                    }
                }
                self.point_role = PointRole::None;
            }
            Tag::LinearGeometryType => {
                if let (Some(linear), Some(text)) = (self.network_linear.as_mut(), text) {
                    fill(&mut linear.linear_geometry_type, text);
                }
            }
            Tag::StartPoint => self.leave_endpoint(Endpoint::Start),
            Tag::EndPoint => self.leave_endpoint(Endpoint::End),
            Tag::Coordinate(axis) => {
                if let (Some(linear), Some(text)) = (self.network_linear.as_mut(), text) {
                    linear.set_coordinate(self.endpoint, axis, text);
                }
            }
            Tag::SectionId | Tag::OrderOfSection => {
                let (Some(segment), Some(text)) = (self.network_segment.as_mut(), text) else {
                    return;
                };
                let slot = if tag == Tag::SectionId {
                    &mut segment.section_id
                } else {
                    &mut segment.order
                };
                fill(slot, text);
            }
            Tag::DirectionOnSection => {
                // Shared name: lands in every accumulator legitimately open.
                let Some(text) = text else { return };
                if let Some(segment) = self.network_segment.as_mut() {
                    fill(&mut segment.direction, text);
                }
                if let Some(element) = self.element.as_mut() {
                    fill(&mut element.direction, text);
                }
            }
            Tag::FromPoint | Tag::ToPoint => {
                self.segment_bound = Bound::None;
                self.element_bound = Bound::None;
            }
            Tag::PercentageDistanceAlong => {
                if let (Some(segment), Some(text)) = (self.network_segment.as_mut(), text) {
                    segment.set_percentage(self.segment_bound, text);
                }
            }
            Tag::DistanceAlong => {
                if let (Some(element), Some(text)) = (self.element.as_mut(), text) {
                    element.set_distance(self.element_bound, text);
                }
            }
            Tag::NetworkSegment => {
                if let Some(segment) = self.network_segment.take() {
                    match self.network_linear.as_mut() {
                        Some(linear) => linear.segments.push(segment),
                        None => trace!("network segment outside globalNetworkLinear ignored"),
                    }
                }
                self.segment_bound = Bound::None;
            }
            Tag::GlobalNetworkLinear => {
                if self.network_segment.take().is_some() {
                    warn!("discarding network segment that was never closed");
                }
                if let Some(linear) = self.network_linear.take() {
                    if let Some(draft) = self.record.as_mut() {
                        draft.record.global_network_linear.push(linear);
                    }
                }
                self.endpoint = Endpoint::None;
                self.segment_bound = Bound::None;
                self.leave_scope(ValueScope::NetworkVersion);
            }
            Tag::LinearWithinLinearElement => {
                if let Some(element) = self.element.take() {
                    if let Some(draft) = self.record.as_mut() {
                        draft.record.linear_within_linear_element.push(element);
                    }
                }
                self.element_bound = Bound::None;
            }
        }
    }

    /// Close the decode: a record still open at end of input is finalized
    /// under the usual identity rule.
    pub(crate) fn finish(mut self) -> Publication {
        if let Some(draft) = self.record.take() {
            warn!(
                record_id = %draft.record.id,
                "input ended inside a situation record; finalizing it"
            );
            self.emit(draft);
        }
        Publication {
            publication_time: self.publication_time,
            records: self.records,
        }
    }

    fn open_record(&mut self, id: Option<String>, record_type: Option<String>) {
        self.flush_open_record();
        self.reset_record_scope();
        let situation = self.situation.clone().unwrap_or_default();
        self.record = Some(RecordDraft::open(id, record_type, situation));
    }

    /// A record start while another record is open emits the open one first,
    /// as if its closing tag had been seen.
    fn flush_open_record(&mut self) {
        if let Some(draft) = self.record.take() {
            warn!(
                record_id = %draft.record.id,
                "situation record not closed before the next one; flushing"
            );
            self.emit(draft);
        }
    }

    fn emit(&mut self, draft: RecordDraft) {
        match draft.finish() {
            Some(record) => {
                debug!(
                    record_id = %record.id,
                    record_type = record.record_type.as_deref().unwrap_or("-"),
                    "situation record decoded"
                );
                self.records.push(record);
            }
            None => debug!("dropping situation record without id"),
        }
    }

    /// Forget every accumulator and flag that belongs to a single record.
    fn reset_record_scope(&mut self) {
        self.value_scope = ValueScope::None;
        self.alert_c_linear = None;
        self.alert_c_point = None;
        self.point_role = PointRole::None;
        self.network_linear = None;
        self.network_segment = None;
        self.endpoint = Endpoint::None;
        self.segment_bound = Bound::None;
        self.element = None;
        self.element_bound = Bound::None;
    }

    fn enter_bound(&mut self, bound: Bound) {
        self.segment_bound = if self.network_segment.is_some() {
            bound
        } else {
            Bound::None
        };
        self.element_bound = if self.element.is_some() {
            bound
        } else {
            Bound::None
        };
    }

    fn leave_scope(&mut self, scope: ValueScope) {
        if self.value_scope == scope {
            self.value_scope = ValueScope::None;
        }
    }

    fn leave_role(&mut self, role: PointRole) {
        if self.point_role == role {
            self.point_role = PointRole::None;
        }
    }

    fn leave_endpoint(&mut self, endpoint: Endpoint) {
        if self.endpoint == endpoint {
            self.endpoint = Endpoint::None;
        }
    }

    fn set_publication_time(&mut self, text: Option<&str>) {
        if self.publication_time.is_some() {
            return;
        }
        let Some(text) = text else { return };
        match OffsetDateTime::parse(text, &Rfc3339) {
            Ok(value) => self.publication_time = Some(value),
            Err(err) => warn!(value = text, %err, "ignoring unparsable publicationTime"),
        }
    }

    fn set_record_field(&mut self, field: RecordField, text: Option<&str>) {
        let (Some(draft), Some(text)) = (self.record.as_mut(), text) else {
            return;
        };
        let record = &mut draft.record;
        let slot = match field {
            RecordField::ValidityStatus => &mut record.validity_status,
            RecordField::OverallStartTime => &mut record.overall_start_time,
            RecordField::OverallEndTime => &mut record.overall_end_time,
            RecordField::ProbabilityOfOccurrence => &mut record.probability_of_occurrence,
            RecordField::NetworkManagementType => &mut record.network_management_type,
            RecordField::RoadworksType => &mut record.roadworks_type,
            RecordField::RestrictionType => &mut record.restriction_type,
            RecordField::LaneManagementType => {
                &mut record.road_or_carriageway_or_lane_management_type
            }
            RecordField::TrafficControlType => &mut record.traffic_control_type,
            RecordField::SpeedLimit => &mut record.speed_limit,
            RecordField::AccidentType => &mut record.accident_type,
            RecordField::VehicleObstructionType => &mut record.vehicle_obstruction_type,
            RecordField::AuthorityOperationType => &mut record.authority_operation_type,
        };
        fill(slot, text);
    }

    fn set_scoped_value(&mut self, text: Option<&str>) {
        let Some(text) = text else { return };
        match self.value_scope {
            ValueScope::NetworkVersion => {
                if let Some(linear) = self.network_linear.as_mut() {
                    fill(&mut linear.network_version, text);
                }
            }
            ValueScope::AreaName => {
                if let Some(draft) = self.record.as_mut() {
                    fill(&mut draft.area_name, text);
                }
            }
            ValueScope::Comment => {
                if let Some(draft) = self.record.as_mut() {
                    fill(&mut draft.record.comment, text);
                }
            }
            ValueScope::None => {}
        }
    }

    fn set_road(&mut self, tag: Tag, text: Option<&str>) {
        let Some(text) = text else { return };
        if let Some(element) = self.element.as_mut() {
            let slot = if tag == Tag::RoadNumber {
                &mut element.road_number
            } else {
                &mut element.road_name
            };
            fill(slot, text);
        } else if let Some(draft) = self.record.as_mut() {
            fill(&mut draft.record.road_name_or_number, text);
        }
    }
}

/// Trimmed value of the first attribute with the given local name.
fn attribute(event: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>, DecodeError> {
    for attr in event.attributes() {
        let attr = attr.map_err(|err| DecodeError::Attribute(err.to_string()))?;
        if attr.key.local_name().as_ref() == local {
            let value = attr
                .unescape_value()
                .map_err(|err| DecodeError::Attribute(err.to_string()))?;
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            return Ok(Some(trimmed.to_string()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(state: &mut DecoderState, name: &str, attrs: &[(&str, &str)]) {
        let tag = Tag::from_local_name(name.as_bytes()).expect("known tag");
        let event = BytesStart::new(name).with_attributes(attrs.iter().copied());
        state.on_start(tag, &event).expect("start");
    }

    fn end(state: &mut DecoderState, name: &str, text: Option<&str>) {
        let tag = Tag::from_local_name(name.as_bytes()).expect("known tag");
        state.on_end(tag, text);
    }

    #[test]
    fn finish_flushes_record_left_open() {
        let mut state = DecoderState::default();
        start(&mut state, "situationRecord", &[("id", "R1")]);
        end(&mut state, "accidentType", Some("collision"));
        let publication = state.finish();
        assert_eq!(publication.records.len(), 1);
        assert_eq!(publication.records[0].id, "R1");
        assert_eq!(publication.records[0].accident_type.as_deref(), Some("collision"));
    }

    #[test]
    fn finish_drops_open_record_without_id() {
        let mut state = DecoderState::default();
        start(&mut state, "situationRecord", &[]);
        assert!(state.finish().records.is_empty());
    }

    #[test]
    fn next_record_start_flushes_unclosed_record() {
        let mut state = DecoderState::default();
        start(&mut state, "situationRecord", &[("id", "R1")]);
        start(&mut state, "alertCPoint", &[]);
        start(&mut state, "alertCMethod2PrimaryPointLocation", &[]);
        start(&mut state, "situationRecord", &[("id", "R2")]);
        end(&mut state, "specificLocation", Some("4067"));
        end(&mut state, "situationRecord", None);

        let records = state.finish().records;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "R1");
        assert!(records[0].alert_c_point.is_empty());
        assert_eq!(records[1].id, "R2");
        assert!(records[1].alert_c_point.is_empty());
    }

    #[test]
    fn record_boundary_clears_structure_flags() {
        let mut state = DecoderState::default();
        start(&mut state, "situationRecord", &[("id", "R1")]);
        start(&mut state, "linearWithinLinearElement", &[]);
        start(&mut state, "fromPoint", &[]);
        start(&mut state, "generalPublicComment", &[]);
        end(&mut state, "situationRecord", None);

        assert_eq!(state.element_bound, Bound::None);
        assert_eq!(state.value_scope, ValueScope::None);
        assert!(state.element.is_none());

        start(&mut state, "situationRecord", &[("id", "R2")]);
        end(&mut state, "value", Some("stray"));
        end(&mut state, "distanceAlong", Some("10"));
        end(&mut state, "situationRecord", None);
        let records = state.finish().records;
        assert_eq!(records[1].comment, None);
        assert!(records[1].linear_within_linear_element.is_empty());
    }

    #[test]
    fn point_roles_are_exclusive() {
        let mut state = DecoderState::default();
        start(&mut state, "situationRecord", &[("id", "R1")]);
        start(&mut state, "alertCLinear", &[]);
        start(&mut state, "alertCMethod2PrimaryPointLocation", &[]);
        start(&mut state, "alertCMethod2SecondaryPointLocation", &[]);
        assert_eq!(state.point_role, PointRole::Secondary);
        end(&mut state, "specificLocation", Some("2"));
        end(&mut state, "alertCMethod2PrimaryPointLocation", None);
        assert_eq!(state.point_role, PointRole::Secondary);
        end(&mut state, "alertCMethod2SecondaryPointLocation", None);
        end(&mut state, "specificLocation", Some("3"));
        end(&mut state, "alertCLinear", None);

        let records = state.finish().records;
        let linear = &records[0].alert_c_linear[0];
        assert_eq!(linear.primary_specific_location, None);
        assert_eq!(linear.secondary_specific_location.as_deref(), Some("2"));
    }

    #[test]
    fn unknown_names_are_not_tags() {
        assert_eq!(Tag::from_local_name(b"situationRecordVersionTime"), None);
        assert_eq!(
            Tag::from_local_name(b"roadworksType"),
            Tag::from_local_name(b"roadMaintenanceType")
        );
    }
}
