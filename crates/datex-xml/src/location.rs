//! Location method accumulators.
//!
//! Each structure is filled incrementally while its boundary element is open
//! and is handed to the owning record only when the closing tag arrives.
//! Coordinates, codes and offsets are kept as the raw text of the feed; lookup
//! against location tables and reprojection are left to consumers.

use serde::Serialize;

use crate::model::fill;

/// Which Alert-C point an enclosed `specificLocation` belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PointRole {
    #[default]
    None,
    Primary,
    Secondary,
}

/// Start or end point of a global network linear location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Endpoint {
    #[default]
    None,
    Start,
    End,
}

/// `fromPoint` / `toPoint` bound inside a segment or address element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Bound {
    #[default]
    None,
    From,
    To,
}

/// Coordinate axis of a raw network point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Location table reference shared by Alert-C linear and point locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertCTable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction_coded: Option<String>,
}

/// Alert-C table fields addressed by their element name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCField {
    CountryCode,
    TableNumber,
    TableVersion,
    DirectionCoded,
}

impl AlertCTable {
    pub fn set(&mut self, field: AlertCField, value: &str) {
        let slot = match field {
            AlertCField::CountryCode => &mut self.country_code,
            AlertCField::TableNumber => &mut self.table_number,
            AlertCField::TableVersion => &mut self.table_version,
            AlertCField::DirectionCoded => &mut self.direction_coded,
        };
        fill(slot, value);
    }
}

/// Alert-C linear location bounded by a primary and a secondary point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertCLinear {
    #[serde(flatten)]
    pub table: AlertCTable,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_specific_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_specific_location: Option<String>,
}

impl AlertCLinear {
    /// Store a `specificLocation` code for the point currently open.
    ///
    /// Codes outside a primary or secondary point wrapper are ignored.
    pub fn set_specific_location(&mut self, role: PointRole, value: &str) {
        match role {
            PointRole::Primary => fill(&mut self.primary_specific_location, value),
            PointRole::Secondary => fill(&mut self.secondary_specific_location, value),
            PointRole::None => {}
        }
    }
}

/// Alert-C point location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertCPoint {
    #[serde(flatten)]
    pub table: AlertCTable,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_specific_location: Option<String>,
}

/// Raw coordinate pair in the feed's native reference system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawCoordinate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl RawCoordinate {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none()
    }

    fn set(&mut self, axis: Axis, value: &str) {
        match axis {
            Axis::X => fill(&mut self.x, value),
            Axis::Y => fill(&mut self.y, value),
        }
    }
}

/// One ordered section of a global network linear location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalNetworkSegment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_percent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_percent: Option<String>,
}

impl GlobalNetworkSegment {
    pub fn set_percentage(&mut self, bound: Bound, value: &str) {
        match bound {
            Bound::From => fill(&mut self.from_percent, value),
            Bound::To => fill(&mut self.to_percent, value),
            Bound::None => {}
        }
    }
}

/// Path along named network sections with percentage offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalNetworkLinear {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linear_geometry_type: Option<String>,
    #[serde(skip_serializing_if = "RawCoordinate::is_empty")]
    pub start_coordinate: RawCoordinate,
    #[serde(skip_serializing_if = "RawCoordinate::is_empty")]
    pub end_coordinate: RawCoordinate,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<GlobalNetworkSegment>,
}

impl GlobalNetworkLinear {
    /// Store one axis of the start or end coordinate.
    pub fn set_coordinate(&mut self, endpoint: Endpoint, axis: Axis, value: &str) {
        match endpoint {
            Endpoint::Start => self.start_coordinate.set(axis, value),
            Endpoint::End => self.end_coordinate.set(axis, value),
            Endpoint::None => {}
        }
    }
}

/// Address-style location: road identifiers plus distance-along offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearWithinLinearElement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub road_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub road_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_distance_along: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_distance_along: Option<String>,
}

impl LinearWithinLinearElement {
    pub fn set_distance(&mut self, bound: Bound, value: &str) {
        match bound {
            Bound::From => fill(&mut self.from_distance_along, value),
            Bound::To => fill(&mut self.to_distance_along, value),
            Bound::None => {}
        }
    }
}
