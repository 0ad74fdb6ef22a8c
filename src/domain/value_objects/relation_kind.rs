use serde::{Deserialize, Serialize};
use std::fmt;

/// Many-to-many link families between actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Producer enrolled in a cooperative OPA group.
    OpaProducer,
    /// Buyer mandated by an exporter network.
    ExporterBuyer,
}

impl RelationKind {
    pub const ALL: [RelationKind; 2] = [RelationKind::OpaProducer, RelationKind::ExporterBuyer];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::OpaProducer => "opa_producer",
            RelationKind::ExporterBuyer => "exporter_buyer",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "opa_producer" => Ok(RelationKind::OpaProducer),
            "exporter_buyer" => Ok(RelationKind::ExporterBuyer),
            other => Err(format!("Unknown relation kind: {other}")),
        }
    }

    /// Member collection segment used both in remote API paths
    /// (`POST /actors/:id/<segment>`) and as the operation suffix.
    pub fn segment(&self) -> &'static str {
        match self {
            RelationKind::OpaProducer => "producers",
            RelationKind::ExporterBuyer => "buyers",
        }
    }

    /// Key of the member array carried inside a `create` payload
    /// (`"producers": [{"producerId": ...}]`).
    pub fn payload_field(&self) -> &'static str {
        match self {
            RelationKind::OpaProducer => "producers",
            RelationKind::ExporterBuyer => "buyers",
        }
    }

    /// Key of the member id inside each entry of the payload array.
    pub fn member_id_field(&self) -> &'static str {
        match self {
            RelationKind::OpaProducer => "producerId",
            RelationKind::ExporterBuyer => "buyerId",
        }
    }

    /// Key of the confirmed member id list in server responses.
    pub fn confirmed_field(&self) -> &'static str {
        match self {
            RelationKind::OpaProducer => "producerIds",
            RelationKind::ExporterBuyer => "buyerIds",
        }
    }

    pub fn from_segment(value: &str) -> Result<Self, String> {
        match value {
            "producers" => Ok(RelationKind::OpaProducer),
            "buyers" => Ok(RelationKind::ExporterBuyer),
            other => Err(format!("Unknown relation segment: {other}")),
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
