use super::RelationKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mutation intents a pending operation can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Update,
    UpdateRelation(RelationKind),
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::UpdateRelation(RelationKind::OpaProducer) => "update_relation_producers",
            OperationKind::UpdateRelation(RelationKind::ExporterBuyer) => "update_relation_buyers",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "create" => Ok(OperationKind::Create),
            "update" => Ok(OperationKind::Update),
            "update_relation_producers" => {
                Ok(OperationKind::UpdateRelation(RelationKind::OpaProducer))
            }
            "update_relation_buyers" => {
                Ok(OperationKind::UpdateRelation(RelationKind::ExporterBuyer))
            }
            other => Err(format!("Unknown operation kind: {other}")),
        }
    }

    /// Create and update amend into each other while unsynced; relation
    /// operations amend only with the same relation family.
    pub fn is_mutation(&self) -> bool {
        matches!(self, OperationKind::Create | OperationKind::Update)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_kind_round_trip() {
        for kind in [
            OperationKind::Create,
            OperationKind::Update,
            OperationKind::UpdateRelation(RelationKind::OpaProducer),
            OperationKind::UpdateRelation(RelationKind::ExporterBuyer),
        ] {
            assert_eq!(OperationKind::parse(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_operation_rejected() {
        assert!(OperationKind::parse("drop_table").is_err());
    }
}
