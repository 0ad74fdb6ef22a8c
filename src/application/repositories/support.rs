use crate::domain::value_objects::{RelationKind, ServerId};
use crate::shared::error::{AppError, Result};
use serde_json::{Map, Value};

/// Body a replay sends to the remote API: the stored document minus client
/// bookkeeping. Local ids, member arrays (sent separately as id lists), and
/// empty optional fields are stripped.
pub(crate) fn scrub_for_remote(data: &Value) -> Value {
    let Some(map) = data.as_object() else {
        return data.clone();
    };
    let mut out = Map::new();
    for (key, value) in map {
        if key == "localId" {
            continue;
        }
        if RelationKind::ALL.iter().any(|r| r.payload_field() == key) {
            continue;
        }
        if value.is_null() {
            continue;
        }
        if value.as_str().is_some_and(str::is_empty) {
            continue;
        }
        out.insert(key.clone(), value.clone());
    }
    Value::Object(out)
}

/// Member ids named by a `create`/`update` payload for one relation family:
/// `"producers": [{"producerId": "..."}]`, with bare strings also accepted.
pub(crate) fn member_ids_in(data: &Value, relation: RelationKind) -> Option<Vec<String>> {
    let items = data.get(relation.payload_field())?.as_array()?;
    let ids = items
        .iter()
        .filter_map(|item| {
            item.as_str()
                .or_else(|| item.get(relation.member_id_field()).and_then(Value::as_str))
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })
        .collect();
    Some(ids)
}

/// Server-assigned id out of a creation/fetch response document.
pub(crate) fn server_id_of(document: &Value) -> Result<ServerId> {
    let raw = document
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Remote {
            code: "MISSING_ID".to_string(),
            message: "response document carries no id".to_string(),
        })?;
    ServerId::new(raw.to_string()).map_err(AppError::Validation)
}

/// Confirmed member list from a server response, when present.
pub(crate) fn confirmed_members_in(
    document: &Value,
    relation: RelationKind,
) -> Option<Vec<ServerId>> {
    let items = document.get(relation.confirmed_field())?.as_array()?;
    let ids = items
        .iter()
        .filter_map(|item| {
            item.as_str()
                .or_else(|| item.get("id").and_then(Value::as_str))
        })
        .filter_map(|raw| ServerId::new(raw.to_string()).ok())
        .collect();
    Some(ids)
}

/// Rows of a bulk sync response, keyed by server id. Documents without an
/// id are dropped; the server should never produce them.
pub(crate) fn sync_rows(data: Value) -> Vec<(ServerId, Value)> {
    let Value::Array(items) = data else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| {
            let server_id = server_id_of(&item).ok()?;
            Some((server_id, item))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scrub_drops_client_only_fields() {
        let body = scrub_for_remote(&json!({
            "localId": "abc",
            "name": "OPA Nord",
            "phone": "",
            "email": null,
            "producers": [{"producerId": "p1"}],
            "region": "north",
        }));
        assert_eq!(body, json!({"name": "OPA Nord", "region": "north"}));
    }

    #[test]
    fn test_member_ids_accept_objects_and_bare_strings() {
        let data = json!({"producers": [{"producerId": "p1"}, "p2", {"other": "x"}]});
        assert_eq!(
            member_ids_in(&data, RelationKind::OpaProducer),
            Some(vec!["p1".to_string(), "p2".to_string()])
        );
        assert_eq!(member_ids_in(&data, RelationKind::ExporterBuyer), None);
    }

    #[test]
    fn test_sync_rows_skip_documents_without_id() {
        let rows = sync_rows(json!([
            {"id": "srv-1", "name": "A"},
            {"name": "broken"},
        ]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.as_str(), "srv-1");
    }
}
