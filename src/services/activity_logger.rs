use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::database::models::CreateActivityInput;
use crate::database::store::Store;
use crate::middleware::RequestInfo;
use crate::services::auth::Claims;

/// Who is making a change and from where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    pub actor_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_request(claims: &Claims, info: &RequestInfo) -> Self {
        Self {
            actor_id: Some(claims.user_id()),
            ip_address: Some(strip_port(&info.ip_address)),
            user_agent: Some(info.user_agent.clone()),
        }
    }

    /// Changes made by background work (the outbox dispatcher).
    pub fn system() -> Self {
        Self::default()
    }

    /// Build the audit row for a change to `entity_id`.
    pub fn activity(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        action: &str,
        description: String,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> CreateActivityInput {
        CreateActivityInput {
            actor_id: self.actor_id,
            entity_type: entity_type.to_string(),
            entity_id,
            action: action.to_string(),
            description,
            metadata,
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Collect metadata pairs for an activity row.
pub fn metadata<I, K>(pairs: I) -> Option<HashMap<String, serde_json::Value>>
where
    I: IntoIterator<Item = (K, serde_json::Value)>,
    K: Into<String>,
{
    let map: HashMap<String, serde_json::Value> =
        pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
    if map.is_empty() { None } else { Some(map) }
}

fn strip_port(addr: &str) -> String {
    // IPv6 addresses keep their colons.
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            host.to_string()
        }
        _ => addr.to_string(),
    }
}

/// Writes activity rows that are not part of a larger transaction.
/// Failures are logged and swallowed so an audit hiccup never masks the
/// outcome of the work being audited.
#[derive(Clone)]
pub struct ActivityLogger {
    store: Arc<dyn Store>,
}

impl ActivityLogger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn log(&self, input: CreateActivityInput) {
        let action = input.action.clone();
        let entity_id = input.entity_id;
        if let Err(err) = self.store.log_activity(input).await {
            log::error!(
                "Failed to record {} activity for {}: {}",
                action,
                entity_id,
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn strips_port_from_ipv4_only() {
        assert_eq!(strip_port("10.0.0.7:51234"), "10.0.0.7");
        assert_eq!(strip_port("10.0.0.7"), "10.0.0.7");
        assert_eq!(strip_port("::1"), "::1");
    }

    #[test]
    fn metadata_is_none_when_empty() {
        assert_eq!(metadata(Vec::<(&str, serde_json::Value)>::new()), None);
        let map = metadata([("period", json!("2026-09"))]).unwrap();
        assert_eq!(map["period"], json!("2026-09"));
    }

    #[test]
    fn system_context_has_no_actor() {
        let input = AuditContext::system().activity(
            "teacher_payment",
            Uuid::nil(),
            "notification_failed",
            "SMS failed".to_string(),
            None,
        );
        assert_eq!(input.actor_id, None);
        assert_eq!(input.ip_address, None);
    }
}
