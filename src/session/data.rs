//! Session payload.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::session::value::Value;

/// Session value naming the signed-in user.
pub const USER_ID_KEY: &str = "user_id";

/// The payload carried, encrypted, in the session cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Session values.
    #[serde(rename = "d", default)]
    pub data: BTreeMap<String, Value>,

    /// One-shot flash messages.
    #[serde(rename = "f", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flash: BTreeMap<String, String>,

    /// Expiry (seconds since epoch).
    #[serde(rename = "e")]
    pub expires_at: u64,
}

impl SessionData {
    /// An empty session expiring `max_age` from now.
    pub fn new(max_age: Duration) -> Self {
        Self {
            data: BTreeMap::new(),
            flash: BTreeMap::new(),
            expires_at: now_secs().saturating_add(max_age.as_secs()),
        }
    }

    pub fn is_expired(&self) -> bool {
        now_secs() > self.expires_at
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.flash.is_empty()
    }

    /// The `user_id` value as text, when it is a non-empty string or an integer.
    pub fn user_id(&self) -> Option<String> {
        match self.data.get(USER_ID_KEY)? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Int(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id() {
        let mut data = SessionData::new(Duration::from_secs(60));
        assert_eq!(data.user_id(), None);
        data.data.insert(USER_ID_KEY.into(), Value::Int(42));
        assert_eq!(data.user_id().as_deref(), Some("42"));
        data.data.insert(USER_ID_KEY.into(), Value::String("ada".into()));
        assert_eq!(data.user_id().as_deref(), Some("ada"));
        data.data.insert(USER_ID_KEY.into(), Value::String(String::new()));
        assert_eq!(data.user_id(), None);
    }

    #[test]
    fn test_new_session_is_empty_and_live() {
        let data = SessionData::new(Duration::from_secs(60));
        assert!(data.is_empty());
        assert!(!data.is_expired());
        assert!(data.expires_at >= now_secs() + 59);
    }

    #[test]
    fn test_expired() {
        let mut data = SessionData::new(Duration::from_secs(60));
        data.expires_at = now_secs() - 10;
        assert!(data.is_expired());
    }

    #[test]
    fn test_missing_maps_deserialize_empty() {
        let data: SessionData = serde_json::from_str(r#"{"e": 1}"#).unwrap();
        assert!(data.data.is_empty());
        assert!(data.flash.is_empty());
        assert_eq!(data.expires_at, 1);
    }

    #[test]
    fn test_wire_names() {
        let mut data = SessionData::new(Duration::from_secs(1));
        data.data.insert("user_id".into(), Value::Int(42));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["d"]["user_id"], 42);
        assert!(json.get("f").is_none());
        assert!(json["e"].is_u64());
    }
}
