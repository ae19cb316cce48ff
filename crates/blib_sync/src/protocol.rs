//! Realtime channel message types (Phoenix wire format)

use crate::store::PushEvent;
use blib_common::{Bookmark, BookmarkId, OwnerId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Topic used for socket-level heartbeats
pub const HEARTBEAT_TOPIC: &str = "phoenix";

/// One frame on the realtime socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

/// What a received frame means for the subscription
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Our join was accepted
    JoinOk,
    /// Join or channel setup rejected by the server
    JoinError(String),
    Push(PushEvent),
    /// Server closed or errored the channel
    Closed(String),
    /// Heartbeat acks, presence, updates and anything else we do not track
    Ignored,
}

impl PhoenixMessage {
    /// Join the bookmarks channel with insert and delete filters for `owner`
    pub fn join(
        topic: &str,
        table: &str,
        owner: &OwnerId,
        access_token: &str,
        msg_ref: &str,
    ) -> Self {
        let filter = format!("user_id=eq.{}", owner);
        let change = |event: &str| {
            json!({
                "event": event,
                "schema": "public",
                "table": table,
                "filter": filter,
            })
        };

        Self {
            topic: topic.to_string(),
            event: "phx_join".to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [change("INSERT"), change("DELETE")],
                },
                "access_token": access_token,
            }),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: Some(msg_ref.to_string()),
        }
    }

    pub fn heartbeat(msg_ref: &str) -> Self {
        Self {
            topic: HEARTBEAT_TOPIC.to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: None,
        }
    }

    pub fn leave(topic: &str, msg_ref: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
            join_ref: None,
        }
    }

    /// Serialize message to JSON text
    pub fn to_text(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize message from JSON text
    pub fn from_text(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Interpret the frame relative to the join we sent (`join_ref`)
    pub fn classify(&self, join_ref: &str) -> crate::Result<ChannelEvent> {
        match self.event.as_str() {
            "phx_reply" => Ok(self.classify_reply(join_ref)),
            "phx_error" => Ok(ChannelEvent::Closed("channel error".to_string())),
            "phx_close" => Ok(ChannelEvent::Closed("channel closed".to_string())),
            "system" => {
                if self.payload["status"] == "error" {
                    let message = self.payload["message"]
                        .as_str()
                        .unwrap_or("system error")
                        .to_string();
                    Ok(ChannelEvent::JoinError(message))
                } else {
                    Ok(ChannelEvent::Ignored)
                }
            }
            "postgres_changes" => self.classify_change(),
            _ => Ok(ChannelEvent::Ignored),
        }
    }

    fn classify_reply(&self, join_ref: &str) -> ChannelEvent {
        if self.msg_ref.as_deref() != Some(join_ref) {
            return ChannelEvent::Ignored;
        }
        match self.payload["status"].as_str() {
            Some("ok") => ChannelEvent::JoinOk,
            _ => {
                let reason = match &self.payload["response"]["reason"] {
                    Value::String(reason) => reason.clone(),
                    Value::Null => self.payload["response"].to_string(),
                    other => other.to_string(),
                };
                ChannelEvent::JoinError(reason)
            }
        }
    }

    fn classify_change(&self) -> crate::Result<ChannelEvent> {
        let data = &self.payload["data"];
        match data["type"].as_str() {
            Some("INSERT") => {
                let bookmark: Bookmark = serde_json::from_value(data["record"].clone())?;
                Ok(ChannelEvent::Push(PushEvent::Insert(bookmark)))
            }
            Some("DELETE") => {
                let old = &data["old_record"];
                // same id rules as full records
                match BookmarkId::deserialize(&old["id"]) {
                    Ok(id) => Ok(ChannelEvent::Push(PushEvent::Delete {
                        id,
                        owner_id: old["user_id"].as_str().map(OwnerId::new),
                    })),
                    Err(_) => Ok(ChannelEvent::Ignored),
                }
            }
            _ => Ok(ChannelEvent::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "realtime:bookmarks-realtime";

    #[test]
    fn test_join_frame() {
        let join = PhoenixMessage::join(TOPIC, "bookmarks", &OwnerId::new("u1"), "jwt", "1");
        let value: Value = serde_json::from_str(&join.to_text().unwrap()).unwrap();

        assert_eq!(value["event"], "phx_join");
        assert_eq!(value["ref"], "1");
        assert_eq!(value["join_ref"], "1");
        let changes = value["payload"]["config"]["postgres_changes"].as_array().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0]["event"], "INSERT");
        assert_eq!(changes[1]["filter"], "user_id=eq.u1");
        assert_eq!(value["payload"]["access_token"], "jwt");
    }

    #[test]
    fn test_join_reply() {
        let reply = PhoenixMessage::from_text(
            r#"{"topic":"realtime:bookmarks-realtime","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#,
        )
        .unwrap();
        assert_eq!(reply.classify("1").unwrap(), ChannelEvent::JoinOk);
        // heartbeat acks share the event name but not the ref
        assert_eq!(reply.classify("7").unwrap(), ChannelEvent::Ignored);

        let rejected = PhoenixMessage::from_text(
            r#"{"topic":"t","event":"phx_reply","payload":{"status":"error","response":{"reason":"unauthorized"}},"ref":"1"}"#,
        )
        .unwrap();
        assert_eq!(
            rejected.classify("1").unwrap(),
            ChannelEvent::JoinError("unauthorized".to_string())
        );
    }

    #[test]
    fn test_insert_change() {
        let frame = PhoenixMessage::from_text(
            r#"{"topic":"realtime:bookmarks-realtime","event":"postgres_changes","ref":null,
                "payload":{"ids":[1],"data":{"type":"INSERT","schema":"public","table":"bookmarks",
                "commit_timestamp":"2024-03-01T10:05:00Z",
                "record":{"id":"b2","url":"https://docs.rs","title":"Docs","user_id":"u1",
                          "created_at":"2024-03-01T10:05:00.000000"}}}}"#,
        )
        .unwrap();

        match frame.classify("1").unwrap() {
            ChannelEvent::Push(PushEvent::Insert(bookmark)) => {
                assert_eq!(bookmark.id.as_str(), "b2");
                assert_eq!(bookmark.owner_id.as_str(), "u1");
            }
            other => panic!("Expected insert, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_change_with_numeric_id() {
        let frame = PhoenixMessage::from_text(
            r#"{"topic":"t","event":"postgres_changes",
                "payload":{"data":{"type":"INSERT","record":{"id":42,"url":"https://docs.rs",
                "title":"Docs","user_id":"u1","created_at":"2024-03-01T10:05:00Z"}}}}"#,
        )
        .unwrap();

        match frame.classify("1").unwrap() {
            ChannelEvent::Push(PushEvent::Insert(bookmark)) => {
                assert_eq!(bookmark.id, BookmarkId::new("42"));
            }
            other => panic!("Expected insert, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_change_with_numeric_id() {
        let frame = PhoenixMessage::from_text(
            r#"{"topic":"t","event":"postgres_changes",
                "payload":{"data":{"type":"DELETE","old_record":{"id":42}}}}"#,
        )
        .unwrap();

        assert_eq!(
            frame.classify("1").unwrap(),
            ChannelEvent::Push(PushEvent::Delete {
                id: BookmarkId::new("42"),
                owner_id: None,
            })
        );
    }

    #[test]
    fn test_malformed_insert_is_error() {
        let frame = PhoenixMessage::from_text(
            r#"{"topic":"t","event":"postgres_changes","payload":{"data":{"type":"INSERT","record":{"id":"x"}}}}"#,
        )
        .unwrap();
        assert!(frame.classify("1").is_err());
    }

    #[test]
    fn test_close_and_unknown() {
        let close = PhoenixMessage::leave(TOPIC, "3");
        assert_eq!(close.classify("1").unwrap(), ChannelEvent::Ignored);

        let closed = PhoenixMessage {
            event: "phx_close".to_string(),
            ..PhoenixMessage::heartbeat("4")
        };
        assert!(matches!(closed.classify("1").unwrap(), ChannelEvent::Closed(_)));
    }
}
