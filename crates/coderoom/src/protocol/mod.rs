use serde::{Deserialize, Serialize};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The client's editor content replaces the room's shared buffer
    CodeUpdate { code: String },
    /// Any message with an unrecognized type tag; ignored without
    /// closing the connection
    #[serde(other)]
    Unknown,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Initial snapshot, sent once immediately after a successful join
    Sync { code: String, language: String },
    /// Another participant's accepted edit
    CodeUpdate { code: String },
    /// Current number of live connections in the room, sent to every
    /// participant on join and leave
    UserCount { count: usize },
}

/// Encode a message as a JSON text frame
pub fn encode_message<T: Serialize>(message: &T) -> crate::SyncResult<String> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a message from a JSON text frame
pub fn decode_message<T: for<'de> Deserialize<'de>>(data: &str) -> crate::SyncResult<T> {
    Ok(serde_json::from_str(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_code_update() {
        let message: ClientMessage =
            decode_message(r#"{"type":"code_update","code":"x = 1"}"#).unwrap();
        assert!(matches!(message, ClientMessage::CodeUpdate { code } if code == "x = 1"));
    }

    #[test]
    fn unrecognized_type_decodes_to_unknown() {
        let message: ClientMessage =
            decode_message(r#"{"type":"cursor_moved","position":42}"#).unwrap();
        assert!(matches!(message, ClientMessage::Unknown));
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(decode_message::<ClientMessage>("not json").is_err());
        assert!(decode_message::<ClientMessage>(r#"{"type":"code_update"}"#).is_err());
    }

    #[test]
    fn encodes_server_messages_with_type_tags() {
        let encoded = encode_message(&ServerMessage::UserCount { count: 2 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value, json!({"type": "user_count", "count": 2}));

        let encoded = encode_message(&ServerMessage::Sync {
            code: "x = 1".to_string(),
            language: "python".to_string(),
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["type"], "sync");
        assert_eq!(value["language"], "python");
    }

    #[test]
    fn code_update_round_trip() {
        let encoded = encode_message(&ServerMessage::CodeUpdate {
            code: "print('hi')".to_string(),
        })
        .unwrap();
        let decoded: ServerMessage = decode_message(&encoded).unwrap();
        assert!(matches!(decoded, ServerMessage::CodeUpdate { code } if code == "print('hi')"));
    }
}
