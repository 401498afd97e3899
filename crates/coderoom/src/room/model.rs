use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable record of a collaborative coding room
///
/// The store owns this record across restarts; the registry keeps a live
/// copy of `code` and `updated_at` while the room has traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub code: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only record of a room's code at a point in time
///
/// Written after each accepted edit; never mutated or truncated by the
/// engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSnapshot {
    pub room_id: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

/// Starter code for a newly created room, selected by language tag
pub fn default_code(language: &str) -> String {
    match language {
        "python" => "# Write your Python code here\n\n".to_string(),
        "javascript" => "// Write your JavaScript code here\n\n".to_string(),
        "typescript" => "// Write your TypeScript code here\n\n".to_string(),
        "java" => {
            "// Write your Java code here\n\npublic class Main {\n    public static void main(String[] args) {\n        \n    }\n}\n"
                .to_string()
        }
        "cpp" => {
            "// Write your C++ code here\n\n#include <iostream>\n\nint main() {\n    \n    return 0;\n}\n"
                .to_string()
        }
        "go" => {
            "// Write your Go code here\n\npackage main\n\nimport \"fmt\"\n\nfunc main() {\n    \n}\n"
                .to_string()
        }
        other => format!("// Write your {} code here\n\n", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("python", "# Write your Python code here\n\n")]
    #[case("javascript", "// Write your JavaScript code here\n\n")]
    #[case("typescript", "// Write your TypeScript code here\n\n")]
    fn known_language_templates(#[case] language: &str, #[case] expected: &str) {
        assert_eq!(default_code(language), expected);
    }

    #[rstest]
    #[case("java")]
    #[case("cpp")]
    #[case("go")]
    fn compiled_language_templates_are_non_empty(#[case] language: &str) {
        let code = default_code(language);
        assert!(code.contains("main"));
    }

    #[test]
    fn unknown_language_falls_back_to_comment() {
        assert_eq!(default_code("brainfuck"), "// Write your brainfuck code here\n\n");
    }

    #[test]
    fn room_record_serializes_round_trip() {
        let room = Room {
            id: "abc12345".to_string(),
            code: "x = 1".to_string(),
            language: "python".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&room).unwrap();
        let loaded: Room = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.id, room.id);
        assert_eq!(loaded.code, room.code);
        assert_eq!(loaded.created_at, room.created_at);
    }
}
