use serde::{Deserialize, Serialize};

/// A single completion suggestion with a confidence score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub suggestion: String,
    pub confidence: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Suggestion {
    fn new(suggestion: impl Into<String>, confidence: f64, kind: &str) -> Self {
        Self {
            suggestion: suggestion.into(),
            confidence,
            kind: kind.to_string(),
        }
    }
}

/// Generate a rule-based completion for the code before the cursor
///
/// Pure function of its inputs: no state, and contexts that match no rule
/// fall back to a low-confidence default instead of an error, so a failed
/// suggestion can never disturb a session.
pub fn suggest(code: &str, cursor_position: usize, language: &str) -> Suggestion {
    let context = code.get(..cursor_position).unwrap_or_default();
    let last_line = context.rsplit('\n').next().unwrap_or_default();

    let language_match = match language {
        "python" => python_suggestion(last_line, context),
        "javascript" => javascript_suggestion(last_line),
        _ => None,
    };

    language_match
        .or_else(|| bracket_close(last_line))
        .unwrap_or_else(|| Suggestion::new("# TODO: Implement", 0.50, "comment"))
}

fn python_suggestion(last_line: &str, context: &str) -> Option<Suggestion> {
    let trimmed = last_line.trim();

    if last_line.ends_with("print(") {
        return Some(Suggestion::new("'Hello, World!')", 0.85, "completion"));
    }

    if trimmed.starts_with("def ") && trimmed.ends_with("):") {
        return Some(Suggestion::new(
            "\n    \"\"\"Function description.\"\"\"",
            0.80,
            "docstring",
        ));
    }

    if trimmed.starts_with("class ") && trimmed.ends_with(':') {
        return Some(Suggestion::new(
            "\n    def __init__(self):\n        pass",
            0.82,
            "method",
        ));
    }

    if trimmed.starts_with("from ") && last_line.ends_with("import ") {
        return Some(Suggestion::new(
            "typing import List, Dict, Optional",
            0.75,
            "import",
        ));
    }

    if trimmed.starts_with("for ") && last_line.ends_with(" in ") {
        return Some(Suggestion::new("range(10):\n        ", 0.78, "completion"));
    }

    if trimmed.starts_with("if ") && trimmed.ends_with(':') {
        return Some(Suggestion::new("\n        pass", 0.70, "statement"));
    }

    if last_line.starts_with(char::is_whitespace) && last_line.ends_with("return ") {
        // Predicate-style function names usually return a boolean
        if context.contains("def is_") || context.contains("def has_") {
            return Some(Suggestion::new("True", 0.75, "boolean"));
        }
        return Some(Suggestion::new("None", 0.70, "return_value"));
    }

    if trimmed.contains('[') && last_line.ends_with(" in ") {
        return Some(Suggestion::new("items]", 0.73, "comprehension"));
    }

    if last_line.contains("= [") && last_line.ends_with('[') {
        return Some(Suggestion::new("1, 2, 3]", 0.65, "list_literal"));
    }

    if last_line.contains("= {") && last_line.ends_with('{') {
        return Some(Suggestion::new("'key': 'value'}", 0.65, "dict_literal"));
    }

    if last_line.contains(".append(") && last_line.ends_with('(') {
        return Some(Suggestion::new("item)", 0.72, "method_arg"));
    }

    if last_line.contains(".join(") && last_line.ends_with('(') {
        return Some(Suggestion::new("items)", 0.74, "method_arg"));
    }

    None
}

fn javascript_suggestion(last_line: &str) -> Option<Suggestion> {
    if last_line.contains("console.log(") {
        return Some(Suggestion::new("'Hello, World!')", 0.85, "completion"));
    }

    if last_line.trim().ends_with("=>") {
        return Some(Suggestion::new(" {\n    \n}", 0.80, "arrow_function"));
    }

    if last_line.contains("const ") && last_line.ends_with("= ") {
        return Some(Suggestion::new("[]", 0.70, "initialization"));
    }

    None
}

fn bracket_close(last_line: &str) -> Option<Suggestion> {
    let trimmed = last_line.trim();

    if trimmed.ends_with('(') {
        return Some(Suggestion::new(")", 0.60, "bracket_close"));
    }
    if trimmed.ends_with('[') {
        return Some(Suggestion::new("]", 0.60, "bracket_close"));
    }
    if trimmed.ends_with('{') {
        return Some(Suggestion::new("}", 0.60, "bracket_close"));
    }

    None
}
