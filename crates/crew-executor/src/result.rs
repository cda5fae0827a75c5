use crew_core::CrewError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Explicit outcome tag a tool reply may carry next to its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    TaskCompleted,
    BugDetected,
    NewTask,
    Passed,
}

/// Parsed tool reply.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredResult {
    /// The reply text (`result` field of the tool's JSON output).
    pub text: String,
    pub status: Option<ResultStatus>,
    #[serde(skip)]
    pub raw: Value,
}

/// Parse the tool's JSON stdout.
///
/// The tool prints either an array of message objects or a single object.
/// The first object holding a string `result` supplies the text; its optional
/// `status` becomes [`StructuredResult::status`].
pub fn parse_result(stdout: &str) -> Result<StructuredResult, CrewError> {
    let raw: Value = serde_json::from_str(stdout.trim())
        .map_err(|err| CrewError::InvalidResponse(format!("not JSON ({err})")))?;

    let entry = match &raw {
        Value::Array(items) => items.iter().find(|item| has_result_text(item)),
        Value::Object(_) if has_result_text(&raw) => Some(&raw),
        _ => None,
    }
    .ok_or_else(|| CrewError::InvalidResponse("no element with a string `result` field".into()))?;

    let text = entry["result"].as_str().unwrap_or_default().to_string();
    let status = entry.get("status").and_then(|value| {
        let parsed = serde_json::from_value::<ResultStatus>(value.clone()).ok();
        if parsed.is_none() {
            tracing::warn!(status = %value, "Ignoring unknown result status");
        }
        parsed
    });

    Ok(StructuredResult { text, status, raw })
}

fn has_result_text(value: &Value) -> bool {
    value.get("result").is_some_and(Value::is_string)
}
