use crate::error::ApiError;

/// Turn a failed call into the single line shown to the operator.
///
/// Returns `None` when there is nothing worth showing. Unauthorized
/// responses are not filtered here; routing them to the session store is
/// the caller's job.
pub fn normalize(err: &ApiError) -> Option<String> {
    match err {
        ApiError::Network { message } | ApiError::Decode { message } => {
            let message = message.trim();
            if message.is_empty() {
                let coerced = err.to_string();
                (!coerced.trim().is_empty()).then_some(coerced)
            } else {
                Some(message.to_string())
            }
        }
        ApiError::Http {
            status,
            status_text,
            body,
        } => Some(
            response_detail(body)
                .unwrap_or_else(|| format!("Call returned invalid statuscode: {status} ({status_text})")),
        ),
    }
}

/// Error text for a failed explicit action, shown next to the action rather
/// than in the global queue. HTTP failures keep the status line above the
/// backend's explanation.
pub fn normalize_inline(err: &ApiError) -> String {
    match err {
        ApiError::Http {
            status,
            status_text,
            body,
        } => {
            let headline = format!("Call returned invalid statuscode: {status} ({status_text})");
            match response_detail(body) {
                Some(detail) => format!("{headline}\n\n{detail}"),
                None => headline,
            }
        }
        other => normalize(other).unwrap_or_else(|| "Call failed".to_string()),
    }
}

/// Prefer a structured `detail` field, else the raw body.
fn response_detail(body: &str) -> Option<String> {
    if body.trim().is_empty() {
        return None;
    }
    if let Ok(serde_json::Value::Object(fields)) = serde_json::from_str(body) {
        match fields.get("detail") {
            Some(serde_json::Value::String(detail)) if !detail.trim().is_empty() => {
                return Some(detail.clone());
            }
            Some(serde_json::Value::Null | serde_json::Value::String(_)) | None => {}
            Some(other) => return Some(other.to_string()),
        }
    }
    Some(body.to_string())
}
