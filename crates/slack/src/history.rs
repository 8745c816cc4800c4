use std::cmp::Ordering;

use serde_json::Value;

/// Oldest-first channel history with Block Kit payloads stripped, ready to be
/// handed to a workflow as context.
pub fn prepare_history(mut messages: Vec<Value>) -> Vec<Value> {
    messages.sort_by(compare_ts);
    for message in &mut messages {
        if let Value::Object(fields) = message {
            fields.remove("blocks");
        }
    }
    messages
}

/// Compact JSON with non-ASCII characters kept as-is.
pub fn history_json(messages: &[Value]) -> String {
    // serializing a slice of `Value` cannot fail
    serde_json::to_string(messages).unwrap_or_else(|_| "[]".to_owned())
}

/// Messages whose `ts` does not parse sort after every parseable one and
/// keep their relative order.
fn compare_ts(left: &Value, right: &Value) -> Ordering {
    let left = left.get("ts").and_then(Value::as_str).and_then(parse_ts);
    let right = right.get("ts").and_then(Value::as_str).and_then(parse_ts);
    match (left, right) {
        (Some(left_ts), Some(right_ts)) => left_ts.cmp(&right_ts),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// `seconds.fraction`, with the fraction right-padded to microseconds so
/// `1.5` reads as `1.500000`.
fn parse_ts(ts: &str) -> Option<(u64, u32)> {
    let (seconds, fraction) = ts.split_once('.').unwrap_or((ts, ""));
    if seconds.is_empty()
        || fraction.len() > 6
        || !seconds.bytes().chain(fraction.bytes()).all(|byte| byte.is_ascii_digit())
    {
        return None;
    }
    Some((seconds.parse().ok()?, format!("{fraction:0<6}").parse().ok()?))
}
