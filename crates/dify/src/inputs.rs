use serde_json::{Map, Value};

pub type WorkflowInputs = Map<String, Value>;

/// Inputs for the assistant app: serialized channel history, the current
/// local time, and the user's prompt.
pub fn assistant_inputs(chat_history: String, today: String, prompt: String) -> WorkflowInputs {
    let mut inputs = Map::new();
    inputs.insert("chat_history".to_owned(), Value::String(chat_history));
    inputs.insert("today".to_owned(), Value::String(today));
    inputs.insert("prompt".to_owned(), Value::String(prompt));
    inputs
}

/// The task extractor names its time input `date` rather than `today`.
pub fn task_inputs(chat_history: String, date: String) -> WorkflowInputs {
    let mut inputs = Map::new();
    inputs.insert("chat_history".to_owned(), Value::String(chat_history));
    inputs.insert("date".to_owned(), Value::String(date));
    inputs
}

pub fn softener_inputs(input: Option<String>, role: String) -> WorkflowInputs {
    let mut inputs = Map::new();
    inputs.insert("input".to_owned(), input.map(Value::String).unwrap_or(Value::Null));
    inputs.insert("role".to_owned(), Value::String(role));
    inputs
}

pub fn illustration_inputs() -> WorkflowInputs {
    Map::new()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{assistant_inputs, softener_inputs, task_inputs};

    #[test]
    fn assistant_inputs_carry_history_time_and_prompt() {
        let inputs = assistant_inputs("[]".to_owned(), "2025年01月01日 09:00:00".to_owned(), "要約して".to_owned());
        assert_eq!(
            serde_json::Value::Object(inputs),
            json!({"chat_history": "[]", "today": "2025年01月01日 09:00:00", "prompt": "要約して"})
        );
    }

    #[test]
    fn task_inputs_use_date_key() {
        let inputs = task_inputs("[]".to_owned(), "now".to_owned());
        assert!(inputs.contains_key("date"));
        assert!(!inputs.contains_key("today"));
    }

    #[test]
    fn softener_inputs_send_null_for_empty_message() {
        let inputs = softener_inputs(None, "上司".to_owned());
        assert_eq!(inputs["input"], serde_json::Value::Null);
        assert_eq!(inputs["role"], "上司");
    }
}
