use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DifyError;

/// `data.outputs` of a finished workflow run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkflowOutputs {
    values: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSegment {
    pub document_name: String,
    pub segment_id: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoftenedMessage {
    pub result: String,
    pub knowledge: Vec<KnowledgeSegment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Illustration {
    pub prompt: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub term: String,
    pub description: String,
    pub status: String,
}

impl Task {
    pub fn summary_line(&self) -> String {
        format!("{} {} {}", self.term, self.description, self.status)
    }
}

#[derive(Deserialize)]
struct RawKnowledge {
    #[serde(default)]
    content: Option<String>,
    metadata: RawKnowledgeMetadata,
}

#[derive(Deserialize)]
struct RawKnowledgeMetadata {
    document_name: String,
    segment_id: String,
}

impl WorkflowOutputs {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn text(&self) -> Result<String, DifyError> {
        self.required_str("text")
    }

    pub fn softened(&self) -> Result<SoftenedMessage, DifyError> {
        let result = self.required_str("result")?;
        let knowledge = match self.values.get("knowledge") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value::<Vec<RawKnowledge>>(value.clone())
                .map_err(|_| DifyError::MissingOutput("knowledge".to_owned()))?
                .into_iter()
                .map(|raw| KnowledgeSegment {
                    document_name: raw.metadata.document_name,
                    segment_id: raw.metadata.segment_id,
                    content: raw.content.unwrap_or_default(),
                })
                .collect(),
        };

        Ok(SoftenedMessage { result, knowledge })
    }

    pub fn illustration(&self) -> Result<Illustration, DifyError> {
        Ok(Illustration { prompt: self.required_str("prompt")?, url: self.required_str("url")? })
    }

    /// Workflows emit `task_list` either as a JSON array or as a string
    /// holding one; both decode the same way.
    pub fn task_list(&self) -> Result<Vec<Task>, DifyError> {
        let missing = || DifyError::MissingOutput("task_list".to_owned());
        let items = match self.values.get("task_list") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Array(items)) => items,
                _ => return Err(missing()),
            },
            _ => return Err(missing()),
        };

        items
            .iter()
            .map(|item| {
                let object = item.as_object().ok_or_else(missing)?;
                Ok(Task {
                    term: field_text(object, "term"),
                    description: field_text(object, "description"),
                    status: field_text(object, "status"),
                })
            })
            .collect()
    }

    fn required_str(&self, key: &str) -> Result<String, DifyError> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| DifyError::MissingOutput(key.to_owned()))
    }
}

fn field_text(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(value)) => value.clone(),
        Some(other) => other.to_string(),
    }
}
