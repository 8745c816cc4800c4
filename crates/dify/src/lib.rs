//! Dify workflow client
//!
//! Every bot surface ends in a single blocking call to a Dify workflow app:
//!
//! ```text
//! POST {workflow_url}
//! Authorization: Bearer {app token}
//! {"inputs": {...}, "response_mode": "blocking", "user": "..."}
//! ```
//!
//! - `client` - `WorkflowClient` trait and the `reqwest`-backed `DifyClient`
//! - `inputs` - builders for each app's `inputs` object
//! - `outputs` - typed decoders over `data.outputs`

pub mod client;
pub mod error;
pub mod inputs;
pub mod outputs;

pub use client::{DifyClient, WorkflowApp, WorkflowClient};
pub use error::DifyError;
pub use inputs::WorkflowInputs;
pub use outputs::{Illustration, KnowledgeSegment, SoftenedMessage, Task, WorkflowOutputs};
