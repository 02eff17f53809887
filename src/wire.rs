use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct PipelineRequest {
    pub baton: Option<String>,
    pub requests: Vec<Request>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Execute { stmt: ExecuteStatement },
    Close {},
}

impl Request {
    pub fn execute(sql: impl Into<String>, want_rows: bool) -> Self {
        Self::Execute {
            stmt: ExecuteStatement {
                sql: sql.into(),
                want_rows,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExecuteStatement {
    pub sql: String,
    pub want_rows: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Value {
    Null {},
    Integer { value: String },
    Float { value: serde_json::Number },
    Text { value: String },
    Blob { base64: String },
}

#[derive(Debug, Deserialize)]
pub struct PipelineResponse {
    #[serde(default)]
    pub baton: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    pub results: Vec<PipelineResult>,
}

#[derive(Debug, Deserialize)]
pub struct PipelineResult {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub response: Option<ResponseEnvelope>,
    #[serde(default)]
    pub error: Option<PipelineError>,
}

#[derive(Debug, Deserialize)]
pub struct PipelineError {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub result: Option<ExecuteResult>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteResult {
    #[serde(default)]
    pub cols: Vec<Col>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct Col {
    #[serde(default)]
    pub name: Option<String>,
}
