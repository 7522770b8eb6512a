use serde::{Deserialize, Serialize};

/// A single row of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "id")]
    pub id: i64,

    #[serde(rename = "vec")]
    pub vector: Vec<f32>,

    #[serde(rename = "fn", default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Record {
    pub fn new(id: i64, vector: Vec<f32>) -> Self {
        Self {
            id,
            vector,
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// Hit is a single nearest-neighbor result.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Primary key of the matched record.
    pub id: i64,

    /// Euclidean distance between the query and the matched vector.
    /// Lower values indicate higher similarity.
    pub distance: f32,
}
