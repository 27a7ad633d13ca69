use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Workspace file as it comes out of the JSON loader.
#[derive(Debug, Default, Deserialize)]
pub struct RawWorkspace {
    #[serde(default)]
    pub variables: BTreeMap<String, RawValue>,
    /// Statements, run in order after the variables are aliased.
    #[serde(default)]
    pub equations: Vec<String>,
}

/// One variable value, tagged by kind: `{"matrix": [[1, 2], [3, 4]]}`,
/// `{"double": 2.5}` or `{"integer": 3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawValue {
    Matrix(Vec<Vec<f64>>),
    Double(f64),
    Integer(i64),
}

/// Final values of every bound name, ready for the writers.
#[derive(Debug, Default, Serialize)]
pub struct ProcessedWorkspace {
    pub values: BTreeMap<String, RawValue>,
}
