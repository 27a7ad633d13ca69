use anyhow::{Result, anyhow, bail};
use nalgebra::DMatrix;

use crate::model::{RawValue, RawWorkspace};

/// Parse the whole workspace JSON string into `RawWorkspace`.
///
/// The file is expected to look like
///
/// ```json
/// { "variables": { "A": {"matrix": [[1, 2], [3, 4]]}, "n": {"integer": 3} },
///   "equations": ["B = A*n"] }
/// ```
///
/// Both keys are optional. Ragged matrix rows are reported as an error.
pub fn load_from_json(json: &str) -> Result<RawWorkspace> {
    log::debug!("workspace file is {} bytes", json.len());
    let raw: RawWorkspace =
        serde_json::from_str(json).map_err(|e| anyhow!("Failed to parse JSON: {}", e))?;

    for (name, value) in &raw.variables {
        if let RawValue::Matrix(rows) = value {
            to_matrix(rows).map_err(|e| anyhow!("variable `{name}`: {e}"))?;
        }
    }

    log::info!(
        "Found {} variables and {} equations",
        raw.variables.len(),
        raw.equations.len()
    );
    Ok(raw)
}

/// Row-major nested vectors to a dense matrix.
pub fn to_matrix(rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let cols = rows.first().map_or(0, Vec::len);
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
        bail!("row {i} has {} columns, expected {cols}", row.len());
    }
    let data: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(DMatrix::from_row_slice(rows.len(), cols, &data))
}

/// Inverse of [`to_matrix`].
pub fn from_matrix(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_rows() {
        let rows = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let m = to_matrix(&rows).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m[(1, 0)], 4.0);
        assert_eq!(from_matrix(&m), rows);

        assert!(to_matrix(&[vec![1.0], vec![2.0, 3.0]]).is_err());
        assert_eq!(to_matrix(&[]).unwrap().shape(), (0, 0));
    }

    #[test]
    fn test_rejects_bad_documents() {
        let test_cases = vec![
            r#"{"variables": {"A": {"matrix": [[1, 2], [3]]}}}"#,
            r#"{"variables": {"A": {"vector": [1, 2]}}}"#,
            r#"{"variables": {"n": {"integer": 2.5}}}"#,
            r#"{"equations": "B = A"}"#,
            "not json",
        ];
        for json in test_cases {
            assert!(load_from_json(json).is_err(), "{json}");
        }
        assert!(load_from_json("{}").unwrap().equations.is_empty());
    }
}
