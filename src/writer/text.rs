//! Human-readable dump of the final values.

use std::io::{self, Write};

use crate::model::{ProcessedWorkspace, RawValue};

pub fn emit<W: Write>(processed: &ProcessedWorkspace, out: &mut W) -> io::Result<()> {
    for (name, value) in &processed.values {
        match value {
            RawValue::Double(v) => writeln!(out, "{name} = {v}")?,
            RawValue::Integer(v) => writeln!(out, "{name} = {v}")?,
            RawValue::Matrix(rows) => {
                let cols = rows.first().map_or(0, Vec::len);
                writeln!(out, "{name} = [{}x{}]", rows.len(), cols)?;
                for row in rows {
                    let cells: Vec<String> = row.iter().map(|v| format!("{v:>10.4}")).collect();
                    writeln!(out, "  {}", cells.join(" "))?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let mut processed = ProcessedWorkspace::default();
        processed
            .values
            .insert("A".into(), RawValue::Matrix(vec![vec![1.0, 2.0], vec![3.0, 4.5]]));
        processed.values.insert("n".into(), RawValue::Integer(3));
        processed.values.insert("x".into(), RawValue::Double(0.25));

        let mut out = Vec::new();
        emit(&processed, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let expected = "A = [2x2]\n      1.0000     2.0000\n      3.0000     4.5000\nn = 3\nx = 0.25\n";
        assert_eq!(text, expected);
    }
}
