use std::fs;

use matrix_equation::model::RawValue;
use matrix_equation::parser::load_from_json;
use matrix_equation::processor;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn loads_and_evaluates_workspace() {
    let json = fs::read_to_string("tests/workspace.json").unwrap();
    let raw = load_from_json(&json).expect("valid json");

    assert_eq!(raw.variables.len(), 4);
    assert_eq!(raw.equations.len(), 6);
    assert_eq!(raw.variables["n"], RawValue::Integer(3));

    let extra = vec!["t = trace(S)".to_string()];
    let processed = processor::run(&raw, &extra).expect("workspace runs");

    let RawValue::Matrix(x) = &processed.values["x"] else {
        panic!("x should be a matrix");
    };
    assert!(close(x[0][0], 0.1) && close(x[1][0], 0.6), "{x:?}");

    assert_eq!(
        processed.values["S"],
        RawValue::Matrix(vec![vec![18.5, 7.0], vec![14.0, 11.5]])
    );
    assert_eq!(processed.values["m"], RawValue::Integer(5));
    assert!(matches!(processed.values["d"], RawValue::Double(d) if close(d, 10.0)));
    assert!(matches!(processed.values["t"], RawValue::Double(t) if close(t, 30.0)));

    // sequences are not part of the output
    assert!(!processed.values.contains_key("idx"));
}

#[test]
fn reports_failing_statement() {
    let json = r#"{"variables": {"A": {"matrix": [[1, 2, 3]]}}, "equations": ["B = A*A"]}"#;
    let raw = load_from_json(json).unwrap();
    let err = processor::run(&raw, &[]).unwrap_err();
    assert!(format!("{err:#}").contains("statement 1"), "{err:#}");
}
