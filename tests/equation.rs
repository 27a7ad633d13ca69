use matrix_equation::{Equation, EquationError};
use nalgebra::DMatrix;

fn m(rows: usize, cols: usize, data: &[f64]) -> DMatrix<f64> {
    DMatrix::from_row_slice(rows, cols, data)
}

/// Deterministic, well-conditioned test data.
fn filled(rows: usize, cols: usize, seed: f64) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |i, j| {
        ((i * cols + j) as f64 * 0.37 + seed).sin() + if i == j { 3.0 } else { 0.0 }
    })
}

fn assert_close(a: &DMatrix<f64>, b: &DMatrix<f64>) {
    assert_eq!(a.shape(), b.shape());
    assert!((a - b).norm() < 1e-9, "{a} != {b}");
}

#[test]
fn arithmetic_matches_kernel() {
    let mut eq = Equation::new();
    let a = filled(3, 3, 0.1);
    let b = filled(3, 3, 0.7);
    let c = filled(3, 3, 1.3);
    eq.alias_matrix("A", a.clone()).unwrap();
    eq.alias_matrix("B", b.clone()).unwrap();
    eq.alias_matrix("C", c.clone()).unwrap();

    let test_cases = vec![
        ("R = A*(B+C)", &a * (&b + &c)),
        ("R = A*B+C", &a * &b + &c),
        ("R = A-B-C", &a - &b - &c),
        ("R = (A-B)*C'", (&a - &b) * c.transpose()),
        ("R = A.*B./C", a.component_mul(&b).component_div(&c)),
        ("R = -A*B", -(&a * &b)),
        ("R = 2*A - B/4", &a * 2.0 - &b / 4.0),
    ];

    for (src, expected) in test_cases {
        eq.process(src).unwrap();
        assert_close(&eq.lookup_matrix("R").unwrap(), &expected);
    }
}

#[test]
fn unary_minus_worked_examples() {
    let mut eq = Equation::new();
    eq.alias_integer("B", 2).unwrap();

    eq.process("R = B--B").unwrap();
    assert_eq!(eq.lookup_integer("R"), Some(4));

    eq.process("R = B---5").unwrap();
    assert_eq!(eq.lookup_integer("R"), Some(-3));

    eq.alias_matrix("M", m(1, 2, &[1.0, -2.0])).unwrap();
    eq.process("N = -M - -M").unwrap();
    assert_close(&eq.lookup_matrix("N").unwrap(), &m(1, 2, &[0.0, 0.0]));
}

#[test]
fn rerun_reads_current_inputs() {
    let mut eq = Equation::new();
    let a = eq.alias_matrix("A", m(2, 2, &[1.0, 2.0, 3.0, 4.0])).unwrap();
    let k = eq.alias_double("k", 2.0).unwrap();

    let seq = eq.compile("R = k*A'").unwrap();
    seq.perform().unwrap();
    assert_close(&eq.lookup_matrix("R").unwrap(), &m(2, 2, &[2.0, 6.0, 4.0, 8.0]));

    *a.borrow_mut() = m(1, 3, &[1.0, 0.0, -1.0]);
    *k.borrow_mut() = -1.0;
    seq.perform().unwrap();
    assert_close(&eq.lookup_matrix("R").unwrap(), &m(3, 1, &[-1.0, 0.0, 1.0]));
}

#[test]
fn submatrix_extraction() {
    let mut eq = Equation::new();
    let b = filled(8, 8, 0.0);
    eq.alias_matrix("B", b.clone()).unwrap();

    eq.process("C = B(2:7,1:6)").unwrap();
    assert_close(&eq.lookup_matrix("C").unwrap(), &b.view((2, 1), (6, 6)).into_owned());

    eq.process("C = B(1:2:7, :)").unwrap();
    let rows: Vec<usize> = vec![1, 3, 5, 7];
    assert_close(&eq.lookup_matrix("C").unwrap(), &b.select_rows(&rows));

    eq.process("C = B(3:, 2 0 1)").unwrap();
    let expected = b.view((3, 0), (5, 8)).into_owned().select_columns(&[2, 0, 1]);
    assert_close(&eq.lookup_matrix("C").unwrap(), &expected);

    // one index list walks the elements row by row
    eq.process("C = B(8:10)").unwrap();
    assert_close(
        &eq.lookup_matrix("C").unwrap(),
        &m(1, 3, &[b[(1, 0)], b[(1, 1)], b[(1, 2)]]),
    );

    // a single element is a double, not a 1x1 matrix
    eq.process("x = B(1,2)").unwrap();
    assert_eq!(eq.lookup_double("x"), Some(b[(1, 2)]));
    assert!(eq.lookup_matrix("x").is_none());
}

#[test]
fn insertion_round_trips() {
    let mut eq = Equation::new();
    eq.alias_matrix("b", DMatrix::zeros(5, 6)).unwrap();
    let src = filled(2, 3, 0.4);
    eq.alias_matrix("src", src.clone()).unwrap();

    eq.process("b(1:2,0:2) = src").unwrap();
    eq.process("e = b(1:2,0:2)").unwrap();
    assert_close(&eq.lookup_matrix("e").unwrap(), &src);
    assert_eq!(eq.lookup_matrix("b").unwrap().shape(), (5, 6));

    // order matters: the addresses are a permutation, not a set
    eq.process("b(4, 2 0 1) = src(0,:)").unwrap();
    eq.process("e = b(4, 2 0 1)").unwrap();
    assert_close(&eq.lookup_matrix("e").unwrap(), &src.rows(0, 1).into_owned());

    eq.process("b(0:1,3:5) = 4.5").unwrap();
    let b = eq.lookup_matrix("b").unwrap();
    assert!(b.view((0, 3), (2, 3)).iter().all(|v| *v == 4.5));

    let err = eq.process("b(4:5, 0) = 1").unwrap_err();
    assert!(matches!(err, EquationError::Shape(_)), "{err}");
}

#[test]
fn ranges_enumerate_progressions() {
    let mut eq = Equation::new();
    eq.alias_integer("s", 3).unwrap();
    eq.alias_integer("e", 10).unwrap();

    let test_cases = vec![
        ("v = [2:6]", vec![2.0, 3.0, 4.0, 5.0, 6.0]),
        ("v = [1:s:e]", vec![1.0, 4.0, 7.0, 10.0]),
        ("v = [e:-s:0]", vec![10.0, 7.0, 4.0, 1.0]),
        ("v = [s+1:e-5]", vec![4.0, 5.0]),
        ("v = [2 3:5 0]", vec![2.0, 3.0, 4.0, 5.0, 0.0]),
        ("v = [3 2 1 0 (-1) (-2)]", vec![3.0, 2.0, 1.0, 0.0, -1.0, -2.0]),
        ("v = [1 -2]", vec![-1.0]),
    ];

    for (src, expected) in test_cases {
        eq.process(src).unwrap();
        let v = eq.lookup_matrix("v").unwrap();
        assert_close(&v, &m(1, expected.len(), &expected));
    }

    eq.alias_matrix("A", filled(4, 4, 0.2)).unwrap();
    eq.process("idx = 2 0:1").unwrap();
    eq.process("r = A(idx, 3)").unwrap();
    let a = eq.lookup_matrix("A").unwrap();
    assert_close(
        &eq.lookup_matrix("r").unwrap(),
        &m(3, 1, &[a[(2, 3)], a[(0, 3)], a[(1, 3)]]),
    );
}

#[test]
fn matrix_literals() {
    let mut eq = Equation::new();
    eq.alias_matrix("A", m(2, 2, &[1.0, 2.0, 3.0, 4.0])).unwrap();
    eq.alias_double("x", 9.0).unwrap();

    eq.process("M = [A, [5;6]; 7 8 x]").unwrap();
    assert_close(
        &eq.lookup_matrix("M").unwrap(),
        &m(3, 3, &[1.0, 2.0, 5.0, 3.0, 4.0, 6.0, 7.0, 8.0, 9.0]),
    );

    eq.process("M = [A'*2 , A(:,0)]").unwrap();
    assert_close(
        &eq.lookup_matrix("M").unwrap(),
        &m(2, 3, &[2.0, 6.0, 1.0, 4.0, 8.0, 3.0]),
    );

    eq.process("M = []").unwrap();
    assert_eq!(eq.lookup_matrix("M").unwrap().shape(), (0, 0));

    // only known once the blocks exist
    let err = eq.process("M = [A; 1 2 3]").unwrap_err();
    assert!(matches!(err, EquationError::Shape(_)), "{err}");
}

#[test]
fn functions_and_solvers() {
    let mut eq = Equation::new();
    let a = m(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 2.0]);
    let b = m(3, 1, &[1.0, 2.0, 3.0]);
    eq.alias_matrix("A", a.clone()).unwrap();
    eq.alias_matrix("b", b.clone()).unwrap();

    let x = a.clone().lu().solve(&b).unwrap();
    for src in ["x = A\\b", "x = b/A", "x = solve(A,b)", "x = inv(A)*b"] {
        eq.process(src).unwrap();
        assert_close(&eq.lookup_matrix("x").unwrap(), &x);
    }

    eq.process("d = det(A)").unwrap();
    assert!((eq.lookup_double("d").unwrap() - a.determinant()).abs() < 1e-9);

    eq.process("t = trace(A) + normF(A)^2").unwrap();
    assert!((eq.lookup_double("t").unwrap() - (9.0 + a.norm_squared())).abs() < 1e-9);

    eq.process("r = max(A,0)").unwrap();
    assert_close(&eq.lookup_matrix("r").unwrap(), &m(3, 1, &[4.0, 3.0, 2.0]));

    eq.process("r = sum(A,1)").unwrap();
    assert_close(&eq.lookup_matrix("r").unwrap(), &m(1, 3, &[5.0, 5.0, 3.0]));

    eq.process("K = kron(eye(2), [1 2])").unwrap();
    assert_close(
        &eq.lookup_matrix("K").unwrap(),
        &m(2, 4, &[1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0]),
    );

    eq.process("Z = zeros(2,3) + ones(2,3)*2").unwrap();
    assert_close(&eq.lookup_matrix("Z").unwrap(), &DMatrix::from_element(2, 3, 2.0));

    eq.process("p = dot(b, b) + atan2(0, 1) + abs(-2)").unwrap();
    assert_eq!(eq.lookup_double("p"), Some(16.0));

    eq.process("D = diag(b)").unwrap();
    assert_close(&eq.lookup_matrix("D").unwrap(), &DMatrix::from_diagonal(&b.column(0)));
}

#[test]
fn macros_expand_like_written_source() {
    let mut eq = Equation::new();
    eq.compile("macro foo(a,b,c) = c*(a*b)").unwrap();

    let expanded = eq.compile("x = foo(1,2,3)").unwrap();
    let written = eq.compile("y = 3*(1*2)").unwrap();
    assert_eq!(expanded.names(), written.names());

    expanded.perform().unwrap();
    assert_eq!(eq.lookup_integer("x"), Some(6));

    eq.alias_matrix("A", m(2, 2, &[1.0, 1.0, 0.0, 1.0])).unwrap();
    eq.compile("macro sq(a) = a*a").unwrap();
    eq.process("P = sq(sq(A))").unwrap();
    assert_close(&eq.lookup_matrix("P").unwrap(), &m(2, 2, &[1.0, 4.0, 0.0, 1.0]));

    eq.compile("macro loop(a) = loop(a)+1").unwrap();
    assert!(eq.compile("z = loop(1)").unwrap_err().is_syntax());
}

#[test]
fn malformed_input_leaves_aliases_unchanged() {
    let mut eq = Equation::new();
    let a = m(3, 3, &[1.0; 9]);
    eq.alias_matrix("a", a.clone()).unwrap();
    eq.alias_integer("n", 7).unwrap();

    let test_cases = vec![
        "a(2,4:5",
        "m=[3:4:]",
        "m=[1:5;2,3,4]",
        "a = a*(2",
        "a = 1.2.3",
        "n = 2 + ",
        "a(0,:) = [1 2",
        "n = [1, 2; 3]",
        "n = a",
    ];

    for src in test_cases {
        let err = eq.compile(src).unwrap_err();
        assert!(err.is_syntax(), "{src}: {err}");
        assert_close(&eq.lookup_matrix("a").unwrap(), &a);
        assert_eq!(eq.lookup_integer("n"), Some(7));
        assert!(eq.lookup("m").is_none(), "{src}");
    }

    assert!(matches!(eq.compile("n = q"), Err(EquationError::Unbound(_))));
}

#[test]
fn runtime_shape_errors() {
    let mut eq = Equation::new();
    eq.alias_matrix("A", DMatrix::zeros(3, 4)).unwrap();
    eq.alias_matrix("B", DMatrix::zeros(5, 6)).unwrap();
    eq.alias_matrix("one", DMatrix::from_element(1, 1, 2.0)).unwrap();

    let seq = eq.compile("C = A*B").unwrap();
    assert!(matches!(seq.perform(), Err(EquationError::Shape(_))));

    let err = eq.process("C = one + A").unwrap_err();
    assert!(err.to_string().contains("Trying to add a 1x1"), "{err}");

    let err = eq.process("c = A(3, 0)").unwrap_err();
    assert!(matches!(err, EquationError::Shape(_)), "{err}");

    eq.alias_matrix("S", m(2, 2, &[1.0, 2.0, 2.0, 4.0])).unwrap();
    let err = eq.process("C = inv(S)").unwrap_err();
    assert!(matches!(err, EquationError::Numeric(_)), "{err}");
}

#[test]
fn integer_extremes_fail_cleanly() {
    let mut eq = Equation::new();
    eq.alias_matrix("A", DMatrix::zeros(3, 3)).unwrap();

    let test_cases = vec![
        "rows = A(9223372036854775806:9223372036854775807, 0)",
        "rows = A(0:100000000000, 0)",
        "rows = A(0, -9223372036854775806:-1:-9223372036854775807)",
        "rows = A(0:100000000000)",
    ];
    for src in test_cases {
        let err = eq.process(src).unwrap_err();
        assert!(matches!(err, EquationError::Shape(_)), "{src}: {err}");
    }

    eq.alias_integer("n", i64::MIN).unwrap();
    let err = eq.process("y = n / -1").unwrap_err();
    assert!(matches!(err, EquationError::Numeric(_)), "{err}");
    let err = eq.process("y = n / 0").unwrap_err();
    assert!(matches!(err, EquationError::Numeric(_)), "{err}");
}
