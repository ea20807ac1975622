use mutdiff::lines::{LineCollision, apply_lines};
use mutdiff::mutants::{LineMutation, RejectReason};

const SOURCE: &str = "contract C {\n    function f() public {\n        x = 1;\n    }\n}";

fn line(n: usize, replacement: &str) -> LineMutation {
    LineMutation {
        line: n,
        replacement: replacement.to_string(),
        operator: "LR".to_string(),
    }
}

#[test]
fn replaces_lines_cumulatively() {
    let mutations = vec![line(2, "        x = 0;"), line(1, "    function f() private {")];

    let outcome = apply_lines(SOURCE, &mutations, 2, LineCollision::Insert, 0);
    assert_eq!(outcome.produced(), 2);
    assert_eq!(
        outcome.snapshots[0].text,
        "contract C {\n    function f() private {\n        x = 1;\n    }\n}"
    );
    assert_eq!(
        outcome.snapshots[1].text,
        "contract C {\n    function f() private {\n        x = 0;\n    }\n}"
    );
}

#[test]
fn second_hit_on_a_line_is_inserted_with_closed_brace() {
    let mutations = vec![line(1, "    function f() external {"), line(1, "    if (true) {")];

    let outcome = apply_lines(SOURCE, &mutations, 2, LineCollision::Insert, 0);
    assert_eq!(outcome.produced(), 2);
    let lines: Vec<&str> = outcome.snapshots[1].text.split('\n').collect();
    assert_eq!(lines[1], "    if (true) {}");
    assert_eq!(lines[2], "    function f() external {");
    assert_eq!(lines.len(), 6);
}

#[test]
fn inserted_lines_shift_later_targets() {
    let mutations = vec![
        line(1, "    function f() external {"),
        line(1, "    x = 2;"),
        line(2, "        x = 3;"),
    ];

    let outcome = apply_lines(SOURCE, &mutations, 3, LineCollision::Insert, 0);
    let lines: Vec<&str> = outcome.snapshots[2].text.split('\n').collect();
    assert_eq!(lines[3], "        x = 3;");
}

#[test]
fn skip_policy_rejects_used_lines() {
    let mutations = vec![line(1, "    function f() external {"), line(1, "    x = 2;")];

    let outcome = apply_lines(SOURCE, &mutations, 2, LineCollision::Skip, 0);
    assert_eq!(outcome.produced(), 1);
    assert_eq!(outcome.shortfall(), 1);
    assert_eq!(outcome.rejected[0].reason, RejectReason::Overlap);
}

#[test]
fn line_adjust_maps_reported_numbers() {
    let mutations = vec![line(0, "        x = 9;")];

    let outcome = apply_lines(SOURCE, &mutations, 1, LineCollision::Insert, 2);
    assert!(outcome.snapshots[0].text.contains("x = 9;"));
    assert!(!outcome.snapshots[0].text.contains("x = 1;"));
}

#[test]
fn negative_adjust_below_zero_is_out_of_bounds() {
    let outcome = apply_lines(SOURCE, &[line(0, "x")], 1, LineCollision::Insert, -1);
    assert_eq!(outcome.produced(), 0);
    assert_eq!(outcome.rejected[0].reason, RejectReason::OutOfBounds);
}

#[test]
fn line_past_end_is_out_of_bounds() {
    let outcome = apply_lines(SOURCE, &[line(40, "x")], 1, LineCollision::Insert, 0);
    assert_eq!(outcome.produced(), 0);
    assert_eq!(outcome.rejected[0].reason, RejectReason::OutOfBounds);
}

#[test]
fn block_opener_with_trailing_space_is_closed() {
    let mutations = vec![line(1, "    function f() external {"), line(1, "    while (x) { ")];

    let outcome = apply_lines(SOURCE, &mutations, 2, LineCollision::Insert, 0);
    let lines: Vec<&str> = outcome.snapshots[1].text.split('\n').collect();
    assert_eq!(lines[1], "    while (x) { }");
}
