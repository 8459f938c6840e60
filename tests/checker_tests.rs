use pretty_assertions::assert_eq;
use promql_editor::{check, parse, Severity};

const SET_SCALAR: &str = "set operator not allowed in binary scalar expression";
const VECTOR_MATCHING: &str = "vector matching only allowed between instant vectors";
const BOOL_MODIFIER: &str = "bool modifier can only be used on comparison operators";
const SET_GROUPING: &str = "no grouping allowed for set operations";
const SET_CARDINALITY: &str = "set operations must always be many-to-many";

fn diagnostics(source: &str) -> Vec<(usize, usize, String)> {
    check(&parse(source))
        .into_iter()
        .map(|d| (d.from, d.to, d.message))
        .collect()
}

fn expect(source: &str, from: usize, to: usize, messages: &[&str]) {
    let expected: Vec<_> = messages
        .iter()
        .map(|m| (from, to, m.to_string()))
        .collect();
    assert_eq!(diagnostics(source), expected, "diagnostics of {:?}", source);
}

#[test]
fn test_valid_expressions() {
    let sources = [
        "1",
        "2 * 3",
        "metric_name_1 > bool metric_name_2",
        "metric_name offset 1d",
        "metric_name[5m] offset 1d",
        "rate(metric_name[5m])[1h:] offset 1m",
        "sum(metric_name offset 1m)",
        "rate(metric_name[5m] offset 1d)",
        "max_over_time(rate(metric_name[5m])[1h:] offset 1m)",
        "foo * bar",
        "foo*bar",
        "foo* bar",
        "foo *bar",
        "foo==bar",
        "foo * sum",
        "foo == 1",
        "foo == bool 1",
        "2.5 / bar",
        "foo and bar",
        "foo or bar",
        "foo unless bar",
        "foo + bar or bla and blub",
        "foo and bar unless baz or qux",
        "foo * on(test,blub) bar",
        "foo*on(test,blub)bar",
        "foo * on(test,blub) group_left bar",
        "foo*on(test,blub)group_left()bar",
        "foo and on(test,blub) bar",
        "foo and on() bar",
        "foo and ignoring(test,blub) bar",
        "foo and ignoring() bar",
        "foo unless on(bar) baz",
        "foo / on(test,blub) group_left(bar) bar",
        "foo / ignoring(test,blub) group_left(blub) bar",
        "foo / ignoring(test,blub) group_left(bar) bar",
        "foo - on(test,blub) group_right(bar,foo) bar",
        "foo - ignoring(test,blub) group_right(bar,foo) bar",
    ];
    for source in sources {
        let found = diagnostics(source);
        assert!(found.is_empty(), "diagnostics of {:?}: {:?}", source, found);
    }
}

#[test]
fn test_set_operator_on_scalars() {
    expect("1 unless 1", 0, 10, &[SET_SCALAR]);
    expect("foo and 1", 0, 9, &[SET_SCALAR]);
    expect("1 and foo", 0, 9, &[SET_SCALAR]);
    expect("foo or 1", 0, 8, &[SET_SCALAR]);
    expect("1 or foo", 0, 8, &[SET_SCALAR]);
    expect("foo unless 1", 0, 12, &[SET_SCALAR]);
    expect("1 unless foo", 0, 12, &[SET_SCALAR]);
}

#[test]
fn test_string_operand() {
    expect(
        "metric_name * \"string\"",
        14,
        22,
        &["binary expression must contain only scalar and instant vector types"],
    );
}

#[test]
fn test_bool_modifier() {
    expect("metric_name_1 + bool metric_name_2", 0, 34, &[BOOL_MODIFIER]);
    expect("foo + bool bar", 0, 14, &[BOOL_MODIFIER]);
    expect("foo + bool 10", 0, 13, &[BOOL_MODIFIER]);
    expect("foo and bool 10", 0, 15, &[BOOL_MODIFIER, SET_SCALAR]);
}

#[test]
fn test_vector_matching_with_scalar() {
    expect("1 or on(bar) foo", 0, 16, &[VECTOR_MATCHING, SET_SCALAR]);
    expect("foo == on(bar) 10", 0, 17, &[VECTOR_MATCHING]);
}

#[test]
fn test_grouping_on_set_operators() {
    let cases = [
        ("foo and on(bar) group_left(baz) bar", 35),
        ("foo and on(bar) group_right(baz) bar", 36),
        ("foo or on(bar) group_left(baz) bar", 34),
        ("foo or on(bar) group_right(baz) bar", 35),
        ("foo unless on(bar) group_left(baz) bar", 38),
        ("foo unless on(bar) group_right(baz) bar", 39),
    ];
    for (source, to) in cases {
        expect(source, 0, to, &[SET_GROUPING, SET_CARDINALITY]);
    }
}

#[test]
fn test_label_in_on_and_group() {
    expect(
        "http_requests{group=\"production\"} + on(instance) group_left(job,instance) cpu_count{type=\"smp\"}",
        0,
        95,
        &["label \"instance\" must not occur in ON and GROUP clause at once"],
    );
}

#[test]
fn test_diagnostics_are_errors() {
    let diagnostics = check(&parse("foo and bool 10"));
    assert!(diagnostics.iter().all(|d| d.severity == Severity::Error));
    assert!(diagnostics.windows(2).all(|w| w[0].from <= w[1].from));
}

#[test]
fn test_regex_matchers_are_non_empty() {
    for source in ["{job!~\"x\"}", "{job=~\"\"}", "{job=~\".+\"}", "{job!~\"\"}"] {
        let found = diagnostics(source);
        assert!(found.is_empty(), "diagnostics of {:?}: {:?}", source, found);
    }
    expect(
        "{job=\"\",env!=\"x\"}",
        0,
        17,
        &["vector selector must contain at least one non-empty matcher"],
    );
}

#[test]
fn test_metric_name_set_twice_keeps_raw_value() {
    expect(
        "foo{__name__=\"a\\\"b\"}",
        0,
        20,
        &["metric name must not be set twice: foo or a\\\"b"],
    );
}
