//! Static completion terms: keywords, operators, functions and snippets

use crate::parser::{Aggregator, Function};

use super::Candidate;

/// Short description of a built-in function
pub fn function_info(func: Function) -> Option<&'static str> {
    let info = match func {
        Function::Abs => "Returns the input vector with all sample values converted to their absolute value.",
        Function::Absent => "Returns an empty vector if the vector passed to it has any elements and a 1-element vector with the value 1 if the vector passed to it has no elements. This is useful for alerting on when no time series exist for a given metric name and label combination.",
        Function::AvgOverTime => "The average value of all points in the specified interval.",
        Function::Ceil => "Rounds the sample values of all elements in `v` up to the nearest integer.",
        Function::Changes => "For each input time series, `changes(v range-vector)` returns the number of times its value has changed within the provided time range as an instant vector.",
        Function::ClampMax => "Clamps the sample values of all elements in `v` to have an upper limit of `max`.",
        Function::ClampMin => "Clamps the sample values of all elements in `v` to have a lower limit of `min`.",
        Function::CountOverTime => "The count of all values in the specified interval.",
        Function::DaysInMonth => "Returns number of days in the month for each of the given times in UTC. Returned values are from 28 to 31.",
        Function::DayOfMonth => "Returns the day of the month for each of the given times in UTC. Returned values are from 1 to 31.",
        Function::DayOfWeek => "Returns the day of the week for each of the given times in UTC. Returned values are from 0 to 6, where 0 means Sunday etc.",
        Function::Delta => "Calculates the difference between the first and last value of each time series element in a range vector `v`, returning an instant vector with the given deltas and equivalent labels. The delta is extrapolated to cover the full time range as specified in the range vector selector, so that it is possible to get a non-integer result even if the sample values are all integers.",
        Function::Deriv => "Calculates the per-second derivative of the time series in a range vector `v`, using simple linear regression.",
        Function::Exp => "Calculates the exponential function for all elements in `v`.\nSpecial cases are:\n* `Exp(+Inf) = +Inf` \n* `Exp(NaN) = NaN`",
        Function::Floor => "Rounds the sample values of all elements in `v` down to the nearest integer.",
        Function::HistogramQuantile => "Calculates the φ-quantile (0 ≤ φ ≤ 1) from the buckets `b` of a histogram. The samples in `b` are the counts of observations in each bucket. Each sample must have a label `le` where the label value denotes the inclusive upper bound of the bucket. (Samples without such a label are silently ignored.) The histogram metric type automatically provides time series with the `_bucket` suffix and the appropriate labels.",
        Function::HoltWinters => "Produces a smoothed value for time series based on the range in `v`. The lower the smoothing factor `sf`, the more importance is given to old data. The higher the trend factor `tf`, the more trends in the data is considered. Both `sf` and `tf` must be between 0 and 1.",
        Function::Hour => "Returns the hour of the day for each of the given times in UTC. Returned values are from 0 to 23.",
        Function::Idelta => "Calculates the difference between the last two samples in the range vector `v`, returning an instant vector with the given deltas and equivalent labels.",
        Function::Increase => "Calculates the increase in the time series in the range vector. Breaks in monotonicity (such as counter resets due to target restarts) are automatically adjusted for. The increase is extrapolated to cover the full time range as specified in the range vector selector, so that it is possible to get a non-integer result even if a counter increases only by integer increments.",
        Function::Irate => "Calculates the per-second instant rate of increase of the time series in the range vector. This is based on the last two data points. Breaks in monotonicity (such as counter resets due to target restarts) are automatically adjusted for.",
        Function::LabelReplace => "For each timeseries in `v`, `label_replace(v instant-vector, dst_label string, replacement string, src_label string, regex string)` matches the regular expression `regex` against the label `src_label`. If it matches, then the timeseries is returned with the label `dst_label` replaced by the expansion of `replacement`. `$1` is replaced with the first matching subgroup, `$2` with the second etc. If the regular expression doesn't match then the timeseries is returned unchanged.",
        Function::Ln => "Calculates the natural logarithm for all elements in `v`.\nSpecial cases are:\n * `ln(+Inf) = +Inf`\n * `ln(0) = -Inf`\n * `ln(x < 0) = NaN`\n * `ln(NaN) = NaN`",
        Function::Log10 => "Calculates the decimal logarithm for all elements in `v`. The special cases are equivalent to those in `ln`.",
        Function::Log2 => "Calculates the binary logarithm for all elements in `v`. The special cases are equivalent to those in `ln`.",
        Function::MaxOverTime => "The maximum value of all points in the specified interval.",
        Function::MinOverTime => "The minimum value of all points in the specified interval.",
        Function::Minute => "Returns the minute of the hour for each of the given times in UTC. Returned values are from 0 to 59.",
        Function::Month => "Returns the month of the year for each of the given times in UTC. Returned values are from 1 to 12, where 1 means January etc.",
        Function::PredictLinear => "Predicts the value of time series `t` seconds from now, based on the range vector `v`, using simple linear regression.",
        Function::QuantileOverTime => "The φ-quantile (0 ≤ φ ≤ 1) of the values in the specified interval.",
        Function::Rate => "Calculates the per-second average rate of increase of the time series in the range vector. Breaks in monotonicity (such as counter resets due to target restarts) are automatically adjusted for. Also, the calculation extrapolates to the ends of the time range, allowing for missed scrapes or imperfect alignment of scrape cycles with the range's time period.",
        Function::Resets => "For each input time series, `resets(v range-vector)` returns the number of counter resets within the provided time range as an instant vector. Any decrease in the value between two consecutive samples is interpreted as a counter reset.",
        Function::Round => "Rounds the sample values of all elements in `v` to the nearest integer. Ties are resolved by rounding up. The optional `to_nearest` argument allows specifying the nearest multiple to which the sample values should be rounded. This multiple may also be a fraction.",
        Function::Scalar => "Given a single-element input vector, `scalar(v instant-vector)` returns the sample value of that single element as a scalar. If the input vector does not have exactly one element, `scalar` will return `NaN`.",
        Function::Sort => "Returns vector elements sorted by their sample values, in ascending order.",
        Function::SortDesc => "Returns vector elements sorted by their sample values, in descending order.",
        Function::Sqrt => "Calculates the square root of all elements in `v`.",
        Function::StddevOverTime => "The population standard deviation of the values in the specified interval.",
        Function::StdvarOverTime => "The population standard variance of the values in the specified interval.",
        Function::SumOverTime => "The sum of all values in the specified interval.",
        Function::Time => "Returns the number of seconds since January 1, 1970 UTC. Note that this does not actually return the current time, but the time at which the expression is to be evaluated.",
        Function::Vector => "Returns the scalar `s` as a vector with no labels.",
        Function::Year => "Returns the year for each of the given times in UTC.",
        Function::AbsentOverTime | Function::LabelJoin | Function::Timestamp => return None,
    };
    Some(info)
}

pub fn aggregator_info(op: Aggregator) -> Option<&'static str> {
    let info = match op {
        Aggregator::Avg => "Calculate the average over dimensions",
        Aggregator::Bottomk => "Smallest k elements by sample value",
        Aggregator::Count => "Count number of elements in the vector",
        Aggregator::CountValues => "Count number of elements with the same value",
        Aggregator::Max => "Select maximum over dimensions",
        Aggregator::Min => "Select minimum over dimensions",
        Aggregator::Quantile => "Calculate φ-quantile (0 ≤ φ ≤ 1) over dimensions",
        Aggregator::Stddev => "Calculate population standard deviation over dimensions",
        Aggregator::Stdvar => "Calculate population standard variance over dimensions",
        Aggregator::Sum => "Calculate sum over dimensions",
        Aggregator::Topk => "Largest k elements by sample value",
        Aggregator::Group => return None,
    };
    Some(info)
}

pub const BIN_OPS: [&str; 15] = [
    "^", "*", "/", "%", "+", "-", "==", ">=", ">", "<", "<=", "!=", "and", "or", "unless",
];

pub const BIN_OP_MODIFIERS: [&str; 4] = ["on", "ignoring", "group_left", "group_right"];

pub const MATCH_OPS: [&str; 4] = ["=", "!=", "=~", "!~"];

pub const AGGREGATE_OP_MODIFIERS: [&str; 2] = ["by", "without"];

pub const DURATION_UNITS: [(&str, &str); 7] = [
    ("y", "year"),
    ("w", "week"),
    ("d", "day"),
    ("h", "hour"),
    ("m", "minute"),
    ("s", "second"),
    ("ms", "millisecond"),
];

pub const OFFSET: &str = "offset";

/// Multi-token templates offered next to metric names
pub const SNIPPETS: [(&str, &str, &str); 3] = [
    (
        "sum(rate(__input_vector__[5m]))",
        "snippet",
        "sum(rate(${__input_vector__}[5m]))",
    ),
    (
        "histogram_quantile(__quantile__, sum by(le) (rate(__histogram_metric__[5m])))",
        "snippet",
        "histogram_quantile(${__quantile__}, sum by(le) (rate(${__histogram_metric__}[5m])))",
    ),
    (
        "label_replace(__input_vector__, \"__dst__\", \"__replacement__\", \"__src__\", \"__regex__\")",
        "snippet",
        "label_replace(${__input_vector__}, \"${__dst__}\", \"${__replacement__}\", \"${__src__}\", \"${__regex__}\")",
    ),
];

pub fn functions() -> Vec<Candidate> {
    Function::ALL
        .into_iter()
        .map(|func| Candidate::function(func.name(), function_info(func)))
        .collect()
}

pub fn aggregations() -> Vec<Candidate> {
    Aggregator::ALL
        .into_iter()
        .map(|op| Candidate::aggregation(op.name(), aggregator_info(op)))
        .collect()
}

pub fn bin_ops() -> Vec<Candidate> {
    BIN_OPS.iter().map(|op| Candidate::keyword(op)).collect()
}

pub fn bin_op_modifiers() -> Vec<Candidate> {
    BIN_OP_MODIFIERS.iter().map(|m| Candidate::keyword(m)).collect()
}

pub fn match_ops() -> Vec<Candidate> {
    MATCH_OPS.iter().map(|op| Candidate::keyword(op)).collect()
}

pub fn aggregate_op_modifiers() -> Vec<Candidate> {
    AGGREGATE_OP_MODIFIERS
        .iter()
        .map(|m| Candidate::keyword(m))
        .collect()
}

pub fn durations() -> Vec<Candidate> {
    DURATION_UNITS
        .iter()
        .map(|(unit, detail)| Candidate::duration(unit, detail))
        .collect()
}

pub fn offset() -> Vec<Candidate> {
    vec![Candidate::keyword(OFFSET)]
}

pub fn snippets() -> Vec<Candidate> {
    SNIPPETS
        .iter()
        .map(|(label, detail, template)| Candidate::snippet(label, detail, template))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_function_is_offered() {
        let names: Vec<_> = functions().into_iter().map(|c| c.label).collect();
        assert_eq!(names.len(), Function::ALL.len());
        assert!(names.contains(&"histogram_quantile".to_string()));
    }

    #[test]
    fn test_terms_without_info() {
        assert!(function_info(Function::Timestamp).is_none());
        assert!(function_info(Function::Rate).is_some());
        assert!(aggregator_info(Aggregator::Group).is_none());
    }

    #[test]
    fn test_snippets_carry_templates() {
        for candidate in snippets() {
            assert!(candidate.apply.as_deref().unwrap_or("").contains("${"));
        }
    }
}
