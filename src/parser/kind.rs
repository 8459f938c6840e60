//! Grammar symbols of the PromQL syntax tree.

use std::fmt;

/// Kind of a syntax tree node.
///
/// Structural productions and the keyword/operator leaves the completion
/// analyzer needs to tell apart. Punctuation is not represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Root of every tree
    PromQL,
    Expr,

    AggregateExpr,
    AggregateOp,
    Aggregator(Aggregator),
    AggregateModifier,
    By,
    Without,
    GroupingLabels,
    GroupingLabelList,
    GroupingLabel,
    LabelName,

    BinaryExpr,
    Operator(BinaryOp),
    BinModifiers,
    Bool,
    On,
    Ignoring,
    GroupLeft,
    GroupRight,

    FunctionCall,
    FunctionIdentifier,
    Function(Function),
    FunctionCallBody,
    FunctionCallArgs,

    ParenExpr,
    OffsetExpr,
    Offset,
    MatrixSelector,
    SubqueryExpr,
    UnaryExpr,
    UnaryOp,

    VectorSelector,
    MetricIdentifier,
    Identifier,
    LabelMatchers,
    LabelMatchList,
    LabelMatcher,
    MatchOp,
    Match(MatchOp),

    StringLiteral,
    NumberLiteral,
    Duration,

    /// Input the parser could not place, or a missing piece (zero width)
    Error,
}

impl NodeKind {
    pub fn is_error(&self) -> bool {
        matches!(self, NodeKind::Error)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Aggregator(op) => write!(f, "{:?}", op),
            NodeKind::Operator(op) => write!(f, "{:?}", op),
            NodeKind::Function(func) => write!(f, "{:?}", func),
            NodeKind::Match(op) => write!(f, "{:?}", op),
            NodeKind::Error => write!(f, "⚠"),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Aggregation operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregator {
    Avg,
    Bottomk,
    Count,
    CountValues,
    Group,
    Max,
    Min,
    Quantile,
    Stddev,
    Stdvar,
    Sum,
    Topk,
}

impl Aggregator {
    pub const ALL: [Aggregator; 12] = [
        Aggregator::Avg,
        Aggregator::Bottomk,
        Aggregator::Count,
        Aggregator::CountValues,
        Aggregator::Group,
        Aggregator::Max,
        Aggregator::Min,
        Aggregator::Quantile,
        Aggregator::Stddev,
        Aggregator::Stdvar,
        Aggregator::Sum,
        Aggregator::Topk,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Aggregator::Avg => "avg",
            Aggregator::Bottomk => "bottomk",
            Aggregator::Count => "count",
            Aggregator::CountValues => "count_values",
            Aggregator::Group => "group",
            Aggregator::Max => "max",
            Aggregator::Min => "min",
            Aggregator::Quantile => "quantile",
            Aggregator::Stddev => "stddev",
            Aggregator::Stdvar => "stdvar",
            Aggregator::Sum => "sum",
            Aggregator::Topk => "topk",
        }
    }

    /// Whether the aggregation takes a leading parameter (`topk(5, ...)`)
    pub fn takes_parameter(&self) -> bool {
        matches!(
            self,
            Aggregator::Topk | Aggregator::Bottomk | Aggregator::Quantile | Aggregator::CountValues
        )
    }
}

/// Binary operators, in their lezer naming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Pow,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Eql,
    Neq,
    Lte,
    Lss,
    Gte,
    Gtr,
    And,
    Or,
    Unless,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Pow => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Eql => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lte => "<=",
            BinaryOp::Lss => "<",
            BinaryOp::Gte => ">=",
            BinaryOp::Gtr => ">",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Unless => "unless",
        }
    }

    /// Binding power; higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And | BinaryOp::Unless => 2,
            BinaryOp::Eql
            | BinaryOp::Neq
            | BinaryOp::Lte
            | BinaryOp::Lss
            | BinaryOp::Gte
            | BinaryOp::Gtr => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 5,
            BinaryOp::Pow => 6,
        }
    }

    pub fn is_right_associative(&self) -> bool {
        matches!(self, BinaryOp::Pow)
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 3
    }

    pub fn is_set_operator(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Unless)
    }
}

/// Label matching operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOp {
    EqlSingle,
    Neq,
    EqlRegex,
    NeqRegex,
}

impl MatchOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            MatchOp::EqlSingle => "=",
            MatchOp::Neq => "!=",
            MatchOp::EqlRegex => "=~",
            MatchOp::NeqRegex => "!~",
        }
    }
}

/// Built-in functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Abs,
    Absent,
    AbsentOverTime,
    AvgOverTime,
    Ceil,
    Changes,
    ClampMax,
    ClampMin,
    CountOverTime,
    DaysInMonth,
    DayOfMonth,
    DayOfWeek,
    Delta,
    Deriv,
    Exp,
    Floor,
    HistogramQuantile,
    HoltWinters,
    Hour,
    Idelta,
    Increase,
    Irate,
    LabelReplace,
    LabelJoin,
    Ln,
    Log10,
    Log2,
    MaxOverTime,
    MinOverTime,
    Minute,
    Month,
    PredictLinear,
    QuantileOverTime,
    Rate,
    Resets,
    Round,
    Scalar,
    Sort,
    SortDesc,
    Sqrt,
    StddevOverTime,
    StdvarOverTime,
    SumOverTime,
    Time,
    Timestamp,
    Vector,
    Year,
}

impl Function {
    pub const ALL: [Function; 47] = [
        Function::Abs,
        Function::Absent,
        Function::AbsentOverTime,
        Function::AvgOverTime,
        Function::Ceil,
        Function::Changes,
        Function::ClampMax,
        Function::ClampMin,
        Function::CountOverTime,
        Function::DaysInMonth,
        Function::DayOfMonth,
        Function::DayOfWeek,
        Function::Delta,
        Function::Deriv,
        Function::Exp,
        Function::Floor,
        Function::HistogramQuantile,
        Function::HoltWinters,
        Function::Hour,
        Function::Idelta,
        Function::Increase,
        Function::Irate,
        Function::LabelReplace,
        Function::LabelJoin,
        Function::Ln,
        Function::Log10,
        Function::Log2,
        Function::MaxOverTime,
        Function::MinOverTime,
        Function::Minute,
        Function::Month,
        Function::PredictLinear,
        Function::QuantileOverTime,
        Function::Rate,
        Function::Resets,
        Function::Round,
        Function::Scalar,
        Function::Sort,
        Function::SortDesc,
        Function::Sqrt,
        Function::StddevOverTime,
        Function::StdvarOverTime,
        Function::SumOverTime,
        Function::Time,
        Function::Timestamp,
        Function::Vector,
        Function::Year,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|func| func.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Absent => "absent",
            Function::AbsentOverTime => "absent_over_time",
            Function::AvgOverTime => "avg_over_time",
            Function::Ceil => "ceil",
            Function::Changes => "changes",
            Function::ClampMax => "clamp_max",
            Function::ClampMin => "clamp_min",
            Function::CountOverTime => "count_over_time",
            Function::DaysInMonth => "days_in_month",
            Function::DayOfMonth => "day_of_month",
            Function::DayOfWeek => "day_of_week",
            Function::Delta => "delta",
            Function::Deriv => "deriv",
            Function::Exp => "exp",
            Function::Floor => "floor",
            Function::HistogramQuantile => "histogram_quantile",
            Function::HoltWinters => "holt_winters",
            Function::Hour => "hour",
            Function::Idelta => "idelta",
            Function::Increase => "increase",
            Function::Irate => "irate",
            Function::LabelReplace => "label_replace",
            Function::LabelJoin => "label_join",
            Function::Ln => "ln",
            Function::Log10 => "log10",
            Function::Log2 => "log2",
            Function::MaxOverTime => "max_over_time",
            Function::MinOverTime => "min_over_time",
            Function::Minute => "minute",
            Function::Month => "month",
            Function::PredictLinear => "predict_linear",
            Function::QuantileOverTime => "quantile_over_time",
            Function::Rate => "rate",
            Function::Resets => "resets",
            Function::Round => "round",
            Function::Scalar => "scalar",
            Function::Sort => "sort",
            Function::SortDesc => "sort_desc",
            Function::Sqrt => "sqrt",
            Function::StddevOverTime => "stddev_over_time",
            Function::StdvarOverTime => "stdvar_over_time",
            Function::SumOverTime => "sum_over_time",
            Function::Time => "time",
            Function::Timestamp => "timestamp",
            Function::Vector => "vector",
            Function::Year => "year",
        }
    }
}
