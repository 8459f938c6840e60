//! Value types of PromQL expressions
//!
//! Every expression node resolves to one of the [`ValueType`]s. Built-in
//! functions carry a [`FunctionSignature`] used both for type resolution and
//! for argument checking.

use std::fmt;

use crate::parser::{walk_through, Function, Node, NodeKind};

/// Type of the value an expression evaluates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    None,
    Vector,
    Scalar,
    Matrix,
    String,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::None => "none",
            ValueType::Vector => "vector",
            ValueType::Scalar => "scalar",
            ValueType::Matrix => "matrix",
            ValueType::String => "string",
        };
        write!(f, "{}", name)
    }
}

/// Signature of a built-in function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: &'static str,
    pub arg_types: &'static [ValueType],
    /// 0 for a fixed arity, N > 0 for up to N optional trailing arguments,
    /// negative for an unbounded number of them
    pub variadic: i32,
    pub return_type: ValueType,
}

const VECTOR: &[ValueType] = &[ValueType::Vector];
const MATRIX: &[ValueType] = &[ValueType::Matrix];
const VECTOR_SCALAR: &[ValueType] = &[ValueType::Vector, ValueType::Scalar];

/// Look up the signature of a built-in function
pub fn signature(func: Function) -> FunctionSignature {
    use ValueType::{Matrix, Scalar, String, Vector};

    let (arg_types, variadic, return_type): (&'static [ValueType], i32, ValueType) = match func {
        Function::Abs
        | Function::Absent
        | Function::Ceil
        | Function::Exp
        | Function::Floor
        | Function::Ln
        | Function::Log10
        | Function::Log2
        | Function::Sort
        | Function::SortDesc
        | Function::Sqrt
        | Function::Timestamp => (VECTOR, 0, Vector),

        Function::AbsentOverTime
        | Function::AvgOverTime
        | Function::Changes
        | Function::CountOverTime
        | Function::Delta
        | Function::Deriv
        | Function::Idelta
        | Function::Increase
        | Function::Irate
        | Function::MaxOverTime
        | Function::MinOverTime
        | Function::Rate
        | Function::Resets
        | Function::StddevOverTime
        | Function::StdvarOverTime
        | Function::SumOverTime => (MATRIX, 0, Vector),

        Function::ClampMax | Function::ClampMin => (VECTOR_SCALAR, 0, Vector),

        Function::DaysInMonth
        | Function::DayOfMonth
        | Function::DayOfWeek
        | Function::Hour
        | Function::Minute
        | Function::Month
        | Function::Year => (VECTOR, 1, Vector),

        Function::HistogramQuantile => (&[Scalar, Vector], 0, Vector),
        Function::HoltWinters => (&[Matrix, Scalar, Scalar], 0, Vector),
        Function::LabelReplace => (&[Vector, String, String, String, String], 0, Vector),
        Function::LabelJoin => (&[Vector, String, String, String], -1, Vector),
        Function::PredictLinear => (&[Matrix, Scalar], 0, Vector),
        Function::QuantileOverTime => (&[Scalar, Matrix], 0, Vector),
        Function::Round => (VECTOR_SCALAR, 1, Vector),
        Function::Scalar => (VECTOR, 0, Scalar),
        Function::Time => (&[], 0, Scalar),
        Function::Vector => (&[Scalar], 0, Vector),
    };

    FunctionSignature {
        name: func.name(),
        arg_types,
        variadic,
        return_type,
    }
}

/// Resolve the value type of an expression node
pub fn get_type(node: Option<Node<'_>>) -> ValueType {
    let Some(node) = node else {
        return ValueType::None;
    };

    match node.kind() {
        NodeKind::Expr => get_type(node.first_child()),
        NodeKind::AggregateExpr | NodeKind::VectorSelector => ValueType::Vector,
        NodeKind::NumberLiteral => ValueType::Scalar,
        NodeKind::StringLiteral => ValueType::String,
        NodeKind::MatrixSelector | NodeKind::SubqueryExpr => ValueType::Matrix,
        NodeKind::ParenExpr | NodeKind::UnaryExpr | NodeKind::OffsetExpr => {
            get_type(walk_through(node, &[NodeKind::Expr]).found())
        }
        NodeKind::BinaryExpr => {
            let lt = get_type(node.first_child());
            let rt = get_type(node.last_child());
            if lt == ValueType::Scalar && rt == ValueType::Scalar {
                ValueType::Scalar
            } else {
                ValueType::Vector
            }
        }
        NodeKind::FunctionCall => {
            let ident = walk_through(node, &[NodeKind::FunctionIdentifier])
                .found()
                .and_then(|id| id.first_child());
            match ident.map(|n| n.kind()) {
                Some(NodeKind::Function(func)) => signature(func).return_type,
                _ => ValueType::None,
            }
        }
        _ => ValueType::None,
    }
}
