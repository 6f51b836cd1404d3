//! Bottom-up compilation of a parsed filter against a resource.

use super::{Argument, ComparisonOp, FilterError, FilterNode, Literal, LogicalOperator};
use super::{PatternKind, Predicate};
use crate::registry::ResourceDescriptor;

pub(super) fn compile(
    node: &FilterNode,
    resource: &ResourceDescriptor,
) -> Result<Predicate, FilterError> {
    match node {
        FilterNode::Comparison {
            column,
            operator,
            literal,
        } => comparison(column, *operator, literal, resource),
        FilterNode::Logical {
            operator,
            left,
            right,
        } => {
            let left = Box::new(compile(left, resource)?);
            let right = Box::new(compile(right, resource)?);
            Ok(match operator {
                LogicalOperator::And => Predicate::And(left, right),
                LogicalOperator::Or => Predicate::Or(left, right),
            })
        },
        FilterNode::FunctionCall { name, args } => function(name, args, resource),
        FilterNode::Not(inner) => Ok(Predicate::Not(Box::new(compile(inner, resource)?))),
    }
}

fn column<'a>(name: &'a str, resource: &ResourceDescriptor) -> Result<&'a str, FilterError> {
    if resource.is_allowed_column(name) {
        Ok(name)
    } else {
        Err(FilterError::UnknownAttribute(name.to_string()))
    }
}

fn comparison(
    name: &str,
    op: ComparisonOp,
    literal: &Literal,
    resource: &ResourceDescriptor,
) -> Result<Predicate, FilterError> {
    let column = column(name, resource)?.to_string();
    match (op, literal) {
        (ComparisonOp::Eq | ComparisonOp::Ne, Literal::Null) => Ok(Predicate::IsNull {
            column,
            negated: op == ComparisonOp::Ne,
        }),
        (_, Literal::Null) => Err(FilterError::UnsupportedOperator(op.as_str().to_string())),
        (_, literal) => Ok(Predicate::Compare {
            column,
            op,
            value: literal.to_value(),
        }),
    }
}

fn function(
    name: &str,
    args: &[Argument],
    resource: &ResourceDescriptor,
) -> Result<Predicate, FilterError> {
    let Some(kind) = PatternKind::from_function(name) else {
        return Err(FilterError::UnsupportedFunction {
            function: name.to_string(),
            reason: "unknown function".to_string(),
        });
    };

    match args {
        [Argument::Column(col), Argument::Literal(Literal::String(pattern))] => {
            Ok(Predicate::Like {
                column: column(col, resource)?.to_string(),
                kind,
                pattern: pattern.clone(),
            })
        },
        _ => Err(FilterError::UnsupportedFunction {
            function: name.to_string(),
            reason: "expects (column, 'string')".to_string(),
        }),
    }
}
