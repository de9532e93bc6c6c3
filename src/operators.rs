//! Operator rules
//!
//! Each rule reads its already-resolved operands, settles the operator's own
//! shape and storage class, and returns the template that renders it. The
//! engine seeds every operator with the join of its operand types before the
//! rule runs, so rules only override what the join gets wrong.

use crate::ast::Category;
use crate::context::{Cx, RuleResult, Template};
use crate::diagnostics::DiagnosticKind;
use crate::lattice::{Datatype, Shape, StorageClass};
use crate::unit::Include;

/// Types of all operands, for diagnostics
fn operand_types(cx: &Cx<'_>) -> String {
    let names: Vec<&str> = cx.children().map(|c| c.datatype.type_name()).collect();
    format!("[{}]", names.join(", "))
}

fn has_text_operand(cx: &Cx<'_>) -> bool {
    cx.children()
        .any(|c| c.datatype.class == StorageClass::Text)
}

fn check_numeric(cx: &mut Cx<'_>, operation: &str) {
    if !cx.numeric() && has_text_operand(cx) {
        let message = format!("non-numerical {} {}", operation, operand_types(cx));
        cx.report(DiagnosticKind::NonNumericOperand, message);
    }
}

pub fn add(cx: &mut Cx<'_>) -> RuleResult {
    check_numeric(cx, "addition");
    Ok(Template::join("", "+", ""))
}

pub fn sub(cx: &mut Cx<'_>) -> RuleResult {
    check_numeric(cx, "subtraction");
    Ok(Template::join("", "-", ""))
}

/// Matrix product
pub fn mul(cx: &mut Cx<'_>) -> RuleResult {
    if !cx.datatype().is_known() {
        return Ok(Template::join("", "*", ""));
    }
    if !cx.numeric() {
        let message = format!("non-numerical multiplication {}", operand_types(cx));
        cx.report(DiagnosticKind::NonNumericOperand, message);
        return Ok(Template::join("", "*", ""));
    }

    let mut shape = cx.child(0).datatype.shape;
    for k in 1..cx.len() {
        match shape.mul(cx.child(k).datatype.shape) {
            Ok(next) => shape = next,
            Err(mismatch) => {
                let id = cx.child_id(k);
                cx.report_at(
                    id,
                    DiagnosticKind::ShapeMismatch,
                    format!(
                        "multiplication shape mismatch, {}*{}",
                        mismatch.left, mismatch.right
                    ),
                );
            }
        }
    }
    cx.set_shape(shape);
    Ok(Template::join("", "*", ""))
}

/// Element-wise product; `%` is Armadillo's Schur product
pub fn el_mul(cx: &mut Cx<'_>) -> RuleResult {
    check_numeric(cx, "multiplication");
    if cx.numeric() && cx.shape().is_scalar() {
        return Ok(Template::join("", "*", ""));
    }
    Ok(Template::join("", "%", ""))
}

/// `a ./ b`, and `a / b` when every operand is scalar
pub fn el_right_div(cx: &mut Cx<'_>) -> RuleResult {
    check_numeric(cx, "division");
    let typed = cx.numeric();
    let mut out = cx.text(0).to_string();
    let mut class = cx.child(0).datatype.class;

    for k in 1..cx.len() {
        let child = cx.child(k);
        let divisor = cx.text(k);
        if child.category == Category::Int {
            out = format!("{}/{}.0", out, divisor);
        } else if typed && class.is_integral() && child.datatype.class.is_integral() {
            out = format!("{}*1.0/{}", out, divisor);
        } else {
            out = format!("{}/{}", out, divisor);
        }
        class = class.max(child.datatype.class).max(StorageClass::Float);
    }

    if typed {
        cx.set_class(cx.class().max(StorageClass::Float));
    }
    Ok(Template::fixed(out))
}

/// `a .\ b .\ c` is `c/(b/a)`: each operand divides the running quotient
pub fn el_left_div(cx: &mut Cx<'_>) -> RuleResult {
    check_numeric(cx, "division");
    let typed = cx.numeric();
    let mut out = cx.text(0).to_string();
    let mut class = cx.child(0).datatype.class;
    let mut literal = cx.child(0).category == Category::Int;

    for k in 1..cx.len() {
        let child = cx.child(k);
        let numerator = cx.text(k);
        let divisor = if k == 1 { out } else { format!("({})", out) };
        out = if literal {
            format!("{}/{}.0", numerator, divisor)
        } else if typed && class.is_integral() && child.datatype.class.is_integral() {
            format!("{}*1.0/{}", numerator, divisor)
        } else {
            format!("{}/{}", numerator, divisor)
        };
        literal = false;
        class = class.max(child.datatype.class).max(StorageClass::Float);
    }

    if typed {
        cx.set_class(cx.class().max(StorageClass::Float));
    }
    Ok(Template::fixed(out))
}

fn all_scalar(cx: &Cx<'_>) -> bool {
    cx.children().all(|c| c.datatype.shape.is_scalar())
}

/// `A / B`: solves `x B = A` through the transposed system for matrix divisors
pub fn right_div(cx: &mut Cx<'_>) -> RuleResult {
    if !cx.datatype().is_known() {
        return Ok(Template::join("", "/", ""));
    }
    if all_scalar(cx) {
        return el_right_div(cx);
    }
    check_numeric(cx, "division");

    let mut out = cx.text(0).to_string();
    let first = cx.child(0).datatype;
    let (mut shape, mut class) = (first.shape, first.class);

    for k in 1..cx.len() {
        let divisor = cx.child(k).datatype;
        let text = cx.text(k);
        if divisor.shape >= Shape::Matrix {
            out = format!("arma::solve({}.t(), {}.t()).t()", text, out);
        } else if class.is_integral() && divisor.class.is_integral() {
            out = format!("{}*1.0/{}", out, text);
            class = StorageClass::Float;
        } else {
            out = format!("{}/{}", out, text);
        }
        class = class.max(divisor.class);

        match shape.div(divisor.shape) {
            Ok(next) => shape = next,
            Err(mismatch) => cx.report(
                DiagnosticKind::ShapeMismatch,
                format!("Matrix division error '{}/{}'", mismatch.left, mismatch.right),
            ),
        }
    }

    cx.set_datatype(Datatype::new(shape, class));
    Ok(Template::fixed(out))
}

/// `A \ B`: solves `A x = B` directly
pub fn left_div(cx: &mut Cx<'_>) -> RuleResult {
    if !cx.datatype().is_known() {
        return Ok(Template::join("", "\\", ""));
    }
    if all_scalar(cx) {
        return el_left_div(cx);
    }
    check_numeric(cx, "division");

    let mut out = cx.text(0).to_string();
    let first = cx.child(0).datatype;
    let (mut shape, mut class) = (first.shape, first.class);

    for k in 1..cx.len() {
        let operand = cx.child(k).datatype;
        let text = cx.text(k);
        if operand.shape.is_array() {
            out = format!("arma::solve({}, {})", out, text);
        } else if class.is_integral() && operand.class.is_integral() {
            out = format!("({})*1.0/{}", out, text);
            class = StorageClass::Float;
        } else {
            out = format!("({})/{}", out, text);
        }
        class = class.max(operand.class);

        match shape.div(operand.shape) {
            Ok(next) => shape = next,
            Err(mismatch) => cx.report(
                DiagnosticKind::ShapeMismatch,
                format!("Matrix division error '{}\\{}'", mismatch.left, mismatch.right),
            ),
        }
    }

    cx.set_datatype(Datatype::new(shape, class));
    Ok(Template::fixed(out))
}

/// `a ^ b` and `a .^ b`, folded left into nested calls
pub fn power(cx: &mut Cx<'_>) -> RuleResult {
    let function = if !cx.numeric() {
        "pow"
    } else if cx.shape().is_scalar() {
        "std::pow"
    } else {
        "arma::pow"
    };
    let mut out = cx.text(0).to_string();
    for k in 1..cx.len() {
        out = format!("{}({}, {})", function, out, cx.text(k));
    }
    Ok(Template::fixed(out))
}

fn comparison(cx: &mut Cx<'_>, token: &str) -> RuleResult {
    if has_text_operand(cx) {
        let message = format!("comparison '{}' on non-numeric operands {}", token, operand_types(cx));
        cx.report(DiagnosticKind::NonNumericOperand, message);
    }
    Ok(Template::join("", token, ""))
}

pub fn gt(cx: &mut Cx<'_>) -> RuleResult {
    comparison(cx, ">")
}

pub fn ge(cx: &mut Cx<'_>) -> RuleResult {
    comparison(cx, ">=")
}

pub fn lt(cx: &mut Cx<'_>) -> RuleResult {
    comparison(cx, "<")
}

pub fn le(cx: &mut Cx<'_>) -> RuleResult {
    comparison(cx, "<=")
}

pub fn ne(cx: &mut Cx<'_>) -> RuleResult {
    comparison(cx, "!=")
}

pub fn eq(cx: &mut Cx<'_>) -> RuleResult {
    comparison(cx, "==")
}

pub fn and_and(_cx: &mut Cx<'_>) -> RuleResult {
    Ok(Template::join("", "&&", ""))
}

pub fn and(_cx: &mut Cx<'_>) -> RuleResult {
    Ok(Template::join("", "&", ""))
}

pub fn or_or(_cx: &mut Cx<'_>) -> RuleResult {
    Ok(Template::join("", "||", ""))
}

pub fn or(_cx: &mut Cx<'_>) -> RuleResult {
    Ok(Template::join("", "|", ""))
}

pub fn neg(_cx: &mut Cx<'_>) -> RuleResult {
    Ok(Template::join("-(", "", ")"))
}

/// Truthiness of a number becomes an explicit comparison with zero
pub fn not(cx: &mut Cx<'_>) -> RuleResult {
    if !cx.numeric() {
        return Ok(Template::format("not(%(0)s)"));
    }
    Ok(Template::format("(%(0)s == 0)"))
}

pub fn transpose(cx: &mut Cx<'_>) -> RuleResult {
    if !cx.numeric() {
        return Ok(Template::format("arma::strans(%(0)s)"));
    }
    cx.set_shape(cx.child(0).datatype.shape.transposed());
    Ok(Template::join("arma::strans(", "", ")"))
}

/// Conjugate transpose; real data only needs the plain transpose
pub fn ctranspose(cx: &mut Cx<'_>) -> RuleResult {
    if !cx.numeric() {
        return Ok(Template::join("arma::trans(", "", ")"));
    }
    cx.set_shape(cx.child(0).datatype.shape.transposed());
    if cx.class() != StorageClass::Complex {
        return Ok(Template::join("arma::strans(", "", ")"));
    }
    Ok(Template::join("arma::trans(", "", ")"))
}

pub fn paren(_cx: &mut Cx<'_>) -> RuleResult {
    Ok(Template::format("(%(0)s)"))
}

/// Zero-based form of a one-based bound, folded for integer literals
fn zero_based(cx: &Cx<'_>, k: usize) -> String {
    match cx.child(k).int_value() {
        Some(value) => (value - 1).to_string(),
        None => format!("{}-1", cx.text(k)),
    }
}

/// The range is an argument of a subscript into a known numeric variable
fn indexes_variable(cx: &Cx<'_>) -> bool {
    cx.parent()
        .filter(|p| p.category.is_subscript())
        .and_then(|p| cx.lookup(&p.name))
        .map_or(false, |datatype| datatype.is_numeric())
}

/// `start:stop` and `start:step:stop`
pub fn range(cx: &mut Cx<'_>) -> RuleResult {
    if indexes_variable(cx) {
        cx.set_datatype(Datatype::new(Shape::ColVec, StorageClass::Uword));
        return match cx.len() {
            2 => Ok(Template::fixed(format!(
                "arma::span({}, {})",
                zero_based(cx, 0),
                zero_based(cx, 1)
            ))),
            3 => {
                cx.include(Include::Uspan);
                Ok(Template::fixed(format!(
                    "m2cpp::uspan({}, {}, {})",
                    zero_based(cx, 0),
                    cx.text(1),
                    zero_based(cx, 2)
                )))
            }
            _ => Ok(Template::join("", ":", "")),
        };
    }

    let group = cx.group().map(|g| (g.category, g.children.first().copied()));
    let mut class = match group {
        Some((Category::Matrix, _)) => StorageClass::Int,
        _ if cx.parent_category().map_or(false, Category::is_subscript) => StorageClass::Int,
        Some((Category::Assign, Some(target))) if cx.tree().node(target).numeric => {
            StorageClass::Uword
        }
        _ => StorageClass::Int,
    };
    let operands = Datatype::join_all(cx.children().map(|c| c.datatype));
    if operands.is_known() && operands.class > StorageClass::Uword {
        class = StorageClass::Float;
    }
    cx.set_datatype(Datatype::new(Shape::ColVec, class));

    match cx.len() {
        2 => {
            cx.include(Include::Span);
            Ok(Template::format("m2cpp::span<%(type)s>(%(0)s, %(1)s)"))
        }
        3 => {
            if cx.child(1).category.is_number() {
                cx.include(Include::Uspan);
                Ok(Template::format("m2cpp::uspan<%(type)s>(%(0)s, %(1)s, %(2)s)"))
            } else {
                cx.include(Include::Span);
                Ok(Template::format("m2cpp::span<%(type)s>(%(0)s, %(1)s, %(2)s)"))
            }
        }
        _ => Ok(Template::join("", ":", "")),
    }
}

fn axis_extent(position: usize) -> Option<&'static str> {
    match position {
        0 => Some("n_rows"),
        1 => Some("n_cols"),
        2 => Some("n_slices"),
        _ => None,
    }
}

/// A lone `:` selecting every index along one axis
pub fn all(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::new(Shape::ColVec, StorageClass::Uword));
    let subscript = cx
        .parent()
        .filter(|p| p.category.is_subscript())
        .map(|p| p.name.clone());
    let extent = cx.tree().position(cx.id()).and_then(axis_extent);
    match (subscript, extent) {
        (Some(name), Some(extent)) => {
            cx.include(Include::Uspan);
            Ok(Template::fixed(format!("m2cpp::uspan(0, {}.{}-1)", name, extent)))
        }
        _ => Ok(Template::fixed("span::all")),
    }
}

/// `end` inside a subscript: the extent of the subscripted variable.
/// Calls between `end` and the index are skipped.
pub fn end(cx: &mut Cx<'_>) -> RuleResult {
    let (subscript, position) = {
        let tree = cx.tree();
        let mut argument = cx.id();
        let mut subscript = None;
        for ancestor in tree.ancestors(cx.id()) {
            let node = tree.node(ancestor);
            let indexes = match node.category {
                Category::Set => true,
                Category::Get => cx.is_variable(&node.name),
                _ => false,
            };
            if indexes {
                subscript = Some(ancestor);
                break;
            }
            if node.category == Category::Block {
                break;
            }
            argument = ancestor;
        }
        (
            subscript.map(|s| tree.node(s).name.clone()),
            tree.position(argument),
        )
    };

    let Some(name) = subscript else {
        cx.report(
            DiagnosticKind::UnsupportedConstruct,
            "superfluous end-statement outside of an indexing context",
        );
        return Ok(Template::fixed("end"));
    };

    cx.set_datatype(Datatype::scalar(StorageClass::Uword));
    match position.and_then(axis_extent) {
        Some(extent) => Ok(Template::fixed(format!("{}.{}", name, extent))),
        None => {
            cx.report(
                DiagnosticKind::UnsupportedConstruct,
                "end statement in subscript argument beyond the third",
            );
            Ok(Template::fixed("end"))
        }
    }
}
