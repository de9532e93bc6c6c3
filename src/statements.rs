//! Generic rules per category
//!
//! Used whenever no reserved name selects a more specific rule: literals,
//! variables, subscripts, matrix literals, assignments and function
//! definitions.

use crate::ast::{Category, Node};
use crate::context::{Cx, RuleResult, Template};
use crate::diagnostics::DiagnosticKind;
use crate::error::{CompileError, CompileResult};
use crate::lattice::{Datatype, Shape, StorageClass};
use crate::reserved::Reserved;

/// Reject a reserved name as the k-th destination and remember the type of
/// a plain variable destination
pub(crate) fn bind_destination(cx: &mut Cx<'_>, k: usize, datatype: Datatype) -> CompileResult<()> {
    let (category, name) = {
        let target = cx.child(k);
        (target.category, target.name.clone())
    };
    if Reserved::from_name(&name).is_some() {
        return Err(CompileError::reserved(name));
    }
    if category == Category::Var {
        cx.record_variable(&name, datatype);
    }
    Ok(())
}

/// Reject reserved names among the first `count` destinations
pub(crate) fn check_destinations(cx: &Cx<'_>, count: usize) -> CompileResult<()> {
    match cx
        .children()
        .take(count)
        .find(|target| Reserved::from_name(&target.name).is_some())
    {
        Some(target) => Err(CompileError::reserved(target.name.clone())),
        None => Ok(()),
    }
}

pub fn statement(_cx: &mut Cx<'_>) -> RuleResult {
    Ok(Template::format("%(0)s ;"))
}

pub fn assign(cx: &mut Cx<'_>) -> RuleResult {
    let datatype = cx.child(1).datatype;
    bind_destination(cx, 0, datatype)?;
    Ok(Template::format("%(0)s = %(1)s ;"))
}

/// `[a, b] = f(x)` for anything without a dedicated rule
pub fn assigns(cx: &mut Cx<'_>) -> RuleResult {
    let destinations = cx.len() - 1;
    check_destinations(cx, destinations)?;
    let outputs = cx.texts()[..destinations].to_vec();

    let call = {
        let rhs = cx.child(destinations);
        let callable = matches!(rhs.category, Category::Get | Category::Var)
            && !cx.is_variable(&rhs.name)
            && Reserved::from_name(&rhs.name).is_none();
        callable.then(|| {
            let arguments: Vec<String> = rhs.children.iter().map(|&a| cx.rendered(a)).collect();
            (rhs.name.clone(), arguments)
        })
    };

    match call {
        // Outputs become trailing reference arguments
        Some((name, mut arguments)) => {
            arguments.extend(outputs);
            Ok(Template::fixed(format!("{}({}) ;", name, arguments.join(", "))))
        }
        None => {
            cx.report(
                DiagnosticKind::UnsupportedConstruct,
                "multi-value assignment from an expression that is not a function call",
            );
            Ok(Template::fixed(format!(
                "[{}] = {} ;",
                outputs.join(", "),
                cx.text(destinations)
            )))
        }
    }
}

fn declared(cx: &Cx<'_>, name: &str) -> Datatype {
    cx.lookup(name).unwrap_or(Datatype::UNKNOWN)
}

/// `function [a, b] = f(x, y)`
///
/// A single output becomes the return value. Otherwise outputs are passed
/// as trailing references to a `void` function.
pub fn function(cx: &mut Cx<'_>) -> RuleResult {
    let name = cx.node().name.clone();
    let (params, outputs) = {
        let tree = cx.tree();
        let names = |k: usize| -> Vec<String> {
            tree.children(cx.child_id(k))
                .iter()
                .map(|&id| tree.node(id).name.clone())
                .collect()
        };
        (names(0), names(1))
    };
    let mut arguments: Vec<String> = params
        .iter()
        .map(|p| format!("{} {}", declared(cx, p).type_name(), p))
        .collect();
    let body = cx.text(2).to_string();

    let mut lines = Vec::new();
    if let [output] = outputs.as_slice() {
        lines.push(format!(
            "{} {}({})",
            declared(cx, output).type_name(),
            name,
            arguments.join(", ")
        ));
        lines.push("{".to_string());
        lines.extend(body.lines().map(str::to_string));
        if !body.lines().last().map_or(false, |l| l.starts_with("return")) {
            lines.push(format!("return {} ;", output));
        }
        lines.push("}".to_string());
    } else {
        arguments.extend(
            outputs
                .iter()
                .map(|o| format!("{}& {}", declared(cx, o).type_name(), o)),
        );
        lines.push(format!("void {}({})", name, arguments.join(", ")));
        lines.push("{".to_string());
        lines.extend(body.lines().map(str::to_string));
        lines.push("}".to_string());
    }
    Ok(Template::fixed(lines.join("\n")))
}

/// Parameter and output name lists
pub fn names(_cx: &mut Cx<'_>) -> RuleResult {
    Ok(Template::join("", ", ", ""))
}

pub fn return_(cx: &mut Cx<'_>) -> RuleResult {
    let output = {
        let tree = cx.tree();
        tree.enclosing_function(cx.id())
            .and_then(|function| tree.child(function, 1))
            .map(|returns| tree.children(returns))
            .and_then(|outputs| match outputs {
                [output] => Some(tree.node(*output).name.clone()),
                _ => None,
            })
    };
    match output {
        Some(output) => Ok(Template::fixed(format!("return {} ;", output))),
        None => Ok(Template::fixed("return ;")),
    }
}

pub fn break_(_cx: &mut Cx<'_>) -> RuleResult {
    Ok(Template::fixed("break ;"))
}

pub fn var(cx: &mut Cx<'_>) -> RuleResult {
    let name = cx.node().name.clone();
    if let Some(datatype) = cx.lookup(&name) {
        cx.set_datatype(datatype);
    }
    Ok(Template::format("%(name)s"))
}

/// A single index position rather than a selection
fn is_point(node: &Node) -> bool {
    !matches!(node.category, Category::Range | Category::All)
        && matches!(node.datatype.shape, Shape::Scalar | Shape::Unknown)
}

/// Zero-based text of the k-th subscript argument
fn index(cx: &Cx<'_>, k: usize) -> String {
    let argument = cx.child(k);
    match argument.category {
        Category::Range | Category::All => cx.text(k).to_string(),
        _ => match argument.int_value() {
            Some(value) => (value - 1).to_string(),
            None => format!("{}-1", cx.text(k)),
        },
    }
}

/// `A(i, j)` on a known variable, otherwise a call to an unknown function
pub fn subscript(cx: &mut Cx<'_>) -> RuleResult {
    let name = cx.node().name.clone();
    let Some(variable) = cx.lookup(&name) else {
        return Ok(Template::join(&format!("{}(", name), ", ", ")"));
    };

    let arguments: Vec<String> = (0..cx.len()).map(|k| index(cx, k)).collect();
    let points: Vec<bool> = cx.children().map(is_point).collect();
    let shape = if points.iter().all(|&p| p) {
        Shape::Scalar
    } else {
        match (variable.shape, points.as_slice()) {
            (shape, [_]) if shape.is_vector() => shape,
            (_, [_]) => Shape::ColVec,
            (Shape::Matrix, [false, true]) => Shape::ColVec,
            (Shape::Matrix, [true, false]) => Shape::RowVec,
            (shape, _) => shape,
        }
    };
    if variable.is_known() {
        cx.set_datatype(variable.with_shape(shape));
    }
    Ok(Template::fixed(format!("{}({})", name, arguments.join(", "))))
}

pub fn int(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::scalar(StorageClass::Int));
    Ok(Template::format("%(value)s"))
}

pub fn float(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::scalar(StorageClass::Float));
    Ok(Template::format("%(value)s"))
}

pub fn imag(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::scalar(StorageClass::Complex));
    let value = cx.node().value.clone().unwrap_or_default();
    let magnitude = value.trim_end_matches(|c| c == 'i' || c == 'j');
    Ok(Template::fixed(format!("cx_double(0, {})", magnitude)))
}

pub fn string(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::TEXT);
    let value = cx.node().value.clone().unwrap_or_default();
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    Ok(Template::fixed(format!("\"{}\"", escaped)))
}

/// One row of a matrix literal
pub fn row(cx: &mut Cx<'_>) -> RuleResult {
    if cx.is_empty() {
        return Ok(Template::fixed(""));
    }
    if cx.len() == 1 {
        let (datatype, numeric) = {
            let element = cx.child(0);
            (element.datatype, element.numeric)
        };
        cx.set_datatype(datatype);
        cx.set_numeric(numeric);
        return Ok(Template::format("%(0)s"));
    }

    let datatype = Datatype::join_all(cx.children().map(|c| c.datatype));
    if cx.children().all(|c| c.datatype.shape.is_scalar()) {
        cx.set_datatype(datatype.with_shape(Shape::RowVec));
        return Ok(Template::join("", ", ", ""));
    }

    let shape = if cx
        .children()
        .all(|c| matches!(c.datatype.shape, Shape::Scalar | Shape::RowVec))
    {
        Shape::RowVec
    } else {
        Shape::Matrix
    };
    if datatype.is_known() {
        cx.set_datatype(datatype.with_shape(shape));
    }
    let joined = cx.texts()[1..]
        .iter()
        .fold(cx.text(0).to_string(), |acc, t| format!("arma::join_rows({}, {})", acc, t));
    Ok(Template::fixed(joined))
}

/// `[...]`: initialiser constructors for plain numbers, joins otherwise
pub fn matrix(cx: &mut Cx<'_>) -> RuleResult {
    if cx.is_empty() {
        return Ok(Template::fixed("{}"));
    }

    // (element count, every element a scalar or untyped value)
    let rows: Vec<(usize, bool)> = {
        let tree = cx.tree();
        cx.node()
            .children
            .iter()
            .map(|&row| {
                let elements = tree.children(row);
                let plain = elements.iter().all(|&e| {
                    matches!(tree.node(e).datatype.shape, Shape::Scalar | Shape::Unknown)
                        && tree.node(e).category != Category::Range
                });
                (elements.len(), plain)
            })
            .collect()
    };
    let datatype = Datatype::join_all(cx.children().map(|c| c.datatype));

    if datatype.class == StorageClass::Text {
        cx.set_datatype(Datatype::TEXT);
        let parts: Vec<String> = cx.texts().to_vec();
        return Ok(Template::fixed(format!("std::string({})", parts.join(" + "))));
    }

    if rows.iter().all(|&(_, plain)| plain) {
        if !datatype.is_known() {
            return match cx.texts() {
                [single] => Ok(Template::fixed(format!("{{{}}}", single))),
                texts => {
                    let rows: Vec<String> = texts.iter().map(|t| format!("{{{}}}", t)).collect();
                    Ok(Template::fixed(format!("{{{}}}", rows.join(", "))))
                }
            };
        }
        let width = rows[0].0;
        let (shape, text) = if rows.len() == 1 && width == 1 {
            cx.set_datatype(datatype.with_shape(Shape::Scalar));
            return Ok(Template::format("%(0)s"));
        } else if rows.len() == 1 {
            (Shape::RowVec, cx.text(0).to_string())
        } else if rows.iter().all(|&(w, _)| w == 1) {
            (Shape::ColVec, cx.texts().join(", "))
        } else {
            if rows.iter().any(|&(w, _)| w != width) {
                cx.report(
                    DiagnosticKind::ShapeMismatch,
                    "matrix literal rows of different length",
                );
            }
            let rows: Vec<String> = cx.texts().iter().map(|t| format!("{{{}}}", t)).collect();
            (Shape::Matrix, rows.join(", "))
        };
        cx.set_datatype(datatype.with_shape(shape));
        return Ok(Template::fixed(format!("arma::{}({{{}}})", cx.type_name(), text)));
    }

    // Stack rows that are themselves joins or array values
    let stacked: Vec<String> = rows
        .iter()
        .enumerate()
        .map(|(k, &(width, plain))| {
            let row = cx.child(k).datatype;
            if plain && width > 1 {
                let row_type = Datatype::new(Shape::RowVec, row.class).type_name();
                format!("arma::{}({{{}}})", row_type, cx.text(k))
            } else {
                cx.text(k).to_string()
            }
        })
        .collect();

    let shape = if stacked.len() == 1 {
        cx.child(0).datatype.shape
    } else if cx
        .children()
        .all(|r| matches!(r.datatype.shape, Shape::Scalar | Shape::ColVec))
    {
        Shape::ColVec
    } else {
        Shape::Matrix
    };
    if datatype.is_known() {
        cx.set_datatype(datatype.with_shape(shape));
    } else if stacked.len() == 1 {
        let numeric = cx.child(0).numeric;
        cx.set_numeric(numeric);
    }

    let joined = stacked[1..]
        .iter()
        .fold(stacked[0].clone(), |acc, t| format!("arma::join_cols({}, {})", acc, t));
    Ok(Template::fixed(joined))
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::DiagnosticKind;
    use crate::{translate, translate_with_declarations};
    use pretty_assertions::assert_eq;

    fn code(source: &str, declarations: &[(&str, &str)]) -> String {
        translate_with_declarations(source, declarations).unwrap().code()
    }

    #[test]
    fn test_literals() {
        assert_eq!(code("x = 42", &[]), "x = 42 ;");
        assert_eq!(code("x = 2.5e3", &[]), "x = 2.5e3 ;");
        assert_eq!(code("z = 3i", &[]), "z = cx_double(0, 3) ;");
        assert_eq!(code("s = 'it''s'", &[]), "s = \"it's\" ;");
    }

    #[test]
    fn test_assignment_infers_variable_type() {
        let unit = translate("x = 1.5\ny = x * 2").unwrap();
        assert_eq!(unit.suggestions["x"].type_name(), "double");
        assert_eq!(unit.suggestions["y"].type_name(), "double");
    }

    #[test]
    fn test_reserved_assignment_fails_statement() {
        let unit = translate("size = 3\nx = 1").unwrap();
        assert_eq!(
            unit.statements,
            vec![
                "// error: Variable name 'size' is reserved, please rename the variable",
                "x = 1 ;",
            ]
        );
        let error = unit.errors().next().unwrap();
        assert_eq!(error.kind, DiagnosticKind::ReservedNameConflict);
    }

    #[test]
    fn test_subscript_offsets() {
        let unit = translate_with_declarations("y = A(3, k)", &[("A", "mat")]).unwrap();
        assert_eq!(unit.code(), "y = A(2, k-1) ;");
        assert_eq!(unit.suggestions["y"].type_name(), "double");
    }

    #[test]
    fn test_subscript_column_and_row() {
        let unit =
            translate_with_declarations("c = A(:, 2)\nr = A(2, :)", &[("A", "mat")]).unwrap();
        assert_eq!(unit.suggestions["c"].type_name(), "vec");
        assert_eq!(unit.suggestions["r"].type_name(), "rowvec");
    }

    #[test]
    fn test_assignment_through_subscript() {
        assert_eq!(code("A(2, 3) = 5", &[("A", "mat")]), "A(1, 2) = 5 ;");
    }

    #[test]
    fn test_unknown_call_is_generic() {
        let unit = translate("y = foo(1, x)").unwrap();
        assert_eq!(unit.code(), "y = foo(1, x) ;");
        assert!(unit.diagnostics.is_empty());
    }

    #[test]
    fn test_matrix_literals() {
        assert_eq!(code("x = [1, 2, 3]", &[]), "x = arma::irowvec({1, 2, 3}) ;");
        assert_eq!(code("x = [1.0; 2; 3]", &[]), "x = arma::vec({1.0, 2, 3}) ;");
        assert_eq!(
            code("x = [1 2; 3 4.5]", &[]),
            "x = arma::mat({{1, 2}, {3, 4.5}}) ;"
        );
        assert_eq!(code("x = [7]", &[]), "x = 7 ;");
    }

    #[test]
    fn test_matrix_concatenation() {
        assert_eq!(
            code("x = [a, b]", &[("a", "vec"), ("b", "vec")]),
            "x = arma::join_rows(a, b) ;"
        );
        let unit = translate_with_declarations("x = [a; b]", &[("a", "rowvec"), ("b", "rowvec")])
            .unwrap();
        assert_eq!(unit.code(), "x = arma::join_cols(a, b) ;");
        assert_eq!(unit.suggestions["x"].type_name(), "mat");
    }

    #[test]
    fn test_ragged_matrix_literal_is_reported() {
        let unit = translate("x = [1 2; 3]").unwrap();
        assert_eq!(unit.errors().next().unwrap().kind, DiagnosticKind::ShapeMismatch);
    }

    #[test]
    fn test_multi_value_call_of_user_function() {
        assert_eq!(code("[a, b] = solve2(x, 3)", &[]), "solve2(x, 3, a, b) ;");
    }

    #[test]
    fn test_multi_value_from_expression_is_reported() {
        let unit = translate_with_declarations("[a, b] = A(1)", &[("A", "vec")]).unwrap();
        assert_eq!(unit.code(), "[a, b] = A(0) ;");
        assert!(unit.has_errors());
    }

    #[test]
    fn test_function_with_single_output() {
        let source = "function y = twice(x)\n  y = 2 * x\nend";
        let unit = translate_with_declarations(source, &[("x", "vec")]).unwrap();
        assert_eq!(
            unit.statements,
            vec!["vec twice(vec x)", "{", "y = 2*x ;", "return y ;", "}"]
        );
    }

    #[test]
    fn test_function_with_several_outputs() {
        let source = "function [s, p] = both(a, b)\ns = a + b;\np = a * b;\nreturn\nend";
        let unit =
            translate_with_declarations(source, &[("a", "double"), ("b", "double")]).unwrap();
        assert_eq!(
            unit.statements,
            vec![
                "void both(double a, double b, double& s, double& p)",
                "{",
                "s = a+b ;",
                "p = a*b ;",
                "return ;",
                "}",
            ]
        );
    }

    #[test]
    fn test_function_scope_does_not_leak() {
        let unit = translate("function f()\nt = 1\nend\ny = t").unwrap();
        assert_eq!(unit.statements.last().unwrap(), "y = t ;");
        assert_eq!(unit.suggestions.get("y"), None);
    }
}
