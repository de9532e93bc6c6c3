//! Reserved built-in names and their rules
//!
//! A reserved name is checked before the generic rule of a node's category.
//! The same name can carry different rules depending on how it is used: a bare
//! reference (`Var`), a call (`Get`), the right-hand side of a redirected
//! assignment (`Assign`) or of a multi-value assignment (`Assigns`).

use std::fmt;

use crate::ast::Category;
use crate::context::{Cx, Rule, RuleResult, Template};
use crate::diagnostics::DiagnosticKind;
use crate::error::{CompileError, CompileResult};
use crate::lattice::{Datatype, Shape, StorageClass};
use crate::operators;
use crate::statements;
use crate::unit::Include;

/// Built-in identifiers with dedicated translation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reserved {
    I,
    And,
    Or,
    Not,
    All,
    Any,
    False,
    True,
    Pi,
    Inf,
    Nan,
    Eye,
    Flipud,
    Length,
    Max,
    Min,
    Size,
    Transpose,
    Ctranspose,
    Abs,
    Nextpow2,
    Fft,
    Ifft,
    Hankel,
    Zeros,
    Ones,
    Round,
    Rand,
    Floor,
    Clear,
    Close,
    Plot,
    Hold,
    Interp1,
    Linspace,
    Sum,
    Conj,
    Real,
    Imag,
    Tic,
    Toc,
    Diag,
}

impl Reserved {
    pub fn from_name(name: &str) -> Option<Self> {
        use Reserved::*;
        let reserved = match name {
            "i" => I,
            "and" => And,
            "or" => Or,
            "not" => Not,
            "all" => All,
            "any" => Any,
            "false" => False,
            "true" => True,
            "pi" => Pi,
            "inf" | "Inf" => Inf,
            "nan" | "NaN" => Nan,
            "eye" => Eye,
            "flipud" => Flipud,
            "length" => Length,
            "max" => Max,
            "min" => Min,
            "size" => Size,
            "transpose" => Transpose,
            "ctranspose" => Ctranspose,
            "abs" => Abs,
            "nextpow2" => Nextpow2,
            "fft" => Fft,
            "ifft" => Ifft,
            "hankel" => Hankel,
            "zeros" => Zeros,
            "ones" => Ones,
            "round" => Round,
            "rand" => Rand,
            "floor" => Floor,
            "clear" => Clear,
            "close" => Close,
            "plot" => Plot,
            "hold" => Hold,
            "interp1" => Interp1,
            "linspace" => Linspace,
            "sum" => Sum,
            "conj" => Conj,
            "real" => Real,
            "imag" => Imag,
            "tic" => Tic,
            "toc" => Toc,
            "diag" => Diag,
            _ => return None,
        };
        Some(reserved)
    }

    /// Canonical source spelling
    pub fn name(self) -> &'static str {
        use Reserved::*;
        match self {
            I => "i",
            And => "and",
            Or => "or",
            Not => "not",
            All => "all",
            Any => "any",
            False => "false",
            True => "true",
            Pi => "pi",
            Inf => "inf",
            Nan => "nan",
            Eye => "eye",
            Flipud => "flipud",
            Length => "length",
            Max => "max",
            Min => "min",
            Size => "size",
            Transpose => "transpose",
            Ctranspose => "ctranspose",
            Abs => "abs",
            Nextpow2 => "nextpow2",
            Fft => "fft",
            Ifft => "ifft",
            Hankel => "hankel",
            Zeros => "zeros",
            Ones => "ones",
            Round => "round",
            Rand => "rand",
            Floor => "floor",
            Clear => "clear",
            Close => "close",
            Plot => "plot",
            Hold => "hold",
            Interp1 => "interp1",
            Linspace => "linspace",
            Sum => "sum",
            Conj => "conj",
            Real => "real",
            Imag => "imag",
            Tic => "tic",
            Toc => "toc",
            Diag => "diag",
        }
    }
}

impl fmt::Display for Reserved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rule specific to `(category, name)`, if there is one
pub fn rule(category: Category, name: Reserved) -> Option<Rule> {
    use Reserved::*;
    let rule: Rule = match (category, name) {
        (Category::Var, I) => var_i,
        (Category::Var, Pi) => var_pi,
        (Category::Var, Inf) => var_inf,
        (Category::Var, Nan) => var_nan,
        (Category::Var, True) => var_true,
        (Category::Var, False) => var_false,
        (Category::Var, Eye) => var_eye,
        (Category::Var, Rand) => var_rand,
        (Category::Var, Tic) => tic,
        (Category::Var, Toc) => toc,
        (Category::Var, Clear | Close | Plot | Hold) => housekeeping,

        (Category::Get, Abs) => abs,
        (Category::Get, And) => and,
        (Category::Get, Or) => or,
        (Category::Get, Not) => not,
        (Category::Get, Any | All) => boolean_reduction,
        (Category::Get, Size) => size,
        (Category::Get, Length) => length,
        (Category::Get, Min | Max) => extremum,
        (Category::Get, Eye) => eye,
        (Category::Get, Transpose) => transpose,
        (Category::Get, Ctranspose) => ctranspose,
        (Category::Get, Flipud) => flipud,
        (Category::Get, Zeros | Ones) => filled,
        (Category::Get, Round) => round,
        (Category::Get, Floor) => floor,
        (Category::Get, Rand) => rand,
        (Category::Get, Nextpow2) => nextpow2,
        (Category::Get, Fft | Ifft) => fourier,
        (Category::Get, Hankel) => hankel,
        (Category::Get, Interp1) => interp1,
        (Category::Get, Linspace) => linspace,
        (Category::Get, Sum) => sum,
        (Category::Get, Real | Imag) => real_part,
        (Category::Get, Conj) => conj,
        (Category::Get, Diag) => diag,
        (Category::Get, Tic) => tic,
        (Category::Get, Toc) => toc,
        (Category::Get, Clear | Close | Plot | Hold) => housekeeping,

        (Category::Assign, Size) => assign_size,

        (Category::Assigns, Size) => assigns_size,
        (Category::Assigns, Min | Max) => assigns_extremum,

        _ => return None,
    };
    Some(rule)
}

/// Call rendered verbatim with its arguments, type left unresolved
fn generic(cx: &Cx<'_>) -> Template {
    Template::join(&format!("{}(", cx.node().name), ", ", ")")
}

fn unsupported(cx: &mut Cx<'_>) -> RuleResult {
    let message = format!("'{}' with {} arguments", cx.node().name, cx.len());
    cx.report(DiagnosticKind::UnsupportedConstruct, message);
    Ok(generic(cx))
}

/// Take over the type of the first argument
fn inherit(cx: &mut Cx<'_>) {
    let (datatype, numeric) = {
        let arg = cx.child(0);
        (arg.datatype, arg.numeric)
    };
    cx.set_datatype(datatype);
    cx.set_numeric(numeric);
}

/// `[]` as a placeholder argument
fn is_placeholder(category: Category, children: usize) -> bool {
    category == Category::Matrix && children == 0
}

fn var_i(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::scalar(StorageClass::Complex));
    Ok(Template::fixed("cx_double(0, 1)"))
}

fn var_pi(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::scalar(StorageClass::Float));
    Ok(Template::fixed("datum::pi"))
}

fn var_inf(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::scalar(StorageClass::Float));
    Ok(Template::fixed("datum::inf"))
}

fn var_nan(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::scalar(StorageClass::Float));
    Ok(Template::fixed("datum::nan"))
}

fn var_true(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::scalar(StorageClass::Int));
    Ok(Template::fixed("1"))
}

fn var_false(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::scalar(StorageClass::Int));
    Ok(Template::fixed("0"))
}

fn var_eye(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::scalar(StorageClass::Int));
    Ok(Template::fixed("1"))
}

fn var_rand(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::scalar(StorageClass::Float));
    Ok(Template::fixed("arma::randu()"))
}

fn tic(cx: &mut Cx<'_>) -> RuleResult {
    cx.timer().tic();
    Ok(Template::fixed("_timer.tic()"))
}

fn toc(cx: &mut Cx<'_>) -> RuleResult {
    if !cx.timer().toc() {
        cx.report(DiagnosticKind::LikelyMisuse, "toc without a preceding tic");
    }
    if cx.parent_category() == Some(Category::Statement) {
        return Ok(Template::fixed(
            "cout << \"Elapsed time = \" << _timer.toc() << endl",
        ));
    }
    cx.set_datatype(Datatype::scalar(StorageClass::Float));
    Ok(Template::fixed("_timer.toc()"))
}

/// Figure and workspace commands have no counterpart; keep them as comments
fn housekeeping(cx: &mut Cx<'_>) -> RuleResult {
    let name = cx.node().name.clone();
    if cx.node().category == Category::Var {
        return Ok(Template::fixed(format!("// {}", name)));
    }
    Ok(Template::join(&format!("// {}(", name), ", ", ")"))
}

fn abs(cx: &mut Cx<'_>) -> RuleResult {
    if cx.len() != 1 {
        return unsupported(cx);
    }
    inherit(cx);
    if !cx.numeric() {
        return Ok(generic(cx));
    }
    if cx.class() == StorageClass::Complex {
        cx.set_class(StorageClass::Float);
    }
    if cx.shape().is_scalar() {
        return Ok(Template::format("std::abs(%(0)s)"));
    }
    Ok(Template::format("arma::abs(%(0)s)"))
}

fn and(cx: &mut Cx<'_>) -> RuleResult {
    let datatype = Datatype::join_all(cx.children().map(|c| c.datatype));
    cx.set_datatype(datatype);
    Ok(Template::join("(", "*", ")"))
}

fn or(cx: &mut Cx<'_>) -> RuleResult {
    let datatype = Datatype::join_all(cx.children().map(|c| c.datatype));
    cx.set_datatype(datatype);
    let squares: Vec<String> = cx.texts().iter().map(|t| format!("{0}*{0}", t)).collect();
    Ok(Template::fixed(format!("({})", squares.join("+"))))
}

fn not(cx: &mut Cx<'_>) -> RuleResult {
    if cx.len() != 1 {
        return unsupported(cx);
    }
    inherit(cx);
    operators::not(cx)
}

fn transpose(cx: &mut Cx<'_>) -> RuleResult {
    if cx.len() != 1 {
        return unsupported(cx);
    }
    inherit(cx);
    operators::transpose(cx)
}

fn ctranspose(cx: &mut Cx<'_>) -> RuleResult {
    if cx.len() != 1 {
        return unsupported(cx);
    }
    inherit(cx);
    operators::ctranspose(cx)
}

fn flipud(cx: &mut Cx<'_>) -> RuleResult {
    if cx.len() != 1 {
        return unsupported(cx);
    }
    inherit(cx);
    Ok(Template::format("arma::flipud(%(0)s)"))
}

/// `any` and `all`
fn boolean_reduction(cx: &mut Cx<'_>) -> RuleResult {
    if cx.is_empty() || !cx.child(0).numeric {
        return Ok(generic(cx));
    }
    let name = cx.node().name.clone();
    inherit(cx);
    match cx.shape() {
        Shape::Scalar => Ok(Template::format("%(0)s")),
        Shape::ColVec | Shape::RowVec => {
            cx.set_shape(Shape::Scalar);
            Ok(Template::format(format!("arma::{}(%(0)s)", name)))
        }
        Shape::Matrix => {
            let axis = if cx.len() == 2 { cx.child(1).int_value() } else { None };
            match axis {
                Some(1) => {
                    cx.set_shape(Shape::RowVec);
                    Ok(Template::format(format!("arma::{}(%(0)s, 0)", name)))
                }
                Some(2) => {
                    cx.set_shape(Shape::ColVec);
                    Ok(Template::format(format!("arma::{}(%(0)s, 1)", name)))
                }
                _ => {
                    cx.set_numeric(false);
                    cx.report(
                        DiagnosticKind::AmbiguousAxis,
                        format!("'{}' over a matrix needs a literal axis argument", name),
                    );
                    if cx.len() == 2 {
                        return Ok(Template::format(format!("arma::{}(%(0)s, %(1)s-1)", name)));
                    }
                    Ok(Template::format(format!("arma::{}(%(0)s)", name)))
                }
            }
        }
        Shape::Cube => {
            cx.set_shape(Shape::Matrix);
            Ok(Template::join(&format!("arma::{}(", name), ", ", ")"))
        }
        Shape::Unknown => Ok(generic(cx)),
    }
}

/// Extent fields read by `size`, by axis
const EXTENTS: [&str; 3] = ["n_rows", "n_cols", "n_slices"];

/// Text usable as the receiver of a member access
fn receiver(cx: &Cx<'_>, k: usize) -> String {
    match cx.child(k).category {
        Category::Var | Category::Get | Category::Paren => cx.text(k).to_string(),
        _ => format!("({})", cx.text(k)),
    }
}

fn size(cx: &mut Cx<'_>) -> RuleResult {
    if cx.is_empty() || cx.len() > 2 {
        return unsupported(cx);
    }
    let arg = cx.child(0).datatype;
    if !arg.is_known() || cx.parent_category() == Some(Category::Assigns) {
        return Ok(generic(cx));
    }
    let source = receiver(cx, 0);

    if cx.len() == 2 {
        cx.set_datatype(Datatype::scalar(StorageClass::Uword));
        let extent = cx
            .child(1)
            .int_value()
            .and_then(|axis| usize::try_from(axis - 1).ok())
            .and_then(|axis| EXTENTS.get(axis));
        return match extent {
            Some(extent) => Ok(Template::fixed(format!("{}.{}", source, extent))),
            None => Ok(generic(cx)),
        };
    }

    let axes = match arg.shape {
        Shape::ColVec | Shape::RowVec => {
            cx.set_datatype(Datatype::scalar(StorageClass::Uword));
            return Ok(Template::fixed(format!("{}.n_elem", source)));
        }
        Shape::Matrix => 2,
        Shape::Cube => 3,
        _ => return Ok(generic(cx)),
    };

    cx.set_datatype(Datatype::new(Shape::RowVec, StorageClass::Uword));
    let fields: Vec<String> = EXTENTS[..axes]
        .iter()
        .map(|extent| format!("{}.{}", source, extent))
        .collect();
    let extents = format!("{{{}}}", fields.join(", "));

    let destination = cx
        .parent()
        .filter(|p| p.category == Category::Assign)
        .and_then(|p| p.children.first())
        .map(|&d| cx.tree().node(d).category);
    match (cx.parent_category(), destination) {
        (Some(Category::Assign), Some(Category::Var)) => {
            cx.redirect_parent(Reserved::Size);
            Ok(Template::fixed(extents))
        }
        (Some(Category::Statement), _) => Ok(Template::fixed(format!("urowvec({})", extents))),
        _ => {
            let temporary = cx.extract_self(extents);
            Ok(Template::fixed(temporary))
        }
    }
}

/// `x = size(A)` for a matrix or cube: fill a plain array, then wrap it
fn assign_size(cx: &mut Cx<'_>) -> RuleResult {
    let datatype = cx.child(1).datatype;
    statements::bind_destination(cx, 0, datatype)?;
    let axes = {
        let call = cx.child_id(1);
        let tree = cx.tree();
        match tree.child(call, 0).map(|arg| tree.node(arg).datatype.shape) {
            Some(Shape::Cube) => 3,
            _ => 2,
        }
    };
    let target = cx.text(0).to_string();
    Ok(Template::fixed(format!(
        "uword _{0} [] = {1} ;\n{0} = urowvec(_{0}, {2}, false) ;",
        target,
        cx.text(1),
        axes
    )))
}

/// `[r, c] = size(A)` reads each extent directly
fn assigns_size(cx: &mut Cx<'_>) -> RuleResult {
    let destinations = cx.len() - 1;
    let call = cx.child_id(destinations);
    let Some(arg) = cx.tree().child(call, 0) else {
        return Err(CompileError::unsupported("size without arguments"));
    };
    if destinations != 2 && destinations != 3 {
        return Err(CompileError::unsupported(format!(
            "size assigned to {} destinations",
            destinations
        )));
    }
    statements::check_destinations(cx, destinations)?;

    let source = if cx.tree().node(arg).category == Category::Var {
        cx.rendered(arg)
    } else {
        cx.extract_node(arg)
    };
    let mut lines = Vec::with_capacity(destinations);
    for (k, extent) in EXTENTS[..destinations].iter().enumerate() {
        cx.suggest_child(k, Datatype::scalar(StorageClass::Uword));
        lines.push(format!("{} = {}.{} ;", cx.text(k), source, extent));
    }
    Ok(Template::fixed(lines.join("\n")))
}

fn length(cx: &mut Cx<'_>) -> RuleResult {
    if cx.len() != 1 {
        return unsupported(cx);
    }
    cx.set_datatype(Datatype::scalar(StorageClass::Uword));
    if cx.child(0).category == Category::Var {
        return Ok(Template::format("%(0)s.n_elem"));
    }
    cx.include(Include::Length);
    Ok(Template::format("m2cpp::length(%(0)s)"))
}

/// `min` and `max`
fn extremum(cx: &mut Cx<'_>) -> RuleResult {
    let name = cx.node().name.clone();
    let numeric = cx
        .children()
        .filter(|c| !is_placeholder(c.category, c.children.len()))
        .all(|c| c.numeric);
    if cx.is_empty() || !numeric {
        return Ok(generic(cx));
    }

    if cx.children().all(|c| c.datatype.shape.is_scalar()) {
        let datatype = Datatype::join_all(cx.children().map(|c| c.datatype));
        cx.set_datatype(datatype);
        return Ok(Template::join(&format!("std::{}(", name), ", ", ")"));
    }

    let input = cx.child(0).datatype;
    cx.set_datatype(input);
    match cx.len() {
        1 => {
            cx.set_shape(input.shape.reduced());
            Ok(Template::format(format!("arma::{}(%(0)s)", name)))
        }
        2 => Ok(Template::format(format!("arma::{}(%(0)s, %(1)s)", name))),
        3 => match cx.child(2).int_value() {
            Some(1) => {
                cx.set_shape(Shape::RowVec);
                Ok(Template::format(format!("arma::{}(%(0)s, 0)", name)))
            }
            Some(2) => {
                cx.set_shape(Shape::ColVec);
                Ok(Template::format(format!("arma::{}(%(0)s, 1)", name)))
            }
            _ => {
                cx.set_numeric(false);
                cx.report(
                    DiagnosticKind::AmbiguousAxis,
                    format!("'{}' axis argument is not a literal 1 or 2", name),
                );
                Ok(Template::format(format!("arma::{}(%(0)s, %(2)s-1)", name)))
            }
        },
        _ => unsupported(cx),
    }
}

/// `[v, i] = min(x)` through the member form that also yields the index
fn assigns_extremum(cx: &mut Cx<'_>) -> RuleResult {
    let destinations = cx.len() - 1;
    let call = cx.child_id(destinations);
    let name = cx.tree().node(call).name.clone();
    if destinations != 2 {
        return Err(CompileError::unsupported(format!(
            "{} assigned to {} destinations",
            name, destinations
        )));
    }
    statements::check_destinations(cx, destinations)?;
    let Some(arg) = cx.tree().child(call, 0) else {
        return Err(CompileError::unsupported(format!("{} without arguments", name)));
    };
    if cx.tree().child(call, 1).is_some() {
        return Err(CompileError::unsupported(format!(
            "{} with several arguments assigned to two destinations",
            name
        )));
    }

    let (category, numeric, class) = {
        let node = cx.tree().node(arg);
        (node.category, node.numeric, node.datatype.class)
    };
    if !numeric {
        return Ok(Template::fixed(format!(
            "[{}, {}] = {} ;",
            cx.text(0),
            cx.text(1),
            cx.text(2)
        )));
    }

    cx.suggest_child(0, Datatype::scalar(class));
    cx.suggest_child(1, Datatype::scalar(StorageClass::Uword));
    let source = if category == Category::Var {
        cx.rendered(arg)
    } else {
        cx.extract_node(arg)
    };
    Ok(Template::fixed(format!(
        "{} = {}.{}({}) ;",
        cx.text(0),
        source,
        name,
        cx.text(1)
    )))
}

fn eye(cx: &mut Cx<'_>) -> RuleResult {
    if cx.is_empty() {
        return var_eye(cx);
    }
    if cx.len() > 2 {
        return unsupported(cx);
    }
    if !cx.child(0).numeric {
        return Ok(generic(cx));
    }
    cx.set_datatype(Datatype::new(Shape::Matrix, StorageClass::Float));
    if cx.len() == 2 {
        return Ok(Template::format("arma::eye<mat>(%(0)s, %(1)s)"));
    }
    if cx.child(0).datatype.shape.is_vector() {
        return Ok(Template::format("arma::eye<mat>(%(0)s(0), %(0)s(1))"));
    }
    Ok(Template::format("arma::eye<mat>(%(0)s, %(0)s)"))
}

fn rand(cx: &mut Cx<'_>) -> RuleResult {
    let shape = match cx.len() {
        0 => return var_rand(cx),
        1 => Shape::ColVec,
        2 => Shape::Matrix,
        3 => Shape::Cube,
        _ => return unsupported(cx),
    };
    cx.set_datatype(Datatype::new(shape, StorageClass::Float));
    Ok(Template::join(
        &format!("arma::randu<{}>(", cx.type_name()),
        ", ",
        ")",
    ))
}

/// `zeros` and `ones`
fn filled(cx: &mut Cx<'_>) -> RuleResult {
    let name = cx.node().name.clone();
    let count = cx.len();
    if count == 0 {
        cx.set_datatype(Datatype::scalar(StorageClass::Float));
        let value = if name == "ones" { "1" } else { "0" };
        return Ok(Template::fixed(value));
    }
    if count > 3 {
        return unsupported(cx);
    }

    let hint = cx.assignment_hint().filter(|h| h.is_known());
    let mut class = hint.map_or(StorageClass::Float, |h| h.class);
    if cx.group().map_or(false, |g| g.category.is_subscript()) {
        class = StorageClass::Uword;
    }

    let dimensions_vector = {
        let first = cx.child(0);
        count == 1 && first.numeric && first.datatype.shape.is_vector()
    };
    let shape = match hint.map(|h| h.shape) {
        Some(shape) if shape.is_vector() => shape,
        hinted => match count {
            1 if dimensions_vector => match hinted {
                Some(Shape::Cube) => Shape::Cube,
                _ => Shape::Matrix,
            },
            1 => Shape::ColVec,
            2 if cx.child(0).is_int_literal(1) => Shape::RowVec,
            2 if cx.child(1).is_int_literal(1) => Shape::ColVec,
            2 => Shape::Matrix,
            _ => Shape::Cube,
        },
    };
    cx.set_datatype(Datatype::new(shape, class));
    let constructor = format!("arma::{}<{}>", name, cx.type_name());

    if dimensions_vector {
        if cx.child(0).category != Category::Var {
            cx.extract_child(0);
        }
        let dims = cx.text(0).to_string();
        let arguments = match shape {
            Shape::ColVec | Shape::RowVec => format!("{}(0)", dims),
            Shape::Cube => format!("{0}(0), {0}(1), {0}(2)", dims),
            _ => format!("{0}(0), {0}(1)", dims),
        };
        return Ok(Template::fixed(format!("{}({})", constructor, arguments)));
    }

    if count == 2 && shape.is_vector() {
        if cx.child(0).is_int_literal(1) {
            return Ok(Template::format(format!("{}(%(1)s)", constructor)));
        }
        if cx.child(1).is_int_literal(1) {
            return Ok(Template::format(format!("{}(%(0)s)", constructor)));
        }
    }
    Ok(Template::join(&format!("{}(", constructor), ", ", ")"))
}

fn round(cx: &mut Cx<'_>) -> RuleResult {
    if cx.is_empty() || cx.len() > 2 {
        return unsupported(cx);
    }
    inherit(cx);
    if !cx.numeric() {
        return Ok(generic(cx));
    }
    if cx.class().is_integral() {
        return Ok(Template::format("%(0)s"));
    }

    let library = if cx.shape().is_scalar() {
        cx.include(Include::Math);
        "std"
    } else {
        "arma"
    };
    if cx.len() == 1 || cx.child(1).is_int_literal(0) {
        return Ok(Template::format(format!("{}::round(%(0)s)", library)));
    }
    Ok(Template::format(format!(
        "{}::round(%(0)s*std::pow(10, %(1)s))*std::pow(10, -%(1)s)",
        library
    )))
}

fn floor(cx: &mut Cx<'_>) -> RuleResult {
    if cx.len() != 1 {
        return unsupported(cx);
    }
    inherit(cx);
    if !cx.numeric() {
        return Ok(generic(cx));
    }
    if cx.class() > StorageClass::Int {
        cx.set_class(StorageClass::Int);
    }
    if cx.shape().is_scalar() {
        cx.include(Include::Math);
        return Ok(Template::format("std::floor(%(0)s)"));
    }
    Ok(Template::format("arma::floor(%(0)s)"))
}

fn nextpow2(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::scalar(StorageClass::Int));
    cx.include(Include::Nextpow2);
    Ok(Template::join("m2cpp::nextpow2(", ", ", ")"))
}

/// `fft` and `ifft`
fn fourier(cx: &mut Cx<'_>) -> RuleResult {
    let name = cx.node().name.clone();
    let inverse = name == "ifft";
    if cx.is_empty() {
        return unsupported(cx);
    }
    if !cx.child(0).numeric {
        return Ok(generic(cx));
    }
    let input = cx.child(0).datatype;
    cx.set_datatype(input.with_class(StorageClass::Complex));
    if inverse && input.class != StorageClass::Complex {
        cx.report(
            DiagnosticKind::LikelyMisuse,
            format!("argument of 'ifft' should be complex, not {}", input.type_name()),
        );
    }

    match cx.len() {
        1 => Ok(Template::format(format!("arma::{}(%(0)s)", name))),
        2 => Ok(Template::format(format!("arma::{}(%(0)s, %(1)s)", name))),
        3 if input.shape.is_vector() => {
            let length = cx.child(1);
            if is_placeholder(length.category, length.children.len()) {
                return Ok(Template::format(format!("arma::{}(%(0)s)", name)));
            }
            Ok(Template::format(format!("arma::{}(%(0)s, %(1)s)", name)))
        }
        3 => {
            if cx.child(1).category == Category::Matrix {
                cx.include(if inverse { Include::Ifft } else { Include::Fft });
                Ok(Template::format(format!(
                    "m2cpp::{}<{}>(%(0)s, %(2)s)",
                    name,
                    input.type_name()
                )))
            } else {
                cx.include(if inverse { Include::Ifftn } else { Include::Fftn });
                Ok(Template::format(format!(
                    "m2cpp::{}n<{}>(%(0)s, %(1)s, %(2)s)",
                    name,
                    input.type_name()
                )))
            }
        }
        _ => {
            cx.report(
                DiagnosticKind::UnsupportedConstruct,
                format!("number of arguments to '{}' should be between 1 and 3", name),
            );
            Ok(Template::join(&format!("arma::{}(", name), ", ", ")"))
        }
    }
}

fn hankel(cx: &mut Cx<'_>) -> RuleResult {
    let class = match cx.children().next() {
        Some(arg) if arg.numeric => arg.datatype.class,
        _ => StorageClass::Float,
    };
    cx.set_datatype(Datatype::new(Shape::Matrix, class));
    cx.include(Include::Hankel);
    Ok(Template::join("m2cpp::hankel(", ", ", ")"))
}

fn interp1(cx: &mut Cx<'_>) -> RuleResult {
    if cx.len() >= 3 {
        let queries = cx.child(2).datatype;
        if queries.is_known() {
            cx.set_datatype(Datatype::new(queries.shape, StorageClass::Float));
        }
    }
    Ok(Template::join("arma::interp1(", ", ", ")"))
}

fn linspace(cx: &mut Cx<'_>) -> RuleResult {
    cx.set_datatype(Datatype::new(Shape::RowVec, StorageClass::Float));
    Ok(Template::join("arma::linspace<rowvec>(", ", ", ")"))
}

fn sum(cx: &mut Cx<'_>) -> RuleResult {
    if cx.is_empty() || cx.len() > 2 {
        return unsupported(cx);
    }
    let input = cx.child(0).datatype;
    if !cx.child(0).numeric || input.shape.is_scalar() {
        cx.report(
            DiagnosticKind::UnsupportedConstruct,
            format!("sum over non-array {}", input.type_name()),
        );
        return Ok(generic(cx));
    }

    let axis = if cx.len() == 2 { cx.child(1).int_value() } else { None };
    let shape = match (input.shape, axis) {
        (Shape::Matrix, Some(2)) => Shape::ColVec,
        (shape, _) => shape.reduced(),
    };
    cx.set_datatype(input.with_shape(shape));

    match (cx.len(), axis) {
        (1, _) => Ok(Template::format("arma::sum(%(0)s)")),
        (_, Some(axis)) => Ok(Template::format(format!("arma::sum(%(0)s, {})", axis - 1))),
        _ => Ok(Template::format("arma::sum(%(0)s, %(1)s-1)")),
    }
}

/// `real` and `imag`
fn real_part(cx: &mut Cx<'_>) -> RuleResult {
    if cx.len() != 1 {
        return unsupported(cx);
    }
    let name = cx.node().name.clone();
    inherit(cx);
    if cx.numeric() && cx.class() == StorageClass::Complex {
        cx.set_class(StorageClass::Float);
    }
    Ok(Template::format(format!("arma::{}(%(0)s)", name)))
}

fn conj(cx: &mut Cx<'_>) -> RuleResult {
    if cx.len() != 1 {
        return unsupported(cx);
    }
    inherit(cx);
    Ok(Template::format("arma::conj(%(0)s)"))
}

fn diag(cx: &mut Cx<'_>) -> RuleResult {
    if cx.is_empty() || cx.len() > 2 {
        return unsupported(cx);
    }
    if !cx.child(0).numeric {
        return Ok(generic(cx));
    }
    let input = cx.child(0).datatype;
    match input.shape {
        Shape::Scalar => {
            inherit(cx);
            Ok(Template::format("%(0)s"))
        }
        Shape::ColVec | Shape::RowVec => {
            cx.set_datatype(input.with_shape(Shape::Matrix));
            Ok(Template::join("arma::diagmat(", ", ", ")"))
        }
        Shape::Matrix => {
            cx.set_datatype(input.with_shape(Shape::ColVec));
            Ok(Template::join("arma::diagvec(", ", ", ")"))
        }
        _ => unsupported(cx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate_with_declarations;
    use crate::unit::TranslationUnit;

    fn unit(source: &str, declarations: &[(&str, &str)]) -> TranslationUnit {
        translate_with_declarations(source, declarations).unwrap()
    }

    fn code(source: &str, declarations: &[(&str, &str)]) -> String {
        unit(source, declarations).code()
    }

    #[test]
    fn test_names_round_trip() {
        for name in ["size", "zeros", "pi", "toc", "interp1"] {
            assert_eq!(Reserved::from_name(name).unwrap().name(), name);
        }
        assert_eq!(Reserved::from_name("Inf"), Some(Reserved::Inf));
        assert_eq!(Reserved::from_name("foo"), None);
    }

    #[test]
    fn test_specific_rules_by_category() {
        assert!(rule(Category::Get, Reserved::Size).is_some());
        assert!(rule(Category::Assigns, Reserved::Size).is_some());
        assert!(rule(Category::Assigns, Reserved::Zeros).is_none());
        assert!(rule(Category::Var, Reserved::Size).is_none());
    }

    #[test]
    fn test_constants() {
        assert_eq!(code("x = pi", &[]), "x = datum::pi ;");
        assert_eq!(code("x = Inf", &[]), "x = datum::inf ;");
        assert_eq!(code("x = true", &[]), "x = 1 ;");
        assert_eq!(code("z = 2 * i", &[]), "z = 2*cx_double(0, 1) ;");
    }

    #[test]
    fn test_zeros_single_argument_is_column() {
        let unit = unit("x = zeros(3)", &[]);
        assert_eq!(unit.code(), "x = arma::zeros<vec>(3) ;");
        assert_eq!(unit.suggestions["x"].type_name(), "vec");
    }

    #[test]
    fn test_zeros_leading_one_is_row() {
        let unit = unit("x = zeros(1, n)", &[]);
        assert_eq!(unit.code(), "x = arma::zeros<rowvec>(n) ;");
        assert_eq!(unit.suggestions["x"].type_name(), "rowvec");
    }

    #[test]
    fn test_ones_trailing_one_is_column() {
        assert_eq!(code("x = ones(n, 1)", &[]), "x = arma::ones<vec>(n) ;");
    }

    #[test]
    fn test_zeros_matrix_and_cube() {
        assert_eq!(code("x = zeros(3, 4)", &[]), "x = arma::zeros<mat>(3, 4) ;");
        assert_eq!(code("x = ones(2, 3, 4)", &[]), "x = arma::ones<cube>(2, 3, 4) ;");
    }

    #[test]
    fn test_zeros_follows_declared_destination() {
        assert_eq!(code("x = zeros(n)", &[("x", "irowvec")]), "x = arma::zeros<irowvec>(n) ;");
        assert_eq!(code("x = zeros(m, n)", &[("x", "cx_mat")]), "x = arma::zeros<cx_mat>(m, n) ;");
    }

    #[test]
    fn test_zeros_of_dimension_vector() {
        assert_eq!(
            code("x = zeros(d)", &[("d", "urowvec")]),
            "x = arma::zeros<mat>(d(0), d(1)) ;"
        );
    }

    #[test]
    fn test_zeros_hoists_nontrivial_dimensions() {
        let unit = unit("x = zeros(size(A))", &[("A", "mat")]);
        assert_eq!(
            unit.statements,
            vec![
                "urowvec _aux_urowvec_1 = {A.n_rows, A.n_cols} ;".to_string(),
                "x = arma::zeros<mat>(_aux_urowvec_1(0), _aux_urowvec_1(1)) ;".to_string(),
            ]
        );
    }

    #[test]
    fn test_size_with_axis() {
        let unit = unit("n = size(A, 2)", &[("A", "mat")]);
        assert_eq!(unit.code(), "n = A.n_cols ;");
        assert_eq!(unit.suggestions["n"].type_name(), "uword");
    }

    #[test]
    fn test_size_of_vector_is_element_count() {
        assert_eq!(code("n = size(v)", &[("v", "vec")]), "n = v.n_elem ;");
    }

    #[test]
    fn test_size_assigned_whole() {
        let unit = unit("s = size(A)", &[("A", "mat")]);
        assert_eq!(
            unit.code(),
            "uword _s [] = {A.n_rows, A.n_cols} ;\ns = urowvec(_s, 2, false) ;"
        );
        assert_eq!(unit.suggestions["s"].type_name(), "urowvec");
    }

    #[test]
    fn test_size_inline_is_extracted() {
        let unit = unit("n = prod(size(C))", &[("C", "cube")]);
        assert_eq!(
            unit.statements,
            vec![
                "urowvec _aux_urowvec_1 = {C.n_rows, C.n_cols, C.n_slices} ;".to_string(),
                "n = prod(_aux_urowvec_1) ;".to_string(),
            ]
        );
    }

    #[test]
    fn test_size_into_subscript_is_extracted() {
        let unit = unit("B(1, :) = size(A)", &[("A", "mat"), ("B", "umat")]);
        assert_eq!(
            unit.statements,
            vec![
                "urowvec _aux_urowvec_1 = {A.n_rows, A.n_cols} ;".to_string(),
                "B(0, m2cpp::uspan(0, B.n_cols-1)) = _aux_urowvec_1 ;".to_string(),
            ]
        );
    }

    #[test]
    fn test_size_as_statement_stays_inline() {
        let unit = unit("size(A)", &[("A", "mat")]);
        assert_eq!(unit.statements, vec!["urowvec({A.n_rows, A.n_cols}) ;"]);
        assert!(unit.suggestions.is_empty());
    }

    #[test]
    fn test_size_to_two_destinations() {
        let unit = unit("[r, c] = size(A)", &[("A", "mat")]);
        assert_eq!(unit.statements, vec!["r = A.n_rows ;", "c = A.n_cols ;"]);
        assert_eq!(unit.suggestions["r"].type_name(), "uword");
    }

    #[test]
    fn test_size_to_three_destinations_of_expression() {
        let unit = unit("[r, c, s] = size(A + B)", &[("A", "cube"), ("B", "cube")]);
        assert_eq!(
            unit.statements,
            vec![
                "cube _aux_cube_1 = A+B ;",
                "r = _aux_cube_1.n_rows ;",
                "c = _aux_cube_1.n_cols ;",
                "s = _aux_cube_1.n_slices ;",
            ]
        );
    }

    #[test]
    fn test_size_to_four_destinations_fails_statement() {
        let unit = unit("[a, b, c, d] = size(A)\ny = 1", &[("A", "mat")]);
        assert!(unit.statements[0].starts_with("// error:"));
        assert_eq!(unit.statements[1], "y = 1 ;");
        assert!(unit.has_errors());
    }

    #[test]
    fn test_length() {
        let unit = unit("n = length(v)\nm = length(v + 1)", &[("v", "vec")]);
        assert_eq!(unit.statements, vec!["n = v.n_elem ;", "m = m2cpp::length(v+1) ;"]);
        assert!(unit.includes.contains(&Include::Length));
    }

    #[test]
    fn test_min_of_scalars() {
        assert_eq!(code("y = min(a, b)", &[("a", "int"), ("b", "double")]), "y = std::min(a, b) ;");
    }

    #[test]
    fn test_max_of_matrix_reduces() {
        let unit = unit("y = max(A)", &[("A", "mat")]);
        assert_eq!(unit.code(), "y = arma::max(A) ;");
        assert_eq!(unit.suggestions["y"].type_name(), "rowvec");
    }

    #[test]
    fn test_min_with_literal_axis() {
        let unit = unit("y = min(A, [], 2)", &[("A", "mat")]);
        assert_eq!(unit.code(), "y = arma::min(A, 1) ;");
        assert_eq!(unit.suggestions["y"].type_name(), "vec");
    }

    #[test]
    fn test_min_with_symbolic_axis_warns() {
        let unit = unit("y = min(A, [], k)", &[("A", "mat"), ("k", "int")]);
        assert_eq!(unit.code(), "y = arma::min(A, k-1) ;");
        assert_eq!(unit.warnings().next().unwrap().kind, DiagnosticKind::AmbiguousAxis);
    }

    #[test]
    fn test_min_with_unknown_argument_is_generic() {
        assert_eq!(code("y = min(q)", &[]), "y = min(q) ;");
    }

    #[test]
    fn test_value_and_index_of_minimum() {
        let unit = unit("[v, k] = min(x)", &[("x", "vec")]);
        assert_eq!(unit.code(), "v = x.min(k) ;");
        assert_eq!(unit.suggestions["v"].type_name(), "double");
        assert_eq!(unit.suggestions["k"].type_name(), "uword");
    }

    #[test]
    fn test_round_of_integer_is_noop() {
        assert_eq!(code("y = round(n)", &[("n", "int")]), "y = n ;");
    }

    #[test]
    fn test_round_with_decimals() {
        let unit = unit("y = round(x, 2)", &[("x", "double")]);
        assert_eq!(unit.code(), "y = std::round(x*std::pow(10, 2))*std::pow(10, -2) ;");
        assert!(unit.includes.contains(&Include::Math));
    }

    #[test]
    fn test_round_of_array() {
        assert_eq!(code("y = round(v)", &[("v", "vec")]), "y = arma::round(v) ;");
    }

    #[test]
    fn test_floor_narrows_class() {
        let unit = unit("y = floor(v)", &[("v", "vec")]);
        assert_eq!(unit.code(), "y = arma::floor(v) ;");
        assert_eq!(unit.suggestions["y"].type_name(), "ivec");
    }

    #[test]
    fn test_fft_is_complex() {
        let unit = unit("y = fft(v)", &[("v", "vec")]);
        assert_eq!(unit.code(), "y = arma::fft(v) ;");
        assert_eq!(unit.suggestions["y"].type_name(), "cx_vec");
        assert!(unit.diagnostics.is_empty());
    }

    #[test]
    fn test_ifft_of_real_warns() {
        let unit = unit("y = ifft(v)", &[("v", "vec")]);
        assert_eq!(unit.code(), "y = arma::ifft(v) ;");
        assert_eq!(unit.warnings().next().unwrap().kind, DiagnosticKind::LikelyMisuse);
    }

    #[test]
    fn test_fft_along_axis_of_matrix() {
        let unit = unit("y = fft(A, [], 2)\nz = fft(A, n, 2)", &[("A", "mat")]);
        assert_eq!(
            unit.statements,
            vec!["y = m2cpp::fft<mat>(A, 2) ;", "z = m2cpp::fftn<mat>(A, n, 2) ;"]
        );
        assert!(unit.includes.contains(&Include::Fft));
        assert!(unit.includes.contains(&Include::Fftn));
    }

    #[test]
    fn test_fft_with_literal_lengths_uses_axis_form() {
        let unit = unit("y = fft(A, [4 8], 2)", &[("A", "mat")]);
        assert_eq!(unit.code(), "y = m2cpp::fft<mat>(A, 2) ;");
        assert!(unit.includes.contains(&Include::Fft));
        assert!(!unit.includes.contains(&Include::Fftn));
    }

    #[test]
    fn test_sum() {
        assert_eq!(code("y = sum(A)", &[("A", "mat")]), "y = arma::sum(A) ;");
        let unit = unit("y = sum(A, 2)", &[("A", "mat")]);
        assert_eq!(unit.code(), "y = arma::sum(A, 1) ;");
        assert_eq!(unit.suggestions["y"].type_name(), "vec");
    }

    #[test]
    fn test_sum_of_scalar_is_reported() {
        let unit = unit("y = sum(x)", &[("x", "double")]);
        assert_eq!(unit.code(), "y = sum(x) ;");
        assert!(unit.has_errors());
    }

    #[test]
    fn test_real_narrows_complex() {
        let unit = unit("y = real(z)", &[("z", "cx_vec")]);
        assert_eq!(unit.code(), "y = arma::real(z) ;");
        assert_eq!(unit.suggestions["y"].type_name(), "vec");
    }

    #[test]
    fn test_any_over_matrix_needs_axis() {
        let unit = unit("y = any(A)", &[("A", "mat")]);
        assert_eq!(unit.code(), "y = arma::any(A) ;");
        assert_eq!(unit.warnings().next().unwrap().kind, DiagnosticKind::AmbiguousAxis);

        assert_eq!(code("y = all(A, 1)", &[("A", "mat")]), "y = arma::all(A, 0) ;");
        assert_eq!(code("y = all(v)", &[("v", "vec")]), "y = arma::all(v) ;");
    }

    #[test]
    fn test_eye() {
        assert_eq!(code("I = eye(n)", &[("n", "int")]), "I = arma::eye<mat>(n, n) ;");
        let unit = unit("I = eye(2, 3, 4)", &[]);
        assert!(unit.has_errors());
    }

    #[test]
    fn test_rand() {
        assert_eq!(code("x = rand", &[]), "x = arma::randu() ;");
        assert_eq!(code("x = rand(3, 3)", &[]), "x = arma::randu<mat>(3, 3) ;");
    }

    #[test]
    fn test_diag() {
        assert_eq!(code("D = diag(v)", &[("v", "vec")]), "D = arma::diagmat(v) ;");
        assert_eq!(code("d = diag(A)", &[("A", "mat")]), "d = arma::diagvec(A) ;");
    }

    #[test]
    fn test_logical_builtins() {
        assert_eq!(code("y = and(a, b)", &[]), "y = (a*b) ;");
        assert_eq!(code("y = or(a, b)", &[]), "y = (a*a+b*b) ;");
    }

    #[test]
    fn test_housekeeping_becomes_comment() {
        assert_eq!(code("plot(x, y)", &[]), "// plot(x, y) ;");
        assert_eq!(code("clear", &[]), "// clear ;");
    }

    #[test]
    fn test_tic_toc() {
        let unit = unit("tic\nx = 1\ntoc\nt = toc", &[]);
        assert_eq!(
            unit.statements,
            vec![
                "_timer.tic() ;",
                "x = 1 ;",
                "cout << \"Elapsed time = \" << _timer.toc() << endl ;",
                "t = _timer.toc() ;",
            ]
        );
        assert!(unit.uses_timer);
        assert!(unit.diagnostics.is_empty());
    }

    #[test]
    fn test_toc_without_tic_warns() {
        let unit = unit("t = toc", &[]);
        assert_eq!(unit.warnings().next().unwrap().kind, DiagnosticKind::LikelyMisuse);
    }
}
