//! Dimension and storage-class lattice
//!
//! Every numeric expression is classified by a [`Shape`] (how many axes it
//! has) and a [`StorageClass`] (how its elements are stored). Operators join
//! the classes of their operands and compose shapes through the
//! conformability tables below.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// Shape of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Unknown,
    Scalar,
    ColVec,
    RowVec,
    Matrix,
    Cube,
}

impl Shape {
    /// Number of the shape on the 0..=4 scale, `None` when unknown
    pub fn rank(self) -> Option<u8> {
        match self {
            Shape::Unknown => None,
            Shape::Scalar => Some(0),
            Shape::ColVec => Some(1),
            Shape::RowVec => Some(2),
            Shape::Matrix => Some(3),
            Shape::Cube => Some(4),
        }
    }

    pub fn is_scalar(self) -> bool {
        self == Shape::Scalar
    }

    pub fn is_vector(self) -> bool {
        matches!(self, Shape::ColVec | Shape::RowVec)
    }

    /// True for anything with at least one axis
    pub fn is_array(self) -> bool {
        matches!(self, Shape::ColVec | Shape::RowVec | Shape::Matrix | Shape::Cube)
    }

    /// Swap column and row vectors, leave everything else alone
    pub fn transposed(self) -> Shape {
        match self {
            Shape::ColVec => Shape::RowVec,
            Shape::RowVec => Shape::ColVec,
            other => other,
        }
    }

    /// Result of reducing along the trailing axis
    pub fn reduced(self) -> Shape {
        match self {
            Shape::ColVec | Shape::RowVec => Shape::Scalar,
            Shape::Matrix => Shape::RowVec,
            Shape::Cube => Shape::Matrix,
            other => other,
        }
    }

    /// Shape of `self * rhs` under matrix-algebra conformability.
    ///
    /// Pairings without an entry (anything involving a cube on the right of a
    /// vector or matrix, or a cube on the left) keep the left shape.
    pub fn mul(self, rhs: Shape) -> Result<Shape, ShapeMismatch> {
        use Shape::*;
        match (self, rhs) {
            (Unknown, _) | (_, Unknown) => Ok(Unknown),
            (Scalar, other) => Ok(other),
            (ColVec, Scalar) => Ok(ColVec),
            (ColVec, RowVec) => Ok(Matrix),
            (ColVec, ColVec | Matrix | Cube) => Err(ShapeMismatch::new(self, rhs)),
            (RowVec, Scalar) => Ok(RowVec),
            (RowVec, ColVec) => Ok(Scalar),
            (RowVec, RowVec) => Err(ShapeMismatch::new(self, rhs)),
            (RowVec, Matrix) => Ok(Matrix),
            (Matrix, Scalar) => Ok(Matrix),
            (Matrix, ColVec) => Ok(ColVec),
            (Matrix, RowVec) => Err(ShapeMismatch::new(self, rhs)),
            (Matrix, Matrix) => Ok(Matrix),
            (left, _) => Ok(left),
        }
    }

    /// Shape of `self / rhs` for structural division.
    ///
    /// Differs from [`Shape::mul`] for row-vector and cube divisors: a row
    /// vector divided by a matrix stays a row vector here, while the product
    /// becomes a matrix.
    pub fn div(self, rhs: Shape) -> Result<Shape, ShapeMismatch> {
        use Shape::*;
        match (self, rhs) {
            (Unknown, _) | (_, Unknown) => Ok(Unknown),
            (Scalar, other) => Ok(other),
            (ColVec, Scalar) => Ok(ColVec),
            (ColVec, RowVec) => Ok(Matrix),
            (ColVec, ColVec | Matrix | Cube) => Err(ShapeMismatch::new(self, rhs)),
            (RowVec, Scalar) => Ok(RowVec),
            (RowVec, ColVec) => Ok(Scalar),
            (RowVec, RowVec) => Err(ShapeMismatch::new(self, rhs)),
            (RowVec, Matrix) => Ok(RowVec),
            (RowVec, Cube) => Ok(Matrix),
            (Matrix, Scalar) => Ok(Matrix),
            (Matrix, ColVec) => Ok(ColVec),
            (Matrix, RowVec) => Err(ShapeMismatch::new(self, rhs)),
            (Matrix, Matrix) => Ok(Matrix),
            (Matrix, Cube) => Ok(Cube),
            (Cube, _) => Ok(Cube),
        }
    }

    fn short_name(self) -> &'static str {
        match self {
            Shape::Unknown => "unknown",
            Shape::Scalar => "scalar",
            Shape::ColVec => "colvec",
            Shape::RowVec => "rowvec",
            Shape::Matrix => "matrix",
            Shape::Cube => "cube",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Two shapes that cannot be combined by a multiplicative operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeMismatch {
    pub left: Shape,
    pub right: Shape,
}

impl ShapeMismatch {
    fn new(left: Shape, right: Shape) -> Self {
        Self { left, right }
    }
}

/// Element storage, ordered by promotion precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageClass {
    Unresolved,
    Int,
    Uword,
    Float,
    Complex,
    Text,
}

impl StorageClass {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            StorageClass::Int | StorageClass::Uword | StorageClass::Float | StorageClass::Complex
        )
    }

    /// Division in this class would truncate
    pub fn is_integral(self) -> bool {
        self < StorageClass::Float
    }
}

/// A resolved (shape, storage class) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Datatype {
    pub shape: Shape,
    pub class: StorageClass,
}

impl Datatype {
    pub const UNKNOWN: Datatype = Datatype {
        shape: Shape::Unknown,
        class: StorageClass::Unresolved,
    };

    pub const TEXT: Datatype = Datatype {
        shape: Shape::Scalar,
        class: StorageClass::Text,
    };

    pub fn new(shape: Shape, class: StorageClass) -> Self {
        Self { shape, class }
    }

    pub fn scalar(class: StorageClass) -> Self {
        Self::new(Shape::Scalar, class)
    }

    pub fn is_known(&self) -> bool {
        self.class != StorageClass::Unresolved && self.shape != Shape::Unknown
    }

    pub fn is_numeric(&self) -> bool {
        self.is_known() && self.class.is_numeric()
    }

    pub fn with_shape(self, shape: Shape) -> Self {
        Self { shape, ..self }
    }

    pub fn with_class(self, class: StorageClass) -> Self {
        Self { class, ..self }
    }

    /// Least upper bound of two operand types
    pub fn join(self, other: Datatype) -> Datatype {
        if !self.is_known() || !other.is_known() {
            return Datatype::UNKNOWN;
        }
        Datatype {
            shape: self.shape.max(other.shape),
            class: self.class.max(other.class),
        }
    }

    /// Join over any number of operands; no operands is unknown
    pub fn join_all(types: impl IntoIterator<Item = Datatype>) -> Datatype {
        let mut types = types.into_iter();
        match types.next() {
            Some(first) => types.fold(first, Datatype::join),
            None => Datatype::UNKNOWN,
        }
    }

    /// Armadillo type used when declaring a value of this type
    pub fn type_name(&self) -> &'static str {
        use Shape::*;
        use StorageClass::*;
        if !self.is_known() {
            return "TYPE";
        }
        match (self.class, self.shape) {
            (Text, _) => "string",
            (Int, Scalar) => "int",
            (Int, ColVec) => "ivec",
            (Int, RowVec) => "irowvec",
            (Int, Matrix) => "imat",
            (Int, Cube) => "icube",
            (Uword, Scalar) => "uword",
            (Uword, ColVec) => "uvec",
            (Uword, RowVec) => "urowvec",
            (Uword, Matrix) => "umat",
            (Uword, Cube) => "ucube",
            (Float, Scalar) => "double",
            (Float, ColVec) => "vec",
            (Float, RowVec) => "rowvec",
            (Float, Matrix) => "mat",
            (Float, Cube) => "cube",
            (Complex, Scalar) => "cx_double",
            (Complex, ColVec) => "cx_vec",
            (Complex, RowVec) => "cx_rowvec",
            (Complex, Matrix) => "cx_mat",
            (Complex, Cube) => "cx_cube",
            (_, Unknown) | (Unresolved, _) => "TYPE",
        }
    }
}

impl Default for Datatype {
    fn default() -> Self {
        Datatype::UNKNOWN
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for Datatype {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Shape::*;
        use StorageClass::*;
        let (shape, class) = match s.trim() {
            "TYPE" => return Ok(Datatype::UNKNOWN),
            "string" => return Ok(Datatype::TEXT),
            "int" => (Scalar, Int),
            "ivec" => (ColVec, Int),
            "irowvec" => (RowVec, Int),
            "imat" => (Matrix, Int),
            "icube" => (Cube, Int),
            "uword" => (Scalar, Uword),
            "uvec" => (ColVec, Uword),
            "urowvec" => (RowVec, Uword),
            "umat" => (Matrix, Uword),
            "ucube" => (Cube, Uword),
            "double" | "float" => (Scalar, Float),
            "vec" | "colvec" => (ColVec, Float),
            "rowvec" => (RowVec, Float),
            "mat" => (Matrix, Float),
            "cube" => (Cube, Float),
            "cx_double" => (Scalar, Complex),
            "cx_vec" => (ColVec, Complex),
            "cx_rowvec" => (RowVec, Complex),
            "cx_mat" => (Matrix, Complex),
            "cx_cube" => (Cube, Complex),
            other => {
                return Err(CompileError::declaration(format!("unknown type name '{}'", other)))
            }
        };
        Ok(Datatype::new(shape, class))
    }
}

impl TryFrom<String> for Datatype {
    type Error = CompileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Datatype> for String {
    fn from(value: Datatype) -> Self {
        value.type_name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Shape::*;

    #[test]
    fn test_mul_table() {
        assert_eq!(Scalar.mul(Matrix), Ok(Matrix));
        assert_eq!(Scalar.mul(ColVec), Ok(ColVec));
        assert_eq!(ColVec.mul(Scalar), Ok(ColVec));
        assert!(ColVec.mul(ColVec).is_err());
        assert_eq!(ColVec.mul(RowVec), Ok(Matrix));
        assert!(ColVec.mul(Matrix).is_err());
        assert_eq!(RowVec.mul(Scalar), Ok(RowVec));
        assert_eq!(RowVec.mul(ColVec), Ok(Scalar));
        assert!(RowVec.mul(RowVec).is_err());
        assert_eq!(RowVec.mul(Matrix), Ok(Matrix));
        assert_eq!(Matrix.mul(ColVec), Ok(ColVec));
        assert!(Matrix.mul(RowVec).is_err());
    }

    #[test]
    fn test_mul_is_not_commutative() {
        assert_eq!(RowVec.mul(ColVec), Ok(Scalar));
        assert_eq!(ColVec.mul(RowVec), Ok(Matrix));
    }

    #[test]
    fn test_division_asymmetry_with_product() {
        assert_eq!(RowVec.div(Matrix), Ok(RowVec));
        assert_eq!(RowVec.mul(Matrix), Ok(Matrix));
        assert_eq!(Matrix.div(Cube), Ok(Cube));
        assert_eq!(Matrix.mul(Cube), Ok(Matrix));
    }

    #[test]
    fn test_join_promotes_to_max_class() {
        let int = Datatype::scalar(StorageClass::Int);
        let cx = Datatype::new(ColVec, StorageClass::Complex);
        let joined = int.join(cx);
        assert_eq!(joined.class, StorageClass::Complex);
        assert_eq!(joined.shape, ColVec);
        assert_eq!(joined, cx.join(int));
        assert_eq!(joined.join(joined), joined);
    }

    #[test]
    fn test_join_with_unknown_is_unknown() {
        let float = Datatype::scalar(StorageClass::Float);
        assert_eq!(float.join(Datatype::UNKNOWN), Datatype::UNKNOWN);
        assert_eq!(Datatype::join_all([]), Datatype::UNKNOWN);
    }

    #[test]
    fn test_type_names_parse_back() {
        for name in ["int", "uvec", "rowvec", "mat", "cx_cube", "string"] {
            let dt: Datatype = name.parse().unwrap();
            assert_eq!(dt.type_name(), name);
        }
        assert!("matrix".parse::<Datatype>().is_err());
    }

    #[test]
    fn test_integral_classes_are_below_float() {
        assert!(StorageClass::Int.is_integral());
        assert!(StorageClass::Uword.is_integral());
        assert!(!StorageClass::Float.is_integral());
        assert!(StorageClass::Complex > StorageClass::Float);
    }
}
