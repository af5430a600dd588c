use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::types::{PrimitiveKind, TypeDescriptor};

/// Primitive value shared by the AST, the dynamic value graph and the
/// interpreter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Char(char),
}

impl Scalar {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Scalar::Bool(_) => PrimitiveKind::Bool,
            Scalar::Int(_) => PrimitiveKind::Int,
            Scalar::Float(_) => PrimitiveKind::Float,
            Scalar::String(_) => PrimitiveKind::String,
            Scalar::Char(_) => PrimitiveKind::Char,
        }
    }

    pub fn descriptor(&self) -> TypeDescriptor {
        self.kind().descriptor()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view used for mixed int/float arithmetic.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(value) => Some(*value as f64),
            Scalar::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(value) => Some(value),
            _ => None,
        }
    }

    /// Default value of a primitive kind; `None` for `any`.
    pub fn default_of(kind: PrimitiveKind) -> Option<Scalar> {
        match kind {
            PrimitiveKind::Bool => Some(Scalar::Bool(false)),
            PrimitiveKind::Int => Some(Scalar::Int(0)),
            PrimitiveKind::Float => Some(Scalar::Float(0.0)),
            PrimitiveKind::String => Some(Scalar::String(String::new())),
            PrimitiveKind::Char => Some(Scalar::Char('\0')),
            PrimitiveKind::Any => None,
        }
    }

    // Int and Float share a rank: numbers order and hash by value.
    fn rank(&self) -> u8 {
        match self {
            Scalar::Bool(_) => 0,
            Scalar::Int(_) | Scalar::Float(_) => 1,
            Scalar::String(_) => 2,
            Scalar::Char(_) => 3,
        }
    }
}

/// Exact: large integers are not rounded through `f64`.
fn cmp_int_float(int: i64, float: f64) -> Ordering {
    if float.is_nan() {
        return if float.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if float >= 9.223_372_036_854_775_808e18 {
        return Ordering::Less;
    }
    if float < -9.223_372_036_854_775_808e18 {
        return Ordering::Greater;
    }
    let whole = float.trunc();
    match (int as i128).cmp(&(whole as i128)) {
        Ordering::Equal => 0.0_f64
            .partial_cmp(&(float - whole))
            .unwrap_or(Ordering::Equal),
        ordering => ordering,
    }
}

fn cmp_floats(l: f64, r: f64) -> Ordering {
    // 0.0 and -0.0 are one value
    if l == r {
        Ordering::Equal
    } else {
        l.total_cmp(&r)
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Scalar::Bool(l), Scalar::Bool(r)) => l.cmp(r),
            (Scalar::Int(l), Scalar::Int(r)) => l.cmp(r),
            (Scalar::Float(l), Scalar::Float(r)) => cmp_floats(*l, *r),
            (Scalar::Int(l), Scalar::Float(r)) => cmp_int_float(*l, *r),
            (Scalar::Float(l), Scalar::Int(r)) => cmp_int_float(*r, *l).reverse(),
            (Scalar::String(l), Scalar::String(r)) => l.cmp(r),
            (Scalar::Char(l), Scalar::Char(r)) => l.cmp(r),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Scalar::Bool(value) => value.hash(state),
            Scalar::Int(value) => value.hash(state),
            // integral floats hash like the equal Int
            Scalar::Float(value)
                if value.fract() == 0.0
                    && *value >= -9.223_372_036_854_775_808e18
                    && *value < 9.223_372_036_854_775_808e18 =>
            {
                (*value as i64).hash(state)
            }
            Scalar::Float(value) => value.to_bits().hash(state),
            Scalar::String(value) => value.hash(state),
            Scalar::Char(value) => value.hash(state),
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Float(value) => write!(f, "{value:?}"),
            Scalar::String(value) => write!(f, "{value:?}"),
            Scalar::Char(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}
impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}
impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}
impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}
impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}
impl From<char> for Scalar {
    fn from(value: char) -> Self {
        Scalar::Char(value)
    }
}
