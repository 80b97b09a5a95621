use std::collections::HashSet;
use swc_core::common::DUMMY_SP;
use swc_core::ecma::ast::{BinaryOp, Expr, Ident, Lit, MemberProp, Null, UnaryOp};
use swc_core::ecma::atoms::JsWord;

use super::util::{bool_lit, num_lit, str_lit};

/// A JavaScript value the evaluator can reason about.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    /// An array literal. Two arrays are never the same object.
    Array(Vec<Value>)
}

/// The outcome of evaluating an expression.
///
/// Folding passes only ever act on [Evaluation::Known].
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Known(Value),
    Unknown
}

impl From<Option<Value>> for Evaluation {
    fn from(value: Option<Value>) -> Self {
        match value {
            Some(v) => Self::Known(v),
            None => Self::Unknown
        }
    }
}

impl Evaluation {
    pub fn into_option(self) -> Option<Value> {
        match self {
            Self::Known(v) => Some(v),
            Self::Unknown => None
        }
    }
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Num(n) => !(*n == 0.0 || n.is_nan()),
            Self::Str(s) => !s.is_empty(),
            Self::Array(_) => true
        }
    }

    fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null | Self::Array(_) => "object",
            Self::Bool(_) => "boolean",
            Self::Num(_) => "number",
            Self::Str(_) => "string"
        }
    }

    /// `ToPrimitive`. Arrays convert through `join(",")`.
    fn to_primitive(&self) -> Option<Value> {
        match self {
            Self::Array(_) => Some(Self::Str(self.to_js_string()?)),
            other => Some(other.clone())
        }
    }

    pub fn to_number(&self) -> Option<f64> {
        Some(match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => if *b { 1.0 } else { 0.0 },
            Self::Num(n) => *n,
            Self::Str(s) => string_to_number(s),
            Self::Array(_) => string_to_number(&self.to_js_string()?)
        })
    }

    /// `ToString`. `None` if the number formatting would differ from
    /// JavaScript's (exponent notation).
    pub fn to_js_string(&self) -> Option<String> {
        match self {
            Self::Undefined => Some(String::from("undefined")),
            Self::Null => Some(String::from("null")),
            Self::Bool(b) => Some(b.to_string()),
            Self::Num(n) => number_to_string(*n),
            Self::Str(s) => Some(s.clone()),
            Self::Array(elems) => {
                let mut parts = Vec::with_capacity(elems.len());
                for elem in elems {
                    parts.push(match elem {
                        Self::Undefined | Self::Null => String::new(),
                        other => other.to_js_string()?
                    });
                }
                Some(parts.join(","))
            }
        }
    }

    /// Converts the value back into a node, if it has a literal form.
    ///
    /// Negative numbers, `NaN` and infinities need a compound expression
    /// (`-1`, `0 / 0`) and arrays would duplicate allocation sites, so they
    /// return `None`.
    pub fn to_expr(&self) -> Option<Expr> {
        match self {
            Self::Undefined => Some(Expr::Ident(Ident::new(JsWord::from("undefined"), DUMMY_SP))),
            Self::Null => Some(Expr::Lit(Lit::Null(Null { span: DUMMY_SP }))),
            Self::Bool(b) => Some(bool_lit(*b)),
            Self::Num(n) if n.is_finite() && !n.is_sign_negative() => Some(num_lit(*n)),
            Self::Num(_) => None,
            Self::Str(s) => Some(str_lit(s)),
            Self::Array(_) => None
        }
    }
}

/// JavaScript's `Number(string)`.
fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let radix = match s.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&s[2..], radix)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }

    // Rust also accepts "inf" and "nan", JavaScript doesn't.
    if s.chars().any(|c| c.is_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

fn number_to_string(n: f64) -> Option<String> {
    if n.is_nan() {
        Some(String::from("NaN"))
    } else if n.is_infinite() {
        Some(String::from(if n > 0.0 { "Infinity" } else { "-Infinity" }))
    } else if n == 0.0 {
        Some(String::from("0"))
    } else if n.abs() < 1e21 && (n.fract() == 0.0 || n.abs() >= 1e-6) {
        Some(format!("{}", n))
    } else {
        None
    }
}

fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    (n.trunc() % 4294967296.0) as i64 as u32 as i32
}

fn loose_eq(left: &Value, right: &Value) -> Option<bool> {
    use Value::*;

    Some(match (left, right) {
        (Undefined | Null, Undefined | Null) => true,
        (Undefined | Null, _) | (_, Undefined | Null) => false,
        (Array(_), Array(_)) => false,
        (Bool(b), other) | (other, Bool(b)) => {
            return loose_eq(&Num(if *b { 1.0 } else { 0.0 }), other);
        }
        (Array(_), other) | (other, Array(_)) => {
            let primitive = if matches!(left, Array(_)) { left } else { right }.to_primitive()?;
            return loose_eq(&primitive, other);
        }
        (Str(a), Str(b)) => a == b,
        (Num(a), Num(b)) => a == b,
        (Num(a), Str(s)) | (Str(s), Num(a)) => *a == string_to_number(s),
    })
}

fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Num(a), Value::Num(b)) => a == b,
        (Value::Array(_), Value::Array(_)) => false,
        _ => left == right
    }
}

/// Abstract relational comparison, `left < right`. `None` when either side
/// is `NaN` (every comparison is then false).
fn less_than(left: &Value, right: &Value) -> Option<Option<bool>> {
    let left = left.to_primitive()?;
    let right = right.to_primitive()?;
    if let (Value::Str(a), Value::Str(b)) = (&left, &right) {
        return Some(Some(a.encode_utf16().lt(b.encode_utf16())));
    }

    let a = left.to_number()?;
    let b = right.to_number()?;
    if a.is_nan() || b.is_nan() {
        Some(None)
    } else {
        Some(Some(a < b))
    }
}

/// A partial evaluator for side-effect-free literal expressions.
///
/// Identifiers are unknown, except the globals `undefined`, `NaN` and
/// `Infinity` when the program doesn't declare a binding of that name.
#[derive(Default)]
pub struct Evaluator {
    /// Every symbol the program declares.
    declared: HashSet<JsWord>
}

impl Evaluator {
    pub fn new(declared: HashSet<JsWord>) -> Self {
        Self {
            declared
        }
    }

    pub fn evaluate(&self, expr: &Expr) -> Evaluation {
        self.eval(expr).into()
    }

    fn eval(&self, expr: &Expr) -> Option<Value> {
        match expr {
            Expr::Lit(Lit::Str(s)) => Some(Value::Str(s.value.to_string())),
            Expr::Lit(Lit::Num(n)) => Some(Value::Num(n.value)),
            Expr::Lit(Lit::Bool(b)) => Some(Value::Bool(b.value)),
            Expr::Lit(Lit::Null(_)) => Some(Value::Null),
            Expr::Lit(_) => None,
            Expr::Paren(paren) => self.eval(&paren.expr),
            Expr::Ident(id) => {
                if self.declared.contains(&id.sym) {
                    return None;
                }
                match &*id.sym {
                    "undefined" => Some(Value::Undefined),
                    "NaN" => Some(Value::Num(f64::NAN)),
                    "Infinity" => Some(Value::Num(f64::INFINITY)),
                    _ => None
                }
            }
            Expr::Array(array) => {
                let mut elems = Vec::with_capacity(array.elems.len());
                for elem in &array.elems {
                    match elem {
                        None => elems.push(Value::Undefined),
                        Some(elem) if elem.spread.is_some() => return None,
                        Some(elem) => elems.push(self.eval(&elem.expr)?)
                    }
                }
                Some(Value::Array(elems))
            }
            Expr::Tpl(tpl) => {
                let mut out = String::new();
                for (i, quasi) in tpl.quasis.iter().enumerate() {
                    out.push_str(quasi.cooked.as_ref()?);
                    if let Some(expr) = tpl.exprs.get(i) {
                        out.push_str(&self.eval(expr)?.to_js_string()?);
                    }
                }
                Some(Value::Str(out))
            }
            Expr::Seq(seq) => {
                let mut last = None;
                for expr in &seq.exprs {
                    last = Some(self.eval(expr)?);
                }
                last
            }
            Expr::Cond(cond) => {
                if self.eval(&cond.test)?.is_truthy() {
                    self.eval(&cond.cons)
                } else {
                    self.eval(&cond.alt)
                }
            }
            Expr::Unary(unary) => {
                let arg = self.eval(&unary.arg)?;
                match unary.op {
                    UnaryOp::Bang => Some(Value::Bool(!arg.is_truthy())),
                    UnaryOp::Plus => Some(Value::Num(arg.to_number()?)),
                    UnaryOp::Minus => Some(Value::Num(-arg.to_number()?)),
                    UnaryOp::Tilde => Some(Value::Num(!to_int32(arg.to_number()?) as f64)),
                    UnaryOp::TypeOf => Some(Value::Str(arg.type_of().to_string())),
                    UnaryOp::Void => Some(Value::Undefined),
                    UnaryOp::Delete => None
                }
            }
            Expr::Bin(bin) => {
                let left = self.eval(&bin.left)?;
                match bin.op {
                    BinaryOp::LogicalAnd => {
                        return if left.is_truthy() { self.eval(&bin.right) } else { Some(left) };
                    }
                    BinaryOp::LogicalOr => {
                        return if left.is_truthy() { Some(left) } else { self.eval(&bin.right) };
                    }
                    BinaryOp::NullishCoalescing => {
                        return match left {
                            Value::Undefined | Value::Null => self.eval(&bin.right),
                            other => Some(other)
                        };
                    }
                    _ => {}
                }
                let right = self.eval(&bin.right)?;
                binary(bin.op, &left, &right)
            }
            Expr::Member(member) => {
                let object = self.eval(&member.obj)?;
                let key = match &member.prop {
                    MemberProp::Ident(id) => Value::Str(id.sym.to_string()),
                    MemberProp::Computed(computed) => self.eval(&computed.expr)?.to_primitive()?,
                    MemberProp::PrivateName(_) => return None
                };
                member_value(&object, &key)
            }
            _ => None
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    let num = |f: fn(f64, f64) -> f64| -> Option<Value> {
        Some(Value::Num(f(left.to_number()?, right.to_number()?)))
    };
    let int = |f: fn(i32, u32) -> f64| -> Option<Value> {
        Some(Value::Num(f(to_int32(left.to_number()?), to_int32(right.to_number()?) as u32)))
    };

    match op {
        BinaryOp::Add => {
            let left = left.to_primitive()?;
            let right = right.to_primitive()?;
            if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
                Some(Value::Str(left.to_js_string()? + right.to_js_string()?.as_str()))
            } else {
                Some(Value::Num(left.to_number()? + right.to_number()?))
            }
        }
        BinaryOp::Sub => num(|a, b| a - b),
        BinaryOp::Mul => num(|a, b| a * b),
        BinaryOp::Div => num(|a, b| a / b),
        BinaryOp::Mod => num(|a, b| a % b),
        BinaryOp::Exp => num(|a, b| {
            if b.is_nan() || (a.abs() == 1.0 && b.is_infinite()) {
                f64::NAN
            } else {
                a.powf(b)
            }
        }),
        BinaryOp::BitAnd => int(|a, b| (a & b as i32) as f64),
        BinaryOp::BitOr => int(|a, b| (a | b as i32) as f64),
        BinaryOp::BitXor => int(|a, b| (a ^ b as i32) as f64),
        BinaryOp::LShift => int(|a, b| a.wrapping_shl(b & 31) as f64),
        BinaryOp::RShift => int(|a, b| a.wrapping_shr(b & 31) as f64),
        BinaryOp::ZeroFillRShift => int(|a, b| (a as u32).wrapping_shr(b & 31) as f64),
        BinaryOp::EqEq => Some(Value::Bool(loose_eq(left, right)?)),
        BinaryOp::NotEq => Some(Value::Bool(!loose_eq(left, right)?)),
        BinaryOp::EqEqEq => Some(Value::Bool(strict_eq(left, right))),
        BinaryOp::NotEqEq => Some(Value::Bool(!strict_eq(left, right))),
        BinaryOp::Lt => Some(Value::Bool(less_than(left, right)?.unwrap_or(false))),
        BinaryOp::Gt => Some(Value::Bool(less_than(right, left)?.unwrap_or(false))),
        BinaryOp::LtEq => Some(Value::Bool(less_than(right, left)?.map_or(false, |lt| !lt))),
        BinaryOp::GtEq => Some(Value::Bool(less_than(left, right)?.map_or(false, |lt| !lt))),
        _ => None
    }
}

/// Reads `length` or an index of a string or array.
fn member_value(object: &Value, key: &Value) -> Option<Value> {
    let key = match key {
        Value::Num(n) => number_to_string(*n)?,
        Value::Str(s) => s.clone(),
        _ => return None
    };

    match object {
        Value::Str(s) => {
            let units: Vec<u16> = s.encode_utf16().collect();
            if key == "length" {
                return Some(Value::Num(units.len() as f64));
            }
            let index = array_index(&key)?;
            match units.get(index) {
                Some(unit) => String::from_utf16(&[*unit]).ok().map(Value::Str),
                None => Some(Value::Undefined)
            }
        }
        Value::Array(elems) => {
            if key == "length" {
                return Some(Value::Num(elems.len() as f64));
            }
            let index = array_index(&key)?;
            Some(elems.get(index).cloned().unwrap_or(Value::Undefined))
        }
        _ => None
    }
}

/// Parses a canonical array index ("0", "12", never "01").
fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}
