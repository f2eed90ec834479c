use std::cmp::Ordering;
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

use super::{PrimitiveMessage, arg, argument_error, expect_text};
use crate::error::Exec;
use crate::frame::Frame;
use crate::object::Value;
use crate::universe::Universe;

/// Largest integer `<<` will build, in bits.
const MAX_SHIFTED_BITS: u64 = 1 << 24;

pub const PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("asString", as_string),
    PrimitiveMessage::new("sqrt", sqrt),
    PrimitiveMessage::new("atRandom", at_random),
    PrimitiveMessage::new("+", plus),
    PrimitiveMessage::new("-", minus),
    PrimitiveMessage::new("*", multiply),
    PrimitiveMessage::new("//", double_divide),
    PrimitiveMessage::new("/", divide),
    PrimitiveMessage::new("%", modulo),
    PrimitiveMessage::new("&", bit_and),
    PrimitiveMessage::new("=", equals),
    PrimitiveMessage::new("<", less_than),
    PrimitiveMessage::new("<<", shift_left),
    PrimitiveMessage::new("bitXor:", bit_xor),
    PrimitiveMessage::class_side("fromString:", from_string),
];

// ═══════════════════════════════════════════════════════════════════
// Numeric tower
// ═══════════════════════════════════════════════════════════════════

/// Operand view shared by the Integer and Double primitives.
pub(super) enum Number {
    Int(i64),
    Big(Rc<BigInt>),
    Double(f64),
}

impl Number {
    pub(super) fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(Self::Int(*i)),
            Value::BigInteger(i) => Some(Self::Big(i.clone())),
            Value::Double(d) => Some(Self::Double(*d)),
            _ => None,
        }
    }

    pub(super) fn to_f64(&self) -> f64 {
        match self {
            Self::Int(i) => *i as f64,
            Self::Big(i) => i.to_f64().unwrap_or(f64::NAN),
            Self::Double(d) => *d,
        }
    }

    fn to_bigint(&self) -> Option<BigInt> {
        match self {
            Self::Int(i) => Some(BigInt::from(*i)),
            Self::Big(i) => Some((**i).clone()),
            Self::Double(_) => None,
        }
    }

    fn is_double(&self) -> bool {
        matches!(self, Self::Double(_))
    }
}

pub(super) fn operands(u: &Universe, selector: &str, args: &[Value]) -> Exec<(Number, Number)> {
    let left = Number::of(&arg(args, 0));
    let right = Number::of(&arg(args, 1));
    match (left, right) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(argument_error(
            selector,
            format!("expected a number, got {}", u.print_string(&arg(args, 1))),
        )
        .into()),
    }
}

/// Apply an integer operation, promoting to arbitrary precision when the
/// machine word overflows, or a double operation when either side is a
/// double.
fn arithmetic(
    u: &Universe,
    selector: &str,
    args: &[Value],
    small: fn(i64, i64) -> Option<i64>,
    big: fn(&BigInt, &BigInt) -> BigInt,
    double: fn(f64, f64) -> f64,
) -> Exec<Value> {
    let (left, right) = operands(u, selector, args)?;
    if let (Number::Int(l), Number::Int(r)) = (&left, &right) {
        if let Some(result) = small(*l, *r) {
            return Ok(Value::Integer(result));
        }
    }
    match (left.to_bigint(), right.to_bigint()) {
        (Some(l), Some(r)) => Ok(Value::from_bigint(big(&l, &r))),
        _ => Ok(Value::Double(double(left.to_f64(), right.to_f64()))),
    }
}

pub(super) fn compare(left: &Number, right: &Number) -> Option<Ordering> {
    if left.is_double() || right.is_double() {
        return left.to_f64().partial_cmp(&right.to_f64());
    }
    match (left, right) {
        (Number::Int(l), Number::Int(r)) => Some(l.cmp(r)),
        _ => Some(left.to_bigint()?.cmp(&right.to_bigint()?)),
    }
}

fn division_by_zero(selector: &str) -> crate::error::Unwind {
    argument_error(selector, "division by zero").into()
}

fn floor_div_big(l: &BigInt, r: &BigInt) -> BigInt {
    let q = l / r;
    if !(l % r).is_zero() && ((l.sign() == num_bigint::Sign::Minus) != (r.sign() == num_bigint::Sign::Minus)) {
        q - 1
    } else {
        q
    }
}

fn floor_mod_big(l: &BigInt, r: &BigInt) -> BigInt {
    let m = l % r;
    if !m.is_zero() && ((m.sign() == num_bigint::Sign::Minus) != (r.sign() == num_bigint::Sign::Minus)) {
        m + r
    } else {
        m
    }
}

pub(super) fn floor_to_integer(selector: &str, value: f64) -> Exec<Value> {
    BigInt::from_f64(value.floor())
        .map(Value::from_bigint)
        .ok_or_else(|| argument_error(selector, format!("{} is not a finite number", value)).into())
}

// ═══════════════════════════════════════════════════════════════════
// Primitives
// ═══════════════════════════════════════════════════════════════════

fn as_string(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    match arg(&args, 0) {
        Value::Integer(i) => Ok(Value::string(&i.to_string())),
        Value::BigInteger(i) => Ok(Value::string(&i.to_string())),
        other => Err(argument_error("asString", format!("not an integer: {}", u.print_string(&other))).into()),
    }
}

fn sqrt(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let Some(n) = Number::of(&arg(&args, 0)) else {
        return Err(argument_error("sqrt", format!("not an integer: {}", u.print_string(&arg(&args, 0)))).into());
    };
    let result = n.to_f64().sqrt();
    if result.is_finite() && result.fract() == 0.0 {
        floor_to_integer("sqrt", result)
    } else {
        Ok(Value::Double(result))
    }
}

fn at_random(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let bound = arg(&args, 0).as_integer().unwrap_or(0);
    if bound <= 0 {
        return Ok(Value::Integer(0));
    }
    Ok(Value::Integer((u.next_random() % bound as u64) as i64))
}

fn plus(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    arithmetic(u, "+", &args, i64::checked_add, |l, r| l + r, |l, r| l + r)
}

fn minus(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    arithmetic(u, "-", &args, i64::checked_sub, |l, r| l - r, |l, r| l - r)
}

fn multiply(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    arithmetic(u, "*", &args, i64::checked_mul, |l, r| l * r, |l, r| l * r)
}

fn double_divide(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let (left, right) = operands(u, "//", &args)?;
    Ok(Value::Double(left.to_f64() / right.to_f64()))
}

/// Integer division rounding towards negative infinity.
fn divide(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let (left, right) = operands(u, "/", &args)?;
    if left.is_double() || right.is_double() {
        return floor_to_integer("/", left.to_f64() / right.to_f64());
    }
    if matches!(right, Number::Int(0)) {
        return Err(division_by_zero("/"));
    }
    if let (Number::Int(l), Number::Int(r)) = (&left, &right) {
        if let Some(q) = l.checked_div(*r) {
            let adjust = l % r != 0 && ((*l < 0) != (*r < 0));
            return Ok(Value::Integer(if adjust { q - 1 } else { q }));
        }
    }
    match (left.to_bigint(), right.to_bigint()) {
        (Some(l), Some(r)) if !r.is_zero() => Ok(Value::from_bigint(floor_div_big(&l, &r))),
        _ => Err(division_by_zero("/")),
    }
}

/// Modulo with the sign of the divisor.
fn modulo(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let (left, right) = operands(u, "%", &args)?;
    if left.is_double() || right.is_double() {
        return Ok(Value::Double(left.to_f64() % right.to_f64()));
    }
    if matches!(right, Number::Int(0)) {
        return Err(division_by_zero("%"));
    }
    if let (Number::Int(l), Number::Int(r)) = (&left, &right) {
        let m = l.checked_rem(*r).unwrap_or(0);
        let adjust = m != 0 && ((m < 0) != (*r < 0));
        return Ok(Value::Integer(if adjust { m + r } else { m }));
    }
    match (left.to_bigint(), right.to_bigint()) {
        (Some(l), Some(r)) if !r.is_zero() => Ok(Value::from_bigint(floor_mod_big(&l, &r))),
        _ => Err(division_by_zero("%")),
    }
}

fn integer_operands(u: &Universe, selector: &str, args: &[Value]) -> Exec<(BigInt, BigInt)> {
    let (left, right) = operands(u, selector, args)?;
    match (left.to_bigint(), right.to_bigint()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(argument_error(selector, "expected integer operands").into()),
    }
}

fn bit_and(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    if let (Value::Integer(l), Value::Integer(r)) = (arg(&args, 0), arg(&args, 1)) {
        return Ok(Value::Integer(l & r));
    }
    let (l, r) = integer_operands(u, "&", &args)?;
    Ok(Value::from_bigint(l & r))
}

fn bit_xor(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    if let (Value::Integer(l), Value::Integer(r)) = (arg(&args, 0), arg(&args, 1)) {
        return Ok(Value::Integer(l ^ r));
    }
    let (l, r) = integer_operands(u, "bitXor:", &args)?;
    Ok(Value::from_bigint(l ^ r))
}

fn shift_left(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let (value, shift) = integer_operands(u, "<<", &args)?;
    let Some(shift) = shift.to_i64() else {
        return Err(argument_error("<<", "shift amount out of range").into());
    };
    if shift < 0 {
        return Ok(Value::from_bigint(value >> shift.unsigned_abs() as usize));
    }
    if value.is_zero() {
        return Ok(Value::Integer(0));
    }
    if value.bits().saturating_add(shift.unsigned_abs()) > MAX_SHIFTED_BITS {
        return Err(argument_error("<<", format!("shift by {} is too large", shift)).into());
    }
    Ok(Value::from_bigint(value << shift as usize))
}

fn equals(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let equal = match (Number::of(&arg(&args, 0)), Number::of(&arg(&args, 1))) {
        (Some(l), Some(r)) => compare(&l, &r) == Some(Ordering::Equal),
        _ => false,
    };
    Ok(Value::Boolean(equal))
}

fn less_than(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let (left, right) = operands(u, "<", &args)?;
    Ok(Value::Boolean(compare(&left, &right) == Some(Ordering::Less)))
}

fn from_string(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let text = expect_text(u, "fromString:", &arg(&args, 1))?;
    Ok(text
        .trim()
        .parse::<BigInt>()
        .map(Value::from_bigint)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use crate::error::{Unwind, VmError};
    use crate::universe::tests::{run, test_universe};

    fn eval(expression: &str) -> String {
        let u = test_universe();
        let source = format!("Eval = ( run = ( ^ {} ) )", expression);
        let result = run(&u, &source, "run");
        u.print_string(&result)
    }

    #[test]
    fn floor_division_and_modulo() {
        assert_eq!(eval("7 / 2"), "3");
        assert_eq!(eval("-7 / 2"), "-4");
        assert_eq!(eval("-7 % 3"), "2");
        assert_eq!(eval("7 % -3"), "-2");
        assert_eq!(eval("7 // 2"), "3.5");
    }

    #[test]
    fn overflow_promotes_and_demotes() {
        assert_eq!(eval("9223372036854775807 + 1"), "9223372036854775808");
        assert_eq!(eval("(9223372036854775807 + 1) - 1"), "9223372036854775807");
        assert_eq!(eval("1 << 70"), "1180591620717411303424");
        assert_eq!(eval("(1 << 70) = (1 << 70)"), "true");
    }

    #[test]
    fn mixed_with_doubles() {
        assert_eq!(eval("1 + 0.5"), "1.5");
        assert_eq!(eval("2 < 2.5"), "true");
        assert_eq!(eval("3 = 3.0"), "true");
        assert_eq!(eval("16 sqrt"), "4");
        assert_eq!(eval("2 sqrt < 1.5"), "true");
    }

    #[test]
    fn bits_strings_and_parsing() {
        assert_eq!(eval("12 & 10"), "8");
        assert_eq!(eval("12 bitXor: 10"), "6");
        assert_eq!(eval("42 asString"), "42");
        assert_eq!(eval("(Integer fromString: '123') + 1"), "124");
        assert_eq!(eval("Integer fromString: 'abc'"), "nil");
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let u = test_universe();
        let class = u
            .load_class_from_string("DivZero = ( run = ( ^ 1 / 0 ) )")
            .expect("compile");
        let result = u.dispatch(u.symbol("run"), vec![u.new_instance(&class)], None);
        assert!(result.is_err());
    }

    #[test]
    fn huge_shifts_are_rejected() {
        let u = test_universe();
        let class = u
            .load_class_from_string(
                "BigShift = ( run = ( ^ 1 << 100000000000 ) zero = ( ^ 0 << 100000000000 ) )",
            )
            .expect("compile");
        let receiver = u.new_instance(&class);
        let err = u
            .dispatch(u.symbol("run"), vec![receiver.clone()], None)
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, Unwind::Error(VmError::PrimitiveArgument { .. })));
        let zero = u.dispatch(u.symbol("zero"), vec![receiver], None).expect("zero");
        assert_eq!(zero.as_integer(), Some(0));
        assert_eq!(eval("1 << 64"), "18446744073709551616");
    }
}
