use std::rc::Rc;

use super::{PrimitiveMessage, arg, expect_integer, expect_text};
use crate::error::Exec;
use crate::frame::Frame;
use crate::object::Value;
use crate::universe::Universe;

pub const PRIMITIVES: &[PrimitiveMessage] = &[
    PrimitiveMessage::new("concatenate:", concatenate),
    PrimitiveMessage::new("asSymbol", as_symbol),
    PrimitiveMessage::new("length", length),
    PrimitiveMessage::new("=", equals),
    PrimitiveMessage::new("primSubstringFrom:to:", substring),
    PrimitiveMessage::new("hashcode", hashcode),
    PrimitiveMessage::new("isWhiteSpace", is_white_space),
    PrimitiveMessage::new("isLetters", is_letters),
    PrimitiveMessage::new("isDigits", is_digits),
];

pub const SYMBOL_PRIMITIVES: &[PrimitiveMessage] = &[PrimitiveMessage::new("asString", as_string)];

fn concatenate(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let left = expect_text(u, "concatenate:", &arg(&args, 0))?;
    let right = expect_text(u, "concatenate:", &arg(&args, 1))?;
    let mut text = String::with_capacity(left.len() + right.len());
    text.push_str(&left);
    text.push_str(&right);
    Ok(Value::string(&text))
}

fn as_symbol(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let text = expect_text(u, "asSymbol", &arg(&args, 0))?;
    Ok(Value::Symbol(u.symbol(&text)))
}

fn as_string(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    Ok(Value::String(expect_text(u, "asString", &arg(&args, 0))?))
}

/// Length in characters, not bytes.
fn length(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let text = expect_text(u, "length", &arg(&args, 0))?;
    Ok(Value::Integer(text.chars().count() as i64))
}

/// Strings compare by content, symbols by identity. A string never equals
/// a symbol.
fn equals(_: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let equal = match (arg(&args, 0), arg(&args, 1)) {
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Symbol(l), Value::Symbol(r)) => l == r,
        _ => false,
    };
    Ok(Value::Boolean(equal))
}

/// Characters `from` to `to`, both 1-based and inclusive.
fn substring(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let text = expect_text(u, "primSubstringFrom:to:", &arg(&args, 0))?;
    let start = expect_integer(u, "primSubstringFrom:to:", &arg(&args, 1))? - 1;
    let end = expect_integer(u, "primSubstringFrom:to:", &arg(&args, 2))?;
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as i64;
    if start < 0 || start >= len || end > len || end < start {
        return Ok(Value::string("Error - index out of bounds"));
    }
    let slice: String = chars[start as usize..end as usize].iter().collect();
    Ok(Value::string(&slice))
}

/// `h = 31 * h + c` over UTF-16 code units, wrapped to 32 bits.
fn string_hash(text: &str) -> i64 {
    let hash = text
        .encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c)));
    i64::from(hash)
}

fn hashcode(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    let text = expect_text(u, "hashcode", &arg(&args, 0))?;
    Ok(Value::Integer(string_hash(&text)))
}

fn all_chars(u: &Universe, selector: &str, args: &[Value], test: fn(char) -> bool) -> Exec<Value> {
    let text = expect_text(u, selector, &arg(args, 0))?;
    Ok(Value::Boolean(!text.is_empty() && text.chars().all(test)))
}

fn is_white_space(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    all_chars(u, "isWhiteSpace", &args, char::is_whitespace)
}

fn is_letters(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    all_chars(u, "isLetters", &args, char::is_alphabetic)
}

fn is_digits(u: &Universe, _: Option<&Rc<Frame>>, args: Vec<Value>) -> Exec<Value> {
    all_chars(u, "isDigits", &args, |c| c.is_ascii_digit())
}
