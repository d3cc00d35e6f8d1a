//! Decoding of elaboration-model constants
//!
//! The elaborator reports every constant together with a format tag and,
//! for integers, a bit size. This module turns those into [`Value`]s.

use crate::ast::{Ast, AstNode, Constant, NodeId, NodeKind, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiteralError {
    #[error("Invalid digit '{digit}' in base-{base} literal '{text}'")]
    InvalidDigit { text: String, digit: char, base: u32 },
    #[error("Four-state digits are not supported in constant '{0}'")]
    FourState(String),
    #[error("Constant '{0}' does not fit in 64 bits")]
    Overflow(String),
    #[error("Malformed literal '{0}'")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, LiteralError>;

/// A constant as reported by the elaborator, tagged with its format
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Single scalar bit
    Scalar(u8),
    Binary(String),
    Decimal(String),
    Hex(String),
    Octal(String),
    Int(i64),
    UInt(u64),
    Real(f64),
    Str(String),
}

impl Literal {
    fn base(&self) -> Option<u32> {
        match self {
            Literal::Binary(_) => Some(2),
            Literal::Octal(_) => Some(8),
            Literal::Decimal(_) => Some(10),
            Literal::Hex(_) => Some(16),
            _ => None,
        }
    }
}

/// Decode a literal of the given bit size (0 when the elaborator gave none)
pub fn decode(literal: &Literal, size: u32) -> Result<Value> {
    match literal {
        Literal::Scalar(bit) => Ok(Value::Int(Constant {
            value: i64::from(*bit & 1),
            width: 1,
            signed: false,
            is_unsized: false,
        })),
        // The elaborator reports ints as 64-bit, while `int` is 32 bits wide
        Literal::Int(v) => Ok(Value::Int(sized_int(*v, size))),
        Literal::UInt(v) => {
            let v = i64::try_from(*v).map_err(|_| LiteralError::Overflow(v.to_string()))?;
            Ok(Value::Int(sized_int(v, size)))
        }
        Literal::Real(v) => Ok(Value::Real(*v)),
        Literal::Str(s) => Ok(Value::Str(s.clone())),
        Literal::Binary(text) | Literal::Decimal(text) | Literal::Hex(text) | Literal::Octal(text) => {
            if text.contains('\'') {
                return parse_based(text).map(Value::Int);
            }
            let base = literal.base().unwrap_or(10);
            let raw = parse_digits(text, base)?;
            if size == 0 {
                Ok(Value::Int(Constant {
                    value: to_i64(raw, text)?,
                    width: 32,
                    signed: true,
                    is_unsized: true,
                }))
            } else {
                Ok(Value::Int(Constant {
                    value: truncate(raw, size, false, text)?,
                    width: size,
                    signed: false,
                    is_unsized: false,
                }))
            }
        }
    }
}

fn sized_int(value: i64, size: u32) -> Constant {
    let (width, is_unsized) = match size {
        0 => (32, true),
        64 => (32, false),
        n => (n, false),
    };
    Constant {
        value,
        width,
        signed: true,
        is_unsized,
    }
}

/// Parse `<size>'[s]<base><digits>`, e.g. `8'hff`, `'b1010`, `4'sd3`
fn parse_based(text: &str) -> Result<Constant> {
    let (size_str, rest) = text
        .split_once('\'')
        .ok_or_else(|| LiteralError::Malformed(text.to_string()))?;
    let size_str = size_str.trim();
    let width = if size_str.is_empty() {
        None
    } else {
        Some(
            size_str
                .parse::<u32>()
                .map_err(|_| LiteralError::Malformed(text.to_string()))?,
        )
    };

    let mut chars = rest.chars();
    let mut signed = false;
    let mut base_char = chars
        .next()
        .ok_or_else(|| LiteralError::Malformed(text.to_string()))?;
    if base_char == 's' || base_char == 'S' {
        signed = true;
        base_char = chars
            .next()
            .ok_or_else(|| LiteralError::Malformed(text.to_string()))?;
    }
    let base = match base_char.to_ascii_lowercase() {
        'b' => 2,
        'o' => 8,
        'd' => 10,
        'h' => 16,
        _ => return Err(LiteralError::Malformed(text.to_string())),
    };
    let raw = parse_digits(chars.as_str(), base)?;

    Ok(match width {
        Some(width) => Constant {
            value: truncate(raw, width, signed, text)?,
            width,
            signed,
            is_unsized: false,
        },
        None => Constant {
            value: to_i64(raw, text)?,
            width: 32,
            signed,
            is_unsized: true,
        },
    })
}

fn parse_digits(text: &str, base: u32) -> Result<u64> {
    let digits: String = text.trim().chars().filter(|&c| c != '_').collect();
    if digits.is_empty() {
        return Err(LiteralError::Malformed(text.to_string()));
    }
    let mut value: u64 = 0;
    for c in digits.chars() {
        if matches!(c.to_ascii_lowercase(), 'x' | 'z' | '?') {
            return Err(LiteralError::FourState(text.to_string()));
        }
        let digit = c.to_digit(base).ok_or_else(|| LiteralError::InvalidDigit {
            text: text.to_string(),
            digit: c,
            base,
        })?;
        value = value
            .checked_mul(u64::from(base))
            .and_then(|v| v.checked_add(u64::from(digit)))
            .ok_or_else(|| LiteralError::Overflow(text.to_string()))?;
    }
    Ok(value)
}

fn to_i64(raw: u64, text: &str) -> Result<i64> {
    i64::try_from(raw).map_err(|_| LiteralError::Overflow(text.to_string()))
}

/// Keep the low `width` bits, sign-extending signed values
///
/// A signed 64-bit literal keeps its two's complement pattern; an unsigned
/// one above `i64::MAX` is an overflow.
fn truncate(raw: u64, width: u32, signed: bool, text: &str) -> Result<i64> {
    if width == 0 || width >= 64 {
        return if signed { Ok(raw as i64) } else { to_i64(raw, text) };
    }
    let mask = (1u64 << width) - 1;
    let bits = raw & mask;
    if signed && (bits >> (width - 1)) & 1 == 1 {
        Ok((bits | !mask) as i64)
    } else {
        Ok(bits as i64)
    }
}

impl Ast {
    /// Allocate a `Constant` node for an elaboration-model literal
    pub fn literal(&mut self, literal: &Literal, size: u32) -> Result<NodeId> {
        let mut node = AstNode::new(NodeKind::Constant);
        node.value = Some(decode(literal, size)?);
        Ok(self.alloc(node))
    }
}
