//! Format strings, literal parsing, and human-readable rendering.
//!
//! A format string like `#16d+16d:16d` declares how a function's input and
//! output bit-vectors decompose into displayable fields. Parsing happens at
//! compile time; rendering at run time. The helpers here are stateless.

use num_bigint::BigUint;

use crate::bits::Bits;
use crate::error::CompileErrorKind;
use crate::program::{Format, FormatPiece, Radix};

/// The implicit format of a function declared without one: a single hex
/// field per side.
pub(crate) fn default_format(len_in: u32, len_out: u32) -> Format {
    Format {
        input: vec![FormatPiece {
            width: len_in,
            radix: Radix::Hex,
        }],
        output: vec![FormatPiece {
            width: len_out,
            radix: Radix::Hex,
        }],
    }
}

/// Parse and validate `#<in_spec>:<out_spec>` against the declared widths.
pub(crate) fn parse_format(
    text: &str,
    len_in: u32,
    len_out: u32,
) -> Result<Format, CompileErrorKind> {
    let bad = || CompileErrorKind::BadFormat {
        token: text.to_string(),
    };
    let rest = text.strip_prefix('#').ok_or_else(bad)?;
    let mut sides = rest.split(':');
    let (in_spec, out_spec) = match (sides.next(), sides.next(), sides.next()) {
        (Some(i), Some(o), None) => (i, o),
        _ => return Err(bad()),
    };
    Ok(Format {
        input: parse_spec(in_spec, len_in, text)?,
        output: parse_spec(out_spec, len_out, text)?,
    })
}

fn parse_spec(
    spec: &str,
    declared: u32,
    whole: &str,
) -> Result<Vec<FormatPiece>, CompileErrorKind> {
    let bad = || CompileErrorKind::BadFormat {
        token: whole.to_string(),
    };
    let mut pieces = Vec::new();
    for part in spec.split('+') {
        if part.len() < 2 || !part.is_ascii() {
            return Err(bad());
        }
        let (digits, letter) = part.split_at(part.len() - 1);
        let radix = letter
            .chars()
            .next()
            .and_then(Radix::from_letter)
            .ok_or_else(bad)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        let width: u32 = digits.parse().map_err(|_| bad())?;
        pieces.push(FormatPiece { width, radix });
    }
    // A width-0 piece only makes sense as the sole field of a side with no
    // bits at all (`#0d:...` on a zero-input function).
    let sum: u32 = pieces.iter().map(|p| p.width).sum();
    if pieces.iter().any(|p| p.width == 0) && !(pieces.len() == 1 && declared == 0) {
        return Err(CompileErrorKind::ZeroPieceWidth);
    }
    if sum != declared {
        return Err(CompileErrorKind::FormatLenMismatch { declared, sum });
    }
    Ok(pieces)
}

/// Parse a constant token of the form `<digits>[#<radix>]` (radix defaults
/// to decimal).
pub(crate) fn parse_constant(text: &str) -> Result<BigUint, CompileErrorKind> {
    let bad = || CompileErrorKind::BadConstant {
        token: text.to_string(),
    };
    let (digits, radix) = match text.split_once('#') {
        None => (text, Radix::Dec),
        Some((digits, suffix)) => {
            let mut chars = suffix.chars();
            let radix = match (chars.next().and_then(Radix::from_letter), chars.next()) {
                (Some(radix), None) => radix,
                _ => {
                    return Err(CompileErrorKind::BadRadix {
                        radix: suffix.to_string(),
                    });
                }
            };
            (digits, radix)
        }
    };
    if digits.is_empty() {
        return Err(bad());
    }
    BigUint::parse_bytes(digits.as_bytes(), radix.base()).ok_or_else(bad)
}

/// Parse a command-line style literal: decimal, `0x…` hex, or `0b…`
/// binary. This is the inverse of [`render_piece`] for every radix.
pub fn parse_literal(text: &str) -> Option<BigUint> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return BigUint::parse_bytes(hex.as_bytes(), 16);
    }
    if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        return BigUint::parse_bytes(bin.as_bytes(), 2);
    }
    BigUint::parse_bytes(text.as_bytes(), 10)
}

/// Render one field. Binary is zero-padded to the piece width; hex is
/// zero-padded to `width/4` digits when the width is a whole number of
/// nibbles.
pub fn render_piece(bits: &Bits, piece: &FormatPiece) -> String {
    let value = bits.to_uint();
    match piece.radix {
        Radix::Dec => value.to_str_radix(10),
        Radix::Bin => {
            let digits = value.to_str_radix(2);
            format!("0b{:0>width$}", digits, width = piece.width as usize)
        }
        Radix::Hex => {
            let digits = value.to_str_radix(16);
            if piece.width % 4 == 0 && piece.width > 0 {
                format!("0x{:0>width$}", digits, width = (piece.width / 4) as usize)
            } else {
                format!("0x{digits}")
            }
        }
    }
}

/// Split a flat bit-vector into consecutive fields and render each,
/// joined with `delim`. Zero-width fields are skipped.
pub fn render_fields(bits: &Bits, pieces: &[FormatPiece], delim: &str) -> String {
    let mut parts = Vec::with_capacity(pieces.len());
    let mut offset = 0u32;
    for piece in pieces {
        if piece.width == 0 {
            continue;
        }
        let field = bits.slice(offset, piece.width);
        parts.push(render_piece(&field, piece));
        offset += piece.width;
    }
    parts.join(delim)
}
