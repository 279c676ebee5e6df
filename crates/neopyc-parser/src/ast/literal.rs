//! Decoding of literal tokens into values.

use num_bigint::BigInt;

/// A decoded string-like literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringValue {
    Str(String),
    Bytes(Vec<u8>),
}

/// A decoded integer literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntValue {
    Small(i128),
    /// Too large for `i128`; the VM takes integers of any width.
    Big(BigInt),
}

/// Parse an integer literal lexeme: decimal, `0x`, `0o` or `0b`, with
/// optional `_` separators.
pub fn parse_int(lexeme: &str) -> Result<IntValue, String> {
    let digits: String = lexeme.chars().filter(|c| *c != '_').collect();
    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else {
        if lower.len() > 1 && lower.starts_with('0') && lower.chars().any(|c| c != '0') {
            return Err(format!("leading zeros are not permitted in '{lexeme}'"));
        }
        (10, lower.as_str())
    };

    if body.is_empty() {
        return Err(format!("invalid integer literal '{lexeme}'"));
    }

    match i128::from_str_radix(body, radix) {
        Ok(value) => Ok(IntValue::Small(value)),
        // Overflow: fall back to BigInt
        Err(err) if *err.kind() == std::num::IntErrorKind::PosOverflow => {
            BigInt::parse_bytes(body.as_bytes(), radix)
                .map(IntValue::Big)
                .ok_or_else(|| format!("invalid integer literal '{lexeme}'"))
        }
        Err(_) => Err(format!("invalid integer literal '{lexeme}'")),
    }
}

/// Decode a string or bytes literal lexeme, including its prefix and quotes.
pub fn decode_string(lexeme: &str) -> Result<StringValue, String> {
    let quote_at = lexeme
        .find(['\'', '"'])
        .ok_or_else(|| format!("malformed string literal {lexeme}"))?;
    let prefix = lexeme[..quote_at].to_ascii_lowercase();
    let quoted = &lexeme[quote_at..];

    let quote = &quoted[..1];
    let triple = quoted.len() >= 6 && quoted.starts_with(&quote.repeat(3));
    let delimiter = if triple { 3 } else { 1 };
    if quoted.len() < delimiter * 2 {
        return Err(format!("malformed string literal {lexeme}"));
    }
    let body = &quoted[delimiter..quoted.len() - delimiter];

    let raw = prefix.contains('r');
    let bytes = prefix.contains('b');

    if bytes {
        if !body.is_ascii() {
            return Err("bytes can only contain ASCII literal characters".to_string());
        }
        let decoded = if raw {
            body.as_bytes().to_vec()
        } else {
            unescape_bytes(body)?
        };
        return Ok(StringValue::Bytes(decoded));
    }

    if raw {
        return Ok(StringValue::Str(body.to_string()));
    }
    let decoded = unescape_bytes(body)?;
    String::from_utf8(decoded)
        .map(StringValue::Str)
        .map_err(|_| "string literal is not valid UTF-8".to_string())
}

/// Resolve backslash escapes. The result is UTF-8 for `str` bodies because
/// non-ASCII characters pass through unchanged and `\u` escapes are encoded.
fn unescape_bytes(body: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let Some(escape) = chars.next() else {
            out.push(b'\\');
            break;
        };
        match escape {
            '\n' => {}
            '\\' => out.push(b'\\'),
            '\'' => out.push(b'\''),
            '"' => out.push(b'"'),
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                let value = u8::from_str_radix(&hex, 16)
                    .map_err(|_| format!("invalid \\x escape '\\x{hex}'"))?;
                out.push(value);
            }
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid \\u escape '\\u{hex}'"))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(code.encode_utf8(&mut buf).as_bytes());
            }
            '0'..='7' => {
                let mut value = escape.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            other => {
                out.push(b'\\');
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    Ok(out)
}
