//! EIP-712 type strings and struct hashing over JSON values.

use std::collections::BTreeSet;

use alloy_primitives::{hex, keccak256, Address, B256, U256};
use serde_json::Value;

use super::Types;
use crate::{Result, SignerError};

/// Builds the type string of `primary`: its own declaration followed by every struct type it
/// references, directly or through arrays, sorted by name.
pub fn encode_type(primary: &str, types: &Types) -> Result<String> {
    if !types.contains_key(primary) {
        return Err(SignerError::invalid_field("primaryType", format!("unknown type `{primary}`")));
    }

    let mut found = BTreeSet::new();
    collect_dependencies(primary, types, &mut found)?;
    found.remove(primary);

    let mut encoded = String::new();
    for name in std::iter::once(primary).chain(found) {
        encoded.push_str(name);
        encoded.push('(');
        if let Some(fields) = types.get(name) {
            for (index, field) in fields.iter().enumerate() {
                if index > 0 {
                    encoded.push(',');
                }
                encoded.push_str(&field.ty);
                encoded.push(' ');
                encoded.push_str(&field.name);
            }
        }
        encoded.push(')');
    }
    Ok(encoded)
}

/// `keccak(encode_type(primary))`.
pub fn type_hash(primary: &str, types: &Types) -> Result<B256> {
    Ok(keccak256(encode_type(primary, types)?))
}

/// `keccak(type_hash ‖ encode_data(value))` for a struct of type `primary`.
pub fn hash_struct(primary: &str, value: &Value, types: &Types) -> Result<B256> {
    hash_struct_at(primary, value, types, primary)
}

pub(super) fn hash_struct_at(ty: &str, value: &Value, types: &Types, path: &str) -> Result<B256> {
    let fields = types
        .get(ty)
        .ok_or_else(|| SignerError::invalid_field(path, format!("unknown type `{ty}`")))?;
    let object =
        value.as_object().ok_or_else(|| SignerError::invalid_field(path, "expected an object"))?;

    if let Some(extra) = object.keys().find(|key| !fields.iter().any(|field| &field.name == *key)) {
        return Err(SignerError::invalid_field(
            format!("{path}.{extra}"),
            format!("not declared in type `{ty}`"),
        ));
    }

    let mut encoded = Vec::with_capacity(32 * (fields.len() + 1));
    encoded.extend_from_slice(type_hash(ty, types)?.as_slice());
    for field in fields {
        let field_path = format!("{path}.{}", field.name);
        let value = object
            .get(&field.name)
            .ok_or_else(|| SignerError::invalid_field(&field_path, "missing value"))?;
        encoded.extend_from_slice(encode_value(&field.ty, value, types, &field_path)?.as_slice());
    }
    Ok(keccak256(encoded))
}

/// Walks the struct types reachable from `ty`. Every field must name a declared struct or an
/// atomic type.
fn collect_dependencies<'a>(
    ty: &'a str,
    types: &'a Types,
    found: &mut BTreeSet<&'a str>,
) -> Result<()> {
    let Some((name, fields)) = types.get_key_value(base_type(ty)) else { return Ok(()) };
    if !found.insert(name.as_str()) {
        return Ok(());
    }
    for field in fields {
        let base = base_type(&field.ty);
        if !types.contains_key(base) && !is_atomic(base) {
            return Err(SignerError::invalid_field(
                format!("types.{name}.{}", field.name),
                format!("unknown type `{base}`"),
            ));
        }
        collect_dependencies(&field.ty, types, found)?;
    }
    Ok(())
}

fn base_type(ty: &str) -> &str {
    ty.find('[').map_or(ty, |open| &ty[..open])
}

fn is_atomic(ty: &str) -> bool {
    match ty {
        "address" | "bool" | "string" | "bytes" => true,
        _ => {
            let fixed_bytes = ty
                .strip_prefix("bytes")
                .and_then(|size| size.parse::<usize>().ok())
                .is_some_and(|size| (1..=32).contains(&size));
            let integer = ty.strip_prefix("uint").or_else(|| ty.strip_prefix("int"));
            fixed_bytes || integer.and_then(parse_bits).is_some()
        }
    }
}

/// Encodes one value as a 32-byte word.
fn encode_value(ty: &str, value: &Value, types: &Types, path: &str) -> Result<B256> {
    let invalid = |reason: String| SignerError::invalid_field(path, reason);

    if let Some(inner) = ty.strip_suffix(']') {
        let open = inner.rfind('[').ok_or_else(|| invalid(format!("malformed array type `{ty}`")))?;
        let (element, length) = (&inner[..open], &inner[open + 1..]);
        let items = value.as_array().ok_or_else(|| invalid("expected an array".into()))?;
        if !length.is_empty() {
            let length: usize =
                length.parse().map_err(|_| invalid(format!("malformed array type `{ty}`")))?;
            if items.len() != length {
                return Err(invalid(format!("expected {length} elements, got {}", items.len())));
            }
        }

        let mut encoded = Vec::with_capacity(32 * items.len());
        for (index, item) in items.iter().enumerate() {
            let item_path = format!("{path}[{index}]");
            encoded.extend_from_slice(encode_value(element, item, types, &item_path)?.as_slice());
        }
        return Ok(keccak256(encoded));
    }

    if types.contains_key(ty) {
        return hash_struct_at(ty, value, types, path);
    }

    match ty {
        "address" => {
            let address: Address = value
                .as_str()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| invalid("expected a 20-byte hex address".into()))?;
            Ok(address.into_word())
        }
        "bool" => {
            let flag = match value {
                Value::Bool(flag) => *flag,
                Value::String(s) if s == "true" => true,
                Value::String(s) if s == "false" => false,
                _ => return Err(invalid("expected a boolean".into())),
            };
            Ok(B256::with_last_byte(flag as u8))
        }
        "string" => {
            let s = value.as_str().ok_or_else(|| invalid("expected a string".into()))?;
            Ok(keccak256(s))
        }
        "bytes" => {
            let bytes = decode_hex(value).ok_or_else(|| invalid("expected hex bytes".into()))?;
            Ok(keccak256(bytes))
        }
        _ => {
            let fixed_size = ty.strip_prefix("bytes").and_then(|size| size.parse::<usize>().ok());
            if let Some(size) = fixed_size {
                if !(1..=32).contains(&size) {
                    return Err(invalid(format!("unknown type `{ty}`")));
                }
                let bytes =
                    decode_hex(value).ok_or_else(|| invalid("expected hex bytes".into()))?;
                if bytes.len() != size {
                    return Err(invalid(format!("expected {size} bytes, got {}", bytes.len())));
                }
                let mut word = B256::ZERO;
                word[..size].copy_from_slice(&bytes);
                return Ok(word);
            }
            if let Some(bits) = ty.strip_prefix("uint").and_then(parse_bits) {
                let (negative, magnitude) =
                    parse_integer(value).ok_or_else(|| invalid("expected an integer".into()))?;
                if negative && !magnitude.is_zero() {
                    return Err(invalid(format!("negative value for `{ty}`")));
                }
                if magnitude.bit_len() > bits {
                    return Err(invalid(format!("value does not fit `{ty}`")));
                }
                return Ok(B256::from(magnitude));
            }
            if let Some(bits) = ty.strip_prefix("int").and_then(parse_bits) {
                let (negative, magnitude) =
                    parse_integer(value).ok_or_else(|| invalid("expected an integer".into()))?;
                let limit = U256::from(1) << (bits - 1);
                let fits = if negative { magnitude <= limit } else { magnitude < limit };
                if !fits {
                    return Err(invalid(format!("value does not fit `{ty}`")));
                }
                let word = if negative { U256::ZERO.wrapping_sub(magnitude) } else { magnitude };
                return Ok(B256::from(word));
            }
            Err(invalid(format!("unknown type `{ty}`")))
        }
    }
}

fn parse_bits(bits: &str) -> Option<usize> {
    let bits: usize = bits.parse().ok()?;
    ((1..=256).contains(&bits) && bits % 8 == 0).then_some(bits)
}

fn decode_hex(value: &Value) -> Option<Vec<u8>> {
    hex::decode(value.as_str()?).ok()
}

/// Parses a JSON number, a decimal string or a `0x` hex string into a sign and a magnitude.
///
/// Strings must hold at least one digit and nothing but digits of their radix.
pub(super) fn parse_integer(value: &Value) -> Option<(bool, U256)> {
    match value {
        Value::Number(number) => {
            if let Some(unsigned) = number.as_u64() {
                Some((false, U256::from(unsigned)))
            } else {
                number.as_i64().map(|signed| (signed < 0, U256::from(signed.unsigned_abs())))
            }
        }
        Value::String(s) => {
            let (negative, digits) = s.strip_prefix('-').map_or((false, s.as_str()), |d| (true, d));
            let hex_digits = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"));
            let (digits, radix) = hex_digits.map_or((digits, 10), |hex_digits| (hex_digits, 16));
            if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
                return None;
            }
            let magnitude = U256::from_str_radix(digits, u64::from(radix)).ok()?;
            Some((negative, magnitude))
        }
        _ => None,
    }
}
