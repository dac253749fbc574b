//! SCALE value decoding helpers.

use subxt::ext::scale_value::{At, Composite, Primitive, Value, ValueDef};

use furnace_core::models::AccountId;

// =============================================================================
// SCALE Value to JSON conversion
// =============================================================================

/// Convert a Composite to a JSON value.
pub fn composite_to_json<T>(composite: &Composite<T>) -> serde_json::Value {
    match composite {
        Composite::Unnamed(values) => {
            // Check if this looks like a byte array (e.g., AccountId, Hash)
            if let Some(hex_str) = try_as_byte_array(values) {
                return serde_json::Value::String(hex_str);
            }
            // Unwrap single-element tuples (common for newtype wrappers like AccountId)
            if values.len() == 1 {
                return value_to_json(&values[0]);
            }
            serde_json::Value::Array(values.iter().map(value_to_json).collect())
        }
        Composite::Named(fields) => {
            let obj: serde_json::Map<String, serde_json::Value> = fields
                .iter()
                .map(|(name, v)| (name.clone(), value_to_json(v)))
                .collect();
            serde_json::Value::Object(obj)
        }
    }
}

/// Try to interpret an unnamed composite as a 32-byte account or hash.
fn try_as_byte_array<T>(values: &[Value<T>]) -> Option<String> {
    if values.len() != 32 {
        return None;
    }
    let bytes = values_to_bytes(values.iter())?;
    Some(format!("0x{}", hex::encode(bytes)))
}

/// Convert a Value to a JSON value.
fn value_to_json<T>(value: &Value<T>) -> serde_json::Value {
    match &value.value {
        ValueDef::Composite(composite) => composite_to_json(composite),
        ValueDef::Variant(variant) => {
            let inner = composite_to_json(&variant.values);
            match variant.name.as_str() {
                "None" => serde_json::Value::Null,
                // Option and MultiAddress wrappers carry their payload as is
                "Some" | "Id" => inner,
                name => {
                    let mut map = serde_json::Map::new();
                    map.insert(name.to_string(), inner);
                    serde_json::Value::Object(map)
                }
            }
        }
        ValueDef::Primitive(primitive) => primitive_to_json(primitive),
        ValueDef::BitSequence(bits) => serde_json::Value::String(format!("{:?}", bits)),
    }
}

/// Convert a Primitive to a JSON value.
///
/// Integers become strings: balances do not fit JSON numbers.
fn primitive_to_json(primitive: &Primitive) -> serde_json::Value {
    match primitive {
        Primitive::Bool(b) => serde_json::Value::Bool(*b),
        Primitive::Char(c) => serde_json::Value::String(c.to_string()),
        Primitive::String(s) => serde_json::Value::String(s.clone()),
        Primitive::U128(n) => serde_json::Value::String(n.to_string()),
        Primitive::I128(n) => serde_json::Value::String(n.to_string()),
        Primitive::U256(n) => serde_json::Value::String(format!("{:?}", n)),
        Primitive::I256(n) => serde_json::Value::String(format!("{:?}", n)),
    }
}

/// Whether a partly undecodable call of `pallet` must fail the block.
///
/// `Balances` calls may be transfers into the treasury and are never
/// dropped silently. Other calls keep `unknown` names and `Null` args.
pub fn undecodable_call_is_fatal(pallet: &str) -> bool {
    pallet == "Balances"
}

// =============================================================================
// Storage values
// =============================================================================

/// Read a byte vector (e.g. `Vec<u8>` or `BoundedVec<u8, _>`) from a value.
pub fn value_to_bytes<T>(value: &Value<T>) -> Option<Vec<u8>> {
    match &value.value {
        ValueDef::Composite(composite) => match composite {
            // BoundedVec is a newtype around the inner Vec
            Composite::Unnamed(values)
                if values.len() == 1 && matches!(values[0].value, ValueDef::Composite(_)) =>
            {
                value_to_bytes(&values[0])
            }
            _ => values_to_bytes(composite.values()),
        },
        ValueDef::Primitive(Primitive::String(s)) => Some(s.as_bytes().to_vec()),
        _ => None,
    }
}

fn values_to_bytes<'a, T: 'a>(values: impl Iterator<Item = &'a Value<T>>) -> Option<Vec<u8>> {
    values
        .map(|v| v.as_u128().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

/// Free balance from a `System.Account` value (`AccountInfo.data.free`).
pub fn free_balance<T>(account_info: &Value<T>) -> Option<u128> {
    account_info.at("data").at("free").and_then(|v| v.as_u128())
}

/// Token decimals from `system_properties`. Multi-token chains report an
/// array; the native token comes first.
pub fn token_decimals(properties: &serde_json::Map<String, serde_json::Value>) -> Option<u8> {
    let value = properties.get("tokenDecimals")?;
    let decimals = match value {
        serde_json::Value::Array(arr) => arr.first()?.as_u64()?,
        other => other.as_u64()?,
    };
    u8::try_from(decimals).ok()
}

/// Signer account from extrinsic address bytes.
///
/// Accepts a raw `AccountId32` or a `MultiAddress::Id` (variant index 0
/// followed by the account).
pub fn signer_from_address(bytes: &[u8]) -> Option<AccountId> {
    let raw = match bytes.len() {
        32 => bytes,
        33 if bytes[0] == 0 => &bytes[1..],
        _ => return None,
    };
    let arr: [u8; 32] = raw.try_into().ok()?;
    Some(AccountId(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes_value(bytes: &[u8]) -> Value<()> {
        Value::unnamed_composite(bytes.iter().map(|b| Value::u128(*b as u128)))
    }

    // Test critique: les arguments d'un transfert deviennent un JSON exploitable
    #[test]
    fn transfer_args_to_json() {
        let args: Composite<()> = Composite::named([
            ("dest", Value::unnamed_variant("Id", [bytes_value(&[0xab; 32])])),
            ("value", Value::u128(500)),
        ]);
        let json = composite_to_json(&args);
        assert_eq!(
            json,
            json!({ "dest": format!("0x{}", "ab".repeat(32)), "value": "500" })
        );
    }

    // Test critique: un transfert indécodable n'est jamais ignoré
    #[test]
    fn undecodable_transfer_args_have_no_fallback() {
        assert!(undecodable_call_is_fatal("Balances"));
        assert!(!undecodable_call_is_fatal("Timestamp"));
        assert!(!undecodable_call_is_fatal("Memo"));
    }

    #[test]
    fn option_variants_are_flattened() {
        let none: Value<()> = Value::unnamed_variant("None", []);
        assert_eq!(value_to_json(&none), serde_json::Value::Null);

        let some: Value<()> = Value::unnamed_variant("Some", [Value::u128(3)]);
        assert_eq!(value_to_json(&some), json!("3"));

        let other: Value<()> = Value::unnamed_variant("Raw", [Value::bool(true)]);
        assert_eq!(value_to_json(&other), json!({ "Raw": true }));
    }

    #[test]
    fn memo_bytes_are_read() {
        let memo = bytes_value(b"pay me");
        assert_eq!(value_to_bytes(&memo).unwrap(), b"pay me".to_vec());

        // BoundedVec(Vec<u8>)
        let bounded: Value<()> = Value::unnamed_composite([bytes_value(b"hi")]);
        assert_eq!(value_to_bytes(&bounded).unwrap(), b"hi".to_vec());

        assert!(value_to_bytes(&Value::u128(1)).is_none());
        assert!(value_to_bytes(&Value::unnamed_composite([Value::u128(300)])).is_none());
    }

    #[test]
    fn free_balance_from_account_info() {
        let info: Value<()> = Value::named_composite([
            ("nonce", Value::u128(1)),
            (
                "data",
                Value::named_composite([
                    ("free", Value::u128(1_000)),
                    ("reserved", Value::u128(5)),
                ]),
            ),
        ]);
        assert_eq!(free_balance(&info), Some(1_000));
        assert_eq!(free_balance(&Value::<()>::u128(1)), None);
    }

    #[test]
    fn decimals_from_properties() {
        let props = json!({ "tokenDecimals": 10, "tokenSymbol": "JOY" });
        assert_eq!(token_decimals(props.as_object().unwrap()), Some(10));

        let props = json!({ "tokenDecimals": [12, 18] });
        assert_eq!(token_decimals(props.as_object().unwrap()), Some(12));

        let props = json!({ "ss58Format": 126 });
        assert_eq!(token_decimals(props.as_object().unwrap()), None);
    }

    #[test]
    fn signer_from_raw_or_multiaddress() {
        let raw = [7u8; 32];
        assert_eq!(signer_from_address(&raw), Some(AccountId(raw)));

        let mut multi = vec![0u8];
        multi.extend_from_slice(&raw);
        assert_eq!(signer_from_address(&multi), Some(AccountId(raw)));

        // MultiAddress::Index ou longueur inattendue
        multi[0] = 1;
        assert_eq!(signer_from_address(&multi), None);
        assert_eq!(signer_from_address(&[1u8; 20]), None);
    }
}
