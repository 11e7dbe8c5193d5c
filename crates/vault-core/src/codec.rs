//! Secret codec
//!
//! Validation boundary between caller field maps and `SecretPayload`.
//! Caller mistakes surface as `InvalidSecretShape`; anything wrong with a
//! payload on the way back out is `CorruptSecret`.

use std::collections::BTreeMap;

use common::SecretPayload;
use errors::{VaultError, VaultResult};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Validate a caller field map and turn it into a payload
pub fn encode(fields: BTreeMap<String, String>) -> VaultResult<SecretPayload> {
    SecretPayload::new(fields).map_err(|e| VaultError::invalid_shape(e.to_string()))
}

/// Inverse of [`encode`]
pub fn decode(payload: &SecretPayload) -> VaultResult<BTreeMap<String, String>> {
    if payload.is_empty() {
        return Err(VaultError::corrupt("payload has no fields"));
    }
    if payload.fields().keys().any(String::is_empty) {
        return Err(VaultError::corrupt("payload has an empty field name"));
    }
    Ok(payload.fields().clone())
}

/// Encode a typed bundle that serializes to a flat object of strings
pub fn encode_from<T: Serialize>(value: &T) -> VaultResult<SecretPayload> {
    let object = match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(object)) => object,
        Ok(other) => {
            return Err(VaultError::invalid_shape(format!(
                "expected an object of fields, got {}",
                json_kind(&other)
            )));
        }
        Err(e) => return Err(VaultError::invalid_shape(e.to_string())),
    };

    let mut fields = BTreeMap::new();
    for (key, value) in object {
        match value {
            serde_json::Value::String(s) => {
                fields.insert(key, s);
            }
            // Optional fields that are unset are simply not stored.
            serde_json::Value::Null => {}
            other => {
                return Err(VaultError::invalid_shape(format!(
                    "field '{}' must be a string, got {}",
                    key,
                    json_kind(&other)
                )));
            }
        }
    }
    encode(fields)
}

/// Decode a payload into a typed bundle; missing required fields are corrupt
pub fn decode_as<T: DeserializeOwned>(payload: &SecretPayload) -> VaultResult<T> {
    from_fields(decode(payload)?)
}

/// Convert already decoded fields into a typed bundle
pub fn from_fields<T: DeserializeOwned>(fields: BTreeMap<String, String>) -> VaultResult<T> {
    let object = fields
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect::<serde_json::Map<_, _>>();

    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| VaultError::corrupt(format!("payload does not match expected shape: {}", e)))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_round_trip() {
        let samples = [
            map(&[("username", "sf_user"), ("password", "sf_pass"), ("account", "sf_account")]),
            map(&[("token", "")]),
            map(&[("ключ", "значение"), ("a b", "c/d")]),
        ];
        for fields in samples {
            let payload = encode(fields.clone()).unwrap();
            assert_eq!(decode(&payload).unwrap(), fields);
        }
    }

    #[test]
    fn test_decoded_fields_keep_payload_order() {
        let payload = encode(map(&[("username", "u"), ("account", "a"), ("password", "p")])).unwrap();
        let decoded = decode(&payload).unwrap();

        let keys: Vec<_> = decoded.keys().map(String::as_str).collect();
        assert_eq!(keys, ["account", "password", "username"]);
        assert!(decoded.iter().eq(payload.fields().iter()));
    }

    #[test]
    fn test_encode_rejects_bad_shapes() {
        assert!(matches!(
            encode(BTreeMap::new()),
            Err(VaultError::InvalidSecretShape(_))
        ));
        assert!(matches!(
            encode(map(&[("", "value")])),
            Err(VaultError::InvalidSecretShape(_))
        ));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Bundle {
        username: String,
        account: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<String>,
    }

    #[test]
    fn test_typed_round_trip() {
        let bundle = Bundle {
            username: "sf_user".to_string(),
            account: "sf_account".to_string(),
            role: None,
        };
        let payload = encode_from(&bundle).unwrap();
        assert_eq!(payload.len(), 2);
        assert_eq!(decode_as::<Bundle>(&payload).unwrap(), bundle);
    }

    #[test]
    fn test_decode_as_missing_field_is_corrupt() {
        let payload = encode(map(&[("username", "sf_user")])).unwrap();
        assert!(matches!(
            decode_as::<Bundle>(&payload),
            Err(VaultError::CorruptSecret(_))
        ));
    }

    #[test]
    fn test_encode_from_rejects_non_string_fields() {
        #[derive(Serialize)]
        struct WithPort {
            host: String,
            port: u16,
        }
        let err = encode_from(&WithPort {
            host: "db".to_string(),
            port: 5432,
        })
        .unwrap_err();
        assert!(matches!(err, VaultError::InvalidSecretShape(ref m) if m.contains("port")));

        assert!(matches!(
            encode_from(&"just a string"),
            Err(VaultError::InvalidSecretShape(_))
        ));
    }
}
