use serde::Serialize;

/// Keeps the last four characters of a card number
pub fn mask_card(card: &str) -> String {
    let chars: Vec<char> = card.chars().collect();
    let len = chars.len();
    if len > 4 {
        "*".repeat(len - 4) + &chars[len - 4..].iter().collect::<String>()
    } else {
        card.to_string()
    }
}

/// Return true if a key name likely holds a card number.
fn is_card_key(key: &str) -> bool {
    let k = key.to_lowercase();
    k == "pan" || k.contains("card") && (k.contains("number") || k.contains("no")) && !is_hash(&k)
}

fn is_hash(key: &str) -> bool {
    key.contains("hash")
}

/// Return true if a key name holds a secret that must never be logged.
fn is_secret_key(key: &str) -> bool {
    let k = key.to_lowercase();
    is_hash(&k) || k.contains("token") && !k.contains("tracking") || k.contains("secret")
}

pub fn secure_serializable(v: impl Serialize) -> serde_json::Value {
    match serde_json::to_value(v) {
        Ok(value) => secure_value(&value),
        Err(e) => serde_json::Value::String(format!("<unserializable: {e}>")),
    }
}

pub fn secure_value(v: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match v {
        Value::Object(map) => {
            let mut new = serde_json::Map::with_capacity(map.len());
            for (k, val) in map {
                let new_val = match val {
                    Value::String(_) | Value::Number(_) if is_secret_key(k) => {
                        Value::String("***".to_string())
                    }
                    Value::String(s) if is_card_key(k) => Value::String(mask_card(s)),
                    Value::Number(n) if is_card_key(k) => Value::String(mask_card(&n.to_string())),
                    _ => secure_value(val),
                };
                new.insert(k.clone(), new_val);
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(secure_value).collect()),
        other => other.clone(),
    }
}
