//! PHP `serialize()` text for plain data
//!
//! Legacy preference blobs hold PHP-serialized arrays. Values are read into
//! `serde_json::Value`: an array whose keys are exactly `0..n` in order
//! becomes a JSON array, any other array becomes an object with its keys
//! rendered as strings. Objects, references and custom serializers are
//! rejected.

use serde_json::{Map, Number, Value as JsonValue};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhpFormatError {
    #[error("unexpected end of input at byte {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("expected '{expected}' at byte {offset}, found '{found}'")]
    Unexpected {
        expected: char,
        found: char,
        offset: usize,
    },

    #[error("unsupported value type '{tag}' at byte {offset}")]
    Unsupported { tag: char, offset: usize },

    #[error("invalid number '{text}' at byte {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("array key at byte {offset} is not an int or string")]
    InvalidKey { offset: usize },

    #[error("string at byte {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("trailing data at byte {offset}")]
    TrailingData { offset: usize },
}

type Result<T> = std::result::Result<T, PhpFormatError>;

/// Parse one serialized value that spans all of `bytes`
pub fn from_bytes(bytes: &[u8]) -> Result<JsonValue> {
    let mut reader = Reader { bytes, offset: 0 };
    let value = reader.value()?;
    if reader.offset != bytes.len() {
        return Err(PhpFormatError::TrailingData {
            offset: reader.offset,
        });
    }
    Ok(value)
}

/// Serialize `value` the way PHP's `serialize()` writes the equivalent array
pub fn to_string(value: &JsonValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

enum ArrayKey {
    Int(i64),
    Str(String),
}

impl<'a> Reader<'a> {
    fn next(&mut self) -> Result<u8> {
        let byte = *self
            .bytes
            .get(self.offset)
            .ok_or(PhpFormatError::UnexpectedEnd {
                offset: self.offset,
            })?;
        self.offset += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        let offset = self.offset;
        let found = self.next()?;
        if found != expected {
            return Err(PhpFormatError::Unexpected {
                expected: expected as char,
                found: found as char,
                offset,
            });
        }
        Ok(())
    }

    /// Bytes up to `end`, consuming the terminator
    fn until(&mut self, end: u8) -> Result<&'a [u8]> {
        let start = self.offset;
        let len = self.bytes[start..]
            .iter()
            .position(|b| *b == end)
            .ok_or(PhpFormatError::UnexpectedEnd {
                offset: self.bytes.len(),
            })?;
        self.offset = start + len + 1;
        Ok(&self.bytes[start..start + len])
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.offset;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(PhpFormatError::UnexpectedEnd {
                offset: self.bytes.len(),
            })?;
        self.offset = end;
        Ok(&self.bytes[start..end])
    }

    fn number<T: std::str::FromStr>(&mut self, end: u8) -> Result<T> {
        let offset = self.offset;
        let raw = self.until(end)?;
        let text = String::from_utf8_lossy(raw);
        text.parse().map_err(|_| PhpFormatError::InvalidNumber {
            text: text.into_owned(),
            offset,
        })
    }

    fn string(&mut self) -> Result<String> {
        let len: usize = self.number(b':')?;
        self.expect(b'"')?;
        let offset = self.offset;
        let raw = self.take(len)?;
        self.expect(b'"')?;
        self.expect(b';')?;
        String::from_utf8(raw.to_vec()).map_err(|_| PhpFormatError::InvalidUtf8 { offset })
    }

    fn value(&mut self) -> Result<JsonValue> {
        let offset = self.offset;
        let tag = self.next()?;
        if tag == b'N' {
            self.expect(b';')?;
            return Ok(JsonValue::Null);
        }
        self.expect(b':')?;
        match tag {
            b'b' => match self.number::<u8>(b';')? {
                0 => Ok(JsonValue::Bool(false)),
                1 => Ok(JsonValue::Bool(true)),
                other => Err(PhpFormatError::InvalidNumber {
                    text: other.to_string(),
                    offset,
                }),
            },
            b'i' => Ok(JsonValue::from(self.number::<i64>(b';')?)),
            // INF and NAN have no JSON form
            b'd' => {
                let float: f64 = self.number(b';')?;
                Ok(Number::from_f64(float).map_or(JsonValue::Null, JsonValue::Number))
            }
            b's' => Ok(JsonValue::String(self.string()?)),
            b'a' => self.array(),
            other => Err(PhpFormatError::Unsupported {
                tag: other as char,
                offset,
            }),
        }
    }

    fn key(&mut self) -> Result<ArrayKey> {
        let offset = self.offset;
        match self.next()? {
            b'i' => {
                self.expect(b':')?;
                Ok(ArrayKey::Int(self.number(b';')?))
            }
            b's' => {
                self.expect(b':')?;
                Ok(ArrayKey::Str(self.string()?))
            }
            _ => Err(PhpFormatError::InvalidKey { offset }),
        }
    }

    fn array(&mut self) -> Result<JsonValue> {
        let len: usize = self.number(b':')?;
        self.expect(b'{')?;

        let mut entries = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            let key = self.key()?;
            let value = self.value()?;
            entries.push((key, value));
        }
        self.expect(b'}')?;

        let is_list = entries
            .iter()
            .enumerate()
            .all(|(i, (key, _))| matches!(key, ArrayKey::Int(k) if *k == i as i64));
        if is_list {
            return Ok(JsonValue::Array(
                entries.into_iter().map(|(_, value)| value).collect(),
            ));
        }

        let mut map = Map::new();
        for (key, value) in entries {
            let key = match key {
                ArrayKey::Int(k) => k.to_string(),
                ArrayKey::Str(s) => s,
            };
            map.insert(key, value);
        }
        Ok(JsonValue::Object(map))
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push_str(&format!("s:{}:\"{}\";", s.len(), s));
}

/// PHP stores numeric string keys as ints
fn write_key(out: &mut String, key: &str) {
    match key.parse::<i64>() {
        Ok(k) if k.to_string() == key => out.push_str(&format!("i:{};", k)),
        _ => write_string(out, key),
    }
}

fn write_value(out: &mut String, value: &JsonValue) {
    match value {
        JsonValue::Null => out.push_str("N;"),
        JsonValue::Bool(b) => out.push_str(if *b { "b:1;" } else { "b:0;" }),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => out.push_str(&format!("i:{};", i)),
            None => out.push_str(&format!("d:{};", n.as_f64().unwrap_or_default())),
        },
        JsonValue::String(s) => write_string(out, s),
        JsonValue::Array(items) => {
            out.push_str(&format!("a:{}:{{", items.len()));
            for (i, item) in items.iter().enumerate() {
                out.push_str(&format!("i:{};", i));
                write_value(out, item);
            }
            out.push('}');
        }
        JsonValue::Object(map) => {
            out.push_str(&format!("a:{}:{{", map.len()));
            for (key, item) in map {
                write_key(out, key);
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_legacy_preference_array() {
        let raw = br#"a:4:{s:9:"site_name";s:4:"Main";s:20:"default_member_group";i:5;s:8:"cp_theme";N;s:15:"save_tmpl_files";a:2:{i:0;s:1:"a";i:1;s:1:"b";}}"#;

        let value = from_bytes(raw).unwrap();
        assert_eq!(
            value,
            json!({
                "site_name": "Main",
                "default_member_group": 5,
                "cp_theme": null,
                "save_tmpl_files": ["a", "b"]
            })
        );
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(from_bytes(b"b:1;").unwrap(), json!(true));
        assert_eq!(from_bytes(b"i:-12;").unwrap(), json!(-12));
        assert_eq!(from_bytes(b"d:0.5;").unwrap(), json!(0.5));
        assert_eq!(from_bytes(b"d:INF;").unwrap(), json!(null));
        assert_eq!(from_bytes(b"a:0:{}").unwrap(), json!([]));
    }

    #[test]
    fn test_string_length_counts_bytes() {
        let raw = "a:1:{s:4:\"name\";s:6:\"Caf\u{e9}s\";}";
        assert_eq!(from_bytes(raw.as_bytes()).unwrap(), json!({"name": "Caf\u{e9}s"}));
    }

    #[test]
    fn test_sparse_int_keys_become_object() {
        let value = from_bytes(br#"a:2:{i:1;s:1:"x";i:5;s:1:"y";}"#).unwrap();
        assert_eq!(value, json!({"1": "x", "5": "y"}));
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(matches!(
            from_bytes(br#"O:8:"stdClass":0:{}"#),
            Err(PhpFormatError::Unsupported { tag: 'O', .. })
        ));
        assert!(matches!(
            from_bytes(br#"s:10:"short";"#),
            Err(PhpFormatError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            from_bytes(b"i:1;i:2;"),
            Err(PhpFormatError::TrailingData { offset: 4 })
        ));
        assert!(matches!(
            from_bytes(b"a:1:{d:1.5;i:1;}"),
            Err(PhpFormatError::InvalidKey { offset: 5 })
        ));
        assert!(from_bytes(b"i:abc;").is_err());
    }

    #[test]
    fn test_write_matches_php_serialize() {
        let value = json!({"b": "2", "a": 1, "7": true, "list": ["x"], "none": null});
        assert_eq!(
            to_string(&value),
            r#"a:5:{i:7;b:1;s:1:"a";i:1;s:1:"b";s:1:"2";s:4:"list";a:1:{i:0;s:1:"x";}s:4:"none";N;}"#
        );
        assert_eq!(from_bytes(to_string(&value).as_bytes()).unwrap(), value);
    }
}
