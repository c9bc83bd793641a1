/// Response body formatting shared by the middleware and the API codec
///
/// Every JSON body the server writes is tab-indented and ends in a newline,
/// so error responses produced before a handler runs look the same as the
/// ones handlers produce.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

/// Serializes `document` as tab-indented JSON with a trailing newline
pub fn to_pretty<T: Serialize + ?Sized>(document: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    document.serialize(&mut ser)?;
    buf.push(b'\n');

    Ok(buf)
}

/// Wraps `payload` in a single-key object and serializes it with [`to_pretty`]
pub fn envelope<T: Serialize + ?Sized>(key: &str, payload: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut wrapped = serde_json::Map::new();
    wrapped.insert(key.to_string(), serde_json::to_value(payload)?);
    to_pretty(&serde_json::Value::Object(wrapped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_is_tab_indented() {
        let body = envelope("error", "nope").unwrap();
        assert_eq!(body, b"{\n\t\"error\": \"nope\"\n}\n");
    }
}
