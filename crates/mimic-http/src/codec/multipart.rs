//! Multipart content model, decoding (via multer) and encoding.

use super::decoders::DecodingContext;
use super::encoders::EncoderChain;
use super::{DecodeError, DecodedValue, EncodeError, ResponseContent, MULTIPART_FORMDATA, TEXT_PLAIN};
use base64::Engine;
use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::convert::Infallible;

/// Value held by a multipart part.
#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
    Text(String),
    Bytes(Bytes),
    /// Part decoded into a structured value (JSON, form, nested multipart)
    Decoded { value: Box<DecodedValue>, raw: Bytes },
}

impl PartValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PartValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PartValue::Text(text) => text.as_bytes(),
            PartValue::Bytes(bytes) => bytes,
            PartValue::Decoded { raw, .. } => raw,
        }
    }

    pub fn decoded(&self) -> Option<&DecodedValue> {
        match self {
            PartValue::Decoded { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for PartValue {
    fn from(value: &str) -> Self {
        PartValue::Text(value.to_string())
    }
}

impl From<String> for PartValue {
    fn from(value: String) -> Self {
        PartValue::Text(value)
    }
}

impl From<Vec<u8>> for PartValue {
    fn from(value: Vec<u8>) -> Self {
        PartValue::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for PartValue {
    fn from(value: Bytes) -> Self {
        PartValue::Bytes(value)
    }
}

/// One named part of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartPart {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: String,
    pub transfer_encoding: Option<String>,
    pub value: PartValue,
}

/// Ordered multipart body plus its boundary token.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartContent {
    boundary: String,
    subtype: String,
    parts: Vec<MultipartPart>,
}

impl Default for MultipartContent {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartContent {
    /// Empty `multipart/form-data` content with a random boundary.
    pub fn new() -> Self {
        let boundary: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        Self::with_boundary(boundary)
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            subtype: "form-data".to_string(),
            parts: Vec::new(),
        }
    }

    /// Use `multipart/mixed` (or another subtype) instead of `form-data`.
    pub fn subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = subtype.into();
        self
    }

    /// Text field with `text/plain` content type.
    pub fn field(self, field_name: &str, value: &str) -> Self {
        self.typed_field(field_name, TEXT_PLAIN, value)
    }

    pub fn typed_field(
        self,
        field_name: &str,
        content_type: &str,
        value: impl Into<PartValue>,
    ) -> Self {
        self.with_part(MultipartPart {
            field_name: field_name.to_string(),
            file_name: None,
            content_type: content_type.to_string(),
            transfer_encoding: None,
            value: value.into(),
        })
    }

    pub fn file(
        self,
        field_name: &str,
        file_name: &str,
        content_type: &str,
        value: impl Into<PartValue>,
    ) -> Self {
        self.with_part(MultipartPart {
            field_name: field_name.to_string(),
            file_name: Some(file_name.to_string()),
            content_type: content_type.to_string(),
            transfer_encoding: None,
            value: value.into(),
        })
    }

    /// Add a part; a part with the same field name is replaced in place.
    pub fn with_part(mut self, part: MultipartPart) -> Self {
        match self
            .parts
            .iter_mut()
            .find(|p| p.field_name == part.field_name)
        {
            Some(existing) => *existing = part,
            None => self.parts.push(part),
        }
        self
    }

    /// Append a part without replacing (decoded bodies may repeat names).
    pub fn push(&mut self, part: MultipartPart) {
        self.parts.push(part);
    }

    /// First part with the given field name.
    pub fn get(&self, field_name: &str) -> Option<&MultipartPart> {
        self.parts.iter().find(|p| p.field_name == field_name)
    }

    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// `multipart/<subtype>; boundary=<boundary>`
    pub fn content_type(&self) -> String {
        format!("multipart/{}; boundary={}", self.subtype, self.boundary)
    }
}

struct RawPart {
    field_name: String,
    file_name: Option<String>,
    content_type: String,
    charset: Option<String>,
    transfer_encoding: Option<String>,
    data: Bytes,
}

/// Decode a multipart request body.
///
/// Every part goes back through the decoder chain: form fields (no file
/// name) as `text/plain`, file parts by their own content type. Parts with no
/// registered decoder stay as bytes.
pub(crate) fn decode_multipart(
    body: &[u8],
    ctx: &DecodingContext<'_>,
) -> Result<DecodedValue, DecodeError> {
    let content_type = ctx
        .content_type
        .clone()
        .unwrap_or_else(|| MULTIPART_FORMDATA.to_string());
    let malformed = |reason: String| DecodeError::Malformed {
        content_type: content_type.clone(),
        reason,
    };

    let boundary = multer::parse_boundary(&content_type).map_err(|e| malformed(e.to_string()))?;
    let data = Bytes::copy_from_slice(body);
    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(data) });
    let mut multipart = multer::Multipart::new(stream, boundary.clone());

    // Parts are decoded after the executor returns so nested multipart
    // bodies do not re-enter it.
    let raw_parts = futures::executor::block_on(async {
        let mut parts = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| malformed(e.to_string()))?
        {
            let field_name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field
                .content_type()
                .map(|m| m.to_string())
                .unwrap_or_else(|| TEXT_PLAIN.to_string());
            let charset = field
                .content_type()
                .and_then(|m| m.get_param(mime::CHARSET))
                .map(|c| c.as_str().to_string());
            let transfer_encoding = field
                .headers()
                .get("content-transfer-encoding")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let data = field.bytes().await.map_err(|e| malformed(e.to_string()))?;
            parts.push(RawPart {
                field_name,
                file_name,
                content_type,
                charset,
                transfer_encoding,
                data,
            });
        }
        Ok::<_, DecodeError>(parts)
    })?;

    let mut content = MultipartContent::with_boundary(boundary);
    for part in raw_parts {
        let lookup = match part.file_name {
            Some(_) => part.content_type.as_str(),
            None => TEXT_PLAIN,
        };
        let decoded = ctx
            .chain
            .decode_as(&part.data, lookup, &part.content_type, part.charset)?;
        let value = match decoded {
            DecodedValue::Text(text) => PartValue::Text(text),
            DecodedValue::Bytes(_) => PartValue::Bytes(part.data),
            other => PartValue::Decoded {
                value: Box::new(other),
                raw: part.data,
            },
        };
        content.push(MultipartPart {
            field_name: part.field_name,
            file_name: part.file_name,
            content_type: part.content_type,
            transfer_encoding: part.transfer_encoding,
            value,
        });
    }
    Ok(DecodedValue::Multipart(content))
}

/// Render multipart content. Text parts go through the encoder chain for
/// their content type; byte parts are written as-is, or base64 when the part
/// declares `Content-Transfer-Encoding: base64`.
pub(crate) fn encode_multipart(
    content: &MultipartContent,
    chain: &EncoderChain<'_>,
) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    for part in content.parts() {
        out.extend_from_slice(format!("--{}\r\n", content.boundary()).as_bytes());
        match &part.file_name {
            Some(file_name) => out.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.field_name, file_name
                )
                .as_bytes(),
            ),
            None => out.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n",
                    part.field_name
                )
                .as_bytes(),
            ),
        }
        if let Some(encoding) = &part.transfer_encoding {
            out.extend_from_slice(format!("Content-Transfer-Encoding: {encoding}\r\n").as_bytes());
        }
        out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());

        let raw = match &part.value {
            PartValue::Text(text) => {
                chain.encode(&ResponseContent::Text(text.clone()), &part.content_type)?
            }
            PartValue::Bytes(bytes) | PartValue::Decoded { raw: bytes, .. } => bytes.to_vec(),
        };
        let is_base64 = part
            .transfer_encoding
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case("base64"));
        if is_base64 {
            out.extend_from_slice(
                base64::engine::general_purpose::STANDARD
                    .encode(&raw)
                    .as_bytes(),
            );
        } else {
            out.extend_from_slice(&raw);
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{}--\r\n", content.boundary()).as_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DecoderChain, RequestDecoders, ResponseEncoders};

    fn sample() -> MultipartContent {
        MultipartContent::with_boundary("xyzzy")
            .field("alpha", "one")
            .file("bravo", "bravo.dat", "application/json", r#"{"label":"x"}"#)
            .file("charlie", "c.bin", "application/octet-stream", vec![0u8, 159, 146, 150])
    }

    #[test]
    fn test_builder_replaces_same_field() {
        let content = MultipartContent::with_boundary("b")
            .field("alpha", "one")
            .field("alpha", "two");
        assert_eq!(content.parts().len(), 1);
        assert_eq!(content.get("alpha").unwrap().value, PartValue::from("two"));
        assert_eq!(content.content_type(), "multipart/form-data; boundary=b");
    }

    #[test]
    fn test_encode_then_decode_preserves_parts() {
        let global_encoders = ResponseEncoders::with_defaults();
        let local_encoders = ResponseEncoders::new();
        let chain = EncoderChain::new(&local_encoders, &global_encoders);
        let content = sample();
        let bytes = encode_multipart(&content, &chain).unwrap();

        let global_decoders = RequestDecoders::with_defaults();
        let local_decoders = RequestDecoders::new();
        let decoded = DecoderChain::new(&local_decoders, &global_decoders)
            .decode(&bytes, &content.content_type(), None)
            .unwrap();

        let DecodedValue::Multipart(decoded) = decoded else {
            panic!("expected multipart");
        };
        let alpha = decoded.get("alpha").unwrap();
        assert_eq!(alpha.value, PartValue::from("one"));
        assert_eq!(alpha.file_name, None);

        let bravo = decoded.get("bravo").unwrap();
        assert_eq!(bravo.file_name.as_deref(), Some("bravo.dat"));
        assert_eq!(bravo.content_type, "application/json");
        assert_eq!(
            bravo.value.decoded(),
            Some(&DecodedValue::Json(serde_json::json!({"label": "x"})))
        );
        assert_eq!(bravo.value.as_bytes(), br#"{"label":"x"}"#);

        let charlie = decoded.get("charlie").unwrap();
        assert_eq!(charlie.value, PartValue::Bytes(Bytes::from_static(&[0, 159, 146, 150])));
    }

    #[test]
    fn test_parts_resolve_through_decoder_chain() {
        let body = "--b\r\n\
            Content-Disposition: form-data; name=\"alpha\"\r\n\r\n\
            one\r\n\
            --b\r\n\
            Content-Disposition: form-data; name=\"bravo\"; filename=\"bravo.dat\"\r\n\
            Content-Type: application/json\r\n\r\n\
            {\"label\":\"x\"}\r\n\
            --b\r\n\
            Content-Disposition: form-data; name=\"charlie\"; filename=\"c.png\"\r\n\
            Content-Type: image/png\r\n\r\n\
            PNG\r\n\
            --b--\r\n";

        let global = RequestDecoders::with_defaults();
        let mut local = RequestDecoders::new();
        local.register(
            TEXT_PLAIN,
            crate::codec::decoder(|body, _ctx| {
                Ok(DecodedValue::Text(String::from_utf8_lossy(body).to_uppercase()))
            }),
        );
        let decoded = DecoderChain::new(&local, &global)
            .decode(body.as_bytes(), "multipart/form-data; boundary=b", None)
            .unwrap();
        let DecodedValue::Multipart(content) = decoded else {
            panic!("expected multipart");
        };

        assert_eq!(content.get("alpha").unwrap().value, PartValue::from("ONE"));
        assert_eq!(
            content.get("bravo").unwrap().value.decoded(),
            Some(&DecodedValue::Json(serde_json::json!({"label": "x"})))
        );
        assert_eq!(
            content.get("charlie").unwrap().value,
            PartValue::Bytes(Bytes::from_static(b"PNG"))
        );

        let without_override = DecoderChain::new(&RequestDecoders::new(), &global)
            .decode(body.as_bytes(), "multipart/form-data; boundary=b", None)
            .unwrap();
        let DecodedValue::Multipart(content) = without_override else {
            panic!("expected multipart");
        };
        assert_eq!(content.get("alpha").unwrap().value, PartValue::from("one"));
    }

    #[test]
    fn test_malformed_json_part_fails_decode() {
        let body = "--b\r\n\
            Content-Disposition: form-data; name=\"doc\"; filename=\"d.json\"\r\n\
            Content-Type: application/json\r\n\r\n\
            {not json\r\n\
            --b--\r\n";
        let global = RequestDecoders::with_defaults();
        let local = RequestDecoders::new();
        let result = DecoderChain::new(&local, &global).decode(
            body.as_bytes(),
            "multipart/form-data; boundary=b",
            None,
        );
        assert!(matches!(result, Err(DecodeError::Malformed { .. })));
    }

    #[test]
    fn test_encoded_layout() {
        let global = ResponseEncoders::with_defaults();
        let local = ResponseEncoders::new();
        let chain = EncoderChain::new(&local, &global);
        let content = MultipartContent::with_boundary("B").field("a", "1");
        let text = String::from_utf8(encode_multipart(&content, &chain).unwrap()).unwrap();
        assert_eq!(
            text,
            "--B\r\nContent-Disposition: form-data; name=\"a\"\r\nContent-Type: text/plain\r\n\r\n1\r\n--B--\r\n"
        );
    }

    #[test]
    fn test_base64_transfer_encoding() {
        let global = ResponseEncoders::with_defaults();
        let local = ResponseEncoders::new();
        let chain = EncoderChain::new(&local, &global);
        let content = MultipartContent::with_boundary("B").with_part(MultipartPart {
            field_name: "f".to_string(),
            file_name: Some("f.bin".to_string()),
            content_type: "application/octet-stream".to_string(),
            transfer_encoding: Some("base64".to_string()),
            value: PartValue::from(vec![1u8, 2, 3]),
        });
        let text = String::from_utf8(encode_multipart(&content, &chain).unwrap()).unwrap();
        assert!(text.contains("Content-Transfer-Encoding: base64\r\n"));
        assert!(text.contains("\r\n\r\nAQID\r\n"));
    }

    #[test]
    fn test_missing_boundary_is_malformed() {
        let global = RequestDecoders::with_defaults();
        let local = RequestDecoders::new();
        let result = DecoderChain::new(&local, &global).decode(b"junk", "multipart/form-data", None);
        assert!(matches!(result, Err(DecodeError::Malformed { .. })));
    }

    #[test]
    fn test_random_boundary() {
        let a = MultipartContent::new();
        let b = MultipartContent::new();
        assert_eq!(a.boundary().len(), 24);
        assert_ne!(a.boundary(), b.boundary());
    }
}
