//! Content encoding: turn a function's [`Content`] plus call arguments into a
//! [`RequestBody`].
//!
//! | Content | Encoder |
//! |---------|---------|
//! | `Body` | first converter whose `can_write` accepts the content type; raw bytes and streams bypass converters |
//! | `FormUrlEncoded` | [`form::encode_form`] |
//! | `Multipart` | [`multipart::MultipartContent`] |

pub mod form;
pub mod multipart;

use bytes::Bytes;
use restwire::ir::{BodyBinding, Content, PartBinding, ValueMode};

use crate::converter::ConverterRegistry;
use crate::error::EncodeError;
use crate::request::{BytesContent, RequestBody, StreamContent};
use crate::value::{binding_pairs, ArgValue, Arguments};

pub use form::{encode_form, FORM_URLENCODED};
pub use multipart::{MultipartContent, Part, PartBody};

/// Encode the request content of one call. `None` means the function
/// declares no content at all.
pub fn encode_content(
    content: Option<&Content>,
    args: &Arguments,
    converters: &ConverterRegistry,
) -> Result<Option<RequestBody>, EncodeError> {
    let Some(content) = content else {
        return Ok(None);
    };
    let body = match content {
        Content::Body(binding) => encode_body(binding, args, converters)?,
        Content::FormUrlEncoded { fields } => {
            RequestBody::new(encode_form(&binding_pairs(fields, args)?))
        }
        Content::Multipart { subtype, parts } => {
            let mut encoded = Vec::new();
            for binding in parts {
                encode_part(binding, args, converters, &mut encoded)?;
            }
            RequestBody::new(MultipartContent::new(subtype, encoded))
        }
    };
    Ok(Some(body))
}

fn encode_body(
    binding: &BodyBinding,
    args: &Arguments,
    converters: &ConverterRegistry,
) -> Result<RequestBody, EncodeError> {
    let content_type = Some(binding.content_type.clone());
    let value = args.value(&binding.parameter);
    Ok(match value {
        ArgValue::Null => RequestBody::new(BytesContent::new(content_type, Bytes::new())),
        ArgValue::Stream(source) => RequestBody::new(StreamContent::new(content_type, source.clone())),
        ArgValue::Bytes(bytes) => RequestBody::new(BytesContent::new(content_type, bytes.clone())),
        ArgValue::Str(text) if binding.raw => {
            RequestBody::new(BytesContent::new(content_type, text.clone()))
        }
        other => {
            let payload = convert(other, &binding.parameter, &binding.content_type, converters)?;
            RequestBody::new(BytesContent::new(content_type, payload))
        }
    })
}

fn encode_part(
    binding: &PartBinding,
    args: &Arguments,
    converters: &ConverterRegistry,
    out: &mut Vec<Part>,
) -> Result<(), EncodeError> {
    let parameter = binding.parameter.as_str();
    let value = args.value(parameter);
    match binding.mode {
        ValueMode::Single => {
            if !value.is_null() {
                out.push(part(binding, binding.name.clone(), value, converters)?);
            }
        }
        ValueMode::Iterable => {
            for element in value.elements() {
                if !element.is_null() {
                    out.push(part(binding, binding.name.clone(), element, converters)?);
                }
            }
        }
        ValueMode::Map(map_type) => {
            for (key, element) in value.entries(map_type, parameter)? {
                if !element.is_null() {
                    out.push(part(binding, Some(key.to_string()), element, converters)?);
                }
            }
        }
    }
    Ok(())
}

fn part(
    binding: &PartBinding,
    name: Option<String>,
    value: &ArgValue,
    converters: &ConverterRegistry,
) -> Result<Part, EncodeError> {
    let content_type = Some(binding.content_type.clone());
    let body = match value {
        ArgValue::Stream(source) => PartBody::Stream(source.clone()),
        ArgValue::Bytes(bytes) => PartBody::Bytes(bytes.clone()),
        ArgValue::Str(text) if binding.raw => PartBody::Bytes(Bytes::from(text.clone())),
        other => PartBody::Bytes(convert(
            other,
            &binding.parameter,
            &binding.content_type,
            converters,
        )?),
    };
    Ok(Part::new(name, content_type, body))
}

fn convert(
    value: &ArgValue,
    parameter: &str,
    content_type: &str,
    converters: &ConverterRegistry,
) -> Result<Bytes, EncodeError> {
    let writer = converters
        .writer_for(content_type)
        .ok_or_else(|| EncodeError::NoWriter {
            content_type: content_type.to_string(),
        })?;
    let json = value.to_json(parameter)?;
    Ok(writer.write(&json, content_type)?)
}

#[cfg(test)]
mod tests {
    use restwire::ir::{MapType, ValueBinding};
    use serde_json::json;

    use super::*;

    fn body_binding(content_type: &str, raw: bool) -> Content {
        Content::Body(BodyBinding {
            parameter: "body".into(),
            content_type: content_type.into(),
            raw,
            nullable: true,
        })
    }

    fn bytes_of(body: &RequestBody) -> String {
        String::from_utf8(body.to_bytes().unwrap().to_vec()).unwrap()
    }

    #[test]
    fn no_content_no_body() {
        let out = encode_content(None, &Arguments::new(), &ConverterRegistry::with_defaults()).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn body_through_json() {
        let args = Arguments::new().arg("body", json!({ "id": 1 }));
        let body = encode_content(
            Some(&body_binding("application/json", false)),
            &args,
            &ConverterRegistry::with_defaults(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(bytes_of(&body), r#"{"id":1}"#);
        assert_eq!(body.content_type(), Some("application/json"));
        assert_eq!(body.content_length(), Some(8));
    }

    #[test]
    fn null_body_is_explicitly_empty() {
        let args = Arguments::new().null("body");
        let body = encode_content(
            Some(&body_binding("application/json", false)),
            &args,
            &ConverterRegistry::with_defaults(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(body.content_length(), Some(0));
    }

    #[test]
    fn missing_writer_names_the_type() {
        let args = Arguments::new().arg("body", 1);
        let err = encode_content(
            Some(&body_binding("application/xml", false)),
            &args,
            &ConverterRegistry::with_defaults(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "no converter can write application/xml");
    }

    #[test]
    fn raw_bytes_bypass_converters() {
        let args = Arguments::new().arg("body", Bytes::from_static(b"\x00\x01"));
        let body = encode_content(
            Some(&body_binding("application/octet-stream", true)),
            &args,
            &ConverterRegistry::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(&body.to_bytes().unwrap()[..], b"\x00\x01");
    }

    #[test]
    fn form_skips_nulls_and_keeps_order() {
        let content = Content::FormUrlEncoded {
            fields: vec![
                ValueBinding {
                    name: Some("q".into()),
                    parameter: "query".into(),
                    mode: ValueMode::Single,
                },
                ValueBinding {
                    name: Some("tag".into()),
                    parameter: "tags".into(),
                    mode: ValueMode::Iterable,
                },
                ValueBinding {
                    name: Some("skip".into()),
                    parameter: "nothing".into(),
                    mode: ValueMode::Single,
                },
            ],
        };
        let args = Arguments::new()
            .arg("query", "a b")
            .arg("tags", vec![ArgValue::from("x"), ArgValue::Null, ArgValue::from(2)]);
        let body = encode_content(Some(&content), &args, &ConverterRegistry::default())
            .unwrap()
            .unwrap();
        assert_eq!(bytes_of(&body), "q=a+b&tag=x&tag=2");
        assert_eq!(body.content_type(), Some(FORM_URLENCODED));
    }

    #[test]
    fn multipart_parts_by_mode() {
        let content = Content::Multipart {
            subtype: "form-data".into(),
            parts: vec![
                PartBinding {
                    name: Some("title".into()),
                    parameter: "title".into(),
                    content_type: "text/plain".into(),
                    mode: ValueMode::Single,
                    raw: false,
                },
                PartBinding {
                    name: None,
                    parameter: "extra".into(),
                    content_type: "application/json".into(),
                    mode: ValueMode::Map(MapType::Map),
                    raw: false,
                },
                PartBinding {
                    name: Some("gone".into()),
                    parameter: "gone".into(),
                    content_type: "text/plain".into(),
                    mode: ValueMode::Single,
                    raw: false,
                },
            ],
        };
        let args = Arguments::new()
            .arg("title", "hi")
            .arg("extra", json!({ "meta": { "k": 1 }, "none": null }));
        let body = encode_content(Some(&content), &args, &ConverterRegistry::with_defaults())
            .unwrap()
            .unwrap();
        let written = bytes_of(&body);
        assert!(written.contains("name=\"title\"\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nhi\r\n"));
        assert!(written.contains("name=\"meta\"\r\nContent-Type: application/json\r\nContent-Length: 7\r\n\r\n{\"k\":1}\r\n"));
        assert!(!written.contains("name=\"none\""));
        assert!(!written.contains("name=\"gone\""));
        assert_eq!(body.content_length(), Some(written.len() as u64));
        assert!(body
            .content_type()
            .unwrap()
            .starts_with("multipart/form-data; boundary="));
    }
}
