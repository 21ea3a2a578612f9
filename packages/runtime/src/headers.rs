//! Header encoding.
//!
//! Static headers were checked when the service was validated. Values that
//! arrive at call time are checked here with the same grammar, so an
//! argument cannot smuggle a line break into the request head.

use restwire::http_syntax::{check_header_name, check_header_value, is_content_header};
use restwire::ir::Header;

use crate::error::EncodeError;
use crate::value::Arguments;

/// Expand header bindings into ordered `(name, value)` lines. Null values
/// and null elements emit nothing.
pub fn encode_headers(
    headers: &[Header],
    args: &Arguments,
) -> Result<Vec<(String, String)>, EncodeError> {
    let mut out = Vec::new();
    for header in headers {
        match header {
            Header::Static { name, value } => out.push((name.clone(), value.clone())),
            Header::Single {
                name,
                parameter,
                iterable,
            } => {
                let value = args.value(parameter);
                let values = if *iterable {
                    value.elements()
                } else {
                    vec![value]
                };
                for v in values {
                    if let Some(text) = v.to_text(parameter)? {
                        push_checked(&mut out, name, text)?;
                    }
                }
            }
            Header::Map {
                parameter,
                map_type,
            } => {
                for (name, v) in args.value(parameter).entries(*map_type, parameter)? {
                    if is_content_header(name) {
                        return Err(EncodeError::ContentHeader(name.to_string()));
                    }
                    check_header_name(name).map_err(|reason| EncodeError::InvalidHeaderName {
                        name: name.to_string(),
                        reason,
                    })?;
                    if let Some(text) = v.to_text(parameter)? {
                        push_checked(&mut out, name, text)?;
                    }
                }
            }
        }
    }
    Ok(out)
}

fn push_checked(
    out: &mut Vec<(String, String)>,
    name: &str,
    value: String,
) -> Result<(), EncodeError> {
    check_header_value(&value).map_err(|reason| EncodeError::InvalidHeaderValue {
        name: name.to_string(),
        reason,
    })?;
    out.push((name.to_string(), value));
    Ok(())
}

#[cfg(test)]
mod tests {
    use restwire::ir::MapType;
    use serde_json::json;

    use super::*;
    use crate::value::ArgValue;

    #[test]
    fn order_follows_declaration() {
        let headers = vec![
            Header::Static {
                name: "Accept".into(),
                value: "application/json".into(),
            },
            Header::Single {
                name: "X-Tag".into(),
                parameter: "tags".into(),
                iterable: true,
            },
            Header::Single {
                name: "X-Skip".into(),
                parameter: "skip".into(),
                iterable: false,
            },
            Header::Map {
                parameter: "extra".into(),
                map_type: MapType::MultiValue,
            },
        ];
        let args = Arguments::new()
            .arg("tags", vec![ArgValue::from("a"), ArgValue::Null, ArgValue::from(2)])
            .null("skip")
            .arg("extra", json!({ "X-Multi": ["1", "2"] }));
        let out = encode_headers(&headers, &args).unwrap();
        let lines: Vec<String> = out.iter().map(|(n, v)| format!("{n}: {v}")).collect();
        assert_eq!(
            lines,
            [
                "Accept: application/json",
                "X-Tag: a",
                "X-Tag: 2",
                "X-Multi: 1",
                "X-Multi: 2"
            ]
        );
    }

    #[test]
    fn injected_line_break_is_rejected() {
        let headers = vec![Header::Single {
            name: "X-Id".into(),
            parameter: "id".into(),
            iterable: false,
        }];
        let args = Arguments::new().arg("id", "1\r\nHost: evil");
        let err = encode_headers(&headers, &args).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidHeaderValue { ref name, .. } if name == "X-Id"));
    }

    #[test]
    fn map_keys_are_checked() {
        let headers = vec![Header::Map {
            parameter: "h".into(),
            map_type: MapType::Map,
        }];

        let args = Arguments::new().arg("h", json!({ "content-type": "text/plain" }));
        assert!(matches!(
            encode_headers(&headers, &args),
            Err(EncodeError::ContentHeader(_))
        ));

        let args = Arguments::new().arg("h", json!({ "bad name": "x" }));
        assert!(matches!(
            encode_headers(&headers, &args),
            Err(EncodeError::InvalidHeaderName { .. })
        ));
    }
}
