//! `application/x-www-form-urlencoded` bodies.

use url::form_urlencoded;

use crate::request::BytesContent;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Serialise ordered pairs with form-urlencoded escaping (space becomes `+`).
pub fn encode_form(pairs: &[(String, String)]) -> BytesContent {
    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    BytesContent::new(Some(FORM_URLENCODED.to_string()), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::OutgoingContent;

    #[test]
    fn escapes_and_keeps_order() {
        let pairs = vec![
            ("b".to_string(), "x y".to_string()),
            ("a".to_string(), "1&2=3".to_string()),
            ("b".to_string(), "ü".to_string()),
        ];
        let content = encode_form(&pairs);
        assert_eq!(
            &content.to_bytes().unwrap()[..],
            b"b=x+y&a=1%262%3D3&b=%C3%BC"
        );
        assert_eq!(content.content_type(), Some(FORM_URLENCODED));
    }
}
