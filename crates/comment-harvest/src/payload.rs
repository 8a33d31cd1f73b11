//! Structural checks on API response bodies.
//!
//! The API answers with a JSON array of operation results; the first one
//! carries `data.commentable`. Anything else is not a comment page.

use serde_json::Value;

use crate::types::PageInfo;

/// Why a response body is not a comment page.
#[derive(thiserror::Error, Debug)]
pub enum PayloadError {
    #[error("body is not JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    #[error("body is not a JSON array")]
    NotArray,

    #[error("body is an empty array")]
    EmptyArray,

    #[error("first element has no data.commentable")]
    MissingCommentable,
}

/// Parse a response body and return its `commentable` object.
pub fn extract_commentable(body: &str) -> Result<Value, PayloadError> {
    let parsed: Value = serde_json::from_str(body)?;
    commentable_from_value(parsed)
}

/// Pull `[0].data.commentable` out of an already-parsed body.
pub fn commentable_from_value(body: Value) -> Result<Value, PayloadError> {
    let Value::Array(mut items) = body else {
        return Err(PayloadError::NotArray);
    };
    if items.is_empty() {
        return Err(PayloadError::EmptyArray);
    }

    let mut first = items.swap_remove(0);
    let commentable = first
        .get_mut("data")
        .and_then(|d| d.get_mut("commentable"))
        .map(Value::take)
        .unwrap_or(Value::Null);

    match &commentable {
        Value::Object(map) if !map.is_empty() => Ok(commentable),
        _ => Err(PayloadError::MissingCommentable),
    }
}

/// Read the continuation signal from a commentable object.
pub fn read_continuation(commentable: &Value) -> PageInfo {
    PageInfo::from_commentable(commentable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_first_element() {
        let body = json!([
            {"data": {"commentable": {"id": "P", "comments": {"edges": [], "pageInfo": {"hasNextPage": true, "endCursor": "c1"}}}}},
            {"data": {"other": 1}}
        ])
        .to_string();
        let c = extract_commentable(&body).unwrap();
        assert_eq!(c["id"], "P");
        let info = read_continuation(&c);
        assert!(info.has_next_page);
        assert_eq!(info.end_cursor.unwrap().as_str(), "c1");
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        assert!(matches!(extract_commentable("<html>"), Err(PayloadError::NotJson(_))));
        assert!(matches!(
            extract_commentable(r#"{"data":{"commentable":{"id":"x"}}}"#),
            Err(PayloadError::NotArray)
        ));
        assert!(matches!(extract_commentable("[]"), Err(PayloadError::EmptyArray)));
        assert!(matches!(
            extract_commentable(r#"[{"data":{"project":{}}}]"#),
            Err(PayloadError::MissingCommentable)
        ));
        assert!(matches!(
            extract_commentable(r#"[{"data":{"commentable":null}}]"#),
            Err(PayloadError::MissingCommentable)
        ));
        assert!(matches!(
            extract_commentable(r#"[{"data":{"commentable":{}}}]"#),
            Err(PayloadError::MissingCommentable)
        ));
        assert!(matches!(
            extract_commentable(r#"["telemetry"]"#),
            Err(PayloadError::MissingCommentable)
        ));
    }
}
