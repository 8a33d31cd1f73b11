//! Flatten captured comment trees into one row per comment.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::CommentablePage;

/// One comment, replies included, as a flat record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentRow {
    pub comment_id: Option<String>,
    pub parent_id: Option<String>,
    pub body: Option<String>,
    pub created_at: Option<String>,
    pub removed: Option<bool>,
    pub author_badges: Option<String>,
    pub deleted: Option<bool>,
    pub pinned_at: Option<String>,
    pub author_canceled_pledge: Option<bool>,
    pub author_backing: Option<String>,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    pub author_avatar: Option<String>,
    pub author_blocked: Option<bool>,
}

/// Walk every edge of every page, depth-first through replies.
pub fn flatten_pages(pages: &[CommentablePage]) -> Vec<CommentRow> {
    let mut rows = Vec::new();
    for page in pages {
        for edge in page.edges() {
            if let Some(node) = edge.get("node") {
                flatten_node(node, None, &mut rows);
            }
        }
    }
    rows
}

fn flatten_node(node: &Value, parent_id: Option<&str>, rows: &mut Vec<CommentRow>) {
    if !node.is_object() || node.as_object().is_some_and(|o| o.is_empty()) {
        return;
    }

    let author = node.get("author").filter(|a| a.is_object());
    let author_field = |key: &str| author.and_then(|a| a.get(key));
    let own_id = text(node.get("id"));

    rows.push(CommentRow {
        comment_id: own_id.clone(),
        parent_id: parent_id
            .map(str::to_string)
            .or_else(|| text(node.get("parentId"))),
        body: text(node.get("body")),
        created_at: timestamp(node.get("createdAt")),
        removed: flag(node.get("removedPerGuidelines")),
        author_badges: text(node.get("authorBadges")),
        deleted: flag(node.get("deleted")),
        pinned_at: timestamp(node.get("pinnedAt")),
        author_canceled_pledge: flag(node.get("authorCanceledPledge")),
        author_backing: text(node.get("authorBacking")),
        author_id: text(author_field("id")),
        author_name: text(author_field("name")),
        author_url: text(author_field("url")),
        author_avatar: text(author_field("imageUrl")),
        author_blocked: flag(author_field("isBlocked")),
    });

    let replies = node
        .get("replies")
        .and_then(|r| r.get("nodes"))
        .and_then(Value::as_array);
    for reply in replies.into_iter().flatten() {
        flatten_node(reply, own_id.as_deref(), rows);
    }
}

/// Scalars as text, containers as compact JSON, null as absent.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn flag(value: Option<&Value>) -> Option<bool> {
    value.and_then(Value::as_bool)
}

/// Epoch seconds to RFC 3339 UTC. Anything unparseable becomes absent.
fn timestamp(value: Option<&Value>) -> Option<String> {
    let secs = value?.as_f64()?;
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_page() -> CommentablePage {
        CommentablePage::new(json!({
            "id": "P",
            "comments": {
                "edges": [
                    {"node": {
                        "id": "c1",
                        "body": "Top level",
                        "createdAt": 1_700_000_000,
                        "removedPerGuidelines": false,
                        "deleted": false,
                        "pinnedAt": null,
                        "authorBadges": ["creator", "superbacker"],
                        "authorCanceledPledge": false,
                        "authorBacking": {"id": "b1"},
                        "author": {
                            "id": "u1",
                            "name": "Ada",
                            "url": "https://site.test/profile/ada",
                            "imageUrl": "https://img.test/ada.png",
                            "isBlocked": false
                        },
                        "replies": {"nodes": [
                            {"id": "r1", "body": "Reply", "createdAt": 1_700_000_100,
                             "replies": {"nodes": [{"id": "r2", "body": "Nested"}]}},
                            {"id": "r3", "body": "Another", "parentId": "ignored"}
                        ]}
                    }},
                    {"node": null},
                    {"node": {"id": "c2", "parentId": "external", "body": "Second", "createdAt": "garbage"}}
                ],
                "pageInfo": {"hasNextPage": false, "endCursor": null}
            }
        }))
    }

    #[test]
    fn test_flattens_tree_with_parents() {
        let rows = flatten_pages(&[sample_page()]);
        let ids: Vec<_> = rows.iter().map(|r| r.comment_id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["c1", "r1", "r2", "r3", "c2"]);

        assert_eq!(rows[0].parent_id, None);
        assert_eq!(rows[1].parent_id.as_deref(), Some("c1"));
        assert_eq!(rows[2].parent_id.as_deref(), Some("r1"));
        assert_eq!(rows[3].parent_id.as_deref(), Some("c1"));
        assert_eq!(rows[4].parent_id.as_deref(), Some("external"));
    }

    #[test]
    fn test_row_fields() {
        let rows = flatten_pages(&[sample_page()]);
        let top = &rows[0];
        assert_eq!(top.body.as_deref(), Some("Top level"));
        assert_eq!(top.created_at.as_deref(), Some("2023-11-14T22:13:20Z"));
        assert_eq!(top.pinned_at, None);
        assert_eq!(top.removed, Some(false));
        assert_eq!(top.author_badges.as_deref(), Some(r#"["creator","superbacker"]"#));
        assert_eq!(top.author_backing.as_deref(), Some(r#"{"id":"b1"}"#));
        assert_eq!(top.author_name.as_deref(), Some("Ada"));
        assert_eq!(top.author_avatar.as_deref(), Some("https://img.test/ada.png"));
        assert_eq!(top.author_blocked, Some(false));

        assert_eq!(rows[4].created_at, None);
        assert_eq!(rows[4].author_id, None);
    }

    #[test]
    fn test_pages_without_comments() {
        let rows = flatten_pages(&[CommentablePage::new(json!({"id": "empty"}))]);
        assert!(rows.is_empty());
    }
}
