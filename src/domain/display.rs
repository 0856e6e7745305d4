//! Per-surface display attributes.
//!
//! The text-substitution tag, the block editor and direct programmatic calls
//! each describe a render surface with slightly different spellings. They all
//! resolve to [`DisplayAttributes`] before reaching the archive service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::PostType;

/// `posts_per_page` value meaning "no limit".
pub const UNBOUNDED_POSTS_PER_PAGE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayAttributes {
    pub posts_per_page: i64,
    pub post_type: PostType,
    pub show_filters: bool,
    pub show_export: bool,
}

impl Default for DisplayAttributes {
    fn default() -> Self {
        Self {
            posts_per_page: UNBOUNDED_POSTS_PER_PAGE,
            post_type: PostType::Post,
            show_filters: true,
            show_export: true,
        }
    }
}

impl DisplayAttributes {
    /// Resolve a serialized attribute object (block attributes or the
    /// `data-atts` payload echoed back by the page script).
    ///
    /// Accepts both snake_case and camelCase keys. Malformed JSON, unknown keys
    /// and values of the wrong shape fall back to defaults.
    pub fn from_json_lenient(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(Value::Object(map)) => {
                let mut attrs = Self::default();
                for (key, value) in &map {
                    attrs.apply(key, &AttrValue::Json(value));
                }
                attrs
            }
            _ => Self::default(),
        }
    }

    /// Resolve text-substitution tag attributes, e.g. `posts_per_page="10"`.
    pub fn from_tag_attributes(attrs: &HashMap<String, String>) -> Self {
        let mut resolved = Self::default();
        for (key, value) in attrs {
            resolved.apply(key, &AttrValue::Text(value));
        }
        resolved
    }

    fn apply(&mut self, key: &str, value: &AttrValue<'_>) {
        match key {
            "posts_per_page" | "postsPerPage" => {
                if let Some(count) = value.as_i64() {
                    self.posts_per_page = count;
                }
            }
            "post_type" | "postType" => {
                if let Some(text) = value.as_text() {
                    self.post_type = PostType::parse_lenient(&text);
                }
            }
            "show_filters" | "showFilters" => {
                if let Some(flag) = value.as_bool() {
                    self.show_filters = flag;
                }
            }
            "show_export" | "showExport" => {
                if let Some(flag) = value.as_bool() {
                    self.show_export = flag;
                }
            }
            _ => {}
        }
    }

    /// Serialize for embedding into a page so the script can echo it back.
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "posts_per_page": self.posts_per_page,
            "post_type": self.post_type.as_str(),
            "show_filters": self.show_filters,
            "show_export": self.show_export,
        })
        .to_string()
    }
}

enum AttrValue<'a> {
    Json(&'a Value),
    Text(&'a str),
}

impl AttrValue<'_> {
    fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Json(Value::Number(number)) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|value| value.trunc() as i64)),
            AttrValue::Json(Value::String(text)) => text.trim().parse().ok(),
            AttrValue::Text(text) => text.trim().parse().ok(),
            AttrValue::Json(_) => None,
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            AttrValue::Json(Value::String(text)) => Some(text.clone()),
            AttrValue::Text(text) => Some((*text).to_string()),
            AttrValue::Json(_) => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Json(Value::Bool(flag)) => Some(*flag),
            AttrValue::Json(Value::Number(number)) => number.as_i64().map(|value| value != 0),
            AttrValue::Json(Value::String(text)) => parse_flag(text),
            AttrValue::Text(text) => parse_flag(text),
            AttrValue::Json(_) => None,
        }
    }
}

fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
