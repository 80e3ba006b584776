//! Detail API wire format
//!
//! The content API is not strict about field names; several aliases are
//! accepted for most fields, and list fields may arrive as a single string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::FetchError;
use crate::records::AuthorInfo;

/// Body of `POST /api/v1/tasks` for a one-note detail crawl.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlTaskRequest<'a> {
    pub platform: &'static str,
    pub task_type: &'static str,
    pub content_ids: [&'a str; 1],
    pub xhs_note_urls: [&'a str; 1],
    pub max_count: usize,
    pub max_comments: usize,
    pub start_page: u32,
    pub enable_proxy: bool,
    pub headless: bool,
    pub enable_comments: bool,
    pub enable_sub_comments: bool,
    pub save_data_option: &'static str,
    pub clear_cookies: bool,
}

impl<'a> CrawlTaskRequest<'a> {
    /// Comments are capped at `max_comments` only when they are wanted.
    #[must_use]
    pub fn detail(note_id: &'a str, url: &'a str, fetch_comments: bool, max_comments: usize) -> Self {
        Self {
            platform: "xhs",
            task_type: "detail",
            content_ids: [note_id],
            xhs_note_urls: [url],
            max_count: 1,
            max_comments: if fetch_comments { max_comments } else { 0 },
            start_page: 1,
            enable_proxy: false,
            headless: false,
            enable_comments: fetch_comments,
            enable_sub_comments: fetch_comments,
            save_data_option: "db",
            clear_cookies: false,
        }
    }
}

/// Reply to task creation. Servers have sent the id both as a string and a number.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskCreated {
    #[serde(default)]
    pub task_id: Option<Value>,
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

impl TaskCreated {
    pub fn into_task_id(self) -> Result<String, FetchError> {
        match self.task_id {
            Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.trim().to_string()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(FetchError::Rejected(self.message.unwrap_or_else(|| {
                "task creation returned no task_id".to_string()
            }))),
        }
    }
}

/// `GET /api/v1/tasks/{id}/status`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub progress: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Succeeded,
    Failed,
    Pending,
}

impl TaskStatus {
    #[must_use]
    pub fn phase(&self) -> TaskPhase {
        if self.done {
            return if self.success == Some(true) {
                TaskPhase::Succeeded
            } else {
                TaskPhase::Failed
            };
        }
        match self.status.as_deref() {
            Some("failed") => TaskPhase::Failed,
            _ => TaskPhase::Pending,
        }
    }

    /// Status label for logs and failure reasons.
    #[must_use]
    pub fn label(&self) -> &str {
        self.status.as_deref().unwrap_or("unknown")
    }
}

/// `GET /api/v1/data/content/xhs/{note_id}`: stored content, if the crawler
/// has the note.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentLookup {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ContentLookup {
    /// `Ok(None)` is a cache miss. Some deployments wrap the note in a list.
    pub fn into_cached(self) -> Result<Option<DetailFields>, FetchError> {
        if self.success == Some(false) {
            return Ok(None);
        }
        match self.data {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => match items.first() {
                Some(item) => parse_detail(item).map(Some),
                None => Ok(None),
            },
            Some(Value::Object(ref map)) if map.is_empty() => Ok(None),
            Some(data) => parse_detail(&data).map(Some),
        }
    }
}

/// Content fields of a fetched detail record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    pub content: String,
    pub images: Vec<String>,
    pub video_url: Option<String>,
    pub author: AuthorInfo,
    pub tags: Vec<String>,
    pub created_at: Option<String>,
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn first<'v>(obj: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn string_at(obj: &Value, keys: &[&str]) -> Option<String> {
    match first(obj, keys)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn u64_at(obj: &Value, keys: &[&str]) -> Option<u64> {
    match first(obj, keys)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A list of strings, a single string, or a list of objects carrying `field`.
fn string_list(value: Option<&Value>, field: &str) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(_) => item
                    .get(field)
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Epoch seconds, epoch milliseconds, or an already formatted string.
fn timestamp(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => {
            let raw = n.as_i64()?;
            let dt = if raw > 100_000_000_000 {
                DateTime::<Utc>::from_timestamp_millis(raw)
            } else {
                DateTime::<Utc>::from_timestamp(raw, 0)
            }?;
            Some(dt.to_rfc3339())
        }
        Value::String(s) if !s.trim().is_empty() => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(n) => timestamp(Some(&Value::from(n))),
                Err(_) => Some(s.to_string()),
            }
        }
        _ => None,
    }
}

pub fn parse_detail(data: &Value) -> Result<DetailFields, FetchError> {
    if !data.is_object() {
        return Err(FetchError::Malformed(format!(
            "data is {}, expected an object",
            type_name(data)
        )));
    }

    let author_obj = first(data, &["author", "user"]).filter(|v| v.is_object());
    let author = match author_obj {
        Some(a) => AuthorInfo {
            name: string_at(a, &["name", "nickname", "user_name"]).unwrap_or_default(),
            user_id: string_at(a, &["user_id", "id"]),
            followers: u64_at(a, &["followers", "follower_count", "fans"]),
        },
        None => AuthorInfo {
            name: string_at(data, &["nickname", "user_name"]).unwrap_or_default(),
            user_id: string_at(data, &["user_id"]),
            followers: u64_at(data, &["follower_count", "followers"]),
        },
    };

    let video_url = string_at(data, &["video_url"]).or_else(|| {
        first(data, &["video"])
            .filter(|v| v.is_object())
            .and_then(|v| string_at(v, &["url", "master_url"]))
    });

    Ok(DetailFields {
        content: string_at(data, &["content", "desc"]).unwrap_or_default(),
        images: string_list(first(data, &["images", "image_list"]), "url"),
        video_url,
        author,
        tags: string_list(first(data, &["tags", "note_tag_list", "tag_list"]), "name"),
        created_at: timestamp(first(
            data,
            &["create_time", "publish_time", "time", "last_update_time"],
        )),
    })
}
