//! A single search result with an open set of fields.
//!
//! Standard fields are `title`, `description`, `url`, `favicon`, `image`,
//! `rid` (producing resource), `score`, `rscore` (resource score) and `date`,
//! but any field name is accepted. Values are text, numbers or booleans.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::sanitize::sanitize;

pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const URL: &str = "url";
pub const FAVICON: &str = "favicon";
pub const RID: &str = "rid";
pub const SCORE: &str = "score";
pub const RESOURCE_SCORE: &str = "rscore";
pub const DATE: &str = "date";
pub const FOUND_BEFORE: &str = "foundBefore";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(sanitize(s))),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_i64().map(Self::Int).or_else(|| n.as_f64().map(Self::Float)),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(sanitize(s)),
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self { Self::Text(s) => Some(s), _ => None }
    }

    /// Tolerant numeric reading: text is parsed, anything unreadable is 0.0.
    pub fn as_f32(&self) -> f32 {
        match self {
            Self::Float(f) => *f as f32,
            Self::Int(i) => *i as f32,
            Self::Text(s) => s.trim().parse::<f32>().unwrap_or(0.0),
            Self::Bool(_) => 0.0,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<&str> for FieldValue { fn from(s: &str) -> Self { Self::Text(s.to_string()) } }
impl From<String> for FieldValue { fn from(s: String) -> Self { Self::Text(s) } }
impl From<bool> for FieldValue { fn from(b: bool) -> Self { Self::Bool(b) } }
impl From<i64> for FieldValue { fn from(i: i64) -> Self { Self::Int(i) } }
impl From<i32> for FieldValue { fn from(i: i32) -> Self { Self::Int(i64::from(i)) } }
impl From<f64> for FieldValue { fn from(x: f64) -> Self { Self::Float(x) } }
impl From<f32> for FieldValue { fn from(x: f32) -> Self { Self::Float(f64::from(x)) } }

/// Field names are kept sorted so every serialization of a hit is identical.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hit {
    fields: BTreeMap<String, FieldValue>,
}

impl Hit {
    pub fn new() -> Self { Self::default() }

    pub fn with_fields(title: &str, description: &str, url: &str, favicon: &str) -> Self {
        let mut hit = Self::new();
        hit.put(TITLE, title);
        hit.put(DESCRIPTION, description);
        hit.put(URL, url);
        hit.put(FAVICON, favicon);
        hit
    }

    /// Build from a decoded JSON object. Strings are sanitized on the way in;
    /// members that are not text, numbers or booleans are dropped.
    pub fn from_json(value: &Value) -> Self {
        let mut hit = Self::new();
        if let Value::Object(members) = value {
            for (key, v) in members {
                if let Some(field) = FieldValue::from_json(v) { hit.fields.insert(key.clone(), field); }
            }
        }
        hit
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::from_json(&value))
    }

    pub fn put(&mut self, field: &str, value: impl Into<FieldValue>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn put_if_empty(&mut self, field: &str, value: impl Into<FieldValue>) {
        self.fields.entry(field.to_string()).or_insert_with(|| value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> { self.fields.remove(field) }

    pub fn get(&self, field: &str) -> Option<&FieldValue> { self.fields.get(field) }

    pub fn get_str(&self, field: &str) -> Option<&str> { self.get(field).and_then(FieldValue::as_str) }

    pub fn len(&self) -> usize { self.fields.len() }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    pub fn title(&self) -> Option<&str> { self.get_str(TITLE) }
    pub fn description(&self) -> Option<&str> { self.get_str(DESCRIPTION) }
    pub fn url(&self) -> Option<&str> { self.get_str(URL) }
    pub fn rid(&self) -> Option<&str> { self.get_str(RID) }

    pub fn set_title(&mut self, title: &str) { self.put(TITLE, title); }
    pub fn set_description(&mut self, description: &str) { self.put(DESCRIPTION, description); }
    pub fn set_url(&mut self, url: &str) { self.put(URL, url); }
    pub fn set_score(&mut self, score: f32) { self.put(SCORE, score); }
    pub fn set_resource_score(&mut self, score: f32) { self.put(RESOURCE_SCORE, score); }

    /// Relevance within the producing resource; see [`Hit::float_value`].
    pub fn score(&self) -> f32 { self.float_value(SCORE) }

    pub fn resource_score(&self) -> f32 { self.float_value(RESOURCE_SCORE) }

    /// Absent fields read as 0.0, as do strings that do not parse as a number.
    pub fn float_value(&self, field: &str) -> f32 {
        self.get(field).map_or(0.0, FieldValue::as_f32)
    }

    /// `rid@url`, or `rid@title` for hits without a url. One url may be
    /// stored once per producing resource.
    pub fn id(&self) -> String {
        let rid = self.rid().unwrap_or("");
        let key = self.url().or_else(|| self.title()).unwrap_or("");
        format!("{}@{}", rid, key)
    }

    pub fn to_serializable(&self) -> Map<String, Value> {
        self.fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
    }

    /// The form written into the corpus: no `date`, a `foundBefore` stamp,
    /// and `rid` filled in from `rid` when the hit carries none.
    pub fn to_serializable_for_index(&self, found_before: &str, rid: Option<&str>) -> Map<String, Value> {
        let mut json: Map<String, Value> = self.fields.iter()
            .filter(|(k, _)| k.as_str() != DATE)
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        json.insert(FOUND_BEFORE.to_string(), Value::String(found_before.to_string()));
        if let Some(rid) = rid {
            json.entry(RID.to_string()).or_insert_with(|| Value::String(rid.to_string()));
        }
        json
    }

    /// Element name and text pairs for feed export. Feeds call the target
    /// `link`, so `url` and `link` trade names.
    pub fn to_xml_fields(&self) -> Vec<(String, String)> {
        self.fields.iter().map(|(k, v)| {
            let name = match k.as_str() { "url" => "link", "link" => "url", other => other };
            (name.to_string(), sanitize(&v.to_string()))
        }).collect()
    }

    /// Every text value, whitespace-joined; what the corpus indexes.
    pub fn to_index_text(&self) -> String {
        self.fields.values().filter_map(FieldValue::as_str).collect::<Vec<_>>().join(" ").trim().to_string()
    }

    pub fn to_title_description_text(&self) -> String {
        let mut text = self.title().unwrap_or("").to_string();
        if let Some(desc) = self.description() {
            text.push(' ');
            text.push_str(desc);
        }
        text.trim().to_string()
    }

    /// Ascending order: resource score, then resource id, then own score.
    ///
    /// A hit without `rid` sorts before any hit that has one so that the
    /// order stays transitive when such hits are mixed in.
    pub fn compare(&self, other: &Hit) -> Ordering {
        self.resource_score().total_cmp(&other.resource_score())
            .then_with(|| self.rid().cmp(&other.rid()))
            .then_with(|| self.score().total_cmp(&other.score()))
    }
}

/// Sort best first. The sort is stable, so equal hits keep their input order.
pub fn rank(hits: &mut [Hit]) {
    hits.sort_by(|a, b| b.compare(a));
}
