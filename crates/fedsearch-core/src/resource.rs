//! Descriptor of one search engine in the federation.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)(\??)\}").expect("placeholder pattern"));

/// A registered search engine.
///
/// The api template holds `{q}` (or the optional `{q?}`) where the query goes
/// and may reference `{r}` for a resource id and `{name}` for any private
/// parameter. Private parameters are credentials: the directory strips them
/// from everything it hands out except its internal accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResourceDescriptor")]
pub struct Resource {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "apitemplate")]
    api_template: String,
    #[serde(rename = "urltemplate", skip_serializing_if = "Option::is_none")]
    url_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    favicon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    banner: Option<String>,
    #[serde(rename = "mimetype", skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    #[serde(rename = "testquery", skip_serializing_if = "Option::is_none")]
    test_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prior: Option<f32>,
    #[serde(rename = "privateparameters", skip_serializing_if = "Option::is_none")]
    private_parameters: Option<BTreeMap<String, String>>,
}

/// Unvalidated wire form; every field optional so validation can name what is missing.
#[derive(Debug, Default, Deserialize)]
struct ResourceDescriptor {
    id: Option<String>,
    name: Option<String>,
    #[serde(rename = "apitemplate")]
    api_template: Option<String>,
    #[serde(rename = "urltemplate")]
    url_template: Option<String>,
    favicon: Option<String>,
    banner: Option<String>,
    #[serde(rename = "mimetype")]
    mime_type: Option<String>,
    #[serde(rename = "testquery")]
    test_query: Option<String>,
    prior: Option<f32>,
    #[serde(rename = "privateparameters")]
    private_parameters: Option<BTreeMap<String, String>>,
}

impl TryFrom<ResourceDescriptor> for Resource {
    type Error = Error;

    fn try_from(d: ResourceDescriptor) -> Result<Self> {
        let mut resource = Resource::new(d.id.unwrap_or_default(), d.api_template.unwrap_or_default())?;
        resource.name = d.name;
        resource.url_template = d.url_template;
        resource.favicon = d.favicon;
        resource.banner = d.banner;
        resource.mime_type = d.mime_type;
        resource.test_query = d.test_query;
        resource.prior = d.prior;
        resource.private_parameters = d.private_parameters.filter(|p| !p.is_empty());
        Ok(resource)
    }
}

impl Resource {
    pub fn new(id: impl Into<String>, api_template: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let api_template = api_template.into();
        if id.trim().is_empty() {
            return Err(Error::MalformedResource("missing id".to_string()));
        }
        if api_template.trim().is_empty() {
            return Err(Error::MalformedResource(format!("{}: missing apitemplate", id)));
        }
        let has_query = PLACEHOLDER.captures_iter(&api_template).any(|c| &c[1] == "q");
        if !has_query {
            return Err(Error::MalformedResource(format!("{}: apitemplate has no {{q}} placeholder", id)));
        }
        Ok(Self {
            id, name: None, api_template, url_template: None, favicon: None, banner: None,
            mime_type: None, test_query: None, prior: None, private_parameters: None,
        })
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let descriptor: ResourceDescriptor = serde_json::from_value(value.clone())
            .map_err(|e| Error::MalformedResource(e.to_string()))?;
        Self::try_from(descriptor)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| Error::MalformedResource(e.to_string()))?;
        Self::from_json(&value)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self { self.name = Some(name.into()); self }

    pub fn with_prior(mut self, prior: f32) -> Self { self.prior = Some(prior); self }

    pub fn with_private_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.private_parameters.get_or_insert_with(BTreeMap::new).insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn name(&self) -> Option<&str> { self.name.as_deref() }
    pub fn api_template(&self) -> &str { &self.api_template }
    pub fn prior(&self) -> f32 { self.prior.unwrap_or(0.0) }

    /// Credentials. Only the fetch path may look at these.
    pub fn private_parameters(&self) -> Option<&BTreeMap<String, String>> { self.private_parameters.as_ref() }

    pub fn has_private_parameters(&self) -> bool { self.private_parameters.is_some() }

    /// Copy without credentials, safe to hand to callers.
    pub fn redacted(&self) -> Self {
        Self { private_parameters: None, ..self.clone() }
    }

    /// Display name, or the id for resources that have none.
    pub fn label(&self) -> &str { self.name().unwrap_or(&self.id) }

    /// The api url for `query`, credentials substituted.
    pub fn api_url(&self, query: &str) -> String {
        self.expand(query, None)
    }

    /// The api url asking this resource (a mother) about resource `rid`.
    pub fn resource_url(&self, rid: &str) -> String {
        self.expand("", Some(rid))
    }

    fn expand(&self, query: &str, rid: Option<&str>) -> String {
        PLACEHOLDER.replace_all(&self.api_template, |caps: &Captures| {
            let optional = &caps[2] == "?";
            let value = match &caps[1] {
                "q" => Some(query),
                "r" => rid,
                other => self.private_parameters.as_ref().and_then(|p| p.get(other)).map(String::as_str),
            };
            match value {
                Some(v) => encode(v),
                None if optional => String::new(),
                None => caps[0].to_string(),
            }
        }).into_owned()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
