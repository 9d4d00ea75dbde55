use super::request::{params_object, Params};
use super::BitPayClient;
use crate::core::errors::ClientError;
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::ops::Index;

/// A returned API object that can issue follow-up requests for itself.
#[derive(Clone)]
pub struct Resource {
    value: Value,
    path: String,
    client: BitPayClient,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("path", &self.path)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

impl Resource {
    pub(crate) fn new(client: BitPayClient, origin_path: &str, value: Value) -> Self {
        let path = resource_path(origin_path, &value);
        Self {
            value,
            path,
            client,
        }
    }

    /// The object's `id`, if it has a string or numeric one.
    pub fn id(&self) -> Option<String> {
        id_of(&self.value)
    }

    /// Path follow-up requests are sent to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resource token carried by the object, sent along with follow-ups.
    pub fn token(&self) -> Option<&str> {
        self.value.get("token").and_then(Value::as_str)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn get_field(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub async fn get(&self, params: Option<Value>) -> Result<Response, ClientError> {
        self.send(Method::GET, params).await
    }

    pub async fn put(&self, params: Option<Value>) -> Result<Response, ClientError> {
        self.send(Method::PUT, params).await
    }

    pub async fn post(&self, params: Option<Value>) -> Result<Response, ClientError> {
        self.send(Method::POST, params).await
    }

    pub async fn delete(&self, params: Option<Value>) -> Result<Response, ClientError> {
        self.send(Method::DELETE, params).await
    }

    async fn send(&self, method: Method, params: Option<Value>) -> Result<Response, ClientError> {
        let params = self.with_token(params_object(params)?);
        self.client
            .send_request(method, &self.path, Some(Value::Object(params)))
            .await
    }

    fn with_token(&self, mut params: Params) -> Params {
        if let Some(token) = self.token() {
            params
                .entry("token")
                .or_insert_with(|| Value::String(token.to_string()));
        }
        params
    }
}

/// Parsed response data, every element wrapped as a [`Resource`].
#[derive(Debug, Clone)]
pub enum Response {
    One(Resource),
    Many(Vec<Resource>),
}

impl Response {
    pub fn is_many(&self) -> bool {
        matches!(self, Self::Many(_))
    }

    pub fn as_slice(&self) -> &[Resource] {
        match self {
            Self::One(resource) => std::slice::from_ref(resource),
            Self::Many(resources) => resources,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn first(&self) -> Option<&Resource> {
        self.as_slice().first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.as_slice().iter()
    }

    pub fn into_vec(self) -> Vec<Resource> {
        match self {
            Self::One(resource) => vec![resource],
            Self::Many(resources) => resources,
        }
    }

    /// The plain JSON data, without the attached client.
    pub fn into_value(self) -> Value {
        match self {
            Self::One(resource) => resource.into_value(),
            Self::Many(resources) => {
                Value::Array(resources.into_iter().map(Resource::into_value).collect())
            }
        }
    }
}

/// Positional access into the resources.
///
/// Panics when `index` is out of range; use [`Response::first`] or
/// [`Response::iter`] when the length is not known.
impl Index<usize> for Response {
    type Output = Resource;

    fn index(&self, index: usize) -> &Self::Output {
        &self.as_slice()[index]
    }
}

impl IntoIterator for Response {
    type Item = Resource;
    type IntoIter = std::vec::IntoIter<Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

impl<'a> IntoIterator for &'a Response {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Wrap parsed data: arrays element by element, anything else as one resource.
pub(crate) fn augment(client: &BitPayClient, origin_path: &str, data: Value) -> Response {
    match data {
        Value::Array(items) => Response::Many(
            items
                .into_iter()
                .map(|item| Resource::new(client.clone(), origin_path, item))
                .collect(),
        ),
        other => Response::One(Resource::new(client.clone(), origin_path, other)),
    }
}

fn id_of(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// `<origin>/<id>` unless the origin already names this object.
fn resource_path(origin_path: &str, value: &Value) -> String {
    let origin = origin_path.trim_matches('/');
    match id_of(value) {
        Some(id) if origin.rsplit('/').next() != Some(id.as_str()) => {
            if origin.is_empty() {
                id
            } else {
                format!("{}/{}", origin, id)
            }
        }
        _ => origin.to_string(),
    }
}
