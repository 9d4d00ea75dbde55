use crate::core::config::EffectiveConfig;
use crate::core::errors::ClientError;
use crate::core::kernel::{Request, Signer};
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use url::form_urlencoded;

pub const API_VERSION: &str = "2.0.0";
pub const PLUGIN_INFO: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Delimiter between the URL and its parameter data in the signed payload.
pub const QUERY_DELIMITER: char = '?';

/// Request parameters, always a JSON object.
pub type Params = Map<String, Value>;

/// Accept `None`, `null` or a JSON object as request parameters.
pub fn params_object(params: Option<Value>) -> Result<Params, ClientError> {
    match params {
        None | Some(Value::Null) => Ok(Params::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(ClientError::InvalidParameters(format!(
            "Request parameters must be a JSON object, got {}",
            other
        ))),
    }
}

/// POST and PUT send parameters as a JSON body; other verbs use the query.
pub fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT
}

pub fn build_url(config: &EffectiveConfig, path: &str) -> String {
    format!("{}/{}", config.base_url(), path.trim_start_matches('/'))
}

pub fn encode_query(params: &Params) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, &query_value(value));
    }
    serializer.finish()
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// URL followed by the parameter data, or the bare URL when there is none.
///
/// Query parameters are joined with `?`; a JSON body is appended directly.
pub fn canonical_payload(url: &str, query: &str, body: Option<&str>) -> String {
    let mut payload = url.to_string();
    if !query.is_empty() {
        payload.push(QUERY_DELIMITER);
        payload.push_str(query);
    }
    if let Some(body) = body {
        payload.push_str(body);
    }
    payload
}

fn base_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("content-type".to_string(), "application/json".to_string()),
        ("x-accept-version".to_string(), API_VERSION.to_string()),
        ("x-bitpay-plugin-info".to_string(), PLUGIN_INFO.to_string()),
    ])
}

/// Build a request for `path`, signing it when a signer is given.
pub fn build_request(
    config: &EffectiveConfig,
    method: Method,
    path: &str,
    params: &Params,
    signer: Option<&dyn Signer>,
) -> Result<Request, ClientError> {
    let base_url = build_url(config, path);

    let (query, body) = if carries_body(&method) {
        let body = if params.is_empty() {
            None
        } else {
            Some(serde_json::to_string(params)?)
        };
        (String::new(), body)
    } else {
        (encode_query(params), None)
    };

    let url = canonical_payload(&base_url, &query, None);
    let data_to_sign = canonical_payload(&base_url, &query, body.as_deref());

    let mut headers = base_headers();
    if let Some(signer) = signer {
        headers.extend(signer.sign_request(&data_to_sign)?);
    }

    Ok(Request {
        method,
        url,
        headers,
        body,
        data_to_sign,
    })
}
