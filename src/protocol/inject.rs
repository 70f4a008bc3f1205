use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::form_urlencoded;
use url::{Position, Url};

use crate::errors::VulnAgentError;
use crate::models::ProbeRequest;

/// Where a tested parameter lives in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Path,
    Body,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Query => "query",
            ParameterLocation::Path => "path",
            ParameterLocation::Body => "body",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Place `payload` into `parameter` at `location`, leaving the rest of
/// `base` untouched.
pub fn inject_payload(
    base: &ProbeRequest,
    parameter: &str,
    location: ParameterLocation,
    payload: &str,
) -> Result<ProbeRequest, VulnAgentError> {
    if parameter.trim().is_empty() {
        return Err(VulnAgentError::InvalidInput("parameter name must not be empty".into()));
    }

    let mut request = base.clone();
    match location {
        ParameterLocation::Query => {
            request.url = inject_query(&base.url, parameter, payload)?;
        }
        ParameterLocation::Path => {
            request.url = inject_path(&base.url, parameter, payload)?;
        }
        ParameterLocation::Body => {
            let (body, content_type) = if base.method.prefers_form_body() {
                (inject_form(base.body.as_deref(), parameter, payload), "application/x-www-form-urlencoded")
            } else {
                (inject_json(base.body.as_deref(), parameter, payload)?, "application/json")
            };
            request.body = Some(body);
            set_header(&mut request, "content-type", content_type.to_string());
        }
        ParameterLocation::Header => {
            set_header(&mut request, parameter, payload.to_string());
        }
        ParameterLocation::Cookie => {
            let pair = format!("{}={}", parameter, payload);
            let cookie = match header_value(&request, "cookie") {
                Some(existing) if !existing.trim().is_empty() => {
                    let kept: Vec<&str> = existing
                        .split(';')
                        .map(str::trim)
                        .filter(|c| !c.is_empty() && c.split('=').next() != Some(parameter))
                        .collect();
                    if kept.is_empty() {
                        pair
                    } else {
                        format!("{}; {}", kept.join("; "), pair)
                    }
                }
                _ => pair,
            };
            set_header(&mut request, "cookie", cookie);
        }
    }
    Ok(request)
}

/// Replace the parameter's value, or append it, keeping every other pair.
fn inject_query(raw: &str, parameter: &str, payload: &str) -> Result<String, VulnAgentError> {
    let mut url = Url::parse(raw).map_err(|e| VulnAgentError::InvalidTarget(format!("{}: {}", raw, e)))?;

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let mut replaced = false;
    for (name, value) in pairs.iter_mut() {
        if name == parameter {
            *value = payload.to_string();
            replaced = true;
        }
    }
    if !replaced {
        pairs.push((parameter.to_string(), payload.to_string()));
    }

    url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    Ok(url.to_string())
}

/// Rewrites the path only. A `{parameter}` placeholder segment wins over a
/// segment equal to the name, which wins over a substring of the path.
fn inject_path(raw: &str, parameter: &str, payload: &str) -> Result<String, VulnAgentError> {
    let url = Url::parse(raw).map_err(|e| VulnAgentError::InvalidTarget(format!("{}: {}", raw, e)))?;
    let path = url.path();

    // `Url` stores `{` and `}` percent-encoded.
    let raw_placeholder = format!("{{{}}}", parameter);
    let encoded_placeholder = format!("%7B{}%7D", parameter);
    let is_placeholder = |s: &str| s == raw_placeholder || s.eq_ignore_ascii_case(&encoded_placeholder);

    let mut segments: Vec<String> = path.split('/').map(str::to_string).collect();
    let new_path = if segments.iter().any(|s| is_placeholder(s)) {
        for segment in segments.iter_mut().filter(|s| is_placeholder(s)) {
            *segment = payload.to_string();
        }
        segments.join("/")
    } else if let Some(segment) = segments.iter_mut().find(|s| s.as_str() == parameter) {
        *segment = payload.to_string();
        segments.join("/")
    } else if path.contains(parameter) {
        path.replacen(parameter, payload, 1)
    } else {
        return Err(VulnAgentError::InvalidInput(format!(
            "path parameter '{}' not found in {}",
            parameter, raw
        )));
    };

    Ok(format!(
        "{}{}{}",
        &url[..Position::BeforePath],
        new_path,
        &url[Position::AfterPath..]
    ))
}

fn inject_form(existing: Option<&str>, parameter: &str, payload: &str) -> String {
    let mut pairs: Vec<(String, String)> = existing
        .map(|body| form_urlencoded::parse(body.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    pairs.retain(|(name, _)| name != parameter);
    pairs.push((parameter.to_string(), payload.to_string()));

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish()
}

fn inject_json(existing: Option<&str>, parameter: &str, payload: &str) -> Result<String, VulnAgentError> {
    let mut object = match existing.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        _ => Map::new(),
    };
    object.insert(parameter.to_string(), Value::String(payload.to_string()));
    Ok(serde_json::to_string(&Value::Object(object))?)
}

fn header_value<'a>(request: &'a ProbeRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Header names are case-insensitive; drop any differently-cased duplicate.
fn set_header(request: &mut ProbeRequest, name: &str, value: String) {
    request.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    request.headers.insert(name.to_string(), value);
}
