pub mod catalog;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::errors::WcError;

/// A chain entry as it appears in a job-list file (§4.2): either a bare
/// filter name, or a single-key map binding sub-directives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    Name(String),
    WithArgs(BTreeMap<String, FilterArgValue>),
}

/// A filter's sub-directive argument: either a bare scalar (bound to the
/// filter's default sub-directive) or a map of named sub-directives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterArgValue {
    Scalar(serde_yaml::Value),
    Map(BTreeMap<String, serde_yaml::Value>),
}

/// A chain entry after normalization: a filter name plus its fully resolved
/// sub-directive map.
#[derive(Debug, Clone)]
pub struct NormalizedFilter {
    pub name: String,
    pub args: BTreeMap<String, serde_yaml::Value>,
}

/// The artifact flowing through the chain: either textual or binary data
/// plus a MIME hint (§4.2 — filters declare whether they consume bytes or text).
#[derive(Debug, Clone)]
pub enum Artifact {
    Text(String),
    Bytes(Vec<u8>),
}

impl Artifact {
    pub fn is_bytes(&self) -> bool {
        matches!(self, Artifact::Bytes(_))
    }

    pub fn into_text(self) -> Result<String, WcError> {
        match self {
            Artifact::Text(t) => Ok(t),
            Artifact::Bytes(b) => Ok(String::from_utf8_lossy(&b).into_owned()),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Artifact::Text(t) => t.clone(),
            Artifact::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Artifact::Text(t) => t.into_bytes(),
            Artifact::Bytes(b) => b,
        }
    }
}

/// Normalize a job's declared filter chain (§4.2). Rejects unknown filter
/// names and unknown sub-directive names unless the filter declares support
/// for arbitrary (`<any>`) sub-directives. Idempotent: re-normalizing an
/// already-normalized list returns the same list (tested in catalog.rs).
pub fn normalize_filter_list(chain: &[FilterSpec]) -> Result<Vec<NormalizedFilter>, WcError> {
    let mut out = Vec::with_capacity(chain.len());
    for entry in chain {
        out.push(normalize_one(entry)?);
    }
    validate_chain_types(&out)?;
    Ok(out)
}

/// Enforce the chain's typing (§4.2): a filter that requires bytes can only
/// appear first, since every filter downstream of a text-producing filter
/// only ever sees text. `Any` filters pass whatever they're given through
/// unchanged, so they never trip this check.
fn validate_chain_types(chain: &[NormalizedFilter]) -> Result<(), WcError> {
    let mut current = catalog::InputKind::Bytes;
    for (index, filter) in chain.iter().enumerate() {
        let def = catalog::lookup(&filter.name).expect("already validated in normalize_one");
        if index > 0 && def.input == catalog::InputKind::Bytes && current == catalog::InputKind::Text
        {
            return Err(WcError::FilterExpectedBytes(filter.name.clone()));
        }
        if def.output != catalog::InputKind::Any {
            current = def.output;
        }
    }
    Ok(())
}

/// The MIME kind the chain's first filter needs (§4.1): the retrieval layer
/// uses this to decide whether to hand the job raw bytes or decoded text.
pub fn chain_expects_bytes(chain: &[NormalizedFilter]) -> bool {
    chain
        .first()
        .and_then(|f| catalog::lookup(&f.name))
        .map(|def| def.input == catalog::InputKind::Bytes)
        .unwrap_or(false)
}

fn normalize_one(entry: &FilterSpec) -> Result<NormalizedFilter, WcError> {
    match entry {
        FilterSpec::Name(name) => {
            let def = catalog::lookup(name).ok_or_else(|| WcError::UnknownFilter(name.clone()))?;
            Ok(NormalizedFilter {
                name: def.canonical_name.to_string(),
                args: BTreeMap::new(),
            })
        }
        FilterSpec::WithArgs(map) => {
            if map.len() != 1 {
                return Err(WcError::MalformedJob(
                    0,
                    "filter chain entries must have exactly one key".to_string(),
                ));
            }
            let (name, value) = map.iter().next().expect("checked len == 1");
            let def = catalog::lookup(name).ok_or_else(|| WcError::UnknownFilter(name.clone()))?;

            let args = match value {
                FilterArgValue::Scalar(scalar) => {
                    let default_key = def.default_subdirective.ok_or_else(|| {
                        WcError::UnknownSubDirective("<scalar>".to_string(), name.clone())
                    })?;
                    let mut m = BTreeMap::new();
                    m.insert(default_key.to_string(), scalar.clone());
                    m
                }
                FilterArgValue::Map(m) => {
                    for key in m.keys() {
                        if !def.accepts_subdirective(key) {
                            return Err(WcError::UnknownSubDirective(key.clone(), name.clone()));
                        }
                    }
                    m.clone()
                }
            };

            Ok(NormalizedFilter {
                name: def.canonical_name.to_string(),
                args,
            })
        }
    }
}
