pub mod ai_google;
pub mod command;
pub mod deepdiff;
pub mod image;
pub mod table;
pub mod unified;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::WcError;

/// A job's differ declaration (§3, §4.4): a bare name or `{name: opts}`.
/// Mirrors `FilterSpec`'s shape but a job carries exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DifferSpec {
    Name(String),
    WithArgs(BTreeMap<String, DifferArgValue>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DifferArgValue {
    Scalar(serde_yaml::Value),
    Map(BTreeMap<String, serde_yaml::Value>),
}

impl Default for DifferSpec {
    fn default() -> Self {
        DifferSpec::Name("unified".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedDiffer {
    pub name: String,
    pub args: BTreeMap<String, serde_yaml::Value>,
}

pub fn normalize(spec: &DifferSpec) -> Result<NormalizedDiffer, WcError> {
    match spec {
        DifferSpec::Name(name) => {
            validate_name(name)?;
            Ok(NormalizedDiffer { name: name.clone(), args: BTreeMap::new() })
        }
        DifferSpec::WithArgs(map) => {
            if map.len() != 1 {
                return Err(WcError::MalformedJob(0, "differ spec must have exactly one key".to_string()));
            }
            let (name, value) = map.iter().next().expect("checked len == 1");
            validate_name(name)?;
            let args = match value {
                DifferArgValue::Scalar(_) => BTreeMap::new(),
                DifferArgValue::Map(m) => m.clone(),
            };
            Ok(NormalizedDiffer { name: name.clone(), args })
        }
    }
}

fn validate_name(name: &str) -> Result<(), WcError> {
    match name {
        "unified" | "table" | "command" | "deepdiff" | "image" | "ai_google" => Ok(()),
        other => Err(WcError::UnknownDiffer(other.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Text,
    Markdown,
    Html,
}

/// Comparison-mode toggle (§3, §4.4). Mutual exclusion is enforced by
/// `CommonJobAttrs::validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonMode {
    Full,
    AdditionsOnly,
    DeletionsOnly,
}

#[derive(Debug, Clone)]
pub struct DiffContext {
    pub old_timestamp: DateTime<Utc>,
    pub new_timestamp: DateTime<Utc>,
    pub context_lines: Option<usize>,
    pub comparison_mode: ComparisonMode,
    pub tz: Option<String>,
}

/// The result of running a differ (§4.5 step 5): either a reportable diff,
/// or `NoReport` when the differ determined the change isn't worth surfacing
/// (e.g. an external diff tool exit code 0, or a sub-threshold image MSE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    Diff(String),
    NoReport,
}

pub fn diff(
    differ: &NormalizedDiffer,
    old_data: &[u8],
    new_data: &[u8],
    ctx: &DiffContext,
    kind: ReportKind,
) -> Result<DiffOutcome, WcError> {
    match differ.name.as_str() {
        "unified" => unified::diff(old_data, new_data, ctx, kind),
        "table" => table::diff(old_data, new_data, ctx, kind),
        "command" => command::diff(old_data, new_data, &differ.args, ctx),
        "deepdiff" => deepdiff::diff(old_data, new_data, &differ.args),
        "image" => image::diff(old_data, new_data, &differ.args),
        "ai_google" => ai_google::diff(old_data, new_data, &differ.args, ctx),
        other => Err(WcError::UnknownDiffer(other.to_string())),
    }
}

/// Format a timestamp in RFC 5322 form, optionally with an IANA zone name
/// parenthetical (§4.4). `chrono`'s RFC 2822 formatter produces the same
/// wire shape RFC 5322 inherits; the zone name is appended as CFWS.
pub fn format_timestamp(ts: DateTime<Utc>, tz: Option<&str>) -> String {
    let base = ts.to_rfc2822();
    match tz {
        Some(name) => format!("{base} ({name})"),
        None => base,
    }
}
