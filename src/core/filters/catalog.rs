use std::collections::BTreeMap;
use std::io::Write as _;
use std::process::{Command, Stdio};

use regex::Regex;
use sha1::Digest as _;

use super::Artifact;
use crate::core::errors::WcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Bytes,
    Any,
}

pub struct FilterDef {
    pub canonical_name: &'static str,
    pub input: InputKind,
    /// What this filter hands to the next filter in the chain (§4.2's
    /// "typing of the chain"). Most filters normalize to text; `base64` and
    /// `ascii85` decode to bytes.
    pub output: InputKind,
    pub default_subdirective: Option<&'static str>,
    pub subdirectives: &'static [&'static str],
    pub accepts_any_subdirective: bool,
}

impl FilterDef {
    pub fn accepts_subdirective(&self, name: &str) -> bool {
        self.accepts_any_subdirective || self.subdirectives.contains(&name)
    }
}

/// Environment a filter runs under: the job's display name and canonical
/// location, injected into `execute`/`shellpipe` children (§4.1, §4.2, §5).
pub struct FilterContext<'a> {
    pub job_name: &'a str,
    pub job_location: &'a str,
}

static CATALOG: &[FilterDef] = &[
    FilterDef { canonical_name: "html2text", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("method"), subdirectives: &["method"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "pdf2text", input: InputKind::Bytes, output: InputKind::Text, default_subdirective: None, subdirectives: &["password"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "ical2text", input: InputKind::Text, output: InputKind::Text, default_subdirective: None, subdirectives: &[], accepts_any_subdirective: false },
    FilterDef { canonical_name: "ocr", input: InputKind::Bytes, output: InputKind::Text, default_subdirective: Some("language"), subdirectives: &["language", "timeout"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "beautify", input: InputKind::Text, output: InputKind::Text, default_subdirective: None, subdirectives: &[], accepts_any_subdirective: false },
    FilterDef { canonical_name: "format-json", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("indentation"), subdirectives: &["indentation", "sort_keys"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "format-xml", input: InputKind::Text, output: InputKind::Text, default_subdirective: None, subdirectives: &[], accepts_any_subdirective: false },
    FilterDef { canonical_name: "keep_lines_containing", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("text"), subdirectives: &["text", "re"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "delete_lines_containing", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("text"), subdirectives: &["text", "re"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "strip", input: InputKind::Text, output: InputKind::Text, default_subdirective: None, subdirectives: &["splitlines", "side"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "strip_empty_lines", input: InputKind::Text, output: InputKind::Text, default_subdirective: None, subdirectives: &[], accepts_any_subdirective: false },
    FilterDef { canonical_name: "sort", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("separator"), subdirectives: &["separator", "reverse"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "reverse", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("separator"), subdirectives: &["separator"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "re.sub", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("pattern"), subdirectives: &["pattern", "repl"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "sha1sum", input: InputKind::Any, output: InputKind::Text, default_subdirective: None, subdirectives: &[], accepts_any_subdirective: false },
    FilterDef { canonical_name: "hexdump", input: InputKind::Any, output: InputKind::Text, default_subdirective: None, subdirectives: &[], accepts_any_subdirective: false },
    FilterDef { canonical_name: "css", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("selector"), subdirectives: &["selector", "method", "exclude", "namespaces", "skip", "maxitems"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "xpath", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("path"), subdirectives: &["path", "method", "exclude", "namespaces", "skip", "maxitems"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "element-by-id", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("value"), subdirectives: &["value"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "element-by-class", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("value"), subdirectives: &["value"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "element-by-style", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("value"), subdirectives: &["value"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "element-by-tag", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("value"), subdirectives: &["value"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "execute", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("command"), subdirectives: &["command"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "shellpipe", input: InputKind::Text, output: InputKind::Text, default_subdirective: Some("command"), subdirectives: &["command"], accepts_any_subdirective: false },
    FilterDef { canonical_name: "ascii85", input: InputKind::Text, output: InputKind::Bytes, default_subdirective: None, subdirectives: &[], accepts_any_subdirective: false },
    FilterDef { canonical_name: "base64", input: InputKind::Text, output: InputKind::Bytes, default_subdirective: None, subdirectives: &[], accepts_any_subdirective: false },
];

/// Deprecated aliases (§4.2): `grep`/`grepi` map onto the modern names and
/// must keep working while logging a deprecation warning at call time.
fn resolve_alias(name: &str) -> &str {
    match name {
        "grep" => "keep_lines_containing",
        "grepi" => "delete_lines_containing",
        other => other,
    }
}

pub fn lookup(name: &str) -> Option<&'static FilterDef> {
    let resolved = resolve_alias(name);
    CATALOG.iter().find(|d| d.canonical_name == resolved)
}

fn arg_str<'a>(args: &'a BTreeMap<String, serde_yaml::Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

pub fn apply(
    name: &str,
    args: &BTreeMap<String, serde_yaml::Value>,
    input: Artifact,
    ctx: &FilterContext,
) -> Result<Artifact, WcError> {
    if name == "grep" || name == "grepi" {
        tracing::warn!(filter = name, "using deprecated filter alias");
    }
    let name = resolve_alias(name);

    match name {
        "html2text" => html2text(input, args),
        "pdf2text" => Err(WcError::FilterUnsupported("pdf2text", "no PDF parser bundled")),
        "ical2text" => ical2text(input),
        "ocr" => Err(WcError::FilterUnsupported("ocr", "no OCR engine bundled")),
        "beautify" => beautify(input),
        "format-json" => format_json(input, args),
        "format-xml" => format_xml(input),
        "keep_lines_containing" => filter_lines(input, args, true),
        "delete_lines_containing" => filter_lines(input, args, false),
        "strip" => strip(input, args),
        "strip_empty_lines" => strip_empty_lines(input),
        "sort" => sort_lines(input, args, false),
        "reverse" => sort_lines(input, args, true),
        "re.sub" => re_sub(input, args),
        "sha1sum" => sha1sum(input),
        "hexdump" => hexdump(input),
        "css" => css_select(input, args),
        "xpath" => xpath_select(input, args),
        "element-by-id" => element_by(input, args, "id"),
        "element-by-class" => element_by(input, args, "class"),
        "element-by-style" => element_by(input, args, "style"),
        "element-by-tag" => element_by_tag(input, args),
        "execute" => execute(input, args, ctx, false),
        "shellpipe" => execute(input, args, ctx, true),
        "ascii85" => ascii85_decode(input),
        "base64" => base64_decode(input),
        other => Err(WcError::UnknownFilter(other.to_string())),
    }
}

/// HTML-to-text conversion with a selectable `method` sub-directive (§4.2):
/// `html2text` (default) renders a markdown-ish block layout, `bs4` collapses
/// to whitespace-joined text, `strip_tags` is a bare regex tag strip.
/// `pyhtml2text`/`re` are deprecated aliases for `html2text`/`strip_tags`
/// that still work but log a warning; `lynx` is no longer supported at all.
fn html2text(input: Artifact, args: &BTreeMap<String, serde_yaml::Value>) -> Result<Artifact, WcError> {
    let html = input.into_text()?;
    let method = arg_str(args, "method").unwrap_or("html2text");

    match method {
        "html2text" => Ok(Artifact::Text(html2text_markdown(&html))),
        "pyhtml2text" => {
            tracing::warn!("filter html2text's method 'pyhtml2text' is deprecated: replace with 'html2text'");
            Ok(Artifact::Text(html2text_markdown(&html)))
        }
        "bs4" => Ok(Artifact::Text(html2text_bs4(&html))),
        "strip_tags" => Ok(Artifact::Text(html2text_strip_tags(&html))),
        "re" => {
            tracing::warn!("filter html2text's method 're' is deprecated: replace with 'strip_tags'");
            Ok(Artifact::Text(html2text_strip_tags(&html)))
        }
        "lynx" => Err(WcError::FilterUnsupported(
            "html2text",
            "method 'lynx' is no longer supported",
        )),
        other => Err(WcError::MalformedJob(0, format!("unknown filter html2text method: {other:?}"))),
    }
}

fn html2text_bs4(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn html2text_strip_tags(html: &str) -> String {
    let re = Regex::new(r"<[^>]*>").expect("static pattern");
    let stripped = re.replace_all(html, "");
    stripped
        .lines()
        .map(|l| l.trim_end())
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A small markdown-ish renderer: block elements (`p`, `div`, headings) get
/// surrounding blank lines, `li` gets a `* ` bullet, `a[href]` becomes
/// `text (href)`. Not a full html2text port, just its common-case output.
fn html2text_markdown(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let mut out = String::new();
    walk_markdown(document.root_element(), &mut out);

    let mut result: Vec<&str> = Vec::new();
    let mut prev_blank = true;
    for line in out.lines().map(|l| l.trim_end()) {
        let blank = line.trim().is_empty();
        if blank && prev_blank {
            continue;
        }
        result.push(line);
        prev_blank = blank;
    }
    while result.last().map(|l| l.trim().is_empty()).unwrap_or(false) {
        result.pop();
    }
    result.join("\n")
}

fn walk_markdown(el: scraper::ElementRef, out: &mut String) {
    let tag = el.value().name();
    let is_block = matches!(
        tag,
        "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "br" | "tr" | "ul" | "ol"
    );
    if is_block {
        out.push('\n');
    }
    if tag == "li" {
        out.push_str("\n* ");
    }

    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(child_el) = scraper::ElementRef::wrap(child) else {
            continue;
        };
        if child_el.value().name() == "a" {
            let href = child_el.value().attr("href").unwrap_or("");
            let mut link_text = String::new();
            walk_markdown(child_el, &mut link_text);
            let link_text = link_text.trim();
            if href.is_empty() {
                out.push_str(link_text);
            } else {
                out.push_str(&format!("{link_text} ({href})"));
            }
        } else {
            walk_markdown(child_el, out);
        }
    }

    if is_block {
        out.push('\n');
    }
}

fn ical2text(input: Artifact) -> Result<Artifact, WcError> {
    let text = input.into_text()?;
    let mut out = String::new();
    for line in text.lines() {
        if let Some(summary) = line.strip_prefix("SUMMARY:") {
            out.push_str(summary);
            out.push('\n');
        }
    }
    Ok(Artifact::Text(out))
}

/// Pretty-prints HTML (§4.2), re-indenting via the same `quick-xml`
/// `Reader`/`Writer` pattern `format_xml` uses, relaxed with
/// `check_end_names(false)` for HTML's unclosed void elements (`<br>`,
/// `<img>`, ...). Content of `<script>`/`<style>` elements is reformatted
/// with a brace/semicolon-aware re-indenter rather than left untouched.
fn beautify(input: Artifact) -> Result<Artifact, WcError> {
    let html = input.into_text()?;
    use quick_xml::events::{BytesText, Event};
    use quick_xml::reader::Reader;
    use quick_xml::writer::Writer;

    let mut reader = Reader::from_str(&html);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names(false);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let mut current_tag: Option<String> = None;
    loop {
        match reader
            .read_event()
            .map_err(|e| WcError::MalformedJob(0, format!("beautify: invalid HTML: {e}")))?
        {
            Event::Eof => break,
            Event::Start(start) => {
                current_tag = Some(String::from_utf8_lossy(start.name().as_ref()).to_lowercase());
                writer
                    .write_event(Event::Start(start))
                    .map_err(|e| WcError::MalformedJob(0, format!("beautify: {e}")))?;
            }
            Event::Text(text) if matches!(current_tag.as_deref(), Some("script") | Some("style")) => {
                let raw = String::from_utf8_lossy(text.as_ref()).into_owned();
                let reformatted = reindent_braces(&raw);
                writer
                    .write_event(Event::Text(BytesText::from_escaped(reformatted)))
                    .map_err(|e| WcError::MalformedJob(0, format!("beautify: {e}")))?;
            }
            Event::End(end) => {
                current_tag = None;
                writer
                    .write_event(Event::End(end))
                    .map_err(|e| WcError::MalformedJob(0, format!("beautify: {e}")))?;
            }
            event => writer
                .write_event(event)
                .map_err(|e| WcError::MalformedJob(0, format!("beautify: {e}")))?,
        }
    }

    let bytes = writer.into_inner();
    Ok(Artifact::Text(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Heuristic brace/semicolon re-indenter shared by the `<script>`/`<style>`
/// passes of `beautify` — not a real JS/CSS parser, just enough structure to
/// put declarations and blocks on their own indented line.
fn reindent_braces(code: &str) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for token in code.split_inclusive(['{', '}', ';']) {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.ends_with('}') {
            depth = depth.saturating_sub(1);
        }
        out.push_str(&"  ".repeat(depth));
        out.push_str(trimmed);
        out.push('\n');
        if trimmed.ends_with('{') {
            depth += 1;
        }
    }
    out.trim_end().to_string()
}

fn format_json(input: Artifact, args: &BTreeMap<String, serde_yaml::Value>) -> Result<Artifact, WcError> {
    let text = input.into_text()?;
    let mut value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| WcError::MalformedJob(0, format!("format-json: invalid JSON: {e}")))?;

    if args.get("sort_keys").and_then(|v| v.as_bool()).unwrap_or(false)
        && let serde_json::Value::Object(map) = &value
    {
        let sorted: serde_json::Map<String, serde_json::Value> = map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<std::collections::BTreeMap<_, _>>()
            .into_iter()
            .collect();
        value = serde_json::Value::Object(sorted);
    }

    let indentation = args
        .get("indentation")
        .and_then(|v| v.as_u64())
        .unwrap_or(4) as usize;
    let indent = " ".repeat(indentation);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(&value, &mut ser)
        .map_err(|e| WcError::MalformedJob(0, format!("format-json: {e}")))?;
    Ok(Artifact::Text(String::from_utf8(buf).expect("serde_json emits valid utf8")))
}

fn format_xml(input: Artifact) -> Result<Artifact, WcError> {
    let text = input.into_text()?;
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;
    use quick_xml::writer::Writer;

    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    loop {
        match reader
            .read_event()
            .map_err(|e| WcError::MalformedJob(0, format!("format-xml: invalid XML: {e}")))?
        {
            Event::Eof => break,
            event => writer
                .write_event(event)
                .map_err(|e| WcError::MalformedJob(0, format!("format-xml: {e}")))?,
        }
    }

    let bytes = writer.into_inner();
    Ok(Artifact::Text(String::from_utf8_lossy(&bytes).into_owned()))
}

fn filter_lines(input: Artifact, args: &BTreeMap<String, serde_yaml::Value>, keep_if_match: bool) -> Result<Artifact, WcError> {
    let text = input.into_text()?;
    let predicate: Box<dyn Fn(&str) -> bool> = if let Some(pattern) = arg_str(args, "re") {
        let re = Regex::new(pattern).map_err(|e| WcError::MalformedJob(0, e.to_string()))?;
        Box::new(move |line: &str| re.is_match(line))
    } else if let Some(needle) = arg_str(args, "text") {
        let needle = needle.to_string();
        Box::new(move |line: &str| line.contains(&needle))
    } else {
        Box::new(|_: &str| true)
    };

    let out: Vec<&str> = text
        .lines()
        .filter(|line| predicate(line) == keep_if_match)
        .collect();
    Ok(Artifact::Text(out.join("\n")))
}

fn strip(input: Artifact, args: &BTreeMap<String, serde_yaml::Value>) -> Result<Artifact, WcError> {
    let text = input.into_text()?;
    let side = arg_str(args, "side").unwrap_or("both");
    let splitlines = args.get("splitlines").and_then(|v| v.as_bool()).unwrap_or(false);

    let strip_one = |s: &str| -> String {
        match side {
            "left" => s.trim_start().to_string(),
            "right" => s.trim_end().to_string(),
            _ => s.trim().to_string(),
        }
    };

    if splitlines {
        let out: Vec<String> = text.lines().map(|l| strip_one(l)).collect();
        Ok(Artifact::Text(out.join("\n")))
    } else {
        Ok(Artifact::Text(strip_one(&text)))
    }
}

fn strip_empty_lines(input: Artifact) -> Result<Artifact, WcError> {
    let text = input.into_text()?;
    let out: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    Ok(Artifact::Text(out.join("\n")))
}

fn sort_lines(input: Artifact, args: &BTreeMap<String, serde_yaml::Value>, reverse_only: bool) -> Result<Artifact, WcError> {
    let text = input.into_text()?;
    let separator = arg_str(args, "separator").unwrap_or("\n");
    let mut parts: Vec<&str> = text.split(separator).collect();
    let reverse = args.get("reverse").and_then(|v| v.as_bool()).unwrap_or(false);

    if reverse_only {
        parts.reverse();
    } else {
        parts.sort_by_key(|s| s.to_ascii_lowercase());
        if reverse {
            parts.reverse();
        }
    }

    Ok(Artifact::Text(parts.join(separator)))
}

fn re_sub(input: Artifact, args: &BTreeMap<String, serde_yaml::Value>) -> Result<Artifact, WcError> {
    let text = input.into_text()?;
    let pattern = arg_str(args, "pattern")
        .ok_or_else(|| WcError::UnknownSubDirective("pattern".to_string(), "re.sub".to_string()))?;
    let repl = arg_str(args, "repl").unwrap_or("");
    let re = Regex::new(pattern).map_err(|e| WcError::MalformedJob(0, e.to_string()))?;
    Ok(Artifact::Text(re.replace_all(&text, repl).into_owned()))
}

fn sha1sum(input: Artifact) -> Result<Artifact, WcError> {
    let bytes = input.into_bytes();
    let mut hasher = sha1::Sha1::new();
    hasher.update(&bytes);
    Ok(Artifact::Text(hex::encode(hasher.finalize())))
}

fn hexdump(input: Artifact) -> Result<Artifact, WcError> {
    let bytes = input.into_bytes();
    Ok(Artifact::Text(hex::encode(bytes)))
}

fn css_select(input: Artifact, args: &BTreeMap<String, serde_yaml::Value>) -> Result<Artifact, WcError> {
    let html = input.into_text()?;
    let selector_str = arg_str(args, "selector")
        .ok_or_else(|| WcError::UnknownSubDirective("selector".to_string(), "css".to_string()))?;
    let document = scraper::Html::parse_document(&html);
    let selector = scraper::Selector::parse(selector_str)
        .map_err(|e| WcError::MalformedJob(0, format!("invalid css selector: {e:?}")))?;

    let maxitems = args.get("maxitems").and_then(|v| v.as_u64()).map(|n| n as usize);
    let mut out = Vec::new();
    for (i, el) in document.select(&selector).enumerate() {
        if let Some(max) = maxitems
            && i >= max
        {
            break;
        }
        out.push(el.html());
    }
    Ok(Artifact::Text(out.join("\n")))
}

/// A deliberately small XPath subset: only `//tagname` path expressions are
/// supported (no predicates, no axes). Anything richer is rejected with a
/// precise error rather than silently matching nothing.
fn xpath_select(input: Artifact, args: &BTreeMap<String, serde_yaml::Value>) -> Result<Artifact, WcError> {
    let path = arg_str(args, "path")
        .ok_or_else(|| WcError::UnknownSubDirective("path".to_string(), "xpath".to_string()))?;
    let tag = path
        .strip_prefix("//")
        .ok_or_else(|| WcError::MalformedJob(0, format!("unsupported xpath expression: {path}")))?;

    let selector_str = tag.to_string();
    css_select(
        input,
        &BTreeMap::from([("selector".to_string(), serde_yaml::Value::String(selector_str))]),
    )
}

fn element_by(input: Artifact, args: &BTreeMap<String, serde_yaml::Value>, attr: &str) -> Result<Artifact, WcError> {
    let value = arg_str(args, "value")
        .ok_or_else(|| WcError::UnknownSubDirective("value".to_string(), format!("element-by-{attr}")))?;
    let selector_str = format!("[{attr}=\"{value}\"]");
    css_select(
        input,
        &BTreeMap::from([("selector".to_string(), serde_yaml::Value::String(selector_str))]),
    )
}

fn element_by_tag(input: Artifact, args: &BTreeMap<String, serde_yaml::Value>) -> Result<Artifact, WcError> {
    let tag = arg_str(args, "value")
        .ok_or_else(|| WcError::UnknownSubDirective("value".to_string(), "element-by-tag".to_string()))?;
    css_select(
        input,
        &BTreeMap::from([("selector".to_string(), serde_yaml::Value::String(tag.to_string()))]),
    )
}

fn execute(input: Artifact, args: &BTreeMap<String, serde_yaml::Value>, ctx: &FilterContext, pipe_stdin: bool) -> Result<Artifact, WcError> {
    let command = arg_str(args, "command")
        .ok_or_else(|| WcError::UnknownSubDirective("command".to_string(), "execute".to_string()))?;

    let mut child = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .env("URLWATCH_JOB_NAME", ctx.job_name)
        .env("URLWATCH_JOB_LOCATION", ctx.job_location)
        .stdin(if pipe_stdin { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| WcError::ShellCommandFailed { code: None, stderr: e.to_string() })?;

    if pipe_stdin {
        let text = input.as_text();
        child
            .stdin
            .take()
            .expect("stdin piped above")
            .write_all(text.as_bytes())
            .map_err(|e| WcError::ShellCommandFailed { code: None, stderr: e.to_string() })?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| WcError::ShellCommandFailed { code: None, stderr: e.to_string() })?;

    if !output.status.success() {
        return Err(WcError::ShellCommandFailed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(Artifact::Text(String::from_utf8_lossy(&output.stdout).into_owned()))
}

fn ascii85_decode(input: Artifact) -> Result<Artifact, WcError> {
    let text = input.into_text()?;
    let decoded = ascii85::decode(text.trim())
        .map_err(|e| WcError::MalformedJob(0, format!("invalid ascii85: {e:?}")))?;
    Ok(Artifact::Bytes(decoded))
}

fn base64_decode(input: Artifact) -> Result<Artifact, WcError> {
    use base64::Engine;
    let text = input.into_text()?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|e| WcError::MalformedJob(0, format!("invalid base64: {e}")))?;
    Ok(Artifact::Bytes(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> FilterContext<'static> {
        FilterContext { job_name: "test", job_location: "test://location" }
    }

    #[test]
    fn test_strip_basic() {
        let out = strip(Artifact::Text("  hi  ".to_string()), &BTreeMap::new()).unwrap();
        assert_eq!(out.as_text(), "hi");
    }

    #[test]
    fn test_keep_lines_containing_text() {
        let mut args = BTreeMap::new();
        args.insert("text".to_string(), serde_yaml::Value::String("keep".to_string()));
        let input = Artifact::Text("keep this\nnope\nkeep that\n".to_string());
        let out = filter_lines(input, &args, true).unwrap();
        assert_eq!(out.as_text(), "keep this\nkeep that");
    }

    #[test]
    fn test_delete_lines_containing_regex() {
        let mut args = BTreeMap::new();
        args.insert("re".to_string(), serde_yaml::Value::String(r"^\d+$".to_string()));
        let input = Artifact::Text("42\nhello\n7\n".to_string());
        let out = filter_lines(input, &args, false).unwrap();
        assert_eq!(out.as_text(), "hello");
    }

    #[test]
    fn test_re_sub() {
        let mut args = BTreeMap::new();
        args.insert("pattern".to_string(), serde_yaml::Value::String("a+".to_string()));
        args.insert("repl".to_string(), serde_yaml::Value::String("b".to_string()));
        let out = re_sub(Artifact::Text("aaa123aa".to_string()), &args).unwrap();
        assert_eq!(out.as_text(), "b123b");
    }

    #[test]
    fn test_sort_lines() {
        let input = Artifact::Text("banana\napple\ncherry".to_string());
        let out = sort_lines(input, &BTreeMap::new(), false).unwrap();
        assert_eq!(out.as_text(), "apple\nbanana\ncherry");
    }

    #[test]
    fn test_base64_roundtrip() {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode("hello world");
        let out = base64_decode(Artifact::Text(encoded)).unwrap();
        assert_eq!(out.into_bytes(), b"hello world");
    }

    #[test]
    fn test_ascii85_roundtrip() {
        let encoded = ascii85::encode(b"hello world");
        let out = ascii85_decode(Artifact::Text(encoded)).unwrap();
        assert_eq!(out.into_bytes(), b"hello world");
    }

    #[test]
    fn test_format_json_pretty_prints() {
        let input = Artifact::Text(r#"{"b":1,"a":2}"#.to_string());
        let out = format_json(input, &BTreeMap::new()).unwrap();
        let text = out.as_text();
        assert!(text.contains('\n'));
        let reparsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed["a"], 2);
    }

    #[test]
    fn test_sha1sum_deterministic() {
        let a = sha1sum(Artifact::Text("same".to_string())).unwrap();
        let b = sha1sum(Artifact::Text("same".to_string())).unwrap();
        assert_eq!(a.as_text(), b.as_text());
    }

    #[test]
    fn test_execute_filter_pipes_stdin() {
        let out = execute(
            Artifact::Text("hello\n".to_string()),
            &BTreeMap::from([("command".to_string(), serde_yaml::Value::String("cat".to_string()))]),
            &ctx(),
            true,
        )
        .unwrap();
        assert_eq!(out.as_text(), "hello\n");
    }

    #[test]
    fn test_execute_filter_injects_job_env() {
        let out = execute(
            Artifact::Text(String::new()),
            &BTreeMap::from([(
                "command".to_string(),
                serde_yaml::Value::String("echo $URLWATCH_JOB_NAME".to_string()),
            )]),
            &ctx(),
            false,
        )
        .unwrap();
        assert_eq!(out.as_text().trim(), "test");
    }

    #[test]
    fn test_css_select() {
        let html = "<html><body><p class=\"x\">one</p><p>two</p></body></html>";
        let mut args = BTreeMap::new();
        args.insert("selector".to_string(), serde_yaml::Value::String("p.x".to_string()));
        let out = css_select(Artifact::Text(html.to_string()), &args).unwrap();
        assert!(out.as_text().contains("one"));
        assert!(!out.as_text().contains("two"));
    }

    #[test]
    fn test_pdf2text_is_unsupported_not_panicking() {
        let result = apply("pdf2text", &BTreeMap::new(), Artifact::Bytes(vec![]), &ctx());
        assert!(matches!(result, Err(WcError::FilterUnsupported("pdf2text", _))));
    }

    #[test]
    fn test_grep_alias_behaves_like_keep_lines_containing() {
        let mut args = BTreeMap::new();
        args.insert("text".to_string(), serde_yaml::Value::String("keep".to_string()));
        let out = apply("grep", &args, Artifact::Text("keep\nnope\n".to_string()), &ctx()).unwrap();
        assert_eq!(out.as_text(), "keep");
    }

    #[test]
    fn test_html2text_default_method_renders_markdown_links() {
        let html = "<p>see <a href=\"https://example.com\">here</a></p>";
        let out = html2text(Artifact::Text(html.to_string()), &BTreeMap::new()).unwrap();
        assert!(out.as_text().contains("here (https://example.com)"));
    }

    #[test]
    fn test_html2text_strip_tags_method() {
        let mut args = BTreeMap::new();
        args.insert("method".to_string(), serde_yaml::Value::String("strip_tags".to_string()));
        let out = html2text(Artifact::Text("<b>hi</b> <i>there</i>".to_string()), &args).unwrap();
        assert_eq!(out.as_text(), "hi there");
    }

    #[test]
    fn test_html2text_bs4_method() {
        let mut args = BTreeMap::new();
        args.insert("method".to_string(), serde_yaml::Value::String("bs4".to_string()));
        let out = html2text(Artifact::Text("<div>one  <span>two</span></div>".to_string()), &args).unwrap();
        assert_eq!(out.as_text(), "one two");
    }

    #[test]
    fn test_html2text_unknown_method_errors() {
        let mut args = BTreeMap::new();
        args.insert("method".to_string(), serde_yaml::Value::String("nonsense".to_string()));
        let result = html2text(Artifact::Text("<p>hi</p>".to_string()), &args);
        assert!(matches!(result, Err(WcError::MalformedJob(_, _))));
    }

    #[test]
    fn test_html2text_lynx_method_is_unsupported() {
        let mut args = BTreeMap::new();
        args.insert("method".to_string(), serde_yaml::Value::String("lynx".to_string()));
        let result = html2text(Artifact::Text("<p>hi</p>".to_string()), &args);
        assert!(matches!(result, Err(WcError::FilterUnsupported("html2text", _))));
    }

    #[test]
    fn test_html2text_deprecated_aliases_still_work() {
        let mut args = BTreeMap::new();
        args.insert("method".to_string(), serde_yaml::Value::String("re".to_string()));
        let out = html2text(Artifact::Text("<b>hi</b>".to_string()), &args).unwrap();
        assert_eq!(out.as_text(), "hi");
    }

    #[test]
    fn test_beautify_reindents_html() {
        let out = beautify(Artifact::Text("<div><p>hi</p></div>".to_string())).unwrap();
        assert!(out.as_text().contains("\n"));
    }

    #[test]
    fn test_beautify_reformats_embedded_css() {
        let out = beautify(Artifact::Text(
            "<style>body{color:red;margin:0;}</style>".to_string(),
        ))
        .unwrap();
        let text = out.as_text();
        assert!(text.contains("color:red;"));
        assert!(text.contains("}"));
    }
}
