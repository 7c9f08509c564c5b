use similar::{ChangeTag, TextDiff};

use super::{DiffContext, DiffOutcome, ReportKind};
use crate::core::errors::WcError;

/// Word-level diff rendered as a two-column table (§4.4 `table`). Unlike
/// `unified`, this differ is line-unaware: it compares whole documents word
/// by word, which reads better for prose than for structured text.
pub fn diff(old_data: &[u8], new_data: &[u8], _ctx: &DiffContext, kind: ReportKind) -> Result<DiffOutcome, WcError> {
    let old_data = String::from_utf8_lossy(old_data);
    let new_data = String::from_utf8_lossy(new_data);
    let word_diff = TextDiff::from_words(old_data.as_ref(), new_data.as_ref());
    if word_diff.ratio() >= 1.0 {
        return Ok(DiffOutcome::NoReport);
    }

    let mut removed = String::new();
    let mut added = String::new();
    for change in word_diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => removed.push_str(change.value()),
            ChangeTag::Insert => added.push_str(change.value()),
            ChangeTag::Equal => {
                removed.push_str(change.value());
                added.push_str(change.value());
            }
        }
    }

    let body = match kind {
        ReportKind::Html => format!(
            "<table class=\"diff\">\n<tr><th>old</th><th>new</th></tr>\n<tr><td>{}</td><td>{}</td></tr>\n</table>",
            html_escape(&removed),
            html_escape(&added),
        ),
        ReportKind::Markdown => format!("| old | new |\n| --- | --- |\n| {removed} | {added} |"),
        ReportKind::Text => format!("old: {removed}\nnew: {added}"),
    };

    Ok(DiffOutcome::Diff(body))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
