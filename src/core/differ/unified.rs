use similar::{ChangeTag, TextDiff};

use super::{ComparisonMode, DiffContext, DiffOutcome, ReportKind, format_timestamp};
use crate::core::errors::WcError;

/// Line-unified diff (§4.4 `unified`), including the additions-only /
/// deletions-only comparison modes ported from the original's
/// `_generate_diff` (handler.py).
pub fn diff(old_data: &[u8], new_data: &[u8], ctx: &DiffContext, kind: ReportKind) -> Result<DiffOutcome, WcError> {
    let old_data = String::from_utf8_lossy(old_data);
    let new_data = String::from_utf8_lossy(new_data);
    let old_data = old_data.as_ref();
    let new_data = new_data.as_ref();

    let context_lines = ctx.context_lines.unwrap_or(match ctx.comparison_mode {
        ComparisonMode::Full => 3,
        _ => 0,
    });

    let old_header = format!("--- @ {}", format_timestamp(ctx.old_timestamp, ctx.tz.as_deref()));
    let new_header = format!("+++ @ {}", format_timestamp(ctx.new_timestamp, ctx.tz.as_deref()));

    let mut lines: Vec<String> = vec![old_header.clone(), new_header.clone()];
    let text_diff = TextDiff::from_lines(old_data, new_data);
    for hunk in text_diff.unified_diff().context_radius(context_lines).iter_hunks() {
        lines.push(hunk.header().to_string());
        for change in hunk.iter_changes() {
            let prefix = match change.tag() {
                ChangeTag::Delete => '-',
                ChangeTag::Insert => '+',
                ChangeTag::Equal => ' ',
            };
            let text = change.to_string_lossy();
            lines.push(format!("{prefix}{}", text.trim_end_matches('\n')));
        }
    }

    if lines.len() == 2 {
        return Ok(DiffOutcome::NoReport);
    }

    let outcome = match ctx.comparison_mode {
        ComparisonMode::Full => DiffOutcome::Diff(lines.join("\n")),
        ComparisonMode::AdditionsOnly => additions_only(old_data, new_data, &lines, &old_header),
        ComparisonMode::DeletionsOnly => deletions_only(&lines, &new_header),
    };

    Ok(render(outcome, kind))
}

fn additions_only(old_data: &str, new_data: &str, lines: &[String], old_header: &str) -> DiffOutcome {
    if !old_data.is_empty() && (new_data.len() as f64 / old_data.len() as f64) <= 0.25 {
        let mut out = vec![
            lines[0].clone(),
            lines[1].clone(),
            "/**Comparison type: Additions only**".to_string(),
            "/**Deletions are being shown as 75% or more of the content has been deleted**".to_string(),
        ];
        out.extend(lines[2..].iter().cloned());
        return DiffOutcome::Diff(out.join("\n"));
    }

    let head = format!("...{}", &old_header[3..]);
    let filtered: Vec<String> = lines
        .iter()
        .filter(|l| l.starts_with('+') || l.starts_with('@'))
        .cloned()
        .collect();
    let trimmed = drop_trailing_header(collapse_adjacent_headers(filtered));

    if trimmed.len() <= 1 {
        return DiffOutcome::NoReport;
    }

    let mut out = vec![head, trimmed[0].clone(), "/**Comparison type: Additions only**".to_string()];
    out.extend(trimmed[1..].iter().cloned());
    DiffOutcome::Diff(out.join("\n"))
}

fn deletions_only(lines: &[String], new_header: &str) -> DiffOutcome {
    let head = format!("...{}", &new_header[3..]);
    let filtered: Vec<String> = lines
        .iter()
        .filter(|l| l.starts_with('-') || l.starts_with('@'))
        .cloned()
        .collect();
    let trimmed = drop_trailing_header(collapse_adjacent_headers(filtered));

    if trimmed.len() <= 1 {
        return DiffOutcome::NoReport;
    }

    let mut out = vec![trimmed[0].clone(), head, "/**Comparison type: Deletions only**".to_string()];
    out.extend(trimmed[1..].iter().cloned());
    DiffOutcome::Diff(out.join("\n"))
}

fn collapse_adjacent_headers(lines: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    for i in 0..lines.len() {
        let next_is_header = lines.get(i + 1).map(|s| s.starts_with('@')).unwrap_or(false);
        if lines[i].starts_with('@') && next_is_header {
            continue;
        }
        out.push(lines[i].clone());
    }
    out
}

fn drop_trailing_header(mut lines: Vec<String>) -> Vec<String> {
    if lines.last().map(|s| s.starts_with('@')).unwrap_or(false) {
        lines.pop();
    }
    lines
}

fn render(outcome: DiffOutcome, kind: ReportKind) -> DiffOutcome {
    let DiffOutcome::Diff(body) = outcome else {
        return outcome;
    };
    match kind {
        ReportKind::Text | ReportKind::Markdown => DiffOutcome::Diff(body),
        ReportKind::Html => DiffOutcome::Diff(to_html_table(&body)),
    }
}

fn to_html_table(body: &str) -> String {
    let mut html = String::from("<table class=\"diff\">\n");
    for line in body.lines() {
        let class = if line.starts_with('+') {
            "diff-add"
        } else if line.starts_with('-') {
            "diff-del"
        } else if line.starts_with('@') {
            "diff-hunk"
        } else {
            "diff-ctx"
        };
        html.push_str(&format!(
            "<tr class=\"{class}\"><td>{}</td></tr>\n",
            html_escape(line)
        ));
    }
    html.push_str("</table>");
    html
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
