//! Text example lines: `[label tokens] ['tag] | features...`.
//!
//! Only the label and the feature count matter to the pipeline; feature
//! values are not interpreted.

use cbcont_core::{ContinuousLabel, Example, Result};

/// Parses one input line; blank lines yield `None`.
pub fn parse_example_line(line: &str) -> Result<Option<Example>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let (head, features) = match line.split_once('|') {
        Some((head, rest)) => (head, Some(rest)),
        None => (line, None),
    };

    let mut tag = None;
    let label_tokens = head.split_whitespace().filter(|token| {
        if let Some(stripped) = token.strip_prefix('\'') {
            tag = Some(stripped.to_string());
            false
        } else {
            true
        }
    });
    let label = ContinuousLabel::parse(label_tokens.collect::<Vec<_>>())?;

    let num_features = features.map(count_features).unwrap_or(0);
    let mut ec = Example::with_continuous_label(label, num_features);
    ec.tag = tag;
    Ok(Some(ec))
}

/// Counts feature tokens across namespaces. A namespace name directly follows
/// its `|` without whitespace and is not a feature.
fn count_features(namespaces: &str) -> usize {
    namespaces
        .split('|')
        .map(|ns| {
            let tokens = ns.split_whitespace().count();
            if ns.starts_with(char::is_whitespace) || ns.is_empty() {
                tokens
            } else {
                tokens.saturating_sub(1)
            }
        })
        .sum()
}
