//! Prediction output lines.

use std::io::Write;

use tracing::warn;

use crate::example::{PdfSegment, SampledAction};

/// Formats like a default C++ output stream (`%g`, six significant digits),
/// which the prediction file format is defined by.
pub fn format_g(value: f32) -> String {
    let v = f64::from(value);
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{v:.5e}");
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };
    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    } else {
        let decimals = (5 - exponent) as usize;
        trim_fraction(&format!("{v:.decimals$}")).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// `"<action>::<density>\n"`
pub fn action_pdf_line(chosen: &SampledAction) -> String {
    format!("{}::{}\n", format_g(chosen.action), format_g(chosen.density))
}

/// Space-terminated `%f` densities of every segment, followed by the tag.
pub fn pdf_line(pdf: &[PdfSegment], tag: Option<&str>) -> String {
    let mut line: String = pdf.iter().map(|s| format!("{:.6} ", s.density)).collect();
    if let Some(tag) = tag {
        line.push_str(tag);
    }
    line.push('\n');
    line
}

/// 1-based index and value of the densest segment, `"<id>:<density>"`.
pub fn pdf_mode(pdf: &[PdfSegment]) -> String {
    let mut max_density = 0.0f32;
    let mut max_id = 0usize;
    for (i, segment) in pdf.iter().enumerate() {
        if segment.density > max_density {
            max_density = segment.density;
            max_id = i + 1;
        }
    }
    format!("{max_id}:{max_density:.6}")
}

/// Writes `line` to every sink; a failing sink is logged and skipped.
pub fn write_to_sinks(sinks: &mut [Box<dyn Write>], line: &str) {
    for (index, sink) in sinks.iter_mut().enumerate() {
        if let Err(err) = sink.write_all(line.as_bytes()) {
            warn!(sink = index, error = %err, "failed to write prediction");
        }
    }
}
