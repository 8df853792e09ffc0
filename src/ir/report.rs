// Pretty diagnostic rendering for IR load errors using ariadne

use crate::ir::Span;
use ariadne::{Color, Label, Report, ReportKind, Source};

/// Render a batch of load diagnostics into a single report string
pub fn render_errors(filename: &str, source: &str, errors: &[(String, Span)]) -> String {
    let mut out = Vec::new();
    for (message, span) in errors {
        let report = Report::build(ReportKind::Error, span.start..span.end)
            .with_message(message.clone())
            .with_label(
                Label::new(span.start..span.end)
                    .with_message(message.clone())
                    .with_color(Color::Red),
            )
            .finish();
        let mut buf = Vec::new();
        if report.write(Source::from(source), &mut buf).is_ok() {
            out.extend_from_slice(&buf);
            out.push(b'\n');
        }
    }
    let rendered = String::from_utf8_lossy(&out).into_owned();
    format!("{}: failed to load IR\n{}", filename, rendered)
}
