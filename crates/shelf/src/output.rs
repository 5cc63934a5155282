//! Colored terminal output.

use console::{Style, Term};
use shelf_book::{BuildReport, BuildSummary};
use shelf_export::ExportReport;

/// Status lines on stderr.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    red: Style,
    cyan_bold: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan_bold: Style::new().cyan().bold(),
        }
    }

    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    pub(crate) fn success(&self, msg: &str) {
        let _ = self.term.write_line(&self.green.apply_to(msg).to_string());
    }

    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.term.write_line(&self.yellow.apply_to(msg).to_string());
    }

    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Result of the run (e.g. a preview URL), on stdout.
    pub(crate) fn highlight(&self, msg: &str) {
        let _ = Term::stdout().write_line(&self.cyan_bold.apply_to(msg).to_string());
    }

    /// One line per built book, then one warning per failed book.
    pub(crate) fn build_summary(&self, summary: &BuildSummary) {
        for report in &summary.reports {
            self.info(&book_line(report));
        }
        for failure in &summary.failures {
            self.warning(&format!("Book failed: {failure}"));
        }
        let built = summary.reports.len();
        if summary.is_ok() {
            self.success(&format!("Built {built} book(s)"));
        } else {
            self.warning(&format!(
                "Built {built} book(s), {} failed",
                summary.failures.len()
            ));
        }
    }

    pub(crate) fn export_report(&self, target: &str, report: &ExportReport) {
        let line = format!(
            "Wrote {} files ({}) to {target}",
            report.files,
            human_bytes(report.bytes)
        );
        if report.failures == 0 {
            self.success(&line);
        } else {
            self.warning(&format!("{line}, {} failed", report.failures));
        }
    }
}

fn book_line(report: &BuildReport) -> String {
    let mut line = format!(
        "{}: {} pages ({} downloaded, {} from cache), {} images in {:.1}s",
        report.book,
        report.pages,
        report.downloaded,
        report.from_cache,
        report.images,
        report.elapsed.as_secs_f64()
    );
    if report.failed_pages > 0 {
        line.push_str(&format!(", {} pages missing", report.failed_pages));
    }
    line
}

#[allow(clippy::cast_precision_loss)]
fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
