use crate::api::status::format_latency;
use crate::service::ConnectivityService;
use partsmart_core::{DiagnosticEntry, DiagnosticReport};

/// One row of the diagnostics modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticLine {
    pub name: String,
    pub ok: bool,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct DiagnosticView {
    pub base_url: String,
    pub lines: Vec<DiagnosticLine>,
    pub summary: String,
    pub report: DiagnosticReport,
}

/// Live sweep of every diagnostic endpoint of the active backend.
pub fn run_diagnostics(service: &ConnectivityService) -> DiagnosticView {
    let report = service.block_on(service.prober().full_diagnostic());
    render(report)
}

pub fn render(report: DiagnosticReport) -> DiagnosticView {
    let lines = report.tests.iter().map(render_entry).collect();
    let summary = format!(
        "{}/{} endpoints reachable",
        report.passed(),
        report.tests.len()
    );
    DiagnosticView {
        base_url: report.base_url.clone(),
        lines,
        summary,
        report,
    }
}

fn render_entry(entry: &DiagnosticEntry) -> DiagnosticLine {
    let mut text = format!(
        "{} {}  {}",
        if entry.is_connected { "✓" } else { "✗" },
        entry.name,
        format_latency(entry.response_time_ms)
    );
    if let Some(code) = entry.status_code {
        text.push_str(&format!(" ({})", code));
    }
    if let Some(error) = &entry.error {
        text.push(' ');
        text.push_str(error);
    }
    DiagnosticLine {
        name: entry.name.clone(),
        ok: entry.is_connected,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{PROD, test_service};

    #[test]
    fn renders_rows_in_report_order() {
        let t = test_service();
        t.transport
            .respond(&format!("{}/health", PROD), 200, r#"{"success":true}"#);
        t.transport.respond(&format!("{}/products", PROD), 200, "<html>");
        t.transport.respond(&format!("{}/stores", PROD), 401, "unauthorized");

        let view = run_diagnostics(&t.service);
        assert_eq!(view.base_url, PROD);
        let names: Vec<_> = view.lines.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["health", "products", "root", "auth", "stores"]);
        assert_eq!(view.summary, "2/5 endpoints reachable");

        assert!(view.lines[0].ok);
        assert!(view.lines[0].text.starts_with("✓ health"));
        assert!(view.lines[0].text.ends_with("(200)"));
        assert!(!view.lines[4].ok);
        assert!(view.lines[4].text.starts_with("✗ stores"));
        assert!(view.lines[4].text.ends_with("(401) HTTP 401"));
        assert!(view.lines[2].text.contains("cannot reach server"));
    }

    #[test]
    fn diagnostics_do_not_touch_connection_cache() {
        let t = test_service();
        t.transport
            .respond(&format!("{}/health", PROD), 200, r#"{"success":true}"#);
        run_diagnostics(&t.service);
        assert!(t.service.prober().last_status().is_none());
    }
}
