//! Diagnostic reports and the handler that collects them.
//!
//! Diagnostics are recorded, never thrown past a stage boundary: a stage
//! fails iff the handler recorded at least one error while it ran. Warnings
//! never fail a stage.

use crate::source::{SourceArea, SourceMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A single diagnostic record.
#[derive(Debug, Clone)]
pub struct Report {
    pub severity: Severity,
    pub code: Option<String>,
    pub file: String,
    pub row: u32,
    pub col: u32,
    pub message: String,
    /// Human-readable scope descriptions, innermost last.
    pub context: Vec<String>,
}

impl Report {
    pub fn format(&self) -> String {
        let mut s = String::new();
        for ctx in &self.context {
            s.push_str("in ");
            s.push_str(ctx);
            s.push_str(":\n");
        }
        if self.row > 0 {
            s.push_str(&format!(
                "{} ({}:{}:{}) : {}",
                self.severity.as_str(),
                self.file,
                self.row,
                self.col,
                self.message
            ));
        } else {
            s.push_str(&format!("{} : {}", self.severity.as_str(), self.message));
        }
        if let Some(code) = &self.code {
            s.push_str(&format!(" [{}]", code));
        }
        s
    }
}

/// Sink for diagnostic reports.
pub trait Log {
    fn submit_report(&mut self, report: &Report);
}

/// Log that prints every report to stderr.
#[derive(Debug, Default)]
pub struct StdLog;

impl Log for StdLog {
    fn submit_report(&mut self, report: &Report) {
        eprintln!("{}", report.format());
    }
}

/// Collects reports during a compilation and forwards them to an optional
/// log sink. Also owns the source map so areas can be rendered to file
/// names at submit time.
pub struct ReportHandler<'a> {
    log: Option<&'a mut dyn Log>,
    source_map: SourceMap,
    context_stack: Vec<String>,
    num_errors: usize,
    num_warnings: usize,
}

impl<'a> ReportHandler<'a> {
    pub fn new(log: Option<&'a mut dyn Log>) -> Self {
        ReportHandler {
            log,
            source_map: SourceMap::new(),
            context_stack: Vec::new(),
            num_errors: 0,
            num_warnings: 0,
        }
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    pub fn source_map_mut(&mut self) -> &mut SourceMap {
        &mut self.source_map
    }

    /// Pushes a context description, e.g. "function 'foo(int)'".
    pub fn push_context(&mut self, desc: String) {
        self.context_stack.push(desc);
    }

    pub fn pop_context(&mut self) {
        self.context_stack.pop();
    }

    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    pub fn has_errors(&self) -> bool {
        self.num_errors > 0
    }

    pub fn submit(
        &mut self,
        severity: Severity,
        message: &str,
        area: Option<SourceArea>,
        code: Option<&str>,
    ) {
        match severity {
            Severity::Error => self.num_errors += 1,
            Severity::Warning => self.num_warnings += 1,
            Severity::Info => {}
        }

        let (file, row, col) = match area {
            Some(area) if area.is_valid() => (
                self.source_map.name(area.pos.file).to_string(),
                area.pos.row,
                area.pos.col,
            ),
            _ => (String::new(), 0, 0),
        };

        let report = Report {
            severity,
            code: code.map(str::to_string),
            file,
            row,
            col,
            message: message.to_string(),
            context: self.context_stack.clone(),
        };

        if let Some(log) = self.log.as_mut() {
            log.submit_report(&report);
        }
    }

    pub fn error(&mut self, message: &str, area: Option<SourceArea>) {
        self.submit(Severity::Error, message, area, None);
    }

    pub fn warning(&mut self, message: &str, area: Option<SourceArea>) {
        self.submit(Severity::Warning, message, area, None);
    }

    pub fn info(&mut self, message: &str) {
        self.submit(Severity::Info, message, None, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceArea, SourcePos};

    #[derive(Default)]
    struct CollectLog(Vec<Report>);

    impl Log for CollectLog {
        fn submit_report(&mut self, report: &Report) {
            self.0.push(report.clone());
        }
    }

    #[test]
    fn test_error_counting_and_context() {
        let mut log = CollectLog::default();
        {
            let mut handler = ReportHandler::new(Some(&mut log));
            let file = handler.source_map_mut().intern("a.hlsl");
            handler.push_context("function 'main()'".to_string());
            handler.error(
                "undeclared identifier 'foo'",
                Some(SourceArea::new(SourcePos::new(file, 4, 9), 3)),
            );
            handler.warning("techniques are ignored", None);
            assert!(handler.has_errors());
            assert_eq!(handler.num_errors(), 1);
            assert_eq!(handler.num_warnings(), 1);
        }
        assert_eq!(log.0.len(), 2);
        assert_eq!(log.0[0].file, "a.hlsl");
        assert_eq!(log.0[0].row, 4);
        assert_eq!(log.0[0].context, vec!["function 'main()'".to_string()]);
    }
}
