use crate::{backend::chunk::SourceLocation, frontend::source::SourceSpan, SourceMap};

#[derive(Debug, Clone, PartialEq)]
pub struct VesperPipelineError(Vec<VesperCompilerError>);

impl VesperPipelineError {
    pub fn new(errors: Vec<VesperCompilerError>) -> Self {
        Self(errors)
    }

    pub fn all(&self) -> &[VesperCompilerError] {
        &self.0
    }

    pub fn into_errors(self) -> Vec<VesperCompilerError> {
        self.0
    }
}

impl std::fmt::Display for VesperPipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for error in &self.0 {
            writeln!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for VesperPipelineError {}

#[derive(Debug, Clone, PartialEq, Copy)]
pub enum VesperErrorKind {
    Syntax,
}

impl std::fmt::Display for VesperErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax => write!(f, "Syntax Error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VesperCompilerError {
    pub message: String,
    pub span: SourceSpan,
    pub kind: VesperErrorKind,
}

impl VesperCompilerError {
    pub fn new_syntax_error(message: String, span: SourceSpan) -> Self {
        Self {
            message,
            span,
            kind: VesperErrorKind::Syntax,
        }
    }

    /// Rewrites the message to include its source position; used when
    /// surfacing diagnostics to the user.
    pub fn into_formatted(self, source_map: &SourceMap) -> Self {
        let line = source_map.get_line_number(self.span.start);
        let col = source_map.get_column_number(self.span.start);

        Self {
            message: format!("{} at line {}, column {}: {}", self.kind, line, col, self.message),
            span: self.span,
            kind: self.kind,
        }
    }
}

impl std::fmt::Display for VesperCompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for VesperCompilerError {}

#[derive(Debug, Clone)]
pub struct NativeFunctionError(pub String);

impl NativeFunctionError {
    pub fn new(message: &str) -> Self {
        Self(message.to_string())
    }

    pub fn into_runtime_error(self, loc: SourceLocation) -> VesperRuntimeError {
        VesperRuntimeError::new(self.0, loc)
    }
}

impl From<&'static str> for NativeFunctionError {
    fn from(value: &'static str) -> Self {
        NativeFunctionError::new(value)
    }
}

/// One frame of a runtime stack trace, innermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    callee: String,
    loc: SourceLocation,
}

impl Trace {
    pub fn new(callee: &str, loc: SourceLocation) -> Self {
        Self {
            callee: callee.to_string(),
            loc,
        }
    }
}

impl std::fmt::Display for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  [line {}] in {}", self.loc.line, self.callee)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VesperRuntimeError {
    pub message: String,
    pub stack_trace: Vec<Trace>,
}

impl VesperRuntimeError {
    pub fn new(message: String, loc: SourceLocation) -> Self {
        Self {
            message: format!(
                "Runtime Error at line {}, column {}: {}",
                loc.line, loc.col, message
            ),
            stack_trace: Vec::new(),
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: Vec<Trace>) -> Self {
        self.stack_trace = stack_trace;
        self
    }
}

impl std::fmt::Display for VesperRuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.stack_trace.is_empty() {
            writeln!(f)?;
            writeln!(f, "Stack trace:")?;
            for trace in &self.stack_trace {
                writeln!(f, "{}", trace)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for VesperRuntimeError {}

/// Collects compile diagnostics so a single run can report several.
#[derive(Debug, Clone, Default)]
pub struct ErrorReporter {
    errors: Vec<VesperCompilerError>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn report_error(&mut self, error: VesperCompilerError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[VesperCompilerError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<VesperCompilerError> {
        std::mem::take(&mut self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_errors_carry_line_and_column() {
        let source_map = SourceMap::new("var x = ;".to_string());
        let error = VesperCompilerError::new_syntax_error(
            "Expect expression.".to_string(),
            SourceSpan::new(8, 9),
        )
        .into_formatted(&source_map);

        assert_eq!(
            error.message,
            "Syntax Error at line 1, column 9: Expect expression."
        );
    }

    #[test]
    fn reporter_accumulates_multiple_errors() {
        let mut reporter = ErrorReporter::new();
        assert!(!reporter.has_errors());

        reporter.report_error(VesperCompilerError::new_syntax_error(
            "first".to_string(),
            SourceSpan::default(),
        ));
        reporter.report_error(VesperCompilerError::new_syntax_error(
            "second".to_string(),
            SourceSpan::default(),
        ));

        assert_eq!(reporter.errors().len(), 2);
        assert_eq!(reporter.take_errors().len(), 2);
        assert!(!reporter.has_errors());
    }

    #[test]
    fn runtime_errors_render_their_stack_trace() {
        let error = VesperRuntimeError::new(
            "Operand must be a number.".to_string(),
            SourceLocation::new(3, 5),
        )
        .with_stack_trace(vec![
            Trace::new("inner", SourceLocation::new(3, 5)),
            Trace::new("(script)", SourceLocation::new(7, 1)),
        ]);

        let rendered = error.to_string();
        assert!(rendered.contains("Runtime Error at line 3, column 5"));
        assert!(rendered.contains("[line 3] in inner"));
        assert!(rendered.contains("[line 7] in (script)"));
    }
}
