use std::fmt;

/// Failures that end the initialization chain. None of them are retried; a
/// fresh mount is needed to try again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("graphics API is not available on this platform")]
    UnsupportedPlatform,
    #[error("no suitable GPU adapter found")]
    NoAdapter,
    #[error("failed to create logical device: {0}")]
    DeviceRequest(String),
    #[error("drawable cannot produce a presentation context")]
    NoPresentationContext,
    #[error("failed to create {pipeline} pipeline: {message}")]
    PipelineCreation {
        pipeline: &'static str,
        message: String,
    },
    #[error("invalid scene description: {0}")]
    InvalidScene(String),
}

/// Failures isolated to a single frame. The loop keeps running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("surface unavailable: {0}")]
    Surface(String),
    #[error("GPU validation error: {0}")]
    Validation(String),
    #[error("out of GPU memory")]
    OutOfMemory,
    #[error("renderer resources were already released")]
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// One message from shader compilation. Logged, never fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDiagnostic {
    pub shader: &'static str,
    pub severity: DiagnosticSeverity,
    pub message: String,
    /// 1-based source line, when the compiler reports one.
    pub line: Option<u32>,
}

impl ShaderDiagnostic {
    pub fn log(&self) {
        match self.severity {
            DiagnosticSeverity::Error | DiagnosticSeverity::Warning => {
                tracing::warn!(shader = self.shader, line = ?self.line, "{}", self.message)
            }
            DiagnosticSeverity::Info => {
                tracing::debug!(shader = self.shader, line = ?self.line, "{}", self.message)
            }
        }
    }
}

impl fmt::Display for ShaderDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Info => "info",
        };
        match self.line {
            Some(line) => write!(f, "{} shader:{line}: {severity}: {}", self.shader, self.message),
            None => write!(f, "{} shader: {severity}: {}", self.shader, self.message),
        }
    }
}
