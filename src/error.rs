/// What went wrong, coarse enough for callers to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Snapshot missing, unreadable, or lacking a required column.
    Load,
    /// Filtered subset exceeds the export row cap. Nothing was written.
    ExportTooLarge { rows: usize, cap: usize },
    /// Invalid flags or filter values.
    Usage,
    /// Filesystem errors outside of loading (exports, log directory).
    Io,
    /// Terminal setup/draw/event errors.
    Terminal,
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            kind,
            exit_code,
            message: message.into(),
        }
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Load, 2, message)
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, 2, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, 2, message)
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Terminal, 4, message)
    }

    pub fn export_too_large(rows: usize, cap: usize) -> Self {
        Self::new(
            ErrorKind::ExportTooLarge { rows, cap },
            3,
            format!(
                "Export refused: {rows} rows match the current filters, above the limit of {cap}. Narrow the filters and try again."
            ),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn is_export_too_large(&self) -> bool {
        matches!(self.kind, ErrorKind::ExportTooLarge { .. })
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_too_large_carries_counts() {
        let err = AppError::export_too_large(12, 10);
        assert!(err.is_export_too_large());
        assert_eq!(err.kind(), ErrorKind::ExportTooLarge { rows: 12, cap: 10 });
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("12 rows"));
    }

    #[test]
    fn load_errors_exit_with_two() {
        let err = AppError::load("missing");
        assert_eq!(err.kind(), ErrorKind::Load);
        assert_eq!(err.exit_code(), 2);
        assert!(!err.is_export_too_large());
    }
}
