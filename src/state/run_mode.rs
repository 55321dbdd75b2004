/// Dispatch modes of the bulk orchestrator
use std::fmt;

/// Selects which manifest entries a run dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunMode {
    /// Start from empty progress and scrape every entry
    Normal,

    /// Load progress and skip entries already completed
    Resume,

    /// Load progress but re-scrape every entry, completed or not
    Force,

    /// Load progress and dispatch exactly the entries with a recorded error
    RetryErrorsOnly,
}

impl RunMode {
    /// Resolves CLI flags into a mode; `retry_errors` wins, then `force`
    pub fn from_flags(resume: bool, force: bool, retry_errors: bool) -> Self {
        if retry_errors {
            Self::RetryErrorsOnly
        } else if force {
            Self::Force
        } else if resume {
            Self::Resume
        } else {
            Self::Normal
        }
    }

    /// Returns true if persisted progress is loaded before dispatch
    pub fn loads_progress(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Resume => "resume",
            Self::Force => "force",
            Self::RetryErrorsOnly => "retry-errors",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(RunMode::from_flags(false, false, false), RunMode::Normal);
        assert_eq!(RunMode::from_flags(true, false, false), RunMode::Resume);
        assert_eq!(RunMode::from_flags(true, true, false), RunMode::Force);
        assert_eq!(RunMode::from_flags(false, false, true), RunMode::RetryErrorsOnly);
    }

    #[test]
    fn test_loads_progress() {
        assert!(!RunMode::Normal.loads_progress());
        assert!(RunMode::Resume.loads_progress());
        assert!(RunMode::Force.loads_progress());
        assert!(RunMode::RetryErrorsOnly.loads_progress());
    }
}
