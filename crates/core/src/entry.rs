use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::path::PathBuf;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One line of walk output, in visiting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    Unchanged {
        name: String,
        path: PathBuf,
    },
    ApplyOffset {
        name: String,
        path: PathBuf,
        target: NaiveDateTime,
    },
    SetDate {
        name: String,
        path: PathBuf,
        target: NaiveDateTime,
    },
    Failed {
        name: String,
        path: PathBuf,
        message: String,
    },
    /// The original was deleted but the rewritten copy could not be moved
    /// into its place.
    FileMissing {
        name: String,
        path: PathBuf,
        temp_path: PathBuf,
        message: String,
    },
}

impl LogEntry {
    pub fn failed(name: impl Into<String>, path: impl Into<PathBuf>, err: &dyn Error) -> Self {
        LogEntry::Failed {
            name: name.into(),
            path: path.into(),
            message: error_chain(err),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LogEntry::Unchanged { name, .. }
            | LogEntry::ApplyOffset { name, .. }
            | LogEntry::SetDate { name, .. }
            | LogEntry::Failed { name, .. }
            | LogEntry::FileMissing { name, .. } => name,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LogEntry::Failed { .. } | LogEntry::FileMissing { .. })
    }

    pub fn is_change(&self) -> bool {
        matches!(self, LogEntry::ApplyOffset { .. } | LogEntry::SetDate { .. })
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEntry::Unchanged { name, .. } => write!(f, "Unchanged: {name}"),
            LogEntry::ApplyOffset { name, target, .. } => {
                write!(f, "ApplyOffset: {name} {}", target.format(TIMESTAMP_FORMAT))
            }
            LogEntry::SetDate { name, target, .. } => {
                write!(f, "SetDate: {name} {}", target.format(TIMESTAMP_FORMAT))
            }
            LogEntry::Failed { name, message, .. } => write!(f, "Error: {name}: {message}"),
            LogEntry::FileMissing {
                name,
                temp_path,
                message,
                ..
            } => write!(
                f,
                "FileMissing: {name}: {message} (データは {} に残っています)",
                temp_path.display()
            ),
        }
    }
}

pub(crate) fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io;

    fn target() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 6, 2)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date")
    }

    #[test]
    fn renders_log_lines() {
        let unchanged = LogEntry::Unchanged {
            name: "note.txt".to_string(),
            path: PathBuf::from("/root/note.txt"),
        };
        assert_eq!(unchanged.to_string(), "Unchanged: note.txt");

        let offset = LogEntry::ApplyOffset {
            name: "DSC_1.jpg".to_string(),
            path: PathBuf::from("/root/DSC_1.jpg"),
            target: target(),
        };
        assert_eq!(offset.to_string(), "ApplyOffset: DSC_1.jpg 2023-06-02 00:00:00");

        let set = LogEntry::SetDate {
            name: "DSC_1.jpg".to_string(),
            path: PathBuf::from("/root/DSC_1.jpg"),
            target: target(),
        };
        assert_eq!(set.to_string(), "SetDate: DSC_1.jpg 2023-06-02 00:00:00");
        assert!(set.is_change());
        assert!(!set.is_error());
    }

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] io::Error);

    #[test]
    fn failed_entry_flattens_source_chain() {
        let err = Outer(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        let entry = LogEntry::failed("a.jpg", "/x/a.jpg", &err);
        assert_eq!(entry.to_string(), "Error: a.jpg: outer: denied");
        assert!(entry.is_error());
        assert_eq!(entry.name(), "a.jpg");
    }

    #[test]
    fn file_missing_names_the_surviving_copy() {
        let entry = LogEntry::FileMissing {
            name: "a.jpg".to_string(),
            path: PathBuf::from("/x/a.jpg"),
            temp_path: PathBuf::from("/x/a.jpg.temp.jpg"),
            message: "rename failed".to_string(),
        };
        let line = entry.to_string();
        assert!(line.starts_with("FileMissing: a.jpg: rename failed"));
        assert!(line.contains("/x/a.jpg.temp.jpg"));
        assert!(entry.is_error());
    }
}
