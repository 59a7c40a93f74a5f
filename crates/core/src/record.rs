use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimestampSource {
    DateTaken,
    Filesystem,
}

/// Per-file state gathered during a walk. Lives only long enough to
/// produce one log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub name: String,
    pub matched: bool,
    pub current: Option<NaiveDateTime>,
    pub source: Option<TimestampSource>,
    pub target: Option<NaiveDateTime>,
}

impl FileRecord {
    pub fn new(path: PathBuf) -> Self {
        let name = display_name(&path);
        Self {
            path,
            name,
            matched: false,
            current: None,
            source: None,
            target: None,
        }
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::{display_name, FileRecord};
    use std::path::{Path, PathBuf};

    #[test]
    fn new_record_takes_file_name_and_starts_empty() {
        let record = FileRecord::new(PathBuf::from("/photos/2023/DSC_0001.JPG"));
        assert_eq!(record.name, "DSC_0001.JPG");
        assert!(!record.matched);
        assert_eq!(record.current, None);
        assert_eq!(record.source, None);
        assert_eq!(record.target, None);
    }

    #[test]
    fn display_name_falls_back_to_whole_path() {
        assert_eq!(display_name(Path::new("/")), "/");
        assert_eq!(display_name(Path::new("nested/dir")), "dir");
    }
}
