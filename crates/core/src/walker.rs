use crate::config::RunConfig;
use crate::entry::{error_chain, LogEntry};
use crate::record::{display_name, FileRecord};
use crate::resolver::resolve_current_timestamp;
use crate::writer::{self, WriteError};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("フォルダが存在しません: {}", .0.display())]
    DirectoryNotFound(PathBuf),
}

/// Lazy, ordered walk over a directory tree.
///
/// Files of a directory are visited before its subdirectories; both follow
/// the host's directory-listing order. Symlinked directories are followed
/// without loop detection.
#[derive(Debug)]
pub struct Walk {
    config: RunConfig,
    pending_dirs: Vec<PathBuf>,
    pending_files: VecDeque<PathBuf>,
    ready: VecDeque<LogEntry>,
}

pub fn walk(config: RunConfig) -> Result<Walk, WalkError> {
    if !config.root.is_dir() {
        return Err(WalkError::DirectoryNotFound(config.root));
    }
    Ok(Walk {
        pending_dirs: vec![config.root.clone()],
        pending_files: VecDeque::new(),
        ready: VecDeque::new(),
        config,
    })
}

impl Iterator for Walk {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        loop {
            if let Some(entry) = self.ready.pop_front() {
                return Some(entry);
            }
            if let Some(path) = self.pending_files.pop_front() {
                self.process_file(path);
                continue;
            }
            let dir = self.pending_dirs.pop()?;
            self.enter_directory(&dir);
        }
    }
}

impl Walk {
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn enter_directory(&mut self, dir: &Path) {
        log::debug!("フォルダを走査します: {}", dir.display());
        let mut subdirs = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
        {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => subdirs.push(entry.into_path()),
                Ok(entry) => self.pending_files.push_back(entry.into_path()),
                Err(err) => {
                    let path = err.path().unwrap_or(dir).to_path_buf();
                    self.ready
                        .push_back(LogEntry::failed(display_name(&path), path, &err));
                }
            }
        }
        // Stack order: the first listed subdirectory is entered next.
        self.pending_dirs.extend(subdirs.into_iter().rev());
    }

    fn process_file(&mut self, path: PathBuf) {
        let mut record = FileRecord::new(path);
        record.matched = self.config.filter.matches(&record.name);
        if !record.matched {
            self.ready.push_back(LogEntry::Unchanged {
                name: record.name,
                path: record.path,
            });
            return;
        }

        let mut update_tag = self.config.updates_date_taken();
        let target = if self.config.absolute {
            self.config.offset.to_absolute()
        } else {
            let resolved = match resolve_current_timestamp(&record.path) {
                Ok(resolved) => resolved,
                Err(err) => return self.fail(record, &err),
            };
            if let Some(err) = &resolved.tag_error {
                self.ready
                    .push_back(LogEntry::failed(record.name.clone(), record.path.clone(), err));
                update_tag = false;
            }
            record.current = Some(resolved.timestamp);
            record.source = Some(resolved.source);
            self.config.offset.apply_to(resolved.timestamp)
        };
        let target = match target {
            Ok(target) => target,
            Err(err) => return self.fail(record, &err),
        };
        record.target = Some(target);

        if self.config.is_apply() {
            let result = writer::apply(&record.path, target, update_tag);
            if let Err(err) = result {
                match self.settle_write(record, err) {
                    Some(kept) => record = kept,
                    None => return,
                }
            }
            log::info!(
                "{} -> {} ({:?})",
                record.path.display(),
                target,
                record.source
            );
        }

        let entry = if self.config.absolute {
            LogEntry::SetDate {
                name: record.name,
                path: record.path,
                target,
            }
        } else {
            LogEntry::ApplyOffset {
                name: record.name,
                path: record.path,
                target,
            }
        };
        self.ready.push_back(entry);
    }

    fn fail(&mut self, record: FileRecord, err: &dyn std::error::Error) {
        log::warn!("{}: {}", record.path.display(), error_chain(err));
        self.ready
            .push_back(LogEntry::failed(record.name, record.path, err));
    }

    /// Logs a write failure. The record is handed back when the filesystem
    /// times were still written and the file should count as changed.
    fn settle_write(&mut self, record: FileRecord, err: WriteError) -> Option<FileRecord> {
        if let WriteError::Tag { .. } = err {
            log::warn!("{}", error_chain(&err));
            self.ready.push_back(LogEntry::failed(
                record.name.clone(),
                record.path.clone(),
                &err,
            ));
            return Some(record);
        }
        self.fail_write(record, err);
        None
    }

    fn fail_write(&mut self, record: FileRecord, err: WriteError) {
        match err {
            WriteError::ReplaceFailed { ref temp_path, .. } => {
                log::error!("{}", error_chain(&err));
                self.ready.push_back(LogEntry::FileMissing {
                    name: record.name,
                    path: record.path,
                    temp_path: temp_path.clone(),
                    message: error_chain(&err),
                });
            }
            other => self.fail(record, &other),
        }
    }
}
