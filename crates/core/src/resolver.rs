use crate::exif_tag::{is_tag_image, read_date_taken, TagError};
use crate::record::TimestampSource;
use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("ファイル情報を読めませんでした: {}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
pub struct ResolvedTimestamp {
    pub timestamp: NaiveDateTime,
    pub source: TimestampSource,
    /// Set when the image could not be decoded and the filesystem value
    /// was used instead.
    pub tag_error: Option<TagError>,
}

/// Effective creation time of a file: the date-taken tag of a supported
/// image when present, otherwise the earlier of creation and modification.
pub fn resolve_current_timestamp(path: &Path) -> Result<ResolvedTimestamp, ResolveError> {
    let fallback = filesystem_timestamp(path)?;
    let mut resolved = ResolvedTimestamp {
        timestamp: fallback,
        source: TimestampSource::Filesystem,
        tag_error: None,
    };

    if !is_tag_image(path) {
        return Ok(resolved);
    }

    match fs::read(path)
        .map_err(TagError::from)
        .and_then(|bytes| read_date_taken(&bytes))
    {
        Ok(Some(taken)) => {
            resolved.timestamp = taken;
            resolved.source = TimestampSource::DateTaken;
        }
        Ok(None) => {}
        Err(err) => {
            log::warn!("撮影日時を読めないためファイル日時を使います: {}: {err}", path.display());
            resolved.tag_error = Some(err);
        }
    }
    Ok(resolved)
}

pub fn filesystem_timestamp(path: &Path) -> Result<NaiveDateTime, ResolveError> {
    let metadata = fs::metadata(path).map_err(|source| ResolveError::Metadata {
        path: path.to_path_buf(),
        source,
    })?;
    let modified = metadata
        .modified()
        .map_err(|source| ResolveError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
    // Not every platform/filesystem records a creation time.
    let created = metadata.created().ok();

    Ok(earliest(
        created.map(system_time_to_local),
        system_time_to_local(modified),
    ))
}

pub fn earliest(created: Option<NaiveDateTime>, modified: NaiveDateTime) -> NaiveDateTime {
    match created {
        Some(created) if created < modified => created,
        _ => modified,
    }
}

pub(crate) fn system_time_to_local(time: SystemTime) -> NaiveDateTime {
    let local = DateTime::<Local>::from(time).naive_local();
    local.with_nanosecond(0).unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif_tag::fixtures::jpeg_with_date_taken;
    use chrono::{NaiveDate, TimeZone};
    use filetime::FileTime;
    use std::fs;
    use tempfile::tempdir;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(hh, mm, ss))
            .expect("valid fixture date")
    }

    fn set_local_mtime(path: &Path, value: NaiveDateTime) {
        let local = Local
            .from_local_datetime(&value)
            .earliest()
            .expect("local time exists");
        let time = FileTime::from_system_time(SystemTime::from(local));
        filetime::set_file_times(path, time, time).expect("set file times");
    }

    #[test]
    fn earliest_prefers_older_creation_time() {
        let created = at(2020, 1, 2, 10, 0, 0);
        let modified = at(2020, 1, 1, 9, 0, 0);
        assert_eq!(earliest(Some(created), modified), modified);
        assert_eq!(earliest(Some(modified), created), modified);
        assert_eq!(earliest(None, created), created);
    }

    #[test]
    fn plain_file_resolves_to_filesystem_time() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("note.txt");
        fs::write(&path, b"x").expect("write");
        set_local_mtime(&path, at(2020, 1, 1, 9, 0, 0));

        let resolved = resolve_current_timestamp(&path).expect("resolve");
        assert_eq!(resolved.timestamp, at(2020, 1, 1, 9, 0, 0));
        assert_eq!(resolved.source, TimestampSource::Filesystem);
        assert!(resolved.tag_error.is_none());
    }

    #[test]
    fn date_taken_overrides_filesystem_time() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("DSC_0001.JPG");
        fs::write(&path, jpeg_with_date_taken("2018:03:04 05:06:07")).expect("write");
        set_local_mtime(&path, at(2020, 1, 1, 9, 0, 0));

        let resolved = resolve_current_timestamp(&path).expect("resolve");
        assert_eq!(resolved.timestamp, at(2018, 3, 4, 5, 6, 7));
        assert_eq!(resolved.source, TimestampSource::DateTaken);
    }

    #[test]
    fn tag_is_ignored_for_unsupported_extensions() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("DSC_0001.raw");
        fs::write(&path, jpeg_with_date_taken("2018:03:04 05:06:07")).expect("write");
        set_local_mtime(&path, at(2020, 1, 1, 9, 0, 0));

        let resolved = resolve_current_timestamp(&path).expect("resolve");
        assert_eq!(resolved.timestamp, at(2020, 1, 1, 9, 0, 0));
    }

    #[test]
    fn undecodable_image_falls_back_with_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("broken.jpg");
        fs::write(&path, b"definitely not a jpeg").expect("write");
        set_local_mtime(&path, at(2021, 7, 1, 12, 30, 0));

        let resolved = resolve_current_timestamp(&path).expect("resolve");
        assert_eq!(resolved.timestamp, at(2021, 7, 1, 12, 30, 0));
        assert_eq!(resolved.source, TimestampSource::Filesystem);
        assert!(matches!(resolved.tag_error, Some(TagError::UnknownFormat)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let err = resolve_current_timestamp(&temp.path().join("gone.jpg"))
            .expect_err("missing file");
        assert!(err.to_string().contains("gone.jpg"));
    }
}
