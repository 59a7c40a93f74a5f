use crate::exif_tag::{is_tag_image, write_date_taken, TagError};
use chrono::{Local, NaiveDateTime, TimeZone};
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("画像を読めませんでした: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("一時ファイルに保存できませんでした: {}", temp_path.display())]
    SaveTemp {
        temp_path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("元ファイルを削除できませんでした: {}", path.display())]
    RemoveOriginal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The original is gone and `temp_path` holds the only copy.
    #[error(
        "元ファイル削除後に一時ファイルを戻せませんでした: {} -> {}",
        temp_path.display(),
        path.display()
    )]
    ReplaceFailed {
        path: PathBuf,
        temp_path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("撮影日時タグを更新できませんでした: {}", path.display())]
    Tag {
        path: PathBuf,
        #[source]
        source: TagError,
    },
    #[error("ローカル時刻に存在しない日時です: {0}")]
    NonexistentLocalTime(NaiveDateTime),
    #[error("タイムスタンプを設定できませんでした: {}", path.display())]
    SetTimes {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes `timestamp` to the file's creation and modification times and,
/// when `also_update_tag` is set, to an existing date-taken tag.
///
/// A tag that cannot be re-encoded does not stop the filesystem times from
/// being set; the failure is returned afterwards as [`WriteError::Tag`].
pub fn apply(
    path: &Path,
    timestamp: NaiveDateTime,
    also_update_tag: bool,
) -> Result<(), WriteError> {
    let mut tag_error = None;
    if also_update_tag && is_tag_image(path) {
        match update_date_taken(path, timestamp) {
            Err(err @ WriteError::Tag { .. }) => tag_error = Some(err),
            other => other?,
        }
    }
    set_file_times(path, timestamp)?;
    match tag_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn update_date_taken(path: &Path, timestamp: NaiveDateTime) -> Result<(), WriteError> {
    let original = fs::read(path).map_err(|source| WriteError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let rewritten = write_date_taken(&original, timestamp).map_err(|source| WriteError::Tag {
        path: path.to_path_buf(),
        source,
    })?;
    if rewritten == original {
        log::debug!("撮影日時タグがないため画像は変更しません: {}", path.display());
        return Ok(());
    }
    replace_contents(path, &rewritten)
}

/// Save to a sibling temp file, delete the original, rename the temp file
/// into place. A crash between delete and rename loses the original name.
fn replace_contents(path: &Path, contents: &[u8]) -> Result<(), WriteError> {
    let temp_path = temp_path_for(path);
    if let Err(source) = fs::write(&temp_path, contents) {
        let _ = fs::remove_file(&temp_path);
        return Err(WriteError::SaveTemp { temp_path, source });
    }

    if let Err(source) = fs::remove_file(path) {
        let _ = fs::remove_file(&temp_path);
        return Err(WriteError::RemoveOriginal {
            path: path.to_path_buf(),
            source,
        });
    }

    fs::rename(&temp_path, path).map_err(|source| WriteError::ReplaceFailed {
        path: path.to_path_buf(),
        temp_path,
        source,
    })
}

fn set_file_times(path: &Path, timestamp: NaiveDateTime) -> Result<(), WriteError> {
    let time = local_to_system_time(timestamp)?;
    let file_time = FileTime::from_system_time(time);
    filetime::set_file_times(path, file_time, file_time).map_err(|source| {
        WriteError::SetTimes {
            path: path.to_path_buf(),
            source,
        }
    })?;
    set_creation_time(path, time).map_err(|source| WriteError::SetTimes {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(any(windows, target_os = "macos", target_os = "ios"))]
fn set_creation_time(path: &Path, time: SystemTime) -> io::Result<()> {
    use std::fs::{FileTimes, OpenOptions};
    #[cfg(target_os = "ios")]
    use std::os::ios::fs::FileTimesExt;
    #[cfg(target_os = "macos")]
    use std::os::macos::fs::FileTimesExt;
    #[cfg(windows)]
    use std::os::windows::fs::FileTimesExt;

    let file = OpenOptions::new().write(true).open(path)?;
    file.set_times(FileTimes::new().set_created(time))
}

// Linux and the BSDs expose no way to set the birth time. A target later
// than the birth time therefore reads back as the birth time.
#[cfg(not(any(windows, target_os = "macos", target_os = "ios")))]
fn set_creation_time(_path: &Path, _time: SystemTime) -> io::Result<()> {
    Ok(())
}

fn local_to_system_time(timestamp: NaiveDateTime) -> Result<SystemTime, WriteError> {
    Local
        .from_local_datetime(&timestamp)
        .earliest()
        .map(SystemTime::from)
        .ok_or(WriteError::NonexistentLocalTime(timestamp))
}

pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let ext = path
        .extension()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| "tmp".to_string());
    parent.join(format!("{file_name}.temp.{ext}"))
}
