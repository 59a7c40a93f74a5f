mod config;
mod entry;
mod exif_tag;
mod filter;
mod offset;
mod record;
mod resolver;
mod walker;
mod writer;

pub use config::{RunConfig, RunMode};
pub use entry::{LogEntry, TIMESTAMP_FORMAT};
pub use exif_tag::{
    format_date_taken, is_tag_image, parse_date_taken, read_date_taken, write_date_taken,
    TagError, DATE_TAKEN_TAG,
};
pub use filter::{matches, parse_custom_patterns, FilterMode, NameFilter};
pub use offset::{parse_component, DateError, DateOffset};
pub use record::{FileRecord, TimestampSource};
pub use resolver::{
    earliest, filesystem_timestamp, resolve_current_timestamp, ResolveError, ResolvedTimestamp,
};
pub use walker::{walk, Walk, WalkError};
pub use writer::{apply, WriteError};
