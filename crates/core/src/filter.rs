use serde::{Deserialize, Serialize};

const DSC_MOV_PREFIXES: &[&str] = &["DSC_", "MOV_"];
const IMG_VID_PREFIXES: &[&str] = &["IMG_", "VID_"];
const ALL_CAMERA_PREFIXES: &[&str] = &["DSC_", "IMG_", "MOV_", "VID_"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterMode {
    #[default]
    All,
    DscMov,
    ImgVid,
    DscMovImgVid,
    Custom,
}

impl FilterMode {
    pub const ALL_MODES: [FilterMode; 5] = [
        FilterMode::All,
        FilterMode::DscMov,
        FilterMode::ImgVid,
        FilterMode::DscMovImgVid,
        FilterMode::Custom,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FilterMode::All => "All",
            FilterMode::DscMov => "DSC_ + MOV_",
            FilterMode::ImgVid => "IMG_ + VID_",
            FilterMode::DscMovImgVid => "DSC_ + MOV_ + IMG_ + VID_",
            FilterMode::Custom => "Custom",
        }
    }
}

/// Filter resolved once from user input before a walk starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFilter {
    pub mode: FilterMode,
    pub patterns: Vec<String>,
}

impl NameFilter {
    pub fn new(mode: FilterMode, raw_custom: &str) -> Self {
        Self {
            mode,
            patterns: parse_custom_patterns(raw_custom),
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        matches(file_name, self.mode, &self.patterns)
    }
}

pub fn matches(file_name: &str, mode: FilterMode, custom_patterns: &[String]) -> bool {
    match mode {
        FilterMode::All => true,
        FilterMode::DscMov => has_any_prefix(file_name, DSC_MOV_PREFIXES),
        FilterMode::ImgVid => has_any_prefix(file_name, IMG_VID_PREFIXES),
        FilterMode::DscMovImgVid => has_any_prefix(file_name, ALL_CAMERA_PREFIXES),
        FilterMode::Custom => custom_patterns
            .iter()
            .any(|pattern| file_name.contains(pattern.as_str())),
    }
}

/// Splits `|`-delimited custom text. Empty text yields no patterns; an empty
/// segment inside non-empty text is kept and matches every name.
pub fn parse_custom_patterns(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split('|').map(str::to_string).collect()
}

fn has_any_prefix(file_name: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| file_name.starts_with(prefix))
}
