use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

const UNKNOWN: &str = "unknown";

/// How many ids a dataset summary lists.
const SAMPLE_IDS: usize = 10;

/// Fields encoded in a clip id such as `gBR_sBM_cAll_d04_mBR0_ch01`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipMetadata {
    pub style: String,
    pub motion_type: String,
    pub choreography: String,
    pub difficulty: String,
    pub music: String,
    pub character: String,
}

impl ClipMetadata {
    /// Human-readable dance style, when the code is known.
    pub fn style_name(&self) -> Option<&'static str> {
        expand_style_code(&self.style)
    }

    pub fn motion_name(&self) -> Option<&'static str> {
        expand_motion_code(&self.motion_type)
    }
}

/// Dance style codes of the AIST++ naming convention.
pub fn expand_style_code(code: &str) -> Option<&'static str> {
    match code {
        "gBR" => Some("Break Dance"),
        "gCH" => Some("Charleston"),
        "gHO" => Some("House"),
        "gJB" => Some("Jazz Ballet"),
        "gJS" | "gJZ" => Some("Jazz"),
        "gKR" => Some("Krump"),
        "gLH" => Some("Latin Hip Hop"),
        "gLO" => Some("Locking"),
        "gMH" => Some("Modern Hip Hop"),
        "gPO" => Some("Popping"),
        "gTP" => Some("Tap"),
        "gWA" => Some("Waacking"),
        _ => None,
    }
}

pub fn expand_motion_code(code: &str) -> Option<&'static str> {
    match code {
        "sBM" => Some("Basic Motion"),
        "sFM" => Some("Female Motion"),
        "sMM" => Some("Male Motion"),
        _ => None,
    }
}

// Up to six underscore-separated fields; missing trailing fields are unknown.
static CLIP_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<style>[^_]*)
        (?:_(?P<motion>[^_]*))?
        (?:_(?P<choreo>[^_]*))?
        (?:_(?P<difficulty>[^_]*))?
        (?:_(?P<music>[^_]*))?
        (?:_(?P<character>[^_]*))?
        ",
    )
    .unwrap()
});

/// Parse a clip id (file stem) into its metadata fields.
pub fn parse_clip_id(id: &str) -> ClipMetadata {
    let caps = CLIP_ID_RE.captures(id);
    let field = |name: &str| {
        caps.as_ref()
            .and_then(|c| c.name(name))
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string()
    };

    ClipMetadata {
        style: field("style"),
        motion_type: field("motion"),
        choreography: field("choreo"),
        difficulty: field("difficulty"),
        music: field("music"),
        character: field("character"),
    }
}

/// Ids whose style field is `style`, e.g. `gBR`.
pub fn clips_by_style<'a>(ids: &'a [String], style: &str) -> Vec<&'a String> {
    ids.iter()
        .filter(|id| parse_clip_id(id).style == style)
        .collect()
}

/// Ids whose difficulty field is `difficulty`, e.g. `d04`.
pub fn clips_by_difficulty<'a>(ids: &'a [String], difficulty: &str) -> Vec<&'a String> {
    ids.iter()
        .filter(|id| parse_clip_id(id).difficulty == difficulty)
        .collect()
}

/// Counts over a clip collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub total_clips: usize,
    pub styles: BTreeMap<String, usize>,
    pub motion_types: BTreeMap<String, usize>,
    pub difficulties: BTreeMap<String, usize>,
    pub sample_ids: Vec<String>,
}

pub fn summarize(ids: &[String]) -> DatasetSummary {
    let mut summary = DatasetSummary {
        total_clips: ids.len(),
        sample_ids: ids.iter().take(SAMPLE_IDS).cloned().collect(),
        ..Default::default()
    };

    for id in ids {
        let meta = parse_clip_id(id);
        *summary.styles.entry(meta.style).or_default() += 1;
        *summary.motion_types.entry(meta.motion_type).or_default() += 1;
        *summary.difficulties.entry(meta.difficulty).or_default() += 1;
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_id() {
        let meta = parse_clip_id("gBR_sBM_cAll_d04_mBR0_ch01");
        assert_eq!(meta.style, "gBR");
        assert_eq!(meta.motion_type, "sBM");
        assert_eq!(meta.choreography, "cAll");
        assert_eq!(meta.difficulty, "d04");
        assert_eq!(meta.music, "mBR0");
        assert_eq!(meta.character, "ch01");
        assert_eq!(meta.style_name(), Some("Break Dance"));
        assert_eq!(meta.motion_name(), Some("Basic Motion"));
    }

    #[test]
    fn test_partial_id_fills_unknown() {
        let meta = parse_clip_id("gJZ_sFM");
        assert_eq!(meta.style_name(), Some("Jazz"));
        assert_eq!(meta.motion_name(), Some("Female Motion"));
        assert_eq!(meta.choreography, UNKNOWN);
        assert_eq!(meta.character, UNKNOWN);

        let bare = parse_clip_id("");
        assert_eq!(bare.style, UNKNOWN);
        assert_eq!(bare.style_name(), None);
    }

    #[test]
    fn test_summary_counts() {
        let ids: Vec<String> = [
            "gBR_sBM_cAll_d04_mBR0_ch01",
            "gBR_sFM_cAll_d05_mBR1_ch02",
            "gPO_sBM_cAll_d04_mPO0_ch01",
            "custom",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let summary = summarize(&ids);
        assert_eq!(summary.total_clips, 4);
        assert_eq!(summary.styles["gBR"], 2);
        assert_eq!(summary.styles["custom"], 1);
        assert_eq!(summary.motion_types["sBM"], 2);
        assert_eq!(summary.motion_types[UNKNOWN], 1);
        assert_eq!(summary.difficulties["d04"], 2);
        assert_eq!(summary.sample_ids.len(), 4);
    }

    #[test]
    fn test_filters_match_whole_fields() {
        let ids: Vec<String> = [
            "gBR_sBM_cAll_d04_mBR0_ch01",
            "gBR_sFM_cAll_d05_mBR1_ch02",
            "gBRx_sBM_cAll_d04_mBR0_ch01",
            "gPO_sBM_cAll_d04_mPO0_ch01",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(
            clips_by_style(&ids, "gBR"),
            vec!["gBR_sBM_cAll_d04_mBR0_ch01", "gBR_sFM_cAll_d05_mBR1_ch02"]
        );
        assert_eq!(clips_by_difficulty(&ids, "d05"), vec!["gBR_sFM_cAll_d05_mBR1_ch02"]);
        assert_eq!(clips_by_difficulty(&ids, "d04").len(), 3);
        assert!(clips_by_style(&ids, "gTP").is_empty());
    }

    #[test]
    fn test_summary_samples_first_ten() {
        let ids: Vec<String> = (0..25).map(|i| format!("clip{i:02}")).collect();
        let summary = summarize(&ids);
        assert_eq!(summary.sample_ids.len(), 10);
        assert_eq!(summary.sample_ids[9], "clip09");
    }
}
