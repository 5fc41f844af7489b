use crate::error::SettingsError;
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

/// Date format used for range bounds in settings files and on the command line.
pub const DATE_FORMAT: &str = "%m-%d-%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Criterion {
    Date,
    #[value(name = "type", alias = "file-type")]
    FileType,
    Keyword,
}

impl Criterion {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Criterion::Date => "Date",
            Criterion::FileType => "File Type",
            Criterion::Keyword => "Keyword",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum TimeMode {
    #[serde(rename = "Time Created")]
    Created,
    #[default]
    #[serde(rename = "Time Modified")]
    Modified,
    #[serde(rename = "Time Accessed")]
    Accessed,
}

impl TimeMode {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TimeMode::Created => "Time Created",
            TimeMode::Modified => "Time Modified",
            TimeMode::Accessed => "Time Accessed",
        }
    }

    /// Reads the timestamp this mode refers to.
    pub fn timestamp(self, meta: &Metadata) -> io::Result<SystemTime> {
        match self {
            TimeMode::Created => created_time(meta),
            TimeMode::Modified => meta.modified(),
            TimeMode::Accessed => meta.accessed(),
        }
    }
}

// Birth time is missing on some filesystems; fall back to the inode change time there.
#[cfg(unix)]
fn created_time(meta: &Metadata) -> io::Result<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    use std::time::Duration;

    meta.created().or_else(|_| {
        let secs = u64::try_from(meta.ctime()).unwrap_or(0);
        Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
    })
}

#[cfg(not(unix))]
fn created_time(meta: &Metadata) -> io::Result<SystemTime> {
    meta.created()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum TimeInterval {
    Day,
    #[default]
    Month,
    Year,
}

impl TimeInterval {
    /// Folder name for a timestamp at this granularity, e.g. `3_14_2024`, `3_2024`, `2024`.
    #[must_use]
    pub fn folder_name(self, time: &NaiveDateTime) -> String {
        match self {
            TimeInterval::Day => format!("{}_{}_{}", time.month(), time.day(), time.year()),
            TimeInterval::Month => format!("{}_{}", time.month(), time.year()),
            TimeInterval::Year => time.year().to_string(),
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TimeInterval::Day => "Day",
            TimeInterval::Month => "Month",
            TimeInterval::Year => "Year",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(rename = "Starting Date", default)]
    pub start: String,
    #[serde(rename = "Ending Date", default)]
    pub end: String,
}

impl DateRange {
    /// Resolves the range, filling an empty start with 01-01-1900 and an empty end with `today`.
    pub fn bounds(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), SettingsError> {
        let start = if self.start.trim().is_empty() {
            NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
        } else {
            parse_date(&self.start)?
        };
        let end = if self.end.trim().is_empty() {
            today
        } else {
            parse_date(&self.end)?
        };

        if start > end {
            return Err(SettingsError::InvertedRange {
                start: start.format(DATE_FORMAT).to_string(),
                end: end.format(DATE_FORMAT).to_string(),
            });
        }
        Ok((start, end))
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, SettingsError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| SettingsError::InvalidDate(raw.to_string()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSettings {
    #[serde(rename = "Time Mode", default)]
    pub mode: TimeMode,
    #[serde(rename = "Time Interval", default)]
    pub interval: TimeInterval,
    #[serde(rename = "Date Range", default)]
    pub range: DateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Spreadsheet,
    #[serde(rename = "Word Document")]
    WordDocument,
    Presentation,
    #[serde(rename = "PDF")]
    Pdf,
    Audio,
    Video,
    Image,
    Text,
    Archive,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Spreadsheet,
        Category::WordDocument,
        Category::Presentation,
        Category::Pdf,
        Category::Audio,
        Category::Video,
        Category::Image,
        Category::Text,
        Category::Archive,
    ];

    /// Folder name files of this category are sorted into.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Category::Spreadsheet => "Spreadsheet",
            Category::WordDocument => "Word Document",
            Category::Presentation => "Presentation",
            Category::Pdf => "PDF",
            Category::Audio => "Audio",
            Category::Video => "Video",
            Category::Image => "Image",
            Category::Text => "Text",
            Category::Archive => "Archive",
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Category::Spreadsheet => "📅",
            Category::WordDocument => "📰",
            Category::Presentation => "📊",
            Category::Pdf => "📋",
            Category::Audio => "♫",
            Category::Video => "🎬",
            Category::Image => "📷",
            Category::Text => "📄",
            Category::Archive => "🗂",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = SettingsError;

    /// Accepts folder names loosely: `word`, `Word Document`, `word-document`, `pdf`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "spreadsheet" => Ok(Category::Spreadsheet),
            "word" | "worddocument" => Ok(Category::WordDocument),
            "presentation" => Ok(Category::Presentation),
            "pdf" => Ok(Category::Pdf),
            "audio" => Ok(Category::Audio),
            "video" => Ok(Category::Video),
            "image" => Ok(Category::Image),
            "text" => Ok(Category::Text),
            "archive" => Ok(Category::Archive),
            _ => Err(SettingsError::UnknownCategory(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "selection", content = "types")]
pub enum FileTypeSelection {
    #[default]
    #[serde(rename = "All Types")]
    AllTypes,
    #[serde(rename = "Specific Types")]
    Specific(BTreeSet<Category>),
    #[serde(rename = "Custom File Extension")]
    Custom(BTreeSet<String>),
}

impl FileTypeSelection {
    #[must_use]
    pub fn selects(&self, category: Category) -> bool {
        match self {
            FileTypeSelection::AllTypes => true,
            FileTypeSelection::Specific(set) => set.contains(&category),
            FileTypeSelection::Custom(_) => false,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            FileTypeSelection::AllTypes => false,
            FileTypeSelection::Specific(set) => set.is_empty(),
            FileTypeSelection::Custom(set) => set.is_empty(),
        }
    }
}

/// Normalizes a user-typed extension to a single leading dot: `txt` and `.txt` both give `.txt`.
#[must_use]
pub fn normalize_extension(raw: &str) -> Option<String> {
    let bare: String = raw.trim().chars().filter(|c| *c != '.').collect();
    if bare.is_empty() {
        None
    } else {
        Some(format!(".{bare}"))
    }
}

/// Adds an extension to a custom set, or removes it when it is already there.
/// Returns whether the extension is in the set afterwards.
pub fn toggle_extension(set: &mut BTreeSet<String>, raw: &str) -> bool {
    let Some(ext) = normalize_extension(raw) else {
        return false;
    };
    if set.remove(&ext) {
        false
    } else {
        set.insert(ext);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub folder: String,
    pub keywords: Vec<String>,
}

impl FromStr for KeywordGroup {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (folder, words) = s
            .split_once('=')
            .ok_or_else(|| SettingsError::InvalidKeywordGroup(s.to_string()))?;
        let folder = folder.trim();
        let keywords = split_keywords(words);
        if folder.is_empty() || keywords.is_empty() {
            return Err(SettingsError::InvalidKeywordGroup(s.to_string()));
        }
        Ok(KeywordGroup {
            folder: folder.to_string(),
            keywords,
        })
    }
}

#[must_use]
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSettings {
    #[serde(default)]
    pub groups: Vec<KeywordGroup>,
    #[serde(rename = "Ungrouped Keywords", default)]
    pub ungrouped: Vec<String>,
}

impl KeywordSettings {
    fn is_empty(&self) -> bool {
        self.ungrouped.is_empty() && self.groups.iter().all(|g| g.keywords.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Positioned<T> {
    pub position: u8,
    pub params: T,
}

/// Switches that shape a run rather than how files are classified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub in_place: bool,
    #[serde(default)]
    pub log_sort: bool,
    #[serde(default)]
    pub show_data: bool,
    #[serde(default)]
    pub ignore: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSettings {
    #[serde(rename = "Date", default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Positioned<DateSettings>>,
    #[serde(rename = "File Type", default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<Positioned<FileTypeSelection>>,
    #[serde(rename = "Keyword", default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<Positioned<KeywordSettings>>,
    #[serde(rename = "Options", default)]
    pub options: RunOptions,
}

impl SortSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn position_of(&self, criterion: Criterion) -> Option<u8> {
        match criterion {
            Criterion::Date => self.date.as_ref().map(|p| p.position),
            Criterion::FileType => self.file_type.as_ref().map(|p| p.position),
            Criterion::Keyword => self.keyword.as_ref().map(|p| p.position),
        }
    }

    fn set_position(&mut self, criterion: Criterion, position: u8) {
        match criterion {
            Criterion::Date => {
                if let Some(p) = self.date.as_mut() {
                    p.position = position;
                }
            }
            Criterion::FileType => {
                if let Some(p) = self.file_type.as_mut() {
                    p.position = position;
                }
            }
            Criterion::Keyword => {
                if let Some(p) = self.keyword.as_mut() {
                    p.position = position;
                }
            }
        }
    }

    /// Configured criteria, first sort position first.
    #[must_use]
    pub fn ordered(&self) -> Vec<Criterion> {
        let mut present: Vec<(u8, Criterion)> = [Criterion::Date, Criterion::FileType, Criterion::Keyword]
            .into_iter()
            .filter_map(|c| self.position_of(c).map(|pos| (pos, c)))
            .collect();
        present.sort();
        present.into_iter().map(|(_, c)| c).collect()
    }

    /// Renumbers positions from 1 following `order`; configured criteria missing
    /// from `order` keep their relative order after the listed ones.
    pub fn reorder(&mut self, order: &[Criterion]) {
        let mut sequence: Vec<Criterion> = Vec::new();
        for c in order {
            if self.position_of(*c).is_some() && !sequence.contains(c) {
                sequence.push(*c);
            }
        }
        for c in self.ordered() {
            if !sequence.contains(&c) {
                sequence.push(c);
            }
        }
        for (pos, c) in (1u8..).zip(sequence) {
            self.set_position(c, pos);
        }
    }

    /// Next free position, for appending a criterion after the configured ones.
    #[must_use]
    pub fn next_position(&self) -> u8 {
        [Criterion::Date, Criterion::FileType, Criterion::Keyword]
            .into_iter()
            .filter_map(|c| self.position_of(c))
            .max()
            .map_or(1, |p| p.saturating_add(1))
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let order = self.ordered();
        if order.is_empty() {
            return Err(SettingsError::NoCriteria);
        }

        let mut seen = BTreeSet::new();
        for c in &order {
            let pos = self.position_of(*c).unwrap_or_default();
            if !(1..=3).contains(&pos) {
                return Err(SettingsError::InvalidPosition(pos));
            }
            if !seen.insert(pos) {
                return Err(SettingsError::DuplicatePosition(pos));
            }
        }

        if let Some(date) = &self.date {
            date.params.range.bounds(Local::now().date_naive())?;
        }
        if let Some(ft) = &self.file_type
            && ft.params.is_empty()
        {
            return Err(SettingsError::EmptyCriterion(Criterion::FileType.name()));
        }
        if let Some(kw) = &self.keyword
            && kw.params.is_empty()
        {
            return Err(SettingsError::EmptyCriterion(Criterion::Keyword.name()));
        }
        Ok(())
    }

    /// Human-readable listing of the confirmed settings, one line per entry.
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for c in self.ordered() {
            let pos = self.position_of(c).unwrap_or_default();
            lines.push(format!("[{pos} - Sort By {c}]"));
            match c {
                Criterion::Date => {
                    if let Some(date) = &self.date {
                        let d = &date.params;
                        let today = Local::now().date_naive();
                        let (start, end) = d
                            .range
                            .bounds(today)
                            .map(|(s, e)| (s.format(DATE_FORMAT).to_string(), e.format(DATE_FORMAT).to_string()))
                            .unwrap_or_else(|_| (d.range.start.clone(), d.range.end.clone()));
                        lines.push(format!("   ⌛ {} - {}", d.interval.label(), d.mode.label()));
                        lines.push(format!("      📆 ({start}) → ({end})"));
                    }
                }
                Criterion::FileType => {
                    if let Some(ft) = &self.file_type {
                        match &ft.params {
                            FileTypeSelection::AllTypes => {
                                for cat in Category::ALL {
                                    lines.push(format!("   {} {cat}", cat.symbol()));
                                }
                            }
                            FileTypeSelection::Specific(set) => {
                                for cat in set {
                                    lines.push(format!("   {} {cat}", cat.symbol()));
                                }
                            }
                            FileTypeSelection::Custom(set) => {
                                for ext in set {
                                    lines.push(format!("   🔍 {ext}"));
                                }
                            }
                        }
                    }
                }
                Criterion::Keyword => {
                    if let Some(kw) = &self.keyword {
                        for group in &kw.params.groups {
                            lines.push(format!("   📁 {}", group.folder));
                            for word in &group.keywords {
                                lines.push(format!("       🔍 {word}"));
                            }
                        }
                        if !kw.params.ungrouped.is_empty() {
                            lines.push("   📁 Ungrouped Keywords".to_string());
                            for word in &kw.params.ungrouped {
                                lines.push(format!("       🔍 {word}"));
                            }
                        }
                    }
                }
            }
            lines.push(String::new());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword_settings(position: u8) -> Positioned<KeywordSettings> {
        Positioned {
            position,
            params: KeywordSettings {
                groups: vec![KeywordGroup {
                    folder: "Letters".to_string(),
                    keywords: vec!["letter".to_string()],
                }],
                ungrouped: vec![],
            },
        }
    }

    #[test]
    fn test_date_range_defaults() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let (start, end) = DateRange::default().bounds(today).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(1900, 1, 1).unwrap());
        assert_eq!(end, today);

        let range = DateRange {
            start: "02-15-2023".to_string(),
            end: String::new(),
        };
        let (start, _) = range.bounds(today).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2023, 2, 15).unwrap());
    }

    #[test]
    fn test_date_range_rejects_bad_input() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let bad = DateRange {
            start: "2023-02-15".to_string(),
            end: String::new(),
        };
        assert!(matches!(bad.bounds(today), Err(SettingsError::InvalidDate(_))));

        let inverted = DateRange {
            start: "06-01-2024".to_string(),
            end: "01-01-2024".to_string(),
        };
        assert!(matches!(
            inverted.bounds(today),
            Err(SettingsError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_interval_folder_names() {
        let t = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(TimeInterval::Day.folder_name(&t), "3_4_2024");
        assert_eq!(TimeInterval::Month.folder_name(&t), "3_2024");
        assert_eq!(TimeInterval::Year.folder_name(&t), "2024");
    }

    #[test]
    fn test_extension_normalize_and_toggle() {
        assert_eq!(normalize_extension("txt").as_deref(), Some(".txt"));
        assert_eq!(normalize_extension("..md").as_deref(), Some(".md"));
        assert_eq!(normalize_extension("tar.gz").as_deref(), Some(".targz"));
        assert_eq!(normalize_extension("  "), None);

        let mut set = BTreeSet::new();
        assert!(toggle_extension(&mut set, "csv"));
        assert!(set.contains(".csv"));
        assert!(!toggle_extension(&mut set, ".csv"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("word".parse::<Category>().unwrap(), Category::WordDocument);
        assert_eq!("Word Document".parse::<Category>().unwrap(), Category::WordDocument);
        assert_eq!("PDF".parse::<Category>().unwrap(), Category::Pdf);
        assert!("spreadsheets".parse::<Category>().is_err());
    }

    #[test]
    fn test_keyword_group_parse() {
        let group: KeywordGroup = "Non-Pictures = Flute, Letter,,Humidity".parse().unwrap();
        assert_eq!(group.folder, "Non-Pictures");
        assert_eq!(group.keywords, vec!["Flute", "Letter", "Humidity"]);

        assert!("NoEquals".parse::<KeywordGroup>().is_err());
        assert!("Folder=".parse::<KeywordGroup>().is_err());
    }

    #[test]
    fn test_validate_positions() {
        let mut settings = SortSettings {
            file_type: Some(Positioned {
                position: 1,
                params: FileTypeSelection::AllTypes,
            }),
            keyword: Some(keyword_settings(1)),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::DuplicatePosition(1))
        ));

        settings.reorder(&[Criterion::Keyword]);
        settings.validate().unwrap();
        assert_eq!(settings.ordered(), vec![Criterion::Keyword, Criterion::FileType]);

        assert!(matches!(
            SortSettings::default().validate(),
            Err(SettingsError::NoCriteria)
        ));
    }

    #[test]
    fn test_next_position_out_of_range_is_reported() {
        let mut settings = SortSettings {
            keyword: Some(Positioned {
                position: u8::MAX,
                params: KeywordSettings {
                    groups: vec![],
                    ungrouped: vec!["jar".to_string()],
                },
            }),
            ..Default::default()
        };
        assert_eq!(settings.next_position(), u8::MAX);

        settings.file_type = Some(Positioned {
            position: settings.next_position(),
            params: FileTypeSelection::AllTypes,
        });
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidPosition(u8::MAX))
        ));
    }

    #[test]
    fn test_validate_empty_criteria() {
        let settings = SortSettings {
            file_type: Some(Positioned {
                position: 1,
                params: FileTypeSelection::Specific(BTreeSet::new()),
            }),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::EmptyCriterion("File Type"))
        ));

        let settings = SortSettings {
            keyword: Some(Positioned {
                position: 2,
                params: KeywordSettings::default(),
            }),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::EmptyCriterion("Keyword"))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = SortSettings {
            date: Some(Positioned {
                position: 2,
                params: DateSettings {
                    mode: TimeMode::Accessed,
                    interval: TimeInterval::Year,
                    range: DateRange {
                        start: "01-01-2020".to_string(),
                        end: String::new(),
                    },
                },
            }),
            keyword: Some(keyword_settings(1)),
            options: RunOptions {
                in_place: true,
                ..Default::default()
            },
            ..Default::default()
        };
        settings.save(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"Time Accessed\""));
        assert!(raw.contains("\"Ungrouped Keywords\""));

        let loaded = SortSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.ordered(), vec![Criterion::Keyword, Criterion::Date]);
    }

    #[test]
    fn test_describe_lists_in_order() {
        let settings = SortSettings {
            file_type: Some(Positioned {
                position: 2,
                params: FileTypeSelection::Specific([Category::Pdf].into_iter().collect()),
            }),
            keyword: Some(keyword_settings(1)),
            ..Default::default()
        };
        let lines = settings.describe();
        assert_eq!(lines[0], "[1 - Sort By Keyword]");
        assert!(lines.contains(&"[2 - Sort By File Type]".to_string()));
        assert!(lines.contains(&"   📋 PDF".to_string()));
    }
}
