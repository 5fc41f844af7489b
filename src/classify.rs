use crate::error::SortError;
use crate::settings::{
    Category, Criterion, DateSettings, FileTypeSelection, KeywordSettings, SortSettings,
    TimeInterval, TimeMode,
};
use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime, NaiveTime};
use log::warn;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

pub const VALID_DATE: &str = "Valid Date";
pub const FILE_TYPES: &str = "File Types";
pub const KEYWORDS: &str = "Keywords";
pub const UNKNOWN: &str = "Unknown";

/// `application/*` subtypes are told apart by substring; the first selected category that matches wins.
const APPLICATION_PATTERNS: [(Category, &[&str]); 5] = [
    (Category::Spreadsheet, &["ms-excel", "spreadsheet"]),
    (Category::WordDocument, &["text", "msword", "wordprocessingml"]),
    (
        Category::Presentation,
        &["presentation", "ms-powerpoint", "presentationml"],
    ),
    (Category::Pdf, &["pdf"]),
    (
        Category::Archive,
        &[
            "x-7z-compressed",
            "zip",
            "x-tar",
            "rar",
            "java-archive",
            "gzip",
            "x-bzip",
            "x-bzip2",
            "x-freearc",
        ],
    ),
];

/// Folder-name piece produced by one criterion for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    None,
    Folder(String),
    /// Several folders nested in order; the file ends up in the last one.
    Nested(Vec<String>),
}

impl Fragment {
    #[must_use]
    pub fn parts(&self) -> &[String] {
        match self {
            Fragment::None => &[],
            Fragment::Folder(name) => std::slice::from_ref(name),
            Fragment::Nested(names) => names,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts().is_empty()
    }
}

/// Tallies kept while classifying, grouped like `Valid Date -> Valid -> 12`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortResults {
    tallies: BTreeMap<&'static str, BTreeMap<String, usize>>,
}

impl SortResults {
    fn increment(&mut self, group: &'static str, key: &str) {
        *self
            .tallies
            .entry(group)
            .or_default()
            .entry(key.to_string())
            .or_default() += 1;
    }

    #[must_use]
    pub fn get(&self, group: &str, key: &str) -> usize {
        self.tallies
            .get(group)
            .and_then(|g| g.get(key))
            .copied()
            .unwrap_or(0)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&'static str, &BTreeMap<String, usize>)> {
        self.tallies.iter().map(|(k, v)| (*k, v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }
}

/// Category for a MIME type under the current selection, if any.
#[must_use]
pub fn categorize(top: &str, sub: &str, selection: &FileTypeSelection) -> Option<Category> {
    match top {
        "application" => APPLICATION_PATTERNS
            .iter()
            .find(|(cat, patterns)| {
                patterns.iter().any(|p| sub.contains(p)) && selection.selects(*cat)
            })
            .map(|(cat, _)| *cat),
        "audio" => Some(Category::Audio).filter(|c| selection.selects(*c)),
        "video" => Some(Category::Video).filter(|c| selection.selects(*c)),
        "image" => Some(Category::Image).filter(|c| selection.selects(*c)),
        "text" => Some(Category::Text).filter(|c| selection.selects(*c)),
        _ => None,
    }
}

struct DateRule {
    mode: TimeMode,
    interval: TimeInterval,
    from: NaiveDateTime,
    until: NaiveDateTime,
}

impl DateRule {
    fn new(settings: &DateSettings, today: NaiveDate) -> Result<Self, SortError> {
        let (start, end) = settings.range.bounds(today)?;
        // Both calendar days are part of the range.
        let after_end = end.checked_add_days(Days::new(1)).unwrap_or(end);
        Ok(DateRule {
            mode: settings.mode,
            interval: settings.interval,
            from: start.and_time(NaiveTime::MIN),
            until: after_end.and_time(NaiveTime::MIN),
        })
    }

    fn folder(&self, path: &Path, results: &mut SortResults) -> Result<Fragment, SortError> {
        let meta = fs::metadata(path).map_err(|e| SortError::io("Cannot read file metadata", path, e))?;
        let stamp = self
            .mode
            .timestamp(&meta)
            .map_err(|e| SortError::io("Cannot read file time", path, e))?;
        let time = DateTime::<Local>::from(stamp).naive_local();

        if self.from <= time && time < self.until {
            results.increment(VALID_DATE, "Valid");
            Ok(Fragment::Folder(self.interval.folder_name(&time)))
        } else {
            results.increment(VALID_DATE, "Invalid");
            Ok(Fragment::None)
        }
    }
}

struct FileTypeRule {
    selection: FileTypeSelection,
}

impl FileTypeRule {
    fn folder(&self, path: &Path, results: &mut SortResults) -> Fragment {
        if let FileTypeSelection::Custom(extensions) = &self.selection {
            return custom_extension_folder(path, extensions, results);
        }

        let Some(mime) = mime_guess::from_path(path).first() else {
            warn!("Unknown mimetype for {}", path.display());
            results.increment(UNKNOWN, "Mimetype");
            return Fragment::None;
        };

        match categorize(mime.type_().as_str(), mime.subtype().as_str(), &self.selection) {
            Some(cat) => {
                results.increment(FILE_TYPES, cat.name());
                Fragment::Folder(cat.name().to_string())
            }
            None => Fragment::None,
        }
    }
}

fn custom_extension_folder(
    path: &Path,
    extensions: &BTreeSet<String>,
    results: &mut SortResults,
) -> Fragment {
    let Some(ext) = path.extension().map(|e| format!(".{}", e.to_string_lossy())) else {
        return Fragment::None;
    };
    match extensions.iter().find(|wanted| wanted.eq_ignore_ascii_case(&ext)) {
        Some(wanted) => {
            results.increment(FILE_TYPES, wanted);
            // A leading dot would make the folder hidden.
            Fragment::Folder(wanted.trim_start_matches('.').to_string())
        }
        None => Fragment::None,
    }
}

struct Keyword {
    word: String,
    lower: String,
}

impl Keyword {
    fn new(word: &str) -> Self {
        Keyword {
            word: word.to_string(),
            lower: word.to_lowercase(),
        }
    }
}

struct KeywordRule {
    groups: Vec<(String, Vec<Keyword>)>,
    ungrouped: Vec<Keyword>,
}

impl KeywordRule {
    fn new(settings: &KeywordSettings) -> Self {
        KeywordRule {
            groups: settings
                .groups
                .iter()
                .map(|g| {
                    (
                        g.folder.clone(),
                        g.keywords.iter().map(|w| Keyword::new(w)).collect(),
                    )
                })
                .collect(),
            ungrouped: settings.ungrouped.iter().map(|w| Keyword::new(w)).collect(),
        }
    }

    fn folder(&self, path: &Path, results: &mut SortResults) -> Fragment {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        for (folder, keywords) in &self.groups {
            let hits = matching(keywords, &name, results);
            if !hits.is_empty() {
                return Fragment::Folder(folder.clone());
            }
        }

        let hits = matching(&self.ungrouped, &name, results);
        if hits.is_empty() {
            Fragment::None
        } else {
            Fragment::Nested(hits)
        }
    }
}

// Every matching keyword is tallied, not only the first.
fn matching(keywords: &[Keyword], name: &str, results: &mut SortResults) -> Vec<String> {
    keywords
        .iter()
        .filter(|k| name.contains(&k.lower))
        .map(|k| {
            results.increment(KEYWORDS, &k.word);
            k.word.clone()
        })
        .collect()
}

enum Rule {
    Date(DateRule),
    FileType(FileTypeRule),
    Keyword(KeywordRule),
}

/// The ordered chain of folder rules built from a set of sort settings.
pub struct Classifier {
    rules: Vec<(Criterion, Rule)>,
    results: SortResults,
}

impl Classifier {
    pub fn new(settings: &SortSettings) -> Result<Self, SortError> {
        Self::with_today(settings, Local::now().date_naive())
    }

    /// `today` stands in for an empty ending date.
    pub fn with_today(settings: &SortSettings, today: NaiveDate) -> Result<Self, SortError> {
        settings.validate()?;

        let mut rules = Vec::new();
        for criterion in settings.ordered() {
            let rule = match criterion {
                Criterion::Date => settings
                    .date
                    .as_ref()
                    .map(|d| DateRule::new(&d.params, today).map(Rule::Date))
                    .transpose()?,
                Criterion::FileType => settings.file_type.as_ref().map(|f| {
                    Rule::FileType(FileTypeRule {
                        selection: f.params.clone(),
                    })
                }),
                Criterion::Keyword => settings
                    .keyword
                    .as_ref()
                    .map(|k| Rule::Keyword(KeywordRule::new(&k.params))),
            };
            if let Some(rule) = rule {
                rules.push((criterion, rule));
            }
        }

        Ok(Classifier {
            rules,
            results: SortResults::default(),
        })
    }

    #[must_use]
    pub fn criteria(&self) -> Vec<Criterion> {
        self.rules.iter().map(|(c, _)| *c).collect()
    }

    /// One fragment per criterion, in sort order.
    pub fn folder_chain(&mut self, path: &Path) -> Result<Vec<Fragment>, SortError> {
        let mut fragments = Vec::with_capacity(self.rules.len());
        for (_, rule) in &self.rules {
            let fragment = match rule {
                Rule::Date(r) => r.folder(path, &mut self.results)?,
                Rule::FileType(r) => r.folder(path, &mut self.results),
                Rule::Keyword(r) => r.folder(path, &mut self.results),
            };
            fragments.push(fragment);
        }
        Ok(fragments)
    }

    #[must_use]
    pub fn into_results(self) -> SortResults {
        self.results
    }
}
