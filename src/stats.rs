use crate::classify::{SortResults, UNKNOWN};
use crate::error::SortError;
use crate::settings::TimeMode;
use crate::tools::get_base_folder;
use chrono::{DateTime, Local};
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color, Table};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

const CSV_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Properties of one checked file, captured before it is moved.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub name: String,
    /// Parent folder relative to the sorted root, `.` for the root itself.
    pub folder: String,
    pub size: u64,
    pub accessed: DateTime<Local>,
    pub modified: DateTime<Local>,
    pub created: DateTime<Local>,
}

impl FileRecord {
    pub fn from_path(path: &Path, root: &Path) -> Result<Self, SortError> {
        let meta = fs::metadata(path).map_err(|e| SortError::io("Cannot read file metadata", path, e))?;
        let time = |mode: TimeMode| -> Result<DateTime<Local>, SortError> {
            mode.timestamp(&meta)
                .map(DateTime::<Local>::from)
                .map_err(|e| SortError::io("Cannot read file time", path, e))
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let folder = path
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .map(|rel| {
                if rel.as_os_str().is_empty() {
                    ".".to_string()
                } else {
                    rel.to_string_lossy().to_string()
                }
            })
            .unwrap_or_else(|| ".".to_string());

        Ok(FileRecord {
            name,
            folder,
            size: meta.len(),
            accessed: time(TimeMode::Accessed)?,
            modified: time(TimeMode::Modified)?,
            created: time(TimeMode::Created)?,
        })
    }

    #[must_use]
    pub fn time(&self, mode: TimeMode) -> DateTime<Local> {
        match mode {
            TimeMode::Accessed => self.accessed,
            TimeMode::Modified => self.modified,
            TimeMode::Created => self.created,
        }
    }

    #[must_use]
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .map_or_else(String::new, |e| format!(".{}", e.to_string_lossy().to_lowercase()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SizeUnit {
    Kb,
    #[default]
    Mb,
    Gb,
}

impl SizeUnit {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            SizeUnit::Kb => "KB",
            SizeUnit::Mb => "MB",
            SizeUnit::Gb => "GB",
        }
    }
}

/// Bytes in the given unit, rounded to two decimals.
#[must_use]
pub fn convert_bytes(bytes: u64, unit: SizeUnit) -> f64 {
    let power = match unit {
        SizeUnit::Kb => 1,
        SizeUnit::Mb => 2,
        SizeUnit::Gb => 3,
    };
    (bytes as f64 / 1024f64.powi(power) * 100.0).round() / 100.0
}

/// File count per extension (lowercased, with dot); files without one count under `(none)`.
#[must_use]
pub fn extension_counts(records: &[FileRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        let ext = r.extension();
        let key = if ext.is_empty() { "(none)".to_string() } else { ext };
        *counts.entry(key).or_default() += 1;
    }
    counts
}

/// Running total of bytes with records ordered by the chosen timestamp.
#[must_use]
pub fn cumulative_size(records: &[FileRecord], mode: TimeMode) -> Vec<(DateTime<Local>, u64)> {
    let mut ordered: Vec<&FileRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.time(mode));

    let mut total = 0u64;
    ordered
        .into_iter()
        .map(|r| {
            total += r.size;
            (r.time(mode), total)
        })
        .collect()
}

/// Files per first-level folder under `root`. Files sitting directly in `root` are not counted.
pub fn folder_distribution(root: &Path) -> Result<BTreeMap<String, usize>, SortError> {
    let mut counts = BTreeMap::new();
    for entry in WalkDir::new(root).min_depth(2) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(base) = entry.path().parent().and_then(|p| get_base_folder(root, p)) {
            *counts.entry(base).or_default() += 1;
        }
    }
    Ok(counts)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

impl Share {
    /// `"37.5 (3)"`, percent to one decimal then the absolute count.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{:.1} ({})", self.percent, self.count)
    }
}

#[must_use]
pub fn counter_share(counts: &BTreeMap<String, usize>) -> Vec<Share> {
    let total: usize = counts.values().sum();
    counts
        .iter()
        .map(|(label, count)| Share {
            label: label.clone(),
            count: *count,
            percent: if total == 0 {
                0.0
            } else {
                *count as f64 / total as f64 * 100.0
            },
        })
        .collect()
}

pub fn write_csv(records: &[FileRecord], path: &Path, unit: SizeUnit) -> Result<(), SortError> {
    let mut writer = csv::Writer::from_path(path)?;
    let size_header = format!("Size ({})", unit.label());
    writer.write_record([
        "Filename",
        "Folder",
        size_header.as_str(),
        "Time Last Accessed",
        "Time Last Modified",
        "Time Created",
    ])?;
    for r in records {
        writer.write_record([
            r.name.clone(),
            r.folder.clone(),
            format!("{:.2}", convert_bytes(r.size, unit)),
            r.accessed.format(CSV_TIME_FORMAT).to_string(),
            r.modified.format(CSV_TIME_FORMAT).to_string(),
            r.created.format(CSV_TIME_FORMAT).to_string(),
        ])?;
    }
    writer
        .flush()
        .map_err(|e| SortError::io("Cannot write CSV", path, e))?;
    Ok(())
}

fn share_table(header: &str, counts: &BTreeMap<String, usize>) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_HORIZONTAL_ONLY);
    table.set_header(vec![header, "Count", "% (n)"]);

    let shares = counter_share(counts);
    for share in &shares {
        table.add_row(vec![
            Cell::new(&share.label),
            Cell::new(share.count),
            Cell::new(share.describe()),
        ]);
    }
    let total: usize = shares.iter().map(|s| s.count).sum();
    table.add_row(vec![
        Cell::new("TOTAL").add_attribute(Attribute::Bold),
        Cell::new(total).add_attribute(Attribute::Bold),
        Cell::new(""),
    ]);
    table
}

pub fn print_results(results: &SortResults, total_checked: usize) {
    println!("\n{}", "=== Sort Categories ===".cyan());
    println!("Files checked: {}", total_checked.to_string().green());
    if results.is_empty() {
        println!("No classification results.");
        return;
    }
    let unknown = results.get(UNKNOWN, "Mimetype");
    if unknown > 0 {
        println!(
            "{} {} files had no recognisable file type.",
            "WARNING:".yellow(),
            unknown
        );
    }
    for (group, counts) in results.groups() {
        println!("\n{}", group.bold());
        println!("{}", share_table("Label", counts));
    }
}

pub fn print_extensions(records: &[FileRecord]) {
    println!("\n{}", "=== File Extensions ===".cyan());
    if records.is_empty() {
        println!("No files recorded.");
        return;
    }
    println!("{}", share_table("Extension", &extension_counts(records)));
}

pub fn print_distribution(root: &Path) -> Result<(), SortError> {
    println!("\n{}", "=== File Distribution ===".cyan());
    let counts = folder_distribution(root)?;
    if counts.is_empty() {
        println!("No files in subfolders.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_HORIZONTAL_ONLY);
    table.set_header(vec!["Folder Name", "Number of Files"]);
    for (folder, count) in &counts {
        table.add_row(vec![Cell::new(folder), Cell::new(count)]);
    }
    println!("{table}");
    Ok(())
}

pub fn print_size_timeline(records: &[FileRecord], mode: TimeMode) {
    println!("\n{}", format!("=== Cumulative Size by {} ===", mode.label()).cyan());
    let timeline = cumulative_size(records, mode);
    if timeline.is_empty() {
        println!("No files recorded.");
        return;
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_HORIZONTAL_ONLY);
    table.set_header(vec!["Time", "Cumulative Size"]);
    let last = timeline.len() - 1;
    for (i, (time, total)) in timeline.iter().enumerate() {
        let size = Cell::new(human_bytes::human_bytes(*total as f64));
        table.add_row(vec![
            Cell::new(time.format("%Y-%m-%d %H:%M")),
            if i == last {
                size.fg(Color::Green).add_attribute(Attribute::Bold)
            } else {
                size
            },
        ]);
    }
    println!("{table}");
}
