mod classify;
mod compose;
mod error;
mod settings;
mod sort_log;
mod sorter;
mod stats;
mod tools;
mod types;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use error::{SettingsError, SortError};
use log::warn;
use settings::{
    Criterion, DateRange, DateSettings, FileTypeSelection, KeywordGroup, KeywordSettings,
    Positioned, SortSettings, TimeInterval, TimeMode, toggle_extension,
};
use sorter::{FileSorter, spawn_sort};
use stats::SizeUnit;
use std::collections::BTreeSet;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use types::SortOutcome;

#[derive(Parser, Debug)]
#[command(version, about = "Sort files into folders by date, file type and keyword", long_about = None)]
struct Cli {
    /// Print what is being done (same as RUST_LOG=info)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Move the files of a folder tree into folders named by the chosen criteria
    Sort(SortArgs),
    /// Move every nested file into one folder and delete the emptied folders
    Unpack(UnpackArgs),
    /// Count the files a sort would check
    Count(CountArgs),
}

#[derive(Args, Debug)]
struct SortArgs {
    /// Folder to sort
    path: PathBuf,

    /// Load criteria and options from a JSON settings file
    #[arg(long, short = 's', value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Sort by date, using this file timestamp
    #[arg(long, value_enum, value_name = "MODE")]
    date: Option<TimeMode>,

    /// Folder granularity for the date criterion
    #[arg(long, value_enum, default_value_t = TimeInterval::Month)]
    interval: TimeInterval,

    /// First day of the date range (mm-dd-yyyy), defaults to 01-01-1900
    #[arg(long, value_name = "DATE")]
    start: Option<String>,

    /// Last day of the date range (mm-dd-yyyy), defaults to today
    #[arg(long, value_name = "DATE")]
    end: Option<String>,

    /// Sort by file type, into every category folder
    #[arg(long, conflicts_with_all = ["types", "custom_ext"])]
    all_types: bool,

    /// Sort by file type, only these categories (e.g. image,pdf,word)
    #[arg(long, value_delimiter = ',', conflicts_with = "custom_ext")]
    types: Vec<settings::Category>,

    /// Sort by file type, using these extensions as folder names
    #[arg(long, value_delimiter = ',', value_name = "EXT")]
    custom_ext: Vec<String>,

    /// Sort by keyword: files whose name contains a word go to FOLDER
    #[arg(long = "keyword", value_name = "FOLDER=WORDS")]
    keywords: Vec<KeywordGroup>,

    /// Sort by keyword: each matched word becomes its own nested folder
    #[arg(long, value_delimiter = ',', value_name = "WORDS")]
    ungrouped: Vec<String>,

    /// Nesting order of the criteria, outermost first
    #[arg(long, value_enum, value_delimiter = ',')]
    order: Vec<Criterion>,

    /// Build the folders inside each file's own folder instead of the sorted root
    #[arg(long)]
    in_place: bool,

    /// Write a sort log file
    #[arg(long)]
    log: bool,

    /// Folder the sort log is written to
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Record file properties and print reports after the sort
    #[arg(long)]
    show_data: bool,

    /// Write the recorded file properties to a CSV file (implies --show-data)
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Unit of the CSV size column
    #[arg(long, value_enum, default_value_t = SizeUnit::Mb)]
    size_unit: SizeUnit,

    /// Folders (and everything below them) to leave untouched
    #[arg(long, value_name = "DIR", num_args = 1..)]
    ignore: Vec<PathBuf>,

    /// Save the resulting settings to a JSON file
    #[arg(long, value_name = "FILE")]
    save_settings: Option<PathBuf>,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(Args, Debug)]
struct UnpackArgs {
    /// Folder to unpack
    path: PathBuf,

    /// Folder that receives the files, defaults to PATH
    #[arg(long, value_name = "DIR")]
    dest: Option<PathBuf>,

    /// Folders (and everything below them) to leave untouched
    #[arg(long, value_name = "DIR", num_args = 1..)]
    ignore: Vec<PathBuf>,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(Args, Debug)]
struct CountArgs {
    /// Folder to count
    path: PathBuf,

    /// Folders (and everything below them) to leave out
    #[arg(long, value_name = "DIR", num_args = 1..)]
    ignore: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Command::Sort(args) => run_sort(&args),
        Command::Unpack(args) => run_unpack(&args),
        Command::Count(args) => run_count(&args),
    };

    if let Err(e) = result {
        eprintln!("{} {e}", "Error:".red());
        std::process::exit(1);
    }
}

/// Settings file first, then flags: a criterion given on the command line
/// replaces the file's, options are switched on by either.
fn build_settings(args: &SortArgs) -> Result<SortSettings, SettingsError> {
    let mut settings = match &args.settings {
        Some(path) => SortSettings::load(path)?,
        None => SortSettings::default(),
    };

    if let Some(mode) = args.date {
        let position = settings
            .position_of(Criterion::Date)
            .unwrap_or_else(|| settings.next_position());
        settings.date = Some(Positioned {
            position,
            params: DateSettings {
                mode,
                interval: args.interval,
                range: DateRange {
                    start: args.start.clone().unwrap_or_default(),
                    end: args.end.clone().unwrap_or_default(),
                },
            },
        });
    }

    let selection = if !args.custom_ext.is_empty() {
        let mut extensions = BTreeSet::new();
        for ext in &args.custom_ext {
            toggle_extension(&mut extensions, ext);
        }
        Some(FileTypeSelection::Custom(extensions))
    } else if !args.types.is_empty() {
        Some(FileTypeSelection::Specific(args.types.iter().copied().collect()))
    } else if args.all_types {
        Some(FileTypeSelection::AllTypes)
    } else {
        None
    };
    if let Some(params) = selection {
        let position = settings
            .position_of(Criterion::FileType)
            .unwrap_or_else(|| settings.next_position());
        settings.file_type = Some(Positioned { position, params });
    }

    if !args.keywords.is_empty() || !args.ungrouped.is_empty() {
        let position = settings
            .position_of(Criterion::Keyword)
            .unwrap_or_else(|| settings.next_position());
        settings.keyword = Some(Positioned {
            position,
            params: KeywordSettings {
                groups: args.keywords.clone(),
                ungrouped: args.ungrouped.clone(),
            },
        });
    }

    if !args.order.is_empty() {
        settings.reorder(&args.order);
    }

    let options = &mut settings.options;
    options.in_place |= args.in_place;
    options.log_sort |= args.log;
    options.show_data |= args.show_data || args.csv.is_some();
    options.ignore.extend(args.ignore.iter().cloned());
    if let Some(dir) = &args.log_dir {
        options.log_dir = Some(dir.clone());
    }

    settings.validate()?;
    Ok(settings)
}

fn confirm(prompt: &str) -> Result<bool, SortError> {
    print!("{prompt} [y/N] ");
    io::stdout().flush().ok();

    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .map_err(|e| SortError::io("Cannot read answer", Path::new("<stdin>"), e))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

// Typing `q` and Enter stops the sort at the next file.
fn watch_for_cancel(flag: Arc<AtomicBool>) {
    if !io::stdin().is_terminal() {
        return;
    }
    let spawned = thread::Builder::new()
        .name("cancel-watch".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().eq_ignore_ascii_case("q") {
                    flag.store(true, Ordering::Relaxed);
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!("Cancelling from the keyboard is unavailable: {e}");
    }
}

fn run_sort(args: &SortArgs) -> Result<(), SortError> {
    let settings = build_settings(args)?;
    if let Some(path) = &args.save_settings {
        settings.save(path)?;
        println!("Settings saved to {}", path.display());
    }

    let sorter = FileSorter::new(&args.path)?;
    let root = sorter.root().to_path_buf();

    println!("{}", "=== Current Directory ===".cyan());
    println!("{}\n", tools::shorten_path(&root, 2));
    for line in settings.describe() {
        println!("{line}");
    }
    println!();

    if !args.yes && !confirm("Check settings before beginning. Begin sort?")? {
        println!("Sort not started.");
        return Ok(());
    }

    let total = tools::get_file_count(&root, &settings.options.ignore)?;
    let show_data = settings.options.show_data;
    let time_mode = settings
        .date
        .as_ref()
        .map_or(TimeMode::Modified, |d| d.params.mode);

    let handle = spawn_sort(sorter, settings)?;
    watch_for_cancel(handle.cancel_flag());
    if io::stdin().is_terminal() {
        println!("{}", "Type q and press Enter to stop.".dimmed());
    }

    let report = tools::timed("sort_files", || {
        for checked in handle.progress().iter() {
            print!("\r  Sorting files: {checked}/{total}");
            io::stdout().flush().ok();
        }
        println!();
        handle.join()
    })?;

    match report.outcome {
        SortOutcome::Completed => println!("{}", report.outcome.message().green()),
        SortOutcome::Cancelled => println!("{}", report.outcome.message().yellow()),
    }
    print!("{}", report.counter);
    if let Some(path) = &report.log_path {
        println!("Sort log: {}", path.display());
    }

    if show_data {
        stats::print_results(&report.results, report.counter.checked_files);
        stats::print_extensions(&report.records);
        stats::print_size_timeline(&report.records, time_mode);
        stats::print_distribution(&root)?;
    }
    if let Some(path) = &args.csv {
        stats::write_csv(&report.records, path, args.size_unit)?;
        println!("File properties written to {}", path.display());
    }
    Ok(())
}

fn run_unpack(args: &UnpackArgs) -> Result<(), SortError> {
    let sorter = FileSorter::new(&args.path)?;
    let dest = args.dest.clone().unwrap_or_else(|| sorter.root().to_path_buf());

    println!("{}", "=== Unpack Folders ===".cyan());
    println!("From: {}", tools::shorten_path(sorter.root(), 2));
    println!("Into: {}\n", tools::shorten_path(&dest, 2));

    if !args.yes
        && !confirm("This moves ALL nested files and DELETES the emptied folders. Continue?")?
    {
        println!("Unpack not started.");
        return Ok(());
    }

    let counter = tools::timed("unpack_folders", || sorter.unpack_folders(&dest, &args.ignore))?;
    println!("{}", "Folder was unpacked successfully.".green());
    print!("{counter}");
    Ok(())
}

fn run_count(args: &CountArgs) -> Result<(), SortError> {
    let sorter = FileSorter::new(&args.path)?;
    let count = tools::get_file_count(sorter.root(), &args.ignore)?;
    println!(
        "{} files in {}",
        count.to_string().green(),
        tools::shorten_path(sorter.root(), 2)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use settings::Category;

    fn sort_args(argv: &[&str]) -> SortArgs {
        let mut full = vec!["file_sorter", "sort", "/tmp"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Sort(args) => args,
            other => panic!("expected sort, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_build_positions_in_order() {
        let args = sort_args(&["--date", "created", "--types", "image,pdf", "--ungrouped", "jar"]);
        let settings = build_settings(&args).unwrap();

        assert_eq!(
            settings.ordered(),
            vec![Criterion::Date, Criterion::FileType, Criterion::Keyword]
        );
        let date = settings.date.unwrap().params;
        assert_eq!(date.mode, TimeMode::Created);
        assert_eq!(date.interval, TimeInterval::Month);
        assert_eq!(
            settings.file_type.unwrap().params,
            FileTypeSelection::Specific([Category::Image, Category::Pdf].into_iter().collect())
        );
    }

    #[test]
    fn test_order_flag_renumbers() {
        let args = sort_args(&[
            "--all-types",
            "--keyword",
            "Reports=report,summary",
            "--order",
            "keyword,type",
        ]);
        let settings = build_settings(&args).unwrap();
        assert_eq!(settings.ordered(), vec![Criterion::Keyword, Criterion::FileType]);
        assert_eq!(settings.keyword.unwrap().params.groups[0].folder, "Reports");
    }

    #[test]
    fn test_custom_extensions_and_csv_implies_show_data() {
        let args = sort_args(&["--custom-ext", "txt,.LOG", "--csv", "out.csv"]);
        let settings = build_settings(&args).unwrap();
        let FileTypeSelection::Custom(exts) = settings.file_type.unwrap().params else {
            panic!("expected custom extensions");
        };
        assert!(exts.contains(".txt"));
        assert!(exts.contains(".LOG"));
        assert!(settings.options.show_data);
    }

    #[test]
    fn test_flags_replace_file_criterion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut saved = SortSettings::default();
        saved.keyword = Some(Positioned {
            position: 1,
            params: KeywordSettings {
                groups: vec![],
                ungrouped: vec!["old".to_string()],
            },
        });
        saved.options.in_place = true;
        saved.save(&path).unwrap();

        let settings_path = path.to_string_lossy().to_string();
        let args = sort_args(&["--settings", &settings_path, "--ungrouped", "new", "--all-types"]);
        let settings = build_settings(&args).unwrap();

        let keyword = settings.keyword.unwrap();
        assert_eq!(keyword.position, 1);
        assert_eq!(keyword.params.ungrouped, vec!["new".to_string()]);
        assert_eq!(settings.file_type.unwrap().position, 2);
        assert!(settings.options.in_place);
    }

    #[test]
    fn test_no_criteria_rejected() {
        let args = sort_args(&["--log"]);
        assert!(matches!(build_settings(&args), Err(SettingsError::NoCriteria)));
    }

    #[test]
    fn test_conflicting_type_flags_rejected() {
        let result = Cli::try_parse_from([
            "file_sorter",
            "sort",
            "/tmp",
            "--all-types",
            "--types",
            "image",
        ]);
        assert!(result.is_err());
    }
}
