use crate::classify::{Classifier, SortResults};
use crate::compose::{compose, ensure_folders};
use crate::error::SortError;
use crate::settings::{RunOptions, SortSettings};
use crate::sort_log::SortLog;
use crate::stats::FileRecord;
use crate::tools::{is_sortable_file, resolve_ignored, walk_bottom_up};
use crate::types::{SortCounter, SortOutcome};
use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

#[derive(Debug)]
pub struct SortReport {
    pub outcome: SortOutcome,
    pub counter: SortCounter,
    pub results: SortResults,
    /// Filled only when `show_data` is set.
    pub records: Vec<FileRecord>,
    pub log_path: Option<PathBuf>,
}

#[derive(Default)]
struct Tally {
    counter: SortCounter,
    records: Vec<FileRecord>,
}

/// Sorts and unpacks one folder tree.
#[derive(Debug, Clone)]
pub struct FileSorter {
    root: PathBuf,
    cancel: Arc<AtomicBool>,
}

impl FileSorter {
    pub fn new(root: &Path) -> Result<Self, SortError> {
        let root = root
            .canonicalize()
            .map_err(|e| SortError::io("Cannot open folder", root, e))?;
        if !root.is_dir() {
            return Err(SortError::io(
                "Not a folder",
                &root,
                io::Error::from(io::ErrorKind::NotADirectory),
            ));
        }
        info!("Current directory is {}.", root.display());
        Ok(FileSorter {
            root,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shared flag polled once per file; setting it stops a running sort.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Walks the tree bottom-up and moves every file into the folder chain its
    /// classification produces. `progress` receives the running count of checked files.
    pub fn sort_files(
        &self,
        settings: &SortSettings,
        progress: Option<&Sender<usize>>,
    ) -> Result<SortReport, SortError> {
        let options = &settings.options;
        let mut classifier = Classifier::new(settings)?;

        let mut log = if options.log_sort {
            let dir = options.log_dir.clone().unwrap_or_else(|| PathBuf::from("."));
            SortLog::create(&dir)?
        } else {
            SortLog::disabled()
        };
        log.record(&format!("Sort started in ({}).", self.root.display()));
        log.record(&format!(
            "Parameters: {}",
            serde_json::to_string(settings).unwrap_or_default()
        ));
        log.record(&format!("Ignored folders: {:?}", options.ignore));
        log.record(&format!("Sorting in-place: {}", options.in_place));
        let order: Vec<&str> = classifier.criteria().iter().map(|c| c.name()).collect();
        log.record(&format!("Sort order: {}\n", order.join(" > ")));

        let ignored = resolve_ignored(&self.root, &options.ignore);
        let own_log = log.path().and_then(|p| p.canonicalize().ok());
        let files = match self.snapshot(&ignored, own_log.as_deref(), &mut log) {
            Ok(files) => files,
            Err(e) => {
                log.record(&format!("Sort aborted: {e}"));
                log.finish();
                return Err(e);
            }
        };

        let mut tally = Tally::default();
        let outcome = match self.process(&files, options, &mut classifier, &mut tally, &mut log, progress) {
            Ok(outcome) => outcome,
            Err(e) => {
                log.record(&format!("Sort aborted: {e}"));
                log.finish();
                self.cancel.store(false, Ordering::Relaxed);
                return Err(e);
            }
        };

        log.record(outcome.message());
        log.record(&tally.counter.lines().join(", "));
        let log_path = log.path().map(Path::to_path_buf);
        log.finish();
        self.cancel.store(false, Ordering::Relaxed);

        Ok(SortReport {
            outcome,
            counter: tally.counter,
            results: classifier.into_results(),
            records: tally.records,
            log_path,
        })
    }

    // Collected up front so folders created during the sort are never walked.
    fn snapshot(
        &self,
        ignored: &[PathBuf],
        skip_file: Option<&Path>,
        log: &mut SortLog,
    ) -> Result<Vec<PathBuf>, SortError> {
        let (entries, skipped) = walk_bottom_up(&self.root, ignored)?;
        let files = entries
            .into_iter()
            .filter(|e| is_sortable_file(e) && skip_file.is_none_or(|s| s != e.path()))
            .map(walkdir::DirEntry::into_path)
            .collect();

        for dir in skipped {
            log.record(&format!("*Skipped sorting ({}).", dir.display()));
        }
        Ok(files)
    }

    fn process(
        &self,
        files: &[PathBuf],
        options: &RunOptions,
        classifier: &mut Classifier,
        tally: &mut Tally,
        log: &mut SortLog,
        progress: Option<&Sender<usize>>,
    ) -> Result<SortOutcome, SortError> {
        for file in files {
            if self.cancel.load(Ordering::Relaxed) {
                return Ok(SortOutcome::Cancelled);
            }
            let (Some(dir), Some(name)) = (file.parent(), file.file_name()) else {
                continue;
            };

            if options.show_data {
                tally.records.push(FileRecord::from_path(file, &self.root)?);
            }

            let fragments = classifier.folder_chain(file)?;
            let base = if options.in_place { dir } else { self.root.as_path() };

            if let Some(chain) = compose(&fragments, base)
                && let Some(dest) = chain.last()
            {
                let target = dest.join(name);
                if dest != dir
                    && !target.exists()
                    && ensure_folders(&chain, &mut tally.counter, log)?
                {
                    move_file(file, &target)?;
                    log.record(&format!(
                        "({}) moved from ({}) to ({})",
                        name.to_string_lossy(),
                        dir.display(),
                        dest.display()
                    ));
                    tally.counter.sorted_files += 1;
                }
            }

            tally.counter.checked_files += 1;
            if let Some(tx) = progress {
                tx.send(tally.counter.checked_files).ok();
            }
        }
        Ok(SortOutcome::Completed)
    }

    /// Moves every file in every subfolder into `dest` and removes the emptied folders.
    /// Files whose name already exists in `dest` stay where they are.
    pub fn unpack_folders(&self, dest: &Path, ignore: &[PathBuf]) -> Result<SortCounter, SortError> {
        let dest = dest
            .canonicalize()
            .map_err(|e| SortError::io("Cannot open folder", dest, e))?;
        let ignored = resolve_ignored(&self.root, ignore);

        let (entries, skipped) = walk_bottom_up(&self.root, &ignored)?;
        for dir in skipped {
            info!("*Skipped unpacking {}.", dir.display());
        }

        let mut counter = SortCounter::default();
        for entry in entries {
            let path = entry.path();
            if entry.file_type().is_dir() {
                if path == self.root || dest.starts_with(path) {
                    continue;
                }
                match fs::remove_dir(path) {
                    Ok(()) => counter.unpacked_folders += 1,
                    Err(e) => warn!("Kept folder {}: {e}", path.display()),
                }
            } else if is_sortable_file(&entry) {
                let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
                    continue;
                };
                if parent == self.root || parent == dest {
                    continue;
                }
                let target = dest.join(name);
                if target.exists() {
                    warn!(
                        "Skipped {}: {} already exists",
                        path.display(),
                        target.display()
                    );
                    continue;
                }
                move_file(path, &target)?;
                counter.unpacked_files += 1;
            }
        }
        Ok(counter)
    }
}

/// Renames, falling back to copy and delete when `to` is on another filesystem.
pub fn move_file(from: &Path, to: &Path) -> Result<(), SortError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to).map_err(|e| SortError::io("Cannot copy file", from, e))?;
            fs::remove_file(from).map_err(|e| SortError::io("Cannot remove moved file", from, e))
        }
        Err(e) => Err(SortError::io("Cannot move file", from, e)),
    }
}

/// A sort running on its own worker thread.
pub struct SortHandle {
    cancel: Arc<AtomicBool>,
    progress: Receiver<usize>,
    worker: JoinHandle<Result<SortReport, SortError>>,
}

impl SortHandle {
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Checked-file counts; disconnects when the sort ends.
    #[must_use]
    pub fn progress(&self) -> &Receiver<usize> {
        &self.progress
    }

    pub fn join(self) -> Result<SortReport, SortError> {
        self.worker.join().map_err(|_| SortError::WorkerPanicked)?
    }
}

pub fn spawn_sort(sorter: FileSorter, settings: SortSettings) -> Result<SortHandle, SortError> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let cancel = sorter.cancel_flag();
    let worker = thread::Builder::new()
        .name("file-sorter".to_owned())
        .spawn(move || sorter.sort_files(&settings, Some(&tx)))
        .map_err(SortError::Spawn)?;

    Ok(SortHandle {
        cancel,
        progress: rx,
        worker,
    })
}
