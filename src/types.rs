use crate::tools::msg_creator;
use std::fmt;

/// Files and folders touched during one sort or unpack run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortCounter {
    pub checked_files: usize,
    pub sorted_files: usize,
    pub sorted_folders: usize,
    pub unpacked_files: usize,
    pub unpacked_folders: usize,
}

impl SortCounter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == SortCounter::default()
    }

    /// Non-zero entries as `Group Kind: n` lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        [
            ("Checked Files", self.checked_files),
            ("Sorted Files", self.sorted_files),
            ("Sorted Folders", self.sorted_folders),
            ("Unpacked Files", self.unpacked_files),
            ("Unpacked Folders", self.unpacked_folders),
        ]
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .map(|(label, n)| format!("{label}: {n}"))
        .collect()
    }
}

impl fmt::Display for SortCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str(&msg_creator(&["No files or folders altered."]))
        } else {
            f.write_str(&msg_creator(&self.lines()))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOutcome {
    Completed,
    Cancelled,
}

impl SortOutcome {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            SortOutcome::Completed => "Sort successfully finished.",
            SortOutcome::Cancelled => "Sort ended prematurely.",
        }
    }
}
