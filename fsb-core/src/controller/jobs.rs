//! ``src/controller/jobs.rs``
//! ============================================================================
//! # Background job definitions
//!
//! A `Job` is plain data: it carries everything needed to run and nothing
//! tied to the interactive side. `execute` is the single dispatch point the
//! worker calls.

use std::fmt;
use std::path::PathBuf;

use clipr::{ClipboardItem, PasteOutcome, execute_paste};

use crate::error::AppResult;
use crate::operators::archive_task::{
    ArchiveSummary, ExtractReport, create_archive, extract_archive,
};
use crate::operators::search_task::{SearchHit, search};

#[derive(Debug, Clone)]
pub enum Job {
    Search {
        root: PathBuf,
        pattern: String,
        max_results: usize,
    },

    ArchiveCreate {
        sources: Vec<PathBuf>,
        dest: PathBuf,
    },

    ArchiveExtract {
        archive: PathBuf,
        dest: PathBuf,
    },

    /// Bulk copy/move of a clipboard snapshot into `target`.
    Paste {
        items: Vec<ClipboardItem>,
        target: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Search,
    ArchiveCreate,
    ArchiveExtract,
    Paste,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &str = match self {
            Self::Search => "search",
            Self::ArchiveCreate => "archive_create",
            Self::ArchiveExtract => "archive_extract",
            Self::Paste => "paste",
        };

        f.write_str(name)
    }
}

/// What a successful job hands back to the interactive thread.
#[derive(Debug)]
pub enum JobOutput {
    Search {
        root: PathBuf,
        pattern: String,
        hits: Vec<SearchHit>,
    },

    ArchiveCreated(ArchiveSummary),

    ArchiveExtracted(ExtractReport),

    /// Per-item outcomes; individual failures do not fail the job.
    Pasted {
        target: PathBuf,
        outcomes: Vec<PasteOutcome>,
    },
}

impl Job {
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        match self {
            Self::Search { .. } => JobKind::Search,
            Self::ArchiveCreate { .. } => JobKind::ArchiveCreate,
            Self::ArchiveExtract { .. } => JobKind::ArchiveExtract,
            Self::Paste { .. } => JobKind::Paste,
        }
    }
}

pub fn execute(job: Job) -> AppResult<JobOutput> {
    match job {
        Job::Search {
            root,
            pattern,
            max_results,
        } => {
            let hits: Vec<SearchHit> = search(&root, &pattern, max_results)?.collect();
            Ok(JobOutput::Search {
                root,
                pattern,
                hits,
            })
        }

        Job::ArchiveCreate { sources, dest } => {
            create_archive(&sources, &dest).map(JobOutput::ArchiveCreated)
        }

        Job::ArchiveExtract { archive, dest } => {
            extract_archive(&archive, &dest).map(JobOutput::ArchiveExtracted)
        }

        Job::Paste { items, target } => {
            let outcomes: Vec<PasteOutcome> = execute_paste(&items, &target);
            Ok(JobOutput::Pasted { target, outcomes })
        }
    }
}
