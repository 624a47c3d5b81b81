//! ``src/operators/search_task.rs``
//! ============================================================================
//! # Filename search: glob walk with a hard match cap
//!
//! [`SearchWalk`] is a lazy walk over `walkdir` that yields one [`SearchHit`]
//! per matching name. Hidden directories are pruned before descending; hidden
//! files are still matched. The walk ends with `Truncated` as soon as the cap
//! is reached, or with a lone `NoMatches` when nothing matched at all.
//!
//! [`spawn_search`] runs one walk on its own thread, outside the shared
//! worker queue, and posts the collected hits through the result channel.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use compact_str::CompactString;
use glob::{MatchOptions, Pattern};
use tracing::{debug, info, instrument};
use walkdir::{DirEntry, FilterEntry, IntoIter, WalkDir};

use crate::controller::jobs::{JobKind, JobOutput};
use crate::controller::task_queue::{JobId, ResultSender, TaskResult, run_guarded};
use crate::error::{AppError, AppResult};
use crate::fs::file_entry::{is_hidden, is_hidden_name};

/// Default cap on matches per search.
pub const MAX_SEARCH_RESULTS: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchHit {
    /// Path whose base name matched the pattern.
    Match(PathBuf),

    /// The cap was reached and the walk stopped there.
    Truncated { limit: usize },

    /// Informational placeholder for a walk that matched nothing.
    NoMatches,
}

impl SearchHit {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Match(path) => Some(path),
            Self::Truncated { .. } | Self::NoMatches => None,
        }
    }
}

type PrunedWalk = FilterEntry<IntoIter, fn(&DirEntry) -> bool>;

/// Lazy, finite, single-pass search over one directory tree.
pub struct SearchWalk {
    walker: PrunedWalk,
    pattern: Pattern,
    options: MatchOptions,
    max_results: usize,
    matched: usize,
    finished: bool,
}

impl Iterator for SearchWalk {
    type Item = SearchHit;

    fn next(&mut self) -> Option<SearchHit> {
        if self.finished {
            return None;
        }

        if self.matched == self.max_results {
            self.finished = true;
            return Some(SearchHit::Truncated {
                limit: self.max_results,
            });
        }

        loop {
            let entry: DirEntry = match self.walker.next() {
                Some(Ok(entry)) => entry,

                Some(Err(err)) => {
                    debug!("Skipping unreadable search entry: {}", err);
                    continue;
                }

                None => {
                    self.finished = true;
                    return (self.matched == 0).then_some(SearchHit::NoMatches);
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let name: std::borrow::Cow<'_, str> = entry.file_name().to_string_lossy();
            if self.pattern.matches_with(&name, self.options) {
                self.matched += 1;
                return Some(SearchHit::Match(entry.into_path()));
            }
        }
    }
}

/// Keep the root, and any entry that is not a hidden directory.
fn keep_entry(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }

    let hidden: bool = entry.metadata().map_or_else(
        |_| is_hidden_name(entry.file_name()),
        |meta| is_hidden(entry.path(), &meta),
    );

    !hidden
}

/// Host matching rules: case-insensitive on Windows only, `*` spans dots.
#[must_use]
pub const fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: !cfg!(windows),
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}

/// Validate `root` and `pattern` and return the walk over `root`.
#[instrument(level = "debug", skip_all, fields(root = %root.display(), pattern = %pattern))]
pub fn search(root: &Path, pattern: &str, max_results: usize) -> AppResult<SearchWalk> {
    if !root.is_dir() {
        return Err(if root.exists() {
            AppError::invalid_path(root, "search root is not a directory")
        } else {
            AppError::NotFound(root.to_path_buf())
        });
    }

    if max_results == 0 {
        return Err(AppError::InvalidPattern {
            pattern: CompactString::from(pattern),
            reason: CompactString::from("match limit must be at least 1"),
        });
    }

    let compiled: Pattern = Pattern::new(pattern).map_err(|e| AppError::InvalidPattern {
        pattern: CompactString::from(pattern),
        reason: CompactString::from(e.msg),
    })?;

    let walker: PrunedWalk = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(keep_entry as fn(&DirEntry) -> bool);

    Ok(SearchWalk {
        walker,
        pattern: compiled,
        options: match_options(),
        max_results,
        matched: 0,
        finished: false,
    })
}

/// Run one search on a dedicated thread and post a single result.
pub fn spawn_search(
    job_id: JobId,
    root: PathBuf,
    pattern: String,
    max_results: usize,
    sender: ResultSender,
) -> AppResult<()> {
    let thread_root: PathBuf = root.clone();

    thread::Builder::new()
        .name(format!("fsb-search-{job_id}"))
        .spawn(move || {
            let start_time: Instant = Instant::now();

            info!(
                marker = "SEARCH_STARTED",
                operation_type = "filename_search",
                %job_id,
                root = %thread_root.display(),
                pattern = %pattern,
                "Search started"
            );

            let outcome: AppResult<JobOutput> = run_guarded(job_id, || {
                let hits: Vec<SearchHit> =
                    search(&thread_root, &pattern, max_results)?.collect();

                Ok(JobOutput::Search {
                    root: thread_root.clone(),
                    pattern: pattern.clone(),
                    hits,
                })
            });

            let elapsed: Duration = start_time.elapsed();
            info!(
                marker = "SEARCH_FINISHED",
                operation_type = "filename_search",
                %job_id,
                ok = outcome.is_ok(),
                "Search finished in {:?}",
                elapsed
            );

            sender.send(TaskResult {
                job_id,
                kind: JobKind::Search,
                elapsed,
                outcome,
            });
        })
        .map_err(|e| AppError::from_io(&root, e))?;

    Ok(())
}
