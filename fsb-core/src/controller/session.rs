//! ``src/controller/session.rs``
//! ============================================================================
//! # `Session`: folder views, clipboard and background jobs in one place
//!
//! The session is the only owner of interactive state. Every open
//! [`FolderView`] has its own listing, tree, history and search state; the
//! clipboard is shared by all of them. Long work goes to the [`TaskQueue`]
//! (or a search thread) and comes back through [`Session::pump`], which is
//! where clipboard updates, listing refreshes and notifications happen.
//!
//! Failures of user-triggered operations are reported through the UI port
//! and also returned, so a front end can react to either.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, Metadata};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::sync::Arc;

use clipr::{Clipboard, ClipboardItem, ClipboardOperation, PasteOutcome};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::controller::jobs::{Job, JobKind, JobOutput};
use crate::controller::task_queue::{
    JobId, ResultReceiver, ResultSender, TaskQueue, TaskResult, result_channel,
};
use crate::controller::ui_port::{PathMode, UiPort};
use crate::error::{AppError, AppResult};
use crate::fs::file_entry::FileEntry;
use crate::fs::roots::{PlatformRoots, RootEnumerator};
use crate::model::fs_state::DirectoryListModel;
use crate::model::history::{NavigationHistory, validate_directory};
use crate::model::tree_state::DirectoryTreeModel;
use crate::operators::archive_task::{ArchiveSummary, ExtractReport};
use crate::operators::search_task::{SearchHit, spawn_search};
use crate::util::humanize::human_elapsed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(usize);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    Idle,

    /// Submitted, result not drained yet.
    Pending { job_id: JobId, pattern: String },

    Done {
        pattern: String,
        hits: Vec<SearchHit>,
    },
}

/// One open directory view.
pub struct FolderView {
    id: ViewId,
    list: DirectoryListModel,
    tree: DirectoryTreeModel,
    history: NavigationHistory,
    search: SearchState,
}

impl FolderView {
    fn new(id: ViewId, roots: Arc<dyn RootEnumerator>, show_hidden: bool) -> Self {
        let mut tree = DirectoryTreeModel::new(roots, show_hidden);
        tree.build_root();

        Self {
            id,
            list: DirectoryListModel::new(show_hidden),
            tree,
            history: NavigationHistory::new(),
            search: SearchState::Idle,
        }
    }

    /// Make `path` the current directory. Nothing changes if it is invalid.
    fn go_to(&mut self, path: &Path, record: bool) -> AppResult<PathBuf> {
        let canonical: PathBuf = validate_directory(path)?;
        self.list.load(&canonical)?;

        if record {
            self.history.visit(canonical.clone());
        }
        self.tree.expand_to(&canonical);

        debug!(view = %self.id, directory = %canonical.display(), "View moved");

        Ok(canonical)
    }

    /// Re-read the listing and the tree level of the current directory.
    fn reload(&mut self) -> AppResult<()> {
        self.list.refresh()?;

        let directory: PathBuf = self.list.directory().to_path_buf();
        if let Some(node) = self.tree.expand_to(&directory) {
            self.tree.expand(node)?;
        }

        Ok(())
    }

    /// Paths of the named entries in the current listing.
    fn resolve(&self, names: &[&str]) -> AppResult<Vec<PathBuf>> {
        names
            .iter()
            .map(|name: &&str| -> AppResult<PathBuf> {
                self.list
                    .find(name)
                    .map(|entry: &FileEntry| -> PathBuf { entry.path.clone() })
                    .ok_or_else(|| AppError::NotFound(self.directory().join(name)))
            })
            .collect()
    }

    #[must_use]
    pub const fn id(&self) -> ViewId {
        self.id
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        self.list.directory()
    }

    #[must_use]
    pub fn entries(&self) -> &[FileEntry] {
        self.list.entries()
    }

    #[must_use]
    pub const fn list(&self) -> &DirectoryListModel {
        &self.list
    }

    #[must_use]
    pub const fn tree(&self) -> &DirectoryTreeModel {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DirectoryTreeModel {
        &mut self.tree
    }

    #[must_use]
    pub const fn history(&self) -> &NavigationHistory {
        &self.history
    }

    #[must_use]
    pub const fn search_state(&self) -> &SearchState {
        &self.search
    }
}

pub type ResultHandler = Box<dyn FnMut(&TaskResult)>;

/// Bookkeeping for a submitted job until its result is drained.
struct JobContext {
    view: ViewId,

    /// Directories whose views are refreshed on completion.
    affected: Vec<PathBuf>,
}

pub struct Session<U: UiPort> {
    ui: U,
    clipboard: Clipboard,
    queue: TaskQueue,
    sender: ResultSender,
    results: ResultReceiver,
    views: Vec<FolderView>,
    next_view: usize,
    roots: Arc<dyn RootEnumerator>,
    show_hidden: bool,
    max_results: usize,
    jobs: HashMap<JobId, JobContext>,
    handlers: Vec<ResultHandler>,
}

fn view_ref(views: &[FolderView], id: ViewId) -> AppResult<&FolderView> {
    views
        .iter()
        .find(|view: &&FolderView| -> bool { view.id == id })
        .ok_or(AppError::UnknownView(id))
}

fn view_mut(views: &mut [FolderView], id: ViewId) -> AppResult<&mut FolderView> {
    views
        .iter_mut()
        .find(|view: &&mut FolderView| -> bool { view.id == id })
        .ok_or(AppError::UnknownView(id))
}

/// Reject names that are empty, relative markers or contain a separator.
fn validate_name<'a>(directory: &Path, name: &'a str) -> AppResult<&'a str> {
    let trimmed: &str = name.trim();

    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains('/')
        || trimmed.contains(MAIN_SEPARATOR)
    {
        return Err(AppError::invalid_path(&directory.join(name), "invalid name"));
    }

    Ok(trimmed)
}

/// Directories a paste touches: the target, plus the source folders of cut items.
fn paste_affected(items: &[ClipboardItem], target: &Path) -> Vec<PathBuf> {
    let mut affected: Vec<PathBuf> = vec![target.to_path_buf()];

    for item in items {
        if item.operation != ClipboardOperation::Cut {
            continue;
        }

        if let Some(parent) = item.source().parent() {
            if !affected.iter().any(|p: &PathBuf| -> bool { p == parent }) {
                affected.push(parent.to_path_buf());
            }
        }
    }

    affected
}

fn describe_hits(pattern: &str, hits: &[SearchHit]) -> String {
    let matches: usize = hits.iter().filter(|hit| hit.path().is_some()).count();

    match hits.last() {
        Some(SearchHit::NoMatches) => format!("No matches for '{pattern}'"),

        Some(SearchHit::Truncated { limit }) => {
            format!("Showing the first {limit} matches for '{pattern}' (search stopped)")
        }

        _ => format!("{matches} matches for '{pattern}'"),
    }
}

impl<U: UiPort> Session<U> {
    /// Session whose trees start from the host's filesystem roots.
    pub fn new(ui: U, config: &Config) -> AppResult<Self> {
        Self::with_roots(ui, config, Arc::new(PlatformRoots))
    }

    pub fn with_roots(ui: U, config: &Config, roots: Arc<dyn RootEnumerator>) -> AppResult<Self> {
        let (sender, results) = result_channel();
        let queue: TaskQueue = TaskQueue::start(sender.clone(), config.queue.poll_interval)?;

        Ok(Self {
            ui,
            clipboard: Clipboard::new(),
            queue,
            sender,
            results,
            views: Vec::new(),
            next_view: 0,
            roots,
            show_hidden: config.show_hidden,
            max_results: config.search.max_results,
            jobs: HashMap::new(),
            handlers: Vec::new(),
        })
    }

    fn notify_failure(&mut self, err: &AppError) {
        warn!(error = %err, "Operation failed");
        self.ui.notify_error(err.title(), &err.to_string());
    }

    fn surface<T>(&mut self, result: AppResult<T>) -> AppResult<T> {
        if let Err(err) = &result {
            self.notify_failure(err);
        }

        result
    }

    // ------------------------------------------------------------------
    // Views and navigation
    // ------------------------------------------------------------------

    #[instrument(level = "debug", skip_all, fields(start = %start.display()))]
    pub fn open_view(&mut self, start: &Path) -> AppResult<ViewId> {
        let id: ViewId = ViewId(self.next_view);
        let mut view = FolderView::new(id, Arc::clone(&self.roots), self.show_hidden);

        let opened: AppResult<PathBuf> = view.go_to(start, true);
        self.surface(opened)?;

        self.next_view += 1;
        self.views.push(view);
        info!(view = %id, "View opened");

        Ok(id)
    }

    pub fn close_view(&mut self, id: ViewId) -> bool {
        let before: usize = self.views.len();
        self.views.retain(|view: &FolderView| -> bool { view.id != id });
        before != self.views.len()
    }

    pub fn navigate(&mut self, view: ViewId, path: &Path) -> AppResult<()> {
        let result: AppResult<()> =
            view_mut(&mut self.views, view).and_then(|v| v.go_to(path, true).map(|_| ()));
        self.surface(result)
    }

    /// Step back in the view's history. `Ok(None)` when there is nothing to go back to.
    pub fn back(&mut self, view: ViewId) -> AppResult<Option<PathBuf>> {
        let result: AppResult<Option<PathBuf>> = self.step_history(view, true);
        self.surface(result)
    }

    pub fn forward(&mut self, view: ViewId) -> AppResult<Option<PathBuf>> {
        let result: AppResult<Option<PathBuf>> = self.step_history(view, false);
        self.surface(result)
    }

    fn step_history(&mut self, view: ViewId, backwards: bool) -> AppResult<Option<PathBuf>> {
        let view: &mut FolderView = view_mut(&mut self.views, view)?;

        let stepped: Option<PathBuf> = if backwards {
            view.history.back().map(Path::to_path_buf)
        } else {
            view.history.forward().map(Path::to_path_buf)
        };

        let Some(target) = stepped else {
            return Ok(None);
        };

        match view.go_to(&target, false) {
            Ok(_) => Ok(Some(target)),

            Err(err) => {
                // Undo the step so history still matches the listing.
                if backwards {
                    view.history.forward();
                } else {
                    view.history.back();
                }
                Err(err)
            }
        }
    }

    /// Go to the parent directory. `Ok(None)` at a filesystem root.
    pub fn up(&mut self, view: ViewId) -> AppResult<Option<PathBuf>> {
        let result: AppResult<Option<PathBuf>> =
            view_mut(&mut self.views, view).and_then(|view: &mut FolderView| {
                let current: PathBuf = view.directory().to_path_buf();
                let Some(parent) = current.parent() else {
                    return Ok(None);
                };

                let parent: PathBuf = view.go_to(parent, false)?;
                view.history.up(&current);
                Ok(Some(parent))
            });

        self.surface(result)
    }

    pub fn refresh(&mut self, view: ViewId) -> AppResult<()> {
        let result: AppResult<()> = view_mut(&mut self.views, view).and_then(FolderView::reload);
        self.surface(result)
    }

    fn refresh_affected(&mut self, directories: &[PathBuf]) {
        let canonical: Vec<PathBuf> = directories
            .iter()
            .map(|dir: &PathBuf| -> PathBuf { fs::canonicalize(dir).unwrap_or_else(|_| dir.clone()) })
            .collect();

        for view in &mut self.views {
            if !canonical.iter().any(|dir: &PathBuf| -> bool { dir == view.directory() }) {
                continue;
            }

            if let Err(err) = view.reload() {
                warn!(view = %view.id, error = %err, "Refresh after job failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Clipboard
    // ------------------------------------------------------------------

    /// Replace the clipboard with the named entries of `view`, to be copied.
    pub fn copy(&mut self, view: ViewId, names: &[&str]) -> AppResult<usize> {
        let result: AppResult<usize> = self.fill_clipboard(view, names, ClipboardOperation::Copy);
        self.surface(result)
    }

    pub fn cut(&mut self, view: ViewId, names: &[&str]) -> AppResult<usize> {
        let result: AppResult<usize> = self.fill_clipboard(view, names, ClipboardOperation::Cut);
        self.surface(result)
    }

    fn fill_clipboard(
        &mut self,
        view: ViewId,
        names: &[&str],
        operation: ClipboardOperation,
    ) -> AppResult<usize> {
        let paths: Vec<PathBuf> = view_ref(&self.views, view)?.resolve(names)?;
        self.clipboard.set(paths, operation);

        Ok(self.clipboard.len())
    }

    /// Paste on the worker. `Ok(None)` when the clipboard is empty.
    pub fn paste(&mut self, view: ViewId) -> AppResult<Option<JobId>> {
        let result: AppResult<Option<JobId>> = self.submit_paste(view);
        self.surface(result)
    }

    fn submit_paste(&mut self, view: ViewId) -> AppResult<Option<JobId>> {
        let target: PathBuf = view_ref(&self.views, view)?.directory().to_path_buf();

        if self.clipboard.is_empty() {
            self.ui.notify_info("Paste", "Clipboard is empty");
            return Ok(None);
        }

        let items: Vec<ClipboardItem> = self.clipboard.snapshot();
        let affected: Vec<PathBuf> = paste_affected(&items, &target);
        let job_id: JobId = self.queue.submit(Job::Paste { items, target })?;

        self.jobs.insert(job_id, JobContext { view, affected });

        Ok(Some(job_id))
    }

    /// Paste on the calling thread. Returns how many items landed.
    pub fn paste_now(&mut self, view: ViewId) -> AppResult<usize> {
        let result: AppResult<usize> = self.paste_in_place(view);
        self.surface(result)
    }

    fn paste_in_place(&mut self, view: ViewId) -> AppResult<usize> {
        let target: PathBuf = view_ref(&self.views, view)?.directory().to_path_buf();

        if self.clipboard.is_empty() {
            self.ui.notify_info("Paste", "Clipboard is empty");
            return Ok(0);
        }

        let affected: Vec<PathBuf> = paste_affected(self.clipboard.items(), &target);
        let outcomes: Vec<PasteOutcome> = self.clipboard.paste_into(&target);
        self.refresh_affected(&affected);

        self.report_paste(&outcomes)
    }

    fn report_paste(&mut self, outcomes: &[PasteOutcome]) -> AppResult<usize> {
        let details: Vec<String> = outcomes
            .iter()
            .filter_map(|outcome: &PasteOutcome| -> Option<String> {
                outcome
                    .result
                    .as_ref()
                    .err()
                    .map(|err| format!("{}: {}", outcome.item.display_name(), err))
            })
            .collect();

        if !details.is_empty() {
            return Err(AppError::partial_failure("Paste", outcomes.len(), details));
        }

        self.ui
            .notify_info("Paste", &format!("{} item(s) pasted", outcomes.len()));

        Ok(outcomes.len())
    }

    #[must_use]
    pub const fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn clear_clipboard(&mut self) {
        self.clipboard.clear();
    }

    // ------------------------------------------------------------------
    // Other file operations
    // ------------------------------------------------------------------

    /// Ask for a name and create that folder in the view's directory.
    pub fn new_folder(&mut self, view: ViewId) -> AppResult<Option<PathBuf>> {
        let result: AppResult<Option<PathBuf>> = self.create_folder(view);
        self.surface(result)
    }

    fn create_folder(&mut self, view: ViewId) -> AppResult<Option<PathBuf>> {
        let directory: PathBuf = view_ref(&self.views, view)?.directory().to_path_buf();

        let Some(name) = self.ui.prompt_text("New folder", "New Folder") else {
            return Ok(None);
        };

        let path: PathBuf = directory.join(validate_name(&directory, &name)?);
        fs::create_dir(&path).map_err(|e| AppError::from_io(&path, e))?;
        info!(path = %path.display(), "Folder created");

        view_mut(&mut self.views, view)?.reload()?;

        Ok(Some(path))
    }

    /// Ask for a new name for `name`. Never overwrites an existing entry.
    pub fn rename(&mut self, view: ViewId, name: &str) -> AppResult<Option<PathBuf>> {
        let result: AppResult<Option<PathBuf>> = self.rename_entry(view, name);
        self.surface(result)
    }

    fn rename_entry(&mut self, view: ViewId, name: &str) -> AppResult<Option<PathBuf>> {
        let folder: &FolderView = view_ref(&self.views, view)?;
        let directory: PathBuf = folder.directory().to_path_buf();
        let source: PathBuf = folder.resolve(&[name])?.remove(0);

        let Some(answer) = self.ui.prompt_text("Rename", name) else {
            return Ok(None);
        };

        let new_name: &str = validate_name(&directory, &answer)?;
        if new_name == name {
            return Ok(None);
        }

        let dest: PathBuf = directory.join(new_name);
        if fs::symlink_metadata(&dest).is_ok() {
            return Err(AppError::AlreadyExists(dest));
        }

        fs::rename(&source, &dest).map_err(|e| AppError::from_io(&source, e))?;
        info!(from = %source.display(), to = %dest.display(), "Entry renamed");

        view_mut(&mut self.views, view)?.reload()?;

        Ok(Some(dest))
    }

    /// Delete the named entries, best effort. Non-empty folders need confirmation.
    pub fn delete(&mut self, view: ViewId, names: &[&str]) -> AppResult<usize> {
        let result: AppResult<usize> = self.delete_entries(view, names);
        self.surface(result)
    }

    fn delete_entries(&mut self, view: ViewId, names: &[&str]) -> AppResult<usize> {
        let paths: Vec<PathBuf> = view_ref(&self.views, view)?.resolve(names)?;
        let mut removed: usize = 0;
        let mut details: Vec<String> = Vec::new();

        for path in &paths {
            match self.remove_path(path) {
                Ok(true) => removed += 1,

                Ok(false) => debug!(path = %path.display(), "Delete declined"),

                Err(err) => details.push(err.to_string()),
            }
        }

        if let Err(err) = view_mut(&mut self.views, view)?.reload() {
            warn!(error = %err, "Refresh after delete failed");
        }

        if !details.is_empty() {
            return Err(AppError::partial_failure("Delete", paths.len(), details));
        }

        Ok(removed)
    }

    fn remove_path(&mut self, path: &Path) -> AppResult<bool> {
        let meta: Metadata = fs::symlink_metadata(path).map_err(|e| AppError::from_io(path, e))?;

        if meta.is_dir() {
            let non_empty: bool = fs::read_dir(path)
                .map_err(|e| AppError::from_io(path, e))?
                .next()
                .is_some();

            if non_empty
                && !self.ui.confirm(&format!(
                    "Delete '{}' and everything inside it?",
                    path.display()
                ))
            {
                return Ok(false);
            }

            fs::remove_dir_all(path).map_err(|e| AppError::from_io(path, e))?;
        } else {
            fs::remove_file(path).map_err(|e| AppError::from_io(path, e))?;
        }

        info!(path = %path.display(), "Entry deleted");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Background jobs
    // ------------------------------------------------------------------

    /// Start a filename search under the view's directory on its own thread.
    pub fn search(&mut self, view: ViewId, pattern: &str) -> AppResult<JobId> {
        let result: AppResult<JobId> = self.start_search(view, pattern);
        self.surface(result)
    }

    fn start_search(&mut self, view: ViewId, pattern: &str) -> AppResult<JobId> {
        let folder: &mut FolderView = view_mut(&mut self.views, view)?;
        let root: PathBuf = folder.directory().to_path_buf();
        let job_id: JobId = self.sender.next_job_id();

        spawn_search(
            job_id,
            root,
            pattern.to_string(),
            self.max_results,
            self.sender.clone(),
        )?;

        folder.search = SearchState::Pending {
            job_id,
            pattern: pattern.to_string(),
        };
        self.jobs.insert(
            job_id,
            JobContext {
                view,
                affected: Vec::new(),
            },
        );

        Ok(job_id)
    }

    /// Zip the named entries into a file chosen through the UI.
    pub fn create_archive(&mut self, view: ViewId, names: &[&str]) -> AppResult<Option<JobId>> {
        let result: AppResult<Option<JobId>> = self.submit_archive(view, names);
        self.surface(result)
    }

    fn submit_archive(&mut self, view: ViewId, names: &[&str]) -> AppResult<Option<JobId>> {
        let folder: &FolderView = view_ref(&self.views, view)?;
        let directory: PathBuf = folder.directory().to_path_buf();
        let sources: Vec<PathBuf> = folder.resolve(names)?;

        let Some(first) = names.first() else {
            return Err(AppError::invalid_path(&directory, "nothing selected to archive"));
        };

        let suggested: PathBuf = directory.join(format!("{first}.zip"));
        let Some(dest) = self.ui.choose_path(PathMode::SaveFile, &suggested) else {
            return Ok(None);
        };

        if dest.exists()
            && !self
                .ui
                .confirm(&format!("Overwrite '{}'?", dest.display()))
        {
            return Ok(None);
        }

        let affected: Vec<PathBuf> = dest.parent().map(Path::to_path_buf).into_iter().collect();
        let job_id: JobId = self.queue.submit(Job::ArchiveCreate { sources, dest })?;
        self.jobs.insert(job_id, JobContext { view, affected });

        Ok(Some(job_id))
    }

    /// Unpack the named archive into a directory chosen through the UI.
    pub fn extract_archive(&mut self, view: ViewId, name: &str) -> AppResult<Option<JobId>> {
        let result: AppResult<Option<JobId>> = self.submit_extract(view, name);
        self.surface(result)
    }

    fn submit_extract(&mut self, view: ViewId, name: &str) -> AppResult<Option<JobId>> {
        let folder: &FolderView = view_ref(&self.views, view)?;
        let directory: PathBuf = folder.directory().to_path_buf();
        let archive: PathBuf = folder.resolve(&[name])?.remove(0);

        if archive.is_dir() {
            return Err(AppError::invalid_path(&archive, "not an archive"));
        }

        let stem: String = archive
            .file_stem()
            .map_or_else(|| "extracted".to_string(), |s| s.to_string_lossy().into_owned());
        let Some(dest) = self.ui.choose_path(PathMode::OpenDir, &directory.join(stem)) else {
            return Ok(None);
        };

        let mut affected: Vec<PathBuf> = vec![dest.clone()];
        affected.extend(dest.parent().map(Path::to_path_buf));

        let job_id: JobId = self.queue.submit(Job::ArchiveExtract { archive, dest })?;
        self.jobs.insert(job_id, JobContext { view, affected });

        Ok(Some(job_id))
    }

    /// Register a callback run for every drained result, after the session
    /// has applied its own side effects.
    pub fn on_job_result<F>(&mut self, handler: F)
    where
        F: FnMut(&TaskResult) + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Drain every finished job and apply its effects. Call on a timer tick.
    pub fn pump(&mut self) -> usize {
        let mut finished: Vec<TaskResult> = Vec::new();
        self.results
            .drain(|result: TaskResult| finished.push(result));

        for result in &finished {
            self.apply_result(result);

            for handler in &mut self.handlers {
                handler(result);
            }
        }

        finished.len()
    }

    fn apply_result(&mut self, result: &TaskResult) {
        let context: Option<JobContext> = self.jobs.remove(&result.job_id);
        let elapsed: String = human_elapsed(result.elapsed);

        debug!(
            job_id = %result.job_id,
            kind = %result.kind,
            ok = result.outcome.is_ok(),
            "Applying job result"
        );

        match &result.outcome {
            Ok(JobOutput::Search { pattern, hits, .. }) => {
                let Some(view) = self.pending_search_view(context.as_ref(), result.job_id) else {
                    return;
                };

                view.search = SearchState::Done {
                    pattern: pattern.clone(),
                    hits: hits.clone(),
                };

                self.ui
                    .notify_info("Search", &format!("{} ({elapsed})", describe_hits(pattern, hits)));
            }

            Ok(JobOutput::ArchiveCreated(summary)) => self.report_archive(summary, &elapsed),

            Ok(JobOutput::ArchiveExtracted(report)) => self.report_extract(report, &elapsed),

            Ok(JobOutput::Pasted { outcomes, .. }) => {
                self.clipboard.apply_outcomes(outcomes);

                if let Err(err) = self.report_paste(outcomes) {
                    self.notify_failure(&err);
                }
            }

            Err(err) => {
                if result.kind == JobKind::Search {
                    let Some(view) = self.pending_search_view(context.as_ref(), result.job_id)
                    else {
                        return;
                    };

                    view.search = SearchState::Idle;
                }

                self.notify_failure(err);
            }
        }

        if let Some(ctx) = context {
            self.refresh_affected(&ctx.affected);
        }
    }

    /// The view still waiting for search `job_id`. A search superseded by a
    /// newer one in the same view (or whose view is closed) yields `None`.
    fn pending_search_view(
        &mut self,
        context: Option<&JobContext>,
        job_id: JobId,
    ) -> Option<&mut FolderView> {
        let view: &mut FolderView = view_mut(&mut self.views, context?.view).ok()?;

        let current: bool = matches!(
            &view.search,
            SearchState::Pending { job_id: pending, .. } if *pending == job_id
        );

        if !current {
            debug!(%job_id, view = %view.id, "Discarding stale search result");
            return None;
        }

        Some(view)
    }

    fn report_archive(&mut self, summary: &ArchiveSummary, elapsed: &str) {
        if summary.is_complete() {
            self.ui.notify_info(
                "Archive created",
                &format!(
                    "{} ({} files, {} folders) in {elapsed}",
                    summary.dest.display(),
                    summary.files,
                    summary.directories
                ),
            );
            return;
        }

        let skipped: Vec<String> = summary
            .skipped
            .iter()
            .map(|path: &PathBuf| -> String { path.display().to_string() })
            .collect();

        let err: AppError = AppError::archive(
            &summary.dest,
            format!(
                "{} entries could not be stored: {}",
                skipped.len(),
                skipped.join(", ")
            ),
        );
        self.notify_failure(&err);
    }

    fn report_extract(&mut self, report: &ExtractReport, elapsed: &str) {
        if report.is_clean() {
            self.ui.notify_info(
                "Archive extracted",
                &format!(
                    "{} entries into {} in {elapsed}",
                    report.extracted,
                    report.dest.display()
                ),
            );
            return;
        }

        let err: AppError = AppError::archive(
            &report.dest,
            format!(
                "{} entries pointing outside the destination were skipped: {}",
                report.rejected.len(),
                report.rejected.join(", ")
            ),
        );
        self.notify_failure(&err);
    }

    /// Stop the worker. Jobs still queued are dropped.
    pub fn shutdown(&mut self) {
        info!(pending = self.jobs.len(), "Session shutting down");
        self.queue.stop();
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn view(&self, id: ViewId) -> Option<&FolderView> {
        view_ref(&self.views, id).ok()
    }

    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut FolderView> {
        view_mut(&mut self.views, id).ok()
    }

    #[must_use]
    pub fn views(&self) -> &[FolderView] {
        &self.views
    }

    /// Jobs submitted whose result has not been drained yet.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub const fn ui(&self) -> &U {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut U {
        &mut self.ui
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::roots::FixedRoots;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingUi {
        confirm_answer: bool,
        prompt_answers: VecDeque<Option<String>>,
        path_answers: VecDeque<Option<PathBuf>>,
        errors: Vec<(String, String)>,
        infos: Vec<(String, String)>,
    }

    impl UiPort for RecordingUi {
        fn confirm(&mut self, _prompt: &str) -> bool {
            self.confirm_answer
        }

        fn prompt_text(&mut self, _title: &str, _initial: &str) -> Option<String> {
            self.prompt_answers.pop_front().flatten()
        }

        fn choose_path(&mut self, _mode: PathMode, _start: &Path) -> Option<PathBuf> {
            self.path_answers.pop_front().flatten()
        }

        fn notify_error(&mut self, title: &str, message: &str) {
            self.errors.push((title.to_string(), message.to_string()));
        }

        fn notify_info(&mut self, title: &str, message: &str) {
            self.infos.push((title.to_string(), message.to_string()));
        }
    }

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        session: Session<RecordingUi>,
        view: ViewId,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();

        fs::create_dir_all(root.join("docs/inner")).unwrap();
        fs::create_dir(root.join("target")).unwrap();
        fs::write(root.join("docs/readme.txt"), "hello").unwrap();
        fs::write(root.join("note.txt"), "note").unwrap();

        let mut config = Config::default();
        config.queue.poll_interval = Duration::from_millis(10);

        let mut session = Session::with_roots(
            RecordingUi::default(),
            &config,
            Arc::new(FixedRoots(vec![root.clone()])),
        )
        .unwrap();
        let view = session.open_view(&root).unwrap();

        Fixture {
            _dir: dir,
            root,
            session,
            view,
        }
    }

    fn pump_until(session: &mut Session<RecordingUi>, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seen = 0;

        while seen < expected {
            assert!(Instant::now() < deadline, "timed out waiting for job results");
            seen += session.pump();
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn names(session: &Session<RecordingUi>, view: ViewId) -> Vec<String> {
        session
            .view(view)
            .unwrap()
            .entries()
            .iter()
            .map(|e| e.name.to_string())
            .collect()
    }

    #[test]
    fn test_navigation_back_forward_up() {
        let mut fx = fixture();
        let docs = fx.root.join("docs");

        fx.session.navigate(fx.view, &docs).unwrap();
        assert_eq!(names(&fx.session, fx.view), vec!["inner", "readme.txt"]);

        assert_eq!(fx.session.back(fx.view).unwrap(), Some(fx.root.clone()));
        assert_eq!(fx.session.forward(fx.view).unwrap(), Some(docs.clone()));

        assert_eq!(fx.session.up(fx.view).unwrap(), Some(fx.root.clone()));
        assert_eq!(fx.session.view(fx.view).unwrap().directory(), fx.root);
        assert!(fx.session.view(fx.view).unwrap().history().can_go_back());
    }

    #[test]
    fn test_invalid_navigation_leaves_state_and_notifies() {
        let mut fx = fixture();

        let err = fx
            .session
            .navigate(fx.view, &fx.root.join("note.txt"))
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidPath { .. }));
        assert_eq!(fx.session.view(fx.view).unwrap().directory(), fx.root);
        assert!(!fx.session.view(fx.view).unwrap().history().can_go_back());
        assert_eq!(fx.session.ui().errors.len(), 1);
        assert_eq!(fx.session.ui().errors[0].0, "Invalid path");
    }

    #[test]
    fn test_paste_now_copies_and_renames_collisions() {
        let mut fx = fixture();
        fx.session.copy(fx.view, &["note.txt"]).unwrap();

        assert_eq!(fx.session.paste_now(fx.view).unwrap(), 1);
        assert_eq!(fx.session.paste_now(fx.view).unwrap(), 1);

        assert_eq!(fs::read_to_string(fx.root.join("note (1).txt")).unwrap(), "note");
        assert!(fx.root.join("note (2).txt").exists());
        assert!(fx.session.clipboard().contains(&fx.root.join("note.txt")));

        let listed = names(&fx.session, fx.view);
        assert!(listed.contains(&"note (2).txt".to_string()));
    }

    #[test]
    fn test_queued_cut_moves_and_clears_clipboard() {
        let mut fx = fixture();
        fx.session.cut(fx.view, &["note.txt"]).unwrap();

        let other = fx.session.open_view(&fx.root.join("target")).unwrap();
        let job = fx.session.paste(other).unwrap();
        assert!(job.is_some());
        assert_eq!(fx.session.pending_jobs(), 1);

        pump_until(&mut fx.session, 1);

        assert!(fx.root.join("target/note.txt").exists());
        assert!(!fx.root.join("note.txt").exists());
        assert!(fx.session.clipboard().is_empty());
        assert_eq!(names(&fx.session, other), vec!["note.txt"]);
        assert!(!names(&fx.session, fx.view).contains(&"note.txt".to_string()));
    }

    #[test]
    fn test_partial_paste_failure_is_reported() {
        let mut fx = fixture();
        fx.session.copy(fx.view, &["docs", "note.txt"]).unwrap();
        fs::remove_file(fx.root.join("note.txt")).unwrap();

        fx.session.navigate(fx.view, &fx.root.join("target")).unwrap();
        let err = fx.session.paste_now(fx.view).unwrap_err();

        assert!(matches!(err, AppError::PartialFailure { failed: 1, total: 2, .. }));
        assert!(fx.root.join("target/docs/readme.txt").exists());
        assert_eq!(fx.session.ui().errors[0].0, "Some items failed");
    }

    #[test]
    fn test_delete_asks_for_non_empty_folders() {
        let mut fx = fixture();

        fx.session.ui_mut().confirm_answer = false;
        assert_eq!(fx.session.delete(fx.view, &["docs", "note.txt"]).unwrap(), 1);
        assert!(fx.root.join("docs").exists());
        assert!(!fx.root.join("note.txt").exists());

        fx.session.ui_mut().confirm_answer = true;
        assert_eq!(fx.session.delete(fx.view, &["docs", "target"]).unwrap(), 2);
        assert!(names(&fx.session, fx.view).is_empty());
    }

    #[test]
    fn test_new_folder_and_rename() {
        let mut fx = fixture();

        fx.session.ui_mut().prompt_answers.push_back(Some("fresh".to_string()));
        let created = fx.session.new_folder(fx.view).unwrap().unwrap();
        assert!(created.is_dir());

        fx.session.ui_mut().prompt_answers.push_back(Some("renamed".to_string()));
        fx.session.rename(fx.view, "fresh").unwrap();
        assert!(fx.root.join("renamed").is_dir());

        fx.session.ui_mut().prompt_answers.push_back(Some("docs".to_string()));
        let err = fx.session.rename(fx.view, "renamed").unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));

        fx.session.ui_mut().prompt_answers.push_back(Some("../escape".to_string()));
        assert!(fx.session.new_folder(fx.view).is_err());

        fx.session.ui_mut().prompt_answers.push_back(None);
        assert_eq!(fx.session.new_folder(fx.view).unwrap(), None);
    }

    #[test]
    fn test_search_moves_from_pending_to_done() {
        let mut fx = fixture();

        let job_id = fx.session.search(fx.view, "*.txt").unwrap();
        assert!(matches!(
            fx.session.view(fx.view).unwrap().search_state(),
            SearchState::Pending { job_id: pending, .. } if *pending == job_id
        ));

        pump_until(&mut fx.session, 1);

        let SearchState::Done { hits, .. } = fx.session.view(fx.view).unwrap().search_state() else {
            panic!("search should be done");
        };
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_search_without_matches_reports_placeholder() {
        let mut fx = fixture();

        fx.session.search(fx.view, "*.nothing").unwrap();
        pump_until(&mut fx.session, 1);

        let state = fx.session.view(fx.view).unwrap().search_state();
        assert_eq!(
            *state,
            SearchState::Done {
                pattern: "*.nothing".to_string(),
                hits: vec![SearchHit::NoMatches],
            }
        );
        assert!(fx.session.ui().infos.last().unwrap().1.starts_with("No matches"));
    }

    fn search_result(job_id: JobId, outcome: AppResult<JobOutput>) -> TaskResult {
        TaskResult {
            job_id,
            kind: JobKind::Search,
            elapsed: Duration::ZERO,
            outcome,
        }
    }

    fn search_done(root: &Path, pattern: &str, hits: Vec<SearchHit>) -> AppResult<JobOutput> {
        Ok(JobOutput::Search {
            root: root.to_path_buf(),
            pattern: pattern.to_string(),
            hits,
        })
    }

    /// Two searches in one view, the second started before the first finished.
    fn two_pending_searches(fx: &mut Fixture) -> (JobId, JobId) {
        let older = fx.session.sender.next_job_id();
        let newer = fx.session.sender.next_job_id();

        for job_id in [older, newer] {
            fx.session.jobs.insert(
                job_id,
                JobContext {
                    view: fx.view,
                    affected: Vec::new(),
                },
            );
        }

        fx.session.view_mut(fx.view).unwrap().search = SearchState::Pending {
            job_id: newer,
            pattern: "*.txt".to_string(),
        };

        (older, newer)
    }

    #[test]
    fn test_older_search_finishing_last_does_not_replace_newer() {
        let mut fx = fixture();
        let (older, newer) = two_pending_searches(&mut fx);
        let note = fx.root.join("note.txt");

        fx.session.sender.send(search_result(
            newer,
            search_done(&fx.root, "*.txt", vec![SearchHit::Match(note.clone())]),
        ));
        fx.session.sender.send(search_result(
            older,
            search_done(&fx.root, "*.nothing", vec![SearchHit::NoMatches]),
        ));
        assert_eq!(fx.session.pump(), 2);

        assert_eq!(
            *fx.session.view(fx.view).unwrap().search_state(),
            SearchState::Done {
                pattern: "*.txt".to_string(),
                hits: vec![SearchHit::Match(note)],
            }
        );
        assert_eq!(fx.session.ui().infos.len(), 1);
        assert_eq!(fx.session.pending_jobs(), 0);
    }

    #[test]
    fn test_older_search_failure_keeps_newer_pending() {
        let mut fx = fixture();
        let (older, newer) = two_pending_searches(&mut fx);

        fx.session.sender.send(search_result(
            older,
            Err(AppError::NotFound(fx.root.join("gone"))),
        ));
        fx.session.pump();

        assert!(matches!(
            fx.session.view(fx.view).unwrap().search_state(),
            SearchState::Pending { job_id, .. } if *job_id == newer
        ));
        assert!(fx.session.ui().errors.is_empty());
    }

    #[test]
    fn test_archive_round_trip_through_queue() {
        let mut fx = fixture();
        let zip_path = fx.root.join("bundle.zip");
        let out = fx.root.join("out");

        fx.session.ui_mut().path_answers.push_back(Some(zip_path.clone()));
        fx.session.create_archive(fx.view, &["docs", "note.txt"]).unwrap();

        fx.session.ui_mut().path_answers.push_back(Some(out.clone()));
        pump_until(&mut fx.session, 1);
        assert!(names(&fx.session, fx.view).contains(&"bundle.zip".to_string()));

        fx.session.extract_archive(fx.view, "bundle.zip").unwrap();
        pump_until(&mut fx.session, 1);

        assert_eq!(fs::read_to_string(out.join("docs/readme.txt")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(out.join("note.txt")).unwrap(), "note");
        assert!(out.join("docs/inner").is_dir());
        assert!(fx.session.ui().errors.is_empty());
    }

    #[test]
    fn test_handlers_see_every_result() {
        let mut fx = fixture();
        let seen: Rc<RefCell<Vec<JobKind>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        fx.session
            .on_job_result(move |result| sink.borrow_mut().push(result.kind));

        fx.session.search(fx.view, "*").unwrap();
        fx.session.copy(fx.view, &["note.txt"]).unwrap();
        fx.session.paste(fx.view).unwrap();
        pump_until(&mut fx.session, 2);

        let mut kinds = seen.borrow().clone();
        kinds.sort_by_key(|k| k.to_string());
        assert_eq!(kinds, vec![JobKind::Paste, JobKind::Search]);
    }

    #[test]
    fn test_failed_job_notifies_and_worker_survives() {
        let mut fx = fixture();
        fs::write(fx.root.join("broken.zip"), "not a zip").unwrap();
        fx.session.refresh(fx.view).unwrap();

        fx.session.ui_mut().path_answers.push_back(Some(fx.root.join("x")));
        fx.session.extract_archive(fx.view, "broken.zip").unwrap();
        pump_until(&mut fx.session, 1);
        assert_eq!(fx.session.ui().errors.last().unwrap().0, "Archive error");

        fx.session.copy(fx.view, &["note.txt"]).unwrap();
        fx.session.paste(fx.view).unwrap();
        pump_until(&mut fx.session, 1);
        assert!(fx.root.join("note (1).txt").exists());
    }
}
