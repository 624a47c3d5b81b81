//! src/main.rs
//! Line-oriented console front end for the file browser engine
//!
//! A reader thread feeds stdin lines into a channel. The main loop waits one
//! drain interval for a command, runs it, then pumps finished background jobs.

use std::{
    env,
    io::{self, BufRead, Write},
    panic::PanicHookInfo,
    path::{Path, PathBuf},
    thread,
};

use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use directories::BaseDirs;
use tracing::{debug, error, info};

use fsb_core::{
    AppResult, Config, Logger,
    controller::{PathMode, SearchState, Session, UiPort, ViewId},
    fs::FileEntry,
    model::NodeId,
    operators::SearchHit,
};

const HELP: &str = "\
commands:
  ls                    list the current directory
  cd <dir>              change directory (relative or absolute)
  back | fwd | up       history navigation
  tree                  show the folder tree
  refresh               re-read the current directory
  copy <names..>        put entries on the clipboard for copying
  cut <names..>         put entries on the clipboard for moving
  paste                 paste the clipboard here (background)
  paste-now             paste the clipboard here (wait for it)
  clip                  show the clipboard
  find <pattern>        glob search below the current directory
  hits                  show the last search results
  zip <names..>         create a zip archive (background)
  unzip <name>          extract a zip archive (background)
  mkdir                 create a folder
  mv <name>             rename an entry
  rm <names..>          delete entries
  quit
quote names that contain spaces, e.g. rm \"note (1).txt\"";

/// `UiPort` over the terminal. Answers come from the same line channel the
/// command loop reads, so prompts never race with commands.
struct Console {
    input: Receiver<String>,
}

impl Console {
    fn ask(&mut self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        if let Err(e) = io::stdout().flush() {
            debug!("stdout flush failed: {}", e);
        }

        self.input
            .recv()
            .ok()
            .map(|line: String| -> String { line.trim().to_string() })
    }
}

impl UiPort for Console {
    fn confirm(&mut self, prompt: &str) -> bool {
        self.ask(&format!("{prompt} [y/N] "))
            .is_some_and(|answer: String| -> bool {
                matches!(answer.to_lowercase().as_str(), "y" | "yes")
            })
    }

    fn prompt_text(&mut self, title: &str, initial: &str) -> Option<String> {
        let answer: String = self.ask(&format!("{title} [{initial}]: "))?;

        if answer.is_empty() {
            (!initial.is_empty()).then(|| initial.to_string())
        } else {
            Some(answer)
        }
    }

    fn choose_path(&mut self, mode: PathMode, start: &Path) -> Option<PathBuf> {
        let label: &str = match mode {
            PathMode::OpenDir => "Directory",
            PathMode::OpenFile => "Open file",
            PathMode::SaveFile => "Save as",
        };

        let answer: String = self.ask(&format!("{label} [{}]: ", start.display()))?;
        if answer.is_empty() {
            return Some(start.to_path_buf());
        }

        let chosen: PathBuf = PathBuf::from(answer);
        if chosen.is_absolute() {
            return Some(chosen);
        }

        Some(start.parent().map_or(chosen.clone(), |base: &Path| base.join(&chosen)))
    }

    fn notify_error(&mut self, title: &str, message: &str) {
        eprintln!("[{title}] {message}");
    }

    fn notify_info(&mut self, title: &str, message: &str) {
        println!("[{title}] {message}");
    }
}

enum Flow {
    Continue,
    Quit,
}

fn main() -> Result<()> {
    let config: Config = Config::load().context("Failed to load configuration")?;
    let _guard = Logger::init(&config.logging).context("Failed to initialize logging")?;
    setup_panic_handler();

    let start_dir: PathBuf = match env::args_os().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => env::current_dir().context("Failed to read current directory")?,
    };

    info!(start = %start_dir.display(), "fsb starting");

    let (line_tx, line_rx) = unbounded::<String>();
    spawn_input_thread(line_tx)?;

    let console = Console {
        input: line_rx.clone(),
    };
    let mut session: Session<Console> =
        Session::new(console, &config).context("Failed to start session")?;
    let view: ViewId = session
        .open_view(&start_dir)
        .with_context(|| format!("Cannot open {}", start_dir.display()))?;

    session.on_job_result(|result| {
        debug!(job_id = %result.job_id, kind = %result.kind, "Job result delivered");
    });

    print_listing(&session, view);
    prompt(&session, view);

    loop {
        match line_rx.recv_timeout(config.queue.drain_interval) {
            Ok(line) => {
                match run_command(&mut session, view, &line) {
                    Ok(Flow::Quit) => break,

                    Ok(Flow::Continue) => {}

                    // Already shown to the user through the console.
                    Err(err) => debug!(error = %err, "Command failed"),
                }

                session.pump();
                prompt(&session, view);
            }

            Err(RecvTimeoutError::Timeout) => {
                if session.pump() > 0 {
                    prompt(&session, view);
                }
            }

            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    session.shutdown();
    info!("fsb exited cleanly");

    Ok(())
}

fn spawn_input_thread(tx: Sender<String>) -> Result<()> {
    thread::Builder::new()
        .name("fsb-input".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };

                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn input thread")?;

    Ok(())
}

fn run_command(session: &mut Session<Console>, view: ViewId, line: &str) -> AppResult<Flow> {
    let words: Vec<String> = split_args(line);
    let Some((command, rest)) = words.split_first() else {
        return Ok(Flow::Continue);
    };
    let args: Vec<&str> = rest.iter().map(String::as_str).collect();

    match command.as_str() {
        "ls" => print_listing(session, view),

        "cd" => {
            let target: PathBuf = resolve_dir(session, view, args.first().copied().unwrap_or("~"));
            session.navigate(view, &target)?;
            print_listing(session, view);
        }

        "back" => {
            if session.back(view)?.is_some() {
                print_listing(session, view);
            }
        }

        "fwd" => {
            if session.forward(view)?.is_some() {
                print_listing(session, view);
            }
        }

        "up" => {
            if session.up(view)?.is_some() {
                print_listing(session, view);
            }
        }

        "refresh" => {
            session.refresh(view)?;
            print_listing(session, view);
        }

        "tree" => print_tree(session, view),

        "copy" => {
            let count: usize = session.copy(view, &args)?;
            println!("{count} item(s) on the clipboard for copy");
        }

        "cut" => {
            let count: usize = session.cut(view, &args)?;
            println!("{count} item(s) on the clipboard for move");
        }

        "paste" => {
            if let Some(job_id) = session.paste(view)? {
                println!("paste queued as job {job_id}");
            }
        }

        "paste-now" => {
            session.paste_now(view)?;
        }

        "clip" => {
            for item in session.clipboard().items() {
                println!("{} {}", item.operation_tag(), item.source().display());
            }
        }

        "find" => {
            let pattern: String = args.join(" ");
            let job_id = session.search(view, &pattern)?;
            println!("search started as job {job_id}");
        }

        "hits" => print_hits(session, view),

        "zip" => {
            if let Some(job_id) = session.create_archive(view, &args)? {
                println!("archive queued as job {job_id}");
            }
        }

        "unzip" => {
            if let Some(name) = args.first() {
                if let Some(job_id) = session.extract_archive(view, name)? {
                    println!("extraction queued as job {job_id}");
                }
            }
        }

        "mkdir" => {
            if let Some(path) = session.new_folder(view)? {
                println!("created {}", path.display());
            }
        }

        "mv" => {
            if let Some(name) = args.first() {
                if let Some(path) = session.rename(view, name)? {
                    println!("renamed to {}", path.display());
                }
            }
        }

        "rm" => {
            let removed: usize = session.delete(view, &args)?;
            println!("{removed} item(s) deleted");
        }

        "help" | "?" => println!("{HELP}"),

        "quit" | "exit" | "q" => return Ok(Flow::Quit),

        other => eprintln!("unknown command '{other}', try 'help'"),
    }

    Ok(Flow::Continue)
}

/// Split a command line on whitespace. Single or double quotes group words,
/// so `rm "note (1).txt"` names one entry.
fn split_args(line: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut current: String = String::new();
    let mut quote: Option<char> = None;
    let mut in_word: bool = false;

    for c in line.chars() {
        match quote {
            Some(open) if c == open => quote = None,

            Some(_) => current.push(c),

            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }

            None if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }

            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_word {
        args.push(current);
    }

    args
}

fn resolve_dir(session: &Session<Console>, view: ViewId, arg: &str) -> PathBuf {
    if arg == "~" {
        if let Some(dirs) = BaseDirs::new() {
            return dirs.home_dir().to_path_buf();
        }
    }

    let target: PathBuf = PathBuf::from(arg);
    match session.view(view) {
        Some(folder) if target.is_relative() => folder.directory().join(target),
        _ => target,
    }
}

fn prompt(session: &Session<Console>, view: ViewId) {
    if let Some(folder) = session.view(view) {
        print!("{}> ", folder.directory().display());
        if let Err(e) = io::stdout().flush() {
            debug!("stdout flush failed: {}", e);
        }
    }
}

fn print_listing(session: &Session<Console>, view: ViewId) {
    let Some(folder) = session.view(view) else {
        return;
    };

    println!("{}", folder.directory().display());
    for entry in folder.entries() {
        println!("{}", format_entry(entry));
    }
    println!("{} entries", folder.entries().len());
}

fn format_entry(entry: &FileEntry) -> String {
    let marker: &str = if entry.is_directory { "/" } else { "" };

    format!(
        "  {:<40} {:>10}  {}",
        format!("{}{marker}", entry.name),
        entry.size_human(),
        entry.format_modified("%Y-%m-%d %H:%M")
    )
}

fn print_tree(session: &Session<Console>, view: ViewId) {
    let Some(folder) = session.view(view) else {
        return;
    };

    let tree = folder.tree();
    let selected: Option<NodeId> = tree.selected();

    for (depth, id) in tree.visible_nodes() {
        let Some(node) = tree.node(id) else {
            continue;
        };

        let cursor: &str = if Some(id) == selected { "*" } else { " " };
        let fold: &str = if node.expanded { "-" } else { "+" };
        println!("{cursor}{}{fold} {}", "  ".repeat(depth), node.display_name());
    }
}

fn print_hits(session: &Session<Console>, view: ViewId) {
    let Some(folder) = session.view(view) else {
        return;
    };

    match folder.search_state() {
        SearchState::Idle => println!("no search yet"),

        SearchState::Pending { job_id, pattern } => {
            println!("search {job_id} for '{pattern}' still running");
        }

        SearchState::Done { pattern, hits } => {
            println!("results for '{pattern}':");
            for hit in hits {
                match hit {
                    SearchHit::Match(path) => println!("  {}", path.display()),

                    SearchHit::Truncated { limit } => println!("  (stopped after {limit} matches)"),

                    SearchHit::NoMatches => println!("  (no matches)"),
                }
            }
        }
    }
}

fn setup_panic_handler() {
    let original_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info: &PanicHookInfo<'_>| {
        error!("Application panicked: {}", panic_info);
        original_hook(panic_info);
    }));
}
