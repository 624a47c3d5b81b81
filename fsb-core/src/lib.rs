pub mod error;
pub use error::{AppError, AppResult};

pub mod config;
pub use config::Config;

pub mod logging;
pub use logging::{Logger, LoggerConfig};

pub mod fs {
    pub mod file_entry;
    pub use file_entry::FileEntry;

    pub mod dir_scanner;
    pub use dir_scanner::list_directory;

    pub mod roots;
    pub use roots::{FixedRoots, PlatformRoots, RootEnumerator};
}

pub mod model {
    pub mod fs_state;
    pub use fs_state::DirectoryListModel;

    pub mod tree_state;
    pub use tree_state::{Children, DirectoryTreeModel, NodeId, TreeNode};

    pub mod history;
    pub use history::{NavigationHistory, validate_directory};
}

pub mod operators {
    pub mod search_task;
    pub use search_task::{MAX_SEARCH_RESULTS, SearchHit, SearchWalk, search, spawn_search};

    pub mod archive_task;
    pub use archive_task::{ArchiveSummary, ExtractReport, create_archive, extract_archive};
}

pub mod controller {
    pub mod task_queue;
    pub use task_queue::{JobId, ResultReceiver, ResultSender, TaskQueue, TaskResult, result_channel};

    pub mod jobs;
    pub use jobs::{Job, JobKind, JobOutput};

    pub mod ui_port;
    pub use ui_port::{PathMode, UiPort};

    pub mod session;
    pub use session::{FolderView, SearchState, Session, ViewId};
}

pub mod util {
    pub mod humanize;
}
