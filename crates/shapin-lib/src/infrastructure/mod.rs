pub mod config_file;
pub mod github;
pub mod repo;
pub mod workflow;

pub use config_file::{
    CONFIG_FILE_NAME, ConfigFile, ConfigFileError, Migration, init_config, load_config,
    migrate_config, parse_config,
};
pub use github::{DEFAULT_API_URL, GithubError, GithubRegistry};
pub use repo::{RepoError, find_root, root_or_current};
pub use workflow::{DEFAULT_PATTERNS, FileWorkflowStore, Targets};
