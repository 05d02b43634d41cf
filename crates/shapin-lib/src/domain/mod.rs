pub mod action;
pub mod cache;
pub mod filter;
pub mod pin;
pub mod resolution;
pub mod version;
pub mod workflow;

pub use action::{Action, LineMatcher, Repository};
pub use cache::CachedRepositoryService;
pub use filter::{ActionFilter, FilterError, IgnoreRule, NamePattern, PatternFormat};
pub use pin::{LinePinner, Mode, PinError};
pub use resolution::{
    Page, Release, RepositoryService, ResolutionError, Tag, VersionResolver,
};
pub use version::{VersionPrecision, VersionType, classify};
pub use workflow::{Finding, Outcome, WorkflowError, WorkflowStore, split_lines};
