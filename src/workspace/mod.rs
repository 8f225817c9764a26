// Query workspace: tabs and the execution engine that fills their result slots

pub mod execution;
pub mod tabs;

pub use execution::{ExecutionTarget, PagedResult, ResultSlot};
pub use tabs::{QueryTab, Workspace, MAX_TABS};
