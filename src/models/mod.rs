pub mod query;
pub mod task;
pub mod user;

pub use query::{
    ListParams, PageRequest, Paginated, Pagination, SortField, SortOrder, TaskFilter, TaskQuery,
};
pub use task::{
    exp_for_transition, Difficulty, DifficultyUpdate, Progress, ProgressOutcome, ProgressUpdate,
    Task, TaskFields, TaskInput,
};
pub use user::{normalize_email, NewUser, Role, User, UserSummary};
