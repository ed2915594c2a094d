mod task;
mod user;

pub use task::{Priority, Task, TaskChanges, TaskDocument, TaskStatus};
pub use user::User;
