//! # Remote Task Service
//!
//! Everything that talks to the to-do service over HTTP lives here.
//! The rest of the crate only sees the [`TaskService`] trait, the value
//! objects in [`types`] and the [`ServiceError`] taxonomy.

pub mod service;
pub mod todoist;
pub mod types;

pub use service::{DueSpec, ErrorKind, NewTask, ServiceError, TaskFields, TaskService};
pub use todoist::{ClientOptions, DEFAULT_BASE_URL, TodoistClient};
pub use types::{Comment, Due, Filter, Label, Project, Task};
