//! Data models for the application.
//!
//! These models mirror the rows returned by the data API and the REST
//! endpoints. Every list entity implements [`Identified`] so controllers and
//! reconcilers can key state by id.

pub mod application;
pub mod bug_report;
pub mod comment;
pub mod log_entry;
pub mod page;
pub mod session;
pub mod user;

// Re-exports for convenient access
pub use application::{Application, ApplicationDecision, ApplicationStatus};
pub use bug_report::{
    priority_weight, BugCategory, BugPriority, BugReport, BugReportChanges, BugStatus, NewBugReport,
};
pub use comment::{BugComment, NewBugComment};
pub use log_entry::{LogEntry, LogLevel};
pub use page::{Page, PageRequest};
pub use session::Session;
pub use user::{
    Membership, MembershipChanges, MembershipStatus, UserChanges, UserProfile, UserRole,
};

/// An entity with a stable string id.
pub trait Identified {
    fn id(&self) -> &str;
}
