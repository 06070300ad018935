//! Backend access and cross-cutting services.
//!
//! Everything that talks to the network lives here. Controllers depend only
//! on the traits in [`store`], never on [`api_client::ApiClient`] directly.

pub mod api_client;
pub mod notices;
pub mod query;
pub mod store;

pub use api_client::ApiClient;
pub use notices::{Notice, NoticeLevel, NoticeSink};
pub use query::Query;
pub use store::{
    ApplicationQuery, ApplicationStore, BugStore, LogQuery, LogStore, ReportQuery, UserQuery,
    UserStore,
};
