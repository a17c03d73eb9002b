//! Database models split into separate files.

pub mod notification;
pub mod notification_job;
pub mod user;

pub use self::notification::*;
pub use self::notification_job::*;
pub use self::user::*;
