pub mod notification;
pub mod notification_job;
pub mod user;

pub use notification::NotificationRepository;
pub use notification_job::NotificationJobRepository;
pub use user::UserRepository;
