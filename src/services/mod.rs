pub mod ingress;
pub mod init;
pub mod monitor;
pub mod notifier;
pub mod providers;
pub mod queue;
pub mod template;
pub mod worker;
