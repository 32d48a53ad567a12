pub mod activity;
pub mod cleanup;
pub mod notifications;
