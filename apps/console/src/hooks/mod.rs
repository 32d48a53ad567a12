pub mod activity;
pub mod backend;
pub mod cleanup;
pub mod live;
pub mod refresh;
