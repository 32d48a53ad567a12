pub mod download;
pub mod measure;
pub mod session;
pub mod sse;
