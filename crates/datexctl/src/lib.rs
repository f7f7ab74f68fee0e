pub mod cmd_decode;
pub mod cmd_summary;
pub mod cmd_watch;
pub mod common;
