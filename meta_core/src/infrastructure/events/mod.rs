pub mod dir_watch;

pub use dir_watch::{default_allowed_extensions, DirWatchEventSource};
