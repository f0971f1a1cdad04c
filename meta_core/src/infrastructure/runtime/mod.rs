pub mod supervisor;

pub use supervisor::{join_supervised, spawn_supervised};
