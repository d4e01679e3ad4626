pub mod board_io;
pub mod lock;
pub mod project_io;
pub mod recovery;
pub mod store;
pub mod watcher;
