pub mod crawl;
pub mod sweep;
pub mod watch;

// Re-export command functions for convenience
pub use crawl::crawl;
pub use sweep::sweep;
pub use watch::{watch, WatchParams};
