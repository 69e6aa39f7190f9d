pub mod window_cache;

pub use window_cache::WindowCache;
