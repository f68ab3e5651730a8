pub mod context;
pub mod fallback;
pub mod narrative;
pub mod service;
