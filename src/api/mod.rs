pub mod badge;
pub mod cache;
pub mod handlers;
pub mod security;
pub mod server;

pub use badge::{uptime_badge_svg, BadgeDuration};
pub use cache::{CacheError, CacheKey, CacheStats, Encoding, ResponseCache};
pub use handlers::{ApiError, AppState};
pub use security::BasicAuth;
pub use server::{build_router, run_server};
