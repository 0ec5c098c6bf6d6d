pub mod access_log;
pub mod app;
pub mod params;

pub use access_log::{AppError, SessionId, record_access};
pub use app::{AppState, ROUTES, build_router, check_metrics_path};
pub use params::Params;
