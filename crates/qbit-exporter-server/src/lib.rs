pub mod logging;
pub mod router;
pub mod shutdown;

pub use logging::{LogFormat, init_tracing};
pub use router::{AppState, app_router};
pub use shutdown::shutdown_signal;
