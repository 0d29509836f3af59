//! HTTP API for hosted research runs.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/research` - Start a research run for `{topic, email}`
//! - `GET /api/research` - List every run's status
//! - `GET /api/research/:id` - Get one run's status
//! - `GET /api/research/:id/stream` - Stream a run's status via SSE

mod routes;
pub mod types;

pub use routes::{router, serve, AppState, RunHandle};
pub use types::*;
