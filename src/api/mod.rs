//! HTTP interface for YourNews.
//!
//! ## Endpoints
//!
//! - `GET /` - Search page (subject box + results pane)
//! - `POST /search` - Form search; stores the results and redirects to `/`
//! - `POST /api/search` - JSON search
//! - `GET /api/results` - Current results markdown
//! - `GET /api/health` - Health check

mod page;
mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
pub use types::*;
