//! A small user directory.
//!
//! `server` exposes a fixture file of user records as `GET /api/users`. The terminal
//! viewer (`model`, `controller`, `ui`) loads that list through `source` and shows it
//! as a sortable, filterable, paginated table driven by the engine in `table`.

pub mod controller;
pub mod domain;
pub mod inputter;
pub mod logging;
pub mod model;
pub mod record;
pub mod server;
pub mod source;
pub mod table;
pub mod ui;
