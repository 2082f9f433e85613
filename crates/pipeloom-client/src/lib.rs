//! # Pipeloom Client
//!
//! Async side of Pipeloom: the backends that reach external databases and
//! the [`Workbench`] that drives the core state model with them.
//!
//! ## Backends
//!
//! - [`ApiClient`] - the HTTP database gateway (`/database/connect`,
//!   `/database/select-database`, `/database/preview-table`)
//! - [`DemoBackend`] - sample databases served in-process
//!
//! ## Example
//!
//! ```rust,ignore
//! use pipeloom_client::{DemoBackend, Workbench};
//! use pipeloom_core::{Session, Workspace};
//!
//! let workbench = Workbench::new(Box::new(DemoBackend::new()), Workspace::new(), Session::new());
//! let outcome = workbench.test_connection(id).await;
//! println!("{}", outcome.message);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod backend;
pub mod demo;
pub mod error;
pub mod workbench;

pub use api::ApiClient;
pub use backend::Backend;
pub use demo::DemoBackend;
pub use error::{Error, Result};
pub use workbench::{backend_for, TablePreview, Upload, Workbench};
