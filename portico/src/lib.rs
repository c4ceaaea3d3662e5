//! Portico — a composable HTTP service core over Axum.
//!
//! This facade crate re-exports every Portico sub-crate through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use portico::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature         | Default | Crate                         |
//! |-----------------|---------|-------------------------------|
//! | `rpc`           | no      | `portico-rpc`                 |
//! | `rpc-reflection`| no      | `portico-rpc/reflection`      |
//! | `openapi`       | no      | `portico-openapi`              |
//! | `full`          | no      | All of the above              |

pub extern crate portico_core;

pub use portico_core::*;

#[cfg(feature = "rpc")]
pub use portico_rpc;

#[cfg(feature = "openapi")]
pub use portico_openapi;

pub mod prelude {
    pub use portico_core::prelude::*;

    #[cfg(feature = "rpc")]
    pub use portico_rpc::prelude::*;

    #[cfg(feature = "openapi")]
    pub use portico_openapi::prelude::*;
}
