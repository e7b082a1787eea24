//! orchestra-lib: the install-transaction engine of orchestra
//!
//! For one component build this crate:
//! - realizes the build by running its install script or by fetching a
//!   binary archive from a content-addressed cache (`archive`)
//! - rewrites the staged tree so it is relocatable (`transform`)
//! - merges it into the shared root, retiring the previous installation, and
//!   records what was installed (`install`)
//!
//! [`stage::InstallAction`] ties these together.

pub mod archive;
pub mod component;
pub mod config;
pub mod consts;
pub mod install;
pub mod platform;
pub mod runner;
pub mod stage;
pub mod transform;
pub mod util;
