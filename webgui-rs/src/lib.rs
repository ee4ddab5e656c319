//! Web management core for embedded device firmware.
//!
//! This crate holds everything a device web portal needs that does not depend
//! on the HTTP server or the flash driver it runs on:
//!
//! - **Typed variables**: named, typed, access-controlled bindings into the
//!   device configuration, addressed through a REST-style GET/SET API and
//!   through settings forms ([`vars`]).
//! - **Template pages**: `~tag~` / `~tag(N)~` / `~inc:file~` substitution over
//!   a table of render callbacks and an embedded read-only filesystem
//!   ([`template`]).
//! - **Signed messages**: the SysComm JSON envelope protocol with HMAC-SHA256
//!   signatures, payload-type dispatch and structured error replies
//!   ([`syscomm`]).
//! - **Configuration**: the owned [`SystemConfig`] with fixed-capacity fields
//!   and a versioned persistence codec ([`config`], [`store`]).
//!
//! # Example
//!
//! ```
//! use webgui_rs::{DeviceState, SystemConfig};
//! use webgui_rs::vars::{builtin_variables, VariableRegistry, VarType};
//!
//! let mut state = DeviceState::new(SystemConfig::default());
//! let registry = VariableRegistry::new(builtin_variables(&state.config.interfaces));
//!
//! registry.set(&mut state, "otaint", "600").unwrap();
//! let (value, kind) = registry.get(&state, "otaint").unwrap();
//! assert_eq!(value, "600");
//! assert_eq!(kind, VarType::Int);
//! ```

pub mod config;
pub mod error;
pub mod form;
pub mod status;
pub mod store;
pub mod syscomm;
pub mod template;
pub mod vars;

pub use config::{InterfaceSet, SystemConfig};
pub use error::{Overflow, StoreError, VarError};
pub use status::{DeviceState, DeviceStatus, InterfaceStatus};
