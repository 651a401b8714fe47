//! Uniform autofocus control surface.
//!
//! Client code drives focus through one contract,
//! [`AutofocusCapability`](capability::AutofocusCapability), whether scoring
//! happens in a software algorithm or in a hardware device owned by the
//! device-control core.
//!
//! # Architecture Overview
//!
//! ```text
//!                    AutofocusCapability
//!                  ┌──────────┴──────────┐
//!       SoftwareAutofocus        HardwareProxyAutofocus
//!        │          │                    │
//!  PropertyRegistry  FocusAlgorithm   DeviceControlCore (shared, racy)
//!        │
//!  SettingsBridge
//! ```
//!
//! - [`property`] / [`registry`]: the property model and its in-memory store
//! - [`software`]: the software-resident variant
//! - [`hardware`]: the hardware proxy variant
//! - [`core`](crate::core) / [`settings`]: collaborator contracts
//! - [`mock`]: simulated core and demo algorithm
//! - [`config`] / [`logging`]: ambient setup for binaries
//!
//! # Thread Safety
//!
//! The layer is a synchronous façade. Nothing here is safe for concurrent
//! mutation without external synchronization; collaborator traits are
//! `Send + Sync` so instances can move between threads.

pub mod capability;
pub mod config;
pub mod core;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod mock;
pub mod property;
pub mod registry;
pub mod settings;
pub mod software;

pub use capability::{AutofocusCapability, AutofocusHandle, ImageBuffer};
pub use error::{AutofocusError, AutofocusResult, CoreError, CoreResult, SettingsError};
pub use hardware::HardwareProxyAutofocus;
pub use property::PropertyItem;
pub use registry::PropertyRegistry;
pub use software::{FocusAlgorithm, SoftwareAutofocus};
