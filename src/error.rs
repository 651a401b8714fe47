//! Error types for the autofocus layer.
//!
//! Three error enums cover the three places a call can go wrong. All of them use
//! the `thiserror` crate so they compose with `?`.
//!
//! ## Error Hierarchy
//!
//! - **`AutofocusError`**: what every [`AutofocusCapability`](crate::capability::AutofocusCapability)
//!   operation returns.
//!   - **`UnknownProperty`**: the named property does not exist. Recoverable and
//!     never retried.
//!   - **`ReadOnlyProperty`**: a value write targeted a property marked read-only.
//!   - **`DeviceOperationFailed`**: a call into the device-control core failed. The
//!     underlying [`CoreError`] is kept as the error source.
//!   - **`Unsupported`**: the operation has no meaning for this variant. Permanent.
//!   - **`InvalidSetting`**: a stored property value cannot drive the operation.
//!     Fixed by writing a usable value.
//!   - **`Settings`**: the settings store could not persist a value.
//! - **`CoreError`**: what a [`DeviceControlCore`](crate::core::DeviceControlCore)
//!   implementation reports.
//! - **`SettingsError`**: I/O and encoding failures of a file-backed settings store.
//!
//! No error in this layer is retried. Retry policy belongs to the caller.

use thiserror::Error;

/// Convenience alias for results of autofocus operations.
pub type AutofocusResult<T> = std::result::Result<T, AutofocusError>;

/// Convenience alias for results of device-control core calls.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by the uniform autofocus contract.
#[derive(Error, Debug)]
pub enum AutofocusError {
    /// No property with this name exists on the target.
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    /// The property exists but refuses value writes.
    #[error("Property is read-only: {0}")]
    ReadOnlyProperty(String),

    /// The device-control core rejected or failed the call.
    #[error("Device operation '{operation}' failed: {source}")]
    DeviceOperationFailed {
        /// Short name of the operation that was attempted.
        operation: &'static str,
        /// The device-layer failure.
        #[source]
        source: CoreError,
    },

    /// The operation is not meaningful for this implementation.
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    /// A property value is unusable for the requested operation.
    #[error("Invalid value '{value}' for {name}: {reason}")]
    InvalidSetting {
        /// Property name.
        name: String,
        /// The offending value as stored.
        value: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Property values could not be persisted.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl AutofocusError {
    /// Wraps a device-layer failure with the name of the operation it interrupted.
    pub fn device(operation: &'static str, source: CoreError) -> Self {
        AutofocusError::DeviceOperationFailed { operation, source }
    }

    /// True for [`AutofocusError::UnknownProperty`].
    pub fn is_unknown_property(&self) -> bool {
        matches!(self, AutofocusError::UnknownProperty(_))
    }

    /// True for [`AutofocusError::Unsupported`].
    pub fn is_unsupported(&self) -> bool {
        matches!(self, AutofocusError::Unsupported(_))
    }

    /// True for [`AutofocusError::InvalidSetting`].
    pub fn is_invalid_setting(&self) -> bool {
        matches!(self, AutofocusError::InvalidSetting { .. })
    }

    /// True for [`AutofocusError::DeviceOperationFailed`].
    pub fn is_device_failure(&self) -> bool {
        matches!(self, AutofocusError::DeviceOperationFailed { .. })
    }
}

/// Errors reported by a device-control core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// No autofocus device is bound in the core.
    #[error("No autofocus device is bound")]
    NoAutofocusDevice,

    /// The core knows no device with this label.
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// The device has no property with this name.
    #[error("Device '{device}' has no property '{name}'")]
    UnknownProperty {
        /// Device label.
        device: String,
        /// Property name.
        name: String,
    },

    /// The device reported a failure.
    #[error("Device '{device}' error: {message}")]
    Device {
        /// Device label.
        device: String,
        /// Message from the device adapter.
        message: String,
    },
}

/// Errors raised by settings stores.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file-backed store was requested but no location could be determined.
    #[error("No settings file location available")]
    NoLocation,

    /// The backing file is not a valid settings document.
    #[error("Malformed settings document: {0}")]
    Format(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = AutofocusError::UnknownProperty("Gain".to_string());
        assert_eq!(err.to_string(), "Unknown property: Gain");
    }

    #[test]
    fn test_device_failure_keeps_cause() {
        let err = AutofocusError::device(
            "full_focus",
            CoreError::Device {
                device: "ZStage".into(),
                message: "out of range".into(),
            },
        );
        assert!(err.is_device_failure());
        assert!(err.to_string().contains("out of range"));
        let source = err.source().map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("Device 'ZStage' error: out of range")
        );
    }

    #[test]
    fn test_kind_predicates() {
        assert!(AutofocusError::Unsupported("compute_score").is_unsupported());
        assert!(AutofocusError::UnknownProperty("x".into()).is_unknown_property());
        assert!(!AutofocusError::ReadOnlyProperty("x".into()).is_unknown_property());

        let invalid = AutofocusError::InvalidSetting {
            name: "StepSize".into(),
            value: "inf".into(),
            reason: "not a finite number",
        };
        assert!(invalid.is_invalid_setting());
        assert!(!invalid.is_unsupported());
        assert_eq!(
            invalid.to_string(),
            "Invalid value 'inf' for StepSize: not a finite number"
        );

        let settings: AutofocusError = SettingsError::NoLocation.into();
        assert_eq!(
            settings.to_string(),
            "Settings error: No settings file location available"
        );
    }
}
