//! DeviceControlCore - the native layer the hardware proxy talks to.
//!
//! The core owns device enumeration, property I/O and the focus actions of
//! physical autofocus devices. It also holds one piece of shared, mutable
//! state that matters here: which device is *the* autofocus device. Focus
//! actions always go to whatever device is bound at the time of the call, and
//! any caller may rebind it.
//!
//! Calls are synchronous and may block for as long as the hardware takes.
//! Every method can fail with a [`CoreError`]; the autofocus layer translates
//! those into `DeviceOperationFailed`.

use crate::error::CoreResult;

/// Operations the autofocus layer consumes from the device-control core.
pub trait DeviceControlCore: Send + Sync {
    /// Make `device` the active autofocus device.
    fn bind_autofocus_device(&self, device: &str) -> CoreResult<()>;

    /// Label of the active autofocus device. Empty when none is bound.
    fn current_autofocus_device(&self) -> CoreResult<String>;

    /// Run a full focus search on the active autofocus device.
    fn perform_full_focus(&self) -> CoreResult<()>;

    /// Run an incremental focus correction on the active autofocus device.
    fn perform_incremental_focus(&self) -> CoreResult<()>;

    /// Score reached by the last focus action.
    fn last_focus_score(&self) -> CoreResult<f64>;

    /// Score at the current position, without moving anything.
    fn current_focus_score(&self) -> CoreResult<f64>;

    /// Turn continuous focus tracking on or off.
    fn enable_continuous_focus(&self, enable: bool) -> CoreResult<()>;

    /// Whether continuous focus tracking is on.
    fn is_continuous_focus_enabled(&self) -> CoreResult<bool>;

    /// Whether continuous focus has acquired and holds lock.
    fn is_continuous_focus_locked(&self) -> CoreResult<bool>;

    /// Every property name of `device`, in the device's order.
    fn property_names(&self, device: &str) -> CoreResult<Vec<String>>;

    /// Whether `device` exposes a property called `name`.
    fn has_property(&self, device: &str, name: &str) -> CoreResult<bool>;

    /// Current value of a property, as text.
    fn property_value(&self, device: &str, name: &str) -> CoreResult<String>;

    /// Write a property value.
    fn set_property_value(&self, device: &str, name: &str, value: &str) -> CoreResult<()>;

    /// Whether the property refuses writes.
    fn is_property_read_only(&self, device: &str, name: &str) -> CoreResult<bool>;

    /// Whether the property can only be set before device initialization.
    fn is_property_pre_init(&self, device: &str, name: &str) -> CoreResult<bool>;

    /// Whether the property has numeric bounds.
    fn has_property_limits(&self, device: &str, name: &str) -> CoreResult<bool>;

    /// Lower numeric bound. Only meaningful when `has_property_limits` is true.
    fn property_lower_limit(&self, device: &str, name: &str) -> CoreResult<f64>;

    /// Upper numeric bound. Only meaningful when `has_property_limits` is true.
    fn property_upper_limit(&self, device: &str, name: &str) -> CoreResult<f64>;

    /// Legal values. Empty when unconstrained.
    fn allowed_property_values(&self, device: &str, name: &str) -> CoreResult<Vec<String>>;

    /// Images still buffered from the last acquisition.
    fn remaining_image_count(&self) -> CoreResult<usize>;
}
