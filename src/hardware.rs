//! Hardware autofocus proxy.
//!
//! Makes an autofocus device living in the device-control core look like any
//! other [`AutofocusCapability`]. The proxy owns no properties: every read and
//! write goes to the core, and every [`PropertyItem`] is rebuilt from the core on
//! each call.
//!
//! # Select, then act
//!
//! The core's "active autofocus device" is shared, mutable state. Before every
//! operation the proxy re-binds its own device, then issues the call:
//!
//! ```text
//! lock(instance) ─► bind_autofocus_device(dev) ─► core call ─► unlock
//! ```
//!
//! The per-instance lock (on by default) only serializes users of *this* proxy.
//! Anyone else holding the core can rebind between the two steps. That race is
//! a property of the shared core and is accepted here.
//!
//! # Failure policy
//!
//! - Any core failure becomes `DeviceOperationFailed`, except a missing
//!   property which becomes `UnknownProperty`.
//! - After a successful focus action, a failing score read-back is logged and
//!   replaced with [`NEUTRAL_SCORE`]. The action already happened.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::capability::{AutofocusCapability, ImageBuffer};
use crate::core::DeviceControlCore;
use crate::error::{AutofocusError, AutofocusResult, CoreError, CoreResult};
use crate::property::PropertyItem;

/// Score reported when a focus action succeeded but its score could not be read.
pub const NEUTRAL_SCORE: f64 = 0.0;

/// Proxy to the device-control core's bound autofocus device.
pub struct HardwareProxyAutofocus {
    core: Arc<dyn DeviceControlCore>,
    device: Mutex<Option<String>>,
    lock_selection: bool,
}

impl HardwareProxyAutofocus {
    /// Create an unbound proxy. The device is resolved on first use.
    pub fn new(core: Arc<dyn DeviceControlCore>) -> Self {
        Self {
            core,
            device: Mutex::new(None),
            lock_selection: true,
        }
    }

    /// Create a proxy and resolve its device immediately.
    pub fn connect(core: Arc<dyn DeviceControlCore>) -> AutofocusResult<Self> {
        let proxy = Self::new(core);
        proxy.set_context()?;
        Ok(proxy)
    }

    /// Hold the instance lock across select-then-act (default) or only while
    /// reading the cached device name.
    pub fn with_selection_lock(mut self, enabled: bool) -> Self {
        self.lock_selection = enabled;
        self
    }

    /// Ask the core which device is the autofocus device and remember it.
    ///
    /// Call again to follow a rebinding made by someone else.
    pub fn set_context(&self) -> AutofocusResult<String> {
        let resolved = self.resolve("set_context")?;
        *self.device.lock() = Some(resolved.clone());
        tracing::debug!(device = %resolved, "Hardware autofocus bound");
        Ok(resolved)
    }

    /// The cached device name, if resolved.
    pub fn device_name(&self) -> Option<String> {
        self.device.lock().clone()
    }

    fn resolve(&self, operation: &'static str) -> AutofocusResult<String> {
        let device = self
            .core
            .current_autofocus_device()
            .map_err(|e| AutofocusError::device(operation, e))?;
        if device.is_empty() {
            return Err(AutofocusError::device(operation, CoreError::NoAutofocusDevice));
        }
        Ok(device)
    }

    /// Re-select this proxy's device in the core, then run `act`.
    fn with_device<T>(
        &self,
        operation: &'static str,
        act: impl FnOnce(&dyn DeviceControlCore, &str) -> AutofocusResult<T>,
    ) -> AutofocusResult<T> {
        let mut guard = self.device.lock();
        let device = match guard.clone() {
            Some(device) => device,
            None => {
                let device = self.resolve(operation)?;
                *guard = Some(device.clone());
                device
            }
        };
        let _held = if self.lock_selection {
            Some(guard)
        } else {
            drop(guard);
            None
        };

        tracing::debug!(device = %device, operation, "Selecting autofocus device");
        self.core
            .bind_autofocus_device(&device)
            .map_err(|e| AutofocusError::device(operation, e))?;
        act(self.core.as_ref(), &device)
    }

    /// Run a focus action, then read back its score.
    ///
    /// The action's failure propagates; the read-back's does not.
    fn focus_then_score(
        &self,
        operation: &'static str,
        action: fn(&dyn DeviceControlCore) -> CoreResult<()>,
    ) -> AutofocusResult<f64> {
        self.with_device(operation, |core, device| {
            action(core).map_err(|e| AutofocusError::device(operation, e))?;

            match core.last_focus_score() {
                Ok(score) => Ok(score),
                Err(e) => {
                    tracing::warn!(
                        device,
                        operation,
                        error = %e,
                        "Focus succeeded but score read-back failed; reporting neutral score"
                    );
                    Ok(NEUTRAL_SCORE)
                }
            }
        })
    }
}

/// Map a core error raised while touching a named property.
fn property_error(operation: &'static str, e: CoreError) -> AutofocusError {
    match e {
        CoreError::UnknownProperty { name, .. } => AutofocusError::UnknownProperty(name),
        other => AutofocusError::device(operation, other),
    }
}

/// Assemble the full description of one property from the core.
fn describe(
    core: &dyn DeviceControlCore,
    device: &str,
    name: &str,
) -> CoreResult<PropertyItem> {
    let mut item = PropertyItem::new(device, name);
    item.value = core.property_value(device, name)?;
    item.read_only = core.is_property_read_only(device, name)?;
    if core.has_property_limits(device, name)? {
        item.lower_limit = Some(core.property_lower_limit(device, name)?);
        item.upper_limit = Some(core.property_upper_limit(device, name)?);
    }
    item.allowed = core.allowed_property_values(device, name)?;
    Ok(item)
}

impl AutofocusCapability for HardwareProxyAutofocus {
    fn name(&self) -> String {
        self.device_name().unwrap_or_default()
    }

    fn help_text(&self) -> String {
        self.name()
    }

    fn version(&self) -> String {
        "1.0".to_string()
    }

    fn verbose_status(&self) -> String {
        match self.device_name() {
            Some(device) => format!("Proxy for core autofocus device '{device}'"),
            None => "Proxy not yet bound to a core autofocus device".to_string(),
        }
    }

    fn initialize(&mut self) -> AutofocusResult<()> {
        Ok(())
    }

    fn full_focus(&mut self) -> AutofocusResult<f64> {
        self.focus_then_score("full_focus", |core| core.perform_full_focus())
    }

    fn incremental_focus(&mut self) -> AutofocusResult<f64> {
        self.focus_then_score("incremental_focus", |core| core.perform_incremental_focus())
    }

    fn current_focus_score(&self) -> AutofocusResult<f64> {
        self.with_device("current_focus_score", |core, _| {
            core.current_focus_score()
                .map_err(|e| AutofocusError::device("current_focus_score", e))
        })
    }

    fn compute_score(&self, _image: &ImageBuffer) -> AutofocusResult<f64> {
        Err(AutofocusError::Unsupported("compute_score"))
    }

    fn enable_continuous_focus(&mut self, enable: bool) -> AutofocusResult<()> {
        self.with_device("enable_continuous_focus", |core, _| {
            core.enable_continuous_focus(enable)
                .map_err(|e| AutofocusError::device("enable_continuous_focus", e))
        })
    }

    fn is_continuous_focus_enabled(&self) -> AutofocusResult<bool> {
        self.with_device("is_continuous_focus_enabled", |core, _| {
            core.is_continuous_focus_enabled()
                .map_err(|e| AutofocusError::device("is_continuous_focus_enabled", e))
        })
    }

    fn is_continuous_focus_locked(&self) -> AutofocusResult<bool> {
        self.with_device("is_continuous_focus_locked", |core, _| {
            core.is_continuous_focus_locked()
                .map_err(|e| AutofocusError::device("is_continuous_focus_locked", e))
        })
    }

    /// Only properties that are neither read-only nor pre-init.
    fn property_names(&self) -> AutofocusResult<Vec<String>> {
        self.with_device("property_names", |core, device| {
            let listing = || -> CoreResult<Vec<String>> {
                let mut names = Vec::new();
                for name in core.property_names(device)? {
                    if !core.is_property_read_only(device, &name)?
                        && !core.is_property_pre_init(device, &name)?
                    {
                        names.push(name);
                    }
                }
                Ok(names)
            };
            listing().map_err(|e| AutofocusError::device("property_names", e))
        })
    }

    /// Every property, unfiltered.
    fn properties(&self) -> AutofocusResult<Vec<PropertyItem>> {
        self.with_device("properties", |core, device| {
            core.property_names(device)
                .and_then(|names| {
                    names
                        .iter()
                        .map(|name| describe(core, device, name))
                        .collect::<CoreResult<Vec<_>>>()
                })
                .map_err(|e| AutofocusError::device("properties", e))
        })
    }

    fn property(&self, name: &str) -> AutofocusResult<PropertyItem> {
        self.with_device("property", |core, device| {
            let exists = core
                .has_property(device, name)
                .map_err(|e| AutofocusError::device("property", e))?;
            if !exists {
                return Err(AutofocusError::UnknownProperty(name.to_string()));
            }
            describe(core, device, name).map_err(|e| property_error("property", e))
        })
    }

    fn property_value(&self, name: &str) -> AutofocusResult<String> {
        self.with_device("property_value", |core, device| {
            core.property_value(device, name)
                .map_err(|e| property_error("property_value", e))
        })
    }

    fn set_property(&mut self, item: PropertyItem) -> AutofocusResult<()> {
        self.set_property_value(&item.name, &item.value)
    }

    fn set_property_value(&mut self, name: &str, value: &str) -> AutofocusResult<()> {
        self.with_device("set_property_value", |core, device| {
            core.set_property_value(device, name, value)
                .map_err(|e| property_error("set_property_value", e))
        })
    }

    /// Nothing to persist: property state lives in the core.
    fn save_settings(&self) -> AutofocusResult<()> {
        tracing::debug!("Hardware autofocus keeps its settings in the core; nothing saved");
        Ok(())
    }

    fn load_settings(&mut self) -> AutofocusResult<()> {
        Ok(())
    }

    fn number_of_images(&self) -> AutofocusResult<usize> {
        self.core
            .remaining_image_count()
            .map_err(|e| AutofocusError::device("number_of_images", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FailPoint, SimulatedCore, SimulatedDevice};
    use tracing_test::traced_test;

    fn zstage_core() -> Arc<SimulatedCore> {
        let core = SimulatedCore::new();
        core.add_device(
            SimulatedDevice::new("ZStage")
                .with_property(
                    PropertyItem::new("ZStage", "Offset")
                        .with_value("12.5")
                        .with_limits(-100.0, 100.0),
                )
                .with_property(
                    PropertyItem::new("ZStage", "Mode")
                        .with_value("Fine")
                        .with_allowed(["Coarse", "Fine"]),
                )
                .with_property(
                    PropertyItem::new("ZStage", "Firmware")
                        .with_value("2.1")
                        .read_only(),
                )
                .with_pre_init_property(PropertyItem::new("ZStage", "Port").with_value("COM3"))
                .with_scores(0.2, 0.9),
        );
        core.add_device(SimulatedDevice::new("PFS").with_scores(0.1, 0.5));
        core.bind_autofocus_device("ZStage").unwrap();
        Arc::new(core)
    }

    fn proxy(core: &Arc<SimulatedCore>) -> HardwareProxyAutofocus {
        HardwareProxyAutofocus::new(core.clone())
    }

    #[test]
    fn test_resolves_device_lazily() {
        let core = zstage_core();
        let af = proxy(&core);
        assert_eq!(af.device_name(), None);

        af.property_value("Offset").unwrap();
        assert_eq!(af.device_name().as_deref(), Some("ZStage"));
    }

    #[test]
    fn test_connect_without_binding_fails() {
        let core: Arc<SimulatedCore> = Arc::new(SimulatedCore::new());
        let err = HardwareProxyAutofocus::connect(core).err().unwrap();
        assert!(err.is_device_failure());
    }

    #[test]
    fn test_property_names_excludes_read_only_and_pre_init() {
        let core = zstage_core();
        let af = proxy(&core);

        let names = af.property_names().unwrap();
        assert_eq!(names, vec!["Offset", "Mode"]);

        let all: Vec<String> = af.properties().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(all, vec!["Offset", "Mode", "Firmware", "Port"]);
    }

    #[test]
    fn test_property_carries_core_limits_and_value() {
        let core = zstage_core();
        let af = proxy(&core);

        let offset = af.property("Offset").unwrap();
        assert_eq!(offset.device, "ZStage");
        assert_eq!(offset.value, "12.5");
        assert_eq!(offset.lower_limit, Some(-100.0));
        assert_eq!(offset.upper_limit, Some(100.0));
        assert!(!offset.read_only);
        assert!(offset.allowed.is_empty());

        let mode = af.property("Mode").unwrap();
        assert_eq!(mode.lower_limit, None);
        assert_eq!(mode.allowed, vec!["Coarse", "Fine"]);

        assert!(af.property("Firmware").unwrap().read_only);
    }

    #[test]
    fn test_unknown_property() {
        let core = zstage_core();
        let mut af = proxy(&core);

        assert!(af.property("Nope").unwrap_err().is_unknown_property());
        assert!(af.property_value("Nope").unwrap_err().is_unknown_property());
        assert!(af
            .set_property_value("Nope", "1")
            .unwrap_err()
            .is_unknown_property());
    }

    #[test]
    fn test_set_property_writes_through() {
        let core = zstage_core();
        let mut af = proxy(&core);

        af.set_property_value("Offset", "-3").unwrap();
        assert_eq!(core.property_value("ZStage", "Offset").unwrap(), "-3");

        af.set_property(PropertyItem::new("ignored", "Mode").with_value("Coarse"))
            .unwrap();
        assert_eq!(af.property_value("Mode").unwrap(), "Coarse");

        let err = af.set_property_value("Firmware", "3.0").unwrap_err();
        assert!(err.is_device_failure());
    }

    #[test]
    fn test_every_call_reselects_device() {
        let core = zstage_core();
        let mut af = proxy(&core);
        af.set_context().unwrap();

        core.bind_autofocus_device("PFS").unwrap();
        let score = af.full_focus().unwrap();

        assert_eq!(score, 0.9);
        assert_eq!(core.autofocus_device(), "ZStage");
        assert_eq!(core.binds().last().map(String::as_str), Some("ZStage"));
    }

    #[test]
    fn test_set_context_follows_rebinding() {
        let core = zstage_core();
        let af = proxy(&core);
        assert_eq!(af.set_context().unwrap(), "ZStage");

        core.bind_autofocus_device("PFS").unwrap();
        assert_eq!(af.set_context().unwrap(), "PFS");
        assert_eq!(af.name(), "PFS");
    }

    #[test]
    #[traced_test]
    fn test_score_read_back_failure_is_swallowed() {
        let core = zstage_core();
        let mut af = proxy(&core);
        core.fail(FailPoint::LastScore);

        assert_eq!(af.full_focus().unwrap(), NEUTRAL_SCORE);
        assert_eq!(af.incremental_focus().unwrap(), NEUTRAL_SCORE);
        assert!(logs_contain("score read-back failed"));
    }

    #[test]
    fn test_focus_action_failure_propagates() {
        let core = zstage_core();
        let mut af = proxy(&core);
        core.fail(FailPoint::FullFocus);

        let err = af.full_focus().unwrap_err();
        assert!(matches!(
            err,
            AutofocusError::DeviceOperationFailed {
                operation: "full_focus",
                ..
            }
        ));
    }

    #[test]
    fn test_continuous_focus_forwards() {
        let core = zstage_core();
        let mut af = proxy(&core);

        assert!(!af.is_continuous_focus_enabled().unwrap());
        af.enable_continuous_focus(true).unwrap();
        assert!(af.is_continuous_focus_enabled().unwrap());
        assert!(af.is_continuous_focus_locked().unwrap());
    }

    #[test]
    fn test_continuous_selection_failure_is_device_failure() {
        let core = zstage_core();
        let mut af = proxy(&core);
        core.fail(FailPoint::Bind);

        assert!(af.enable_continuous_focus(true).unwrap_err().is_device_failure());
        assert!(af.is_continuous_focus_enabled().unwrap_err().is_device_failure());
        assert!(af.is_continuous_focus_locked().unwrap_err().is_device_failure());
    }

    #[test]
    fn test_lock_released_after_failure() {
        let core = zstage_core();
        let mut af = proxy(&core);

        core.fail(FailPoint::FullFocus);
        assert!(af.full_focus().is_err());
        core.clear_failures();

        assert_eq!(af.full_focus().unwrap(), 0.9);
    }

    #[test]
    fn test_unlocked_mode_still_selects() {
        let core = zstage_core();
        let mut af = proxy(&core).with_selection_lock(false);

        core.bind_autofocus_device("PFS").unwrap();
        af.set_context().unwrap();
        core.bind_autofocus_device("ZStage").unwrap();

        assert_eq!(af.full_focus().unwrap(), 0.5);
    }

    #[test]
    fn test_compute_score_unsupported() {
        let core = zstage_core();
        let af = proxy(&core);
        let image = ImageBuffer::new(1, 1, vec![0]).unwrap();
        assert!(af.compute_score(&image).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_settings_are_no_ops() {
        let core = zstage_core();
        let mut af = proxy(&core);
        af.set_property_value("Offset", "7").unwrap();

        af.save_settings().unwrap();
        af.load_settings().unwrap();
        af.initialize().unwrap();
        assert_eq!(af.property_value("Offset").unwrap(), "7");
    }

    #[test]
    fn test_current_focus_score_reads_core() {
        let core = zstage_core();
        let mut af = proxy(&core);

        assert_eq!(af.current_focus_score().unwrap(), 0.2);
        af.full_focus().unwrap();
        assert_eq!(af.current_focus_score().unwrap(), 0.9);
    }

    #[test]
    fn test_current_focus_score_failure_propagates() {
        let core = zstage_core();
        let af = proxy(&core);
        core.fail(FailPoint::CurrentScore);

        let err = af.current_focus_score().unwrap_err();
        assert!(matches!(
            err,
            AutofocusError::DeviceOperationFailed {
                operation: "current_focus_score",
                ..
            }
        ));
    }

    #[test]
    fn test_incremental_action_failure_propagates() {
        let core = zstage_core();
        let mut af = proxy(&core);
        core.fail(FailPoint::IncrementalFocus);

        let err = af.incremental_focus().unwrap_err();
        assert!(matches!(
            err,
            AutofocusError::DeviceOperationFailed {
                operation: "incremental_focus",
                ..
            }
        ));
        assert_eq!(core.current_focus_score().unwrap(), 0.2);
    }

    #[test]
    fn test_property_listing_failures_propagate() {
        let core = zstage_core();
        let af = proxy(&core);
        af.set_context().unwrap();
        core.fail(FailPoint::PropertyIo);

        let operation = |err: AutofocusError| match err {
            AutofocusError::DeviceOperationFailed { operation, .. } => Some(operation),
            _ => None,
        };
        assert_eq!(operation(af.property_names().unwrap_err()), Some("property_names"));
        assert_eq!(operation(af.properties().unwrap_err()), Some("properties"));
        assert_eq!(operation(af.property("Offset").unwrap_err()), Some("property"));
        assert_eq!(operation(af.property_value("Offset").unwrap_err()), Some("property_value"));

        core.clear_failures();
        assert_eq!(af.property_names().unwrap(), vec!["Offset", "Mode"]);
    }
}
