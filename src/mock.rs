//! Simulated collaborators for testing without hardware.
//!
//! # Available Mocks
//!
//! - `SimulatedCore` - in-memory [`DeviceControlCore`] with any number of
//!   autofocus devices, a shared "active autofocus device" binding, and
//!   injectable failures.
//! - `SweepAlgorithm` - a [`FocusAlgorithm`] that models a one-axis search
//!   toward a fixed target. It exercises the software variant's plumbing and
//!   scores positions, not images.
//!
//! Nothing here models real optics. Scores are deterministic so tests can
//! assert on them.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::capability::ImageBuffer;
use crate::core::DeviceControlCore;
use crate::error::{AutofocusError, AutofocusResult, CoreError, CoreResult};
use crate::property::PropertyItem;
use crate::registry::PropertyRegistry;
use crate::software::FocusAlgorithm;

// =============================================================================
// SimulatedCore
// =============================================================================

/// Core calls that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// `bind_autofocus_device`
    Bind,
    /// `perform_full_focus`
    FullFocus,
    /// `perform_incremental_focus`
    IncrementalFocus,
    /// `last_focus_score`
    LastScore,
    /// `current_focus_score`
    CurrentScore,
    /// Every continuous-focus call.
    Continuous,
    /// Every property read and write.
    PropertyIo,
}

#[derive(Debug, Clone)]
struct SimProperty {
    item: PropertyItem,
    pre_init: bool,
}

/// One simulated autofocus device.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    label: String,
    properties: Vec<SimProperty>,
    score: f64,
    best_score: f64,
    last_score: f64,
    continuous: bool,
}

impl SimulatedDevice {
    /// Create a device with no properties and zero scores.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            properties: Vec::new(),
            score: 0.0,
            best_score: 0.0,
            last_score: 0.0,
            continuous: false,
        }
    }

    /// Add a live property. `device` on the item is overwritten with this label.
    pub fn with_property(mut self, item: PropertyItem) -> Self {
        self.push(item, false);
        self
    }

    /// Add a property that can only be set before initialization.
    pub fn with_pre_init_property(mut self, item: PropertyItem) -> Self {
        self.push(item, true);
        self
    }

    /// Current score and the score a full focus reaches.
    pub fn with_scores(mut self, current: f64, best: f64) -> Self {
        self.score = current;
        self.best_score = best;
        self
    }

    fn push(&mut self, mut item: PropertyItem, pre_init: bool) {
        item.device = self.label.clone();
        self.properties.retain(|p| p.item.name != item.name);
        self.properties.push(SimProperty { item, pre_init });
    }

    fn property(&self, name: &str) -> CoreResult<&SimProperty> {
        self.properties
            .iter()
            .find(|p| p.item.name == name)
            .ok_or_else(|| CoreError::UnknownProperty {
                device: self.label.clone(),
                name: name.to_string(),
            })
    }

    fn property_mut(&mut self, name: &str) -> CoreResult<&mut SimProperty> {
        let label = self.label.clone();
        self.properties
            .iter_mut()
            .find(|p| p.item.name == name)
            .ok_or(CoreError::UnknownProperty {
                device: label,
                name: name.to_string(),
            })
    }

    fn locked(&self) -> bool {
        self.continuous && (self.best_score - self.score).abs() < f64::EPSILON
    }
}

#[derive(Debug, Default)]
struct CoreState {
    devices: Vec<SimulatedDevice>,
    autofocus_device: String,
    binds: Vec<String>,
    failures: HashSet<FailPoint>,
    remaining_images: usize,
}

impl CoreState {
    fn check(&self, point: FailPoint) -> CoreResult<()> {
        if self.failures.contains(&point) {
            return Err(CoreError::Device {
                device: self.autofocus_device.clone(),
                message: format!("injected failure at {point:?}"),
            });
        }
        Ok(())
    }

    fn device(&self, label: &str) -> CoreResult<&SimulatedDevice> {
        self.devices
            .iter()
            .find(|d| d.label == label)
            .ok_or_else(|| CoreError::UnknownDevice(label.to_string()))
    }

    fn device_mut(&mut self, label: &str) -> CoreResult<&mut SimulatedDevice> {
        self.devices
            .iter_mut()
            .find(|d| d.label == label)
            .ok_or_else(|| CoreError::UnknownDevice(label.to_string()))
    }

    fn bound(&mut self) -> CoreResult<&mut SimulatedDevice> {
        if self.autofocus_device.is_empty() {
            return Err(CoreError::NoAutofocusDevice);
        }
        let label = self.autofocus_device.clone();
        self.device_mut(&label)
    }
}

/// In-memory device-control core.
///
/// # Example
///
/// ```rust
/// use autofocus_core::core::DeviceControlCore;
/// use autofocus_core::mock::{SimulatedCore, SimulatedDevice};
///
/// let core = SimulatedCore::new();
/// core.add_device(SimulatedDevice::new("ZStage").with_scores(0.2, 0.9));
/// core.bind_autofocus_device("ZStage").unwrap();
/// core.perform_full_focus().unwrap();
/// assert_eq!(core.last_focus_score().unwrap(), 0.9);
/// ```
#[derive(Debug, Default)]
pub struct SimulatedCore {
    state: Mutex<CoreState>,
}

impl SimulatedCore {
    /// Create a core with no devices and nothing bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// A core with a `ZStage` autofocus device bound, plus a spare `PFS` device.
    pub fn demo() -> Self {
        let core = Self::new();
        core.add_device(
            SimulatedDevice::new("ZStage")
                .with_property(
                    PropertyItem::new("", "Offset")
                        .with_value("0")
                        .with_limits(-100.0, 100.0),
                )
                .with_property(
                    PropertyItem::new("", "Mode")
                        .with_value("Fine")
                        .with_allowed(["Coarse", "Fine"]),
                )
                .with_property(
                    PropertyItem::new("", "Description")
                        .with_value("Simulated Z focus drive")
                        .read_only(),
                )
                .with_pre_init_property(PropertyItem::new("", "Port").with_value("COM1"))
                .with_scores(0.25, 0.92),
        );
        core.add_device(
            SimulatedDevice::new("PFS")
                .with_property(
                    PropertyItem::new("", "LockThreshold")
                        .with_value("0.5")
                        .with_limits(0.0, 1.0),
                )
                .with_scores(0.1, 0.8),
        );
        {
            let mut state = core.state.lock();
            state.autofocus_device = "ZStage".to_string();
        }
        core
    }

    /// Register a device. Replaces a device with the same label.
    pub fn add_device(&self, device: SimulatedDevice) {
        let mut state = self.state.lock();
        state.devices.retain(|d| d.label != device.label);
        state.devices.push(device);
    }

    /// Label of the active autofocus device.
    pub fn autofocus_device(&self) -> String {
        self.state.lock().autofocus_device.clone()
    }

    /// Every successful `bind_autofocus_device` call, oldest first.
    pub fn binds(&self) -> Vec<String> {
        self.state.lock().binds.clone()
    }

    /// Make `point` fail until cleared.
    pub fn fail(&self, point: FailPoint) {
        self.state.lock().failures.insert(point);
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Set the count reported by `remaining_image_count`.
    pub fn set_remaining_images(&self, count: usize) {
        self.state.lock().remaining_images = count;
    }
}

impl DeviceControlCore for SimulatedCore {
    fn bind_autofocus_device(&self, device: &str) -> CoreResult<()> {
        let mut state = self.state.lock();
        state.check(FailPoint::Bind)?;
        state.device(device)?;
        state.autofocus_device = device.to_string();
        state.binds.push(device.to_string());
        Ok(())
    }

    fn current_autofocus_device(&self) -> CoreResult<String> {
        Ok(self.state.lock().autofocus_device.clone())
    }

    fn perform_full_focus(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        state.check(FailPoint::FullFocus)?;
        let device = state.bound()?;
        device.score = device.best_score;
        device.last_score = device.score;
        Ok(())
    }

    fn perform_incremental_focus(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        state.check(FailPoint::IncrementalFocus)?;
        let device = state.bound()?;
        device.score = (device.score + device.best_score) / 2.0;
        device.last_score = device.score;
        Ok(())
    }

    fn last_focus_score(&self) -> CoreResult<f64> {
        let mut state = self.state.lock();
        state.check(FailPoint::LastScore)?;
        Ok(state.bound()?.last_score)
    }

    fn current_focus_score(&self) -> CoreResult<f64> {
        let mut state = self.state.lock();
        state.check(FailPoint::CurrentScore)?;
        Ok(state.bound()?.score)
    }

    fn enable_continuous_focus(&self, enable: bool) -> CoreResult<()> {
        let mut state = self.state.lock();
        state.check(FailPoint::Continuous)?;
        let device = state.bound()?;
        device.continuous = enable;
        if enable {
            device.score = device.best_score;
        }
        Ok(())
    }

    fn is_continuous_focus_enabled(&self) -> CoreResult<bool> {
        let mut state = self.state.lock();
        state.check(FailPoint::Continuous)?;
        Ok(state.bound()?.continuous)
    }

    fn is_continuous_focus_locked(&self) -> CoreResult<bool> {
        let mut state = self.state.lock();
        state.check(FailPoint::Continuous)?;
        Ok(state.bound()?.locked())
    }

    fn property_names(&self, device: &str) -> CoreResult<Vec<String>> {
        let state = self.state.lock();
        state.check(FailPoint::PropertyIo)?;
        Ok(state
            .device(device)?
            .properties
            .iter()
            .map(|p| p.item.name.clone())
            .collect())
    }

    fn has_property(&self, device: &str, name: &str) -> CoreResult<bool> {
        let state = self.state.lock();
        state.check(FailPoint::PropertyIo)?;
        Ok(state.device(device)?.property(name).is_ok())
    }

    fn property_value(&self, device: &str, name: &str) -> CoreResult<String> {
        let state = self.state.lock();
        state.check(FailPoint::PropertyIo)?;
        Ok(state.device(device)?.property(name)?.item.value.clone())
    }

    fn set_property_value(&self, device: &str, name: &str, value: &str) -> CoreResult<()> {
        let mut state = self.state.lock();
        state.check(FailPoint::PropertyIo)?;
        let dev = state.device_mut(device)?;
        let label = dev.label.clone();
        let prop = dev.property_mut(name)?;
        let reject = |message: String| CoreError::Device {
            device: label.clone(),
            message,
        };

        if prop.item.read_only {
            return Err(reject(format!("property '{name}' is read-only")));
        }
        if !prop.item.is_allowed(value) {
            return Err(reject(format!("'{value}' is not an allowed value of '{name}'")));
        }
        if prop.item.has_limits() {
            let number: f64 = value
                .parse()
                .map_err(|_| reject(format!("'{value}' is not numeric")))?;
            let below = prop.item.lower_limit.is_some_and(|lo| number < lo);
            let above = prop.item.upper_limit.is_some_and(|hi| number > hi);
            if below || above {
                return Err(reject(format!("{number} is outside the limits of '{name}'")));
            }
        }
        prop.item.value = value.to_string();
        Ok(())
    }

    fn is_property_read_only(&self, device: &str, name: &str) -> CoreResult<bool> {
        let state = self.state.lock();
        state.check(FailPoint::PropertyIo)?;
        Ok(state.device(device)?.property(name)?.item.read_only)
    }

    fn is_property_pre_init(&self, device: &str, name: &str) -> CoreResult<bool> {
        let state = self.state.lock();
        state.check(FailPoint::PropertyIo)?;
        Ok(state.device(device)?.property(name)?.pre_init)
    }

    fn has_property_limits(&self, device: &str, name: &str) -> CoreResult<bool> {
        let state = self.state.lock();
        state.check(FailPoint::PropertyIo)?;
        Ok(state.device(device)?.property(name)?.item.has_limits())
    }

    fn property_lower_limit(&self, device: &str, name: &str) -> CoreResult<f64> {
        let state = self.state.lock();
        state.check(FailPoint::PropertyIo)?;
        Ok(state
            .device(device)?
            .property(name)?
            .item
            .lower_limit
            .unwrap_or(f64::NEG_INFINITY))
    }

    fn property_upper_limit(&self, device: &str, name: &str) -> CoreResult<f64> {
        let state = self.state.lock();
        state.check(FailPoint::PropertyIo)?;
        Ok(state
            .device(device)?
            .property(name)?
            .item
            .upper_limit
            .unwrap_or(f64::INFINITY))
    }

    fn allowed_property_values(&self, device: &str, name: &str) -> CoreResult<Vec<String>> {
        let state = self.state.lock();
        state.check(FailPoint::PropertyIo)?;
        Ok(state.device(device)?.property(name)?.item.allowed.clone())
    }

    fn remaining_image_count(&self) -> CoreResult<usize> {
        Ok(self.state.lock().remaining_images)
    }
}

// =============================================================================
// SweepAlgorithm
// =============================================================================

/// Simulated one-axis focus search.
///
/// Holds a stage position and a hidden in-focus target. A full focus walks
/// `SearchRange` in `StepSize` steps and lands on the target; an incremental
/// focus halves the remaining error. The score of a position is
/// `1 / (1 + |position - target|)`.
///
/// Properties:
///
/// | Name | Default | Constraint |
/// |---|---|---|
/// | `StepSize` | `1.0` | limits `[0.01, 10]` |
/// | `SearchRange` | `50` | limits `[1, 500]` |
/// | `Channel` | `GFP` | `DAPI`, `GFP`, `RFP` |
#[derive(Debug, Clone)]
pub struct SweepAlgorithm {
    position: f64,
    target: f64,
    images: usize,
}

impl SweepAlgorithm {
    /// Start at `position` with the in-focus plane at `target`.
    pub fn new(position: f64, target: f64) -> Self {
        Self {
            position,
            target,
            images: 0,
        }
    }

    /// Current simulated stage position.
    pub fn position(&self) -> f64 {
        self.position
    }

    fn score(&self) -> f64 {
        1.0 / (1.0 + (self.position - self.target).abs())
    }

    /// Read a numeric setting. It must be finite and inside any declared limits.
    fn number(props: &PropertyRegistry, name: &str) -> AutofocusResult<f64> {
        let item = props.get(name)?;
        let invalid = |reason| {
            tracing::warn!(property = name, value = %item.value, reason, "Unusable autofocus setting");
            AutofocusError::InvalidSetting {
                name: name.to_string(),
                value: item.value.clone(),
                reason,
            }
        };

        let value: f64 = item.value.trim().parse().map_err(|_| invalid("not a number"))?;
        if !value.is_finite() {
            return Err(invalid("not a finite number"));
        }
        if let (Some(lower), Some(upper)) = (item.lower_limit, item.upper_limit) {
            if value < lower || value > upper {
                return Err(invalid("outside declared limits"));
            }
        }
        Ok(value)
    }
}

impl Default for SweepAlgorithm {
    fn default() -> Self {
        Self::new(0.0, 12.0)
    }
}

impl FocusAlgorithm for SweepAlgorithm {
    fn name(&self) -> &str {
        "SweepFocus"
    }

    fn help_text(&self) -> String {
        "Simulated z sweep toward a fixed focal plane".to_string()
    }

    fn declare_properties(&self, registry: &mut PropertyRegistry) {
        let owner = registry.owner().to_string();
        registry.add(
            PropertyItem::new(owner.clone(), "StepSize")
                .with_value("1.0")
                .with_limits(0.01, 10.0),
        );
        registry.add(
            PropertyItem::new(owner, "SearchRange")
                .with_value("50")
                .with_limits(1.0, 500.0),
        );
        registry.create_with_allowed("Channel", "GFP", ["DAPI", "GFP", "RFP"]);
    }

    fn full_focus(&mut self, props: &PropertyRegistry) -> AutofocusResult<f64> {
        let step = Self::number(props, "StepSize")?;
        let range = Self::number(props, "SearchRange")?;
        if step <= 0.0 {
            return Err(AutofocusError::InvalidSetting {
                name: "StepSize".to_string(),
                value: step.to_string(),
                reason: "must be positive",
            });
        }
        self.images = ((range / step).ceil() as usize).saturating_add(1);
        if (self.position - self.target).abs() <= range / 2.0 {
            self.position = self.target;
        }
        tracing::debug!(
            images = self.images,
            position = self.position,
            channel = props.value("Channel").unwrap_or_default(),
            "Sweep finished"
        );
        Ok(self.score())
    }

    fn incremental_focus(&mut self, _props: &PropertyRegistry) -> AutofocusResult<f64> {
        self.position = (self.position + self.target) / 2.0;
        self.images = 3;
        Ok(self.score())
    }

    fn current_focus_score(&self, _props: &PropertyRegistry) -> AutofocusResult<f64> {
        Ok(self.score())
    }

    /// Mean intensity scaled to `[0, 1]`. A placeholder metric, not a focus measure.
    fn compute_score(&self, _props: &PropertyRegistry, image: &ImageBuffer) -> AutofocusResult<f64> {
        if image.pixels.is_empty() {
            return Ok(0.0);
        }
        let sum: f64 = image.pixels.iter().map(|&p| f64::from(p)).sum();
        Ok(sum / image.pixels.len() as f64 / f64::from(u16::MAX))
    }

    fn number_of_images(&self) -> usize {
        self.images
    }

    fn verbose_status(&self) -> String {
        format!("position {:.3}, score {:.3}", self.position, self.score())
    }
}
