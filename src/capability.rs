//! The uniform autofocus contract.
//!
//! Client code drives focus through [`AutofocusCapability`] without knowing
//! whether a software algorithm or a hardware device answers. Exactly two
//! implementations exist:
//!
//! - [`SoftwareAutofocus`]: owns its properties, scores through a
//!   [`FocusAlgorithm`](crate::software::FocusAlgorithm).
//! - [`HardwareProxyAutofocus`]: owns nothing, forwards to the device-control
//!   core's bound autofocus device.
//!
//! [`AutofocusHandle`] tags the two so orchestration code can hold either one
//! by value.
//!
//! # Example
//!
//! ```rust,ignore
//! fn refocus(af: &mut dyn AutofocusCapability) -> AutofocusResult<f64> {
//!     if af.is_continuous_focus_enabled()? {
//!         return af.current_focus_score();
//!     }
//!     af.incremental_focus()
//! }
//! ```

use crate::error::AutofocusResult;
use crate::hardware::HardwareProxyAutofocus;
use crate::property::PropertyItem;
use crate::software::SoftwareAutofocus;

/// A single-channel image handed to [`AutofocusCapability::compute_score`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major pixel intensities, `width * height` long.
    pub pixels: Vec<u16>,
}

impl ImageBuffer {
    /// Wrap row-major pixels. Returns `None` when the length does not match.
    pub fn new(width: u32, height: u32, pixels: Vec<u16>) -> Option<Self> {
        let expected = (width as usize).checked_mul(height as usize)?;
        (pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Pixel at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

/// Property and focus control surface shared by every autofocus implementation.
pub trait AutofocusCapability: Send {
    /// Identity of the implementation (algorithm name or device label).
    fn name(&self) -> String;

    /// Short human-readable description.
    fn help_text(&self) -> String;

    /// Implementation version.
    fn version(&self) -> String;

    /// Free-form status line.
    fn verbose_status(&self) -> String;

    /// One-time setup before first use.
    fn initialize(&mut self) -> AutofocusResult<()>;

    /// Complete focus search. Returns the score reached.
    fn full_focus(&mut self) -> AutofocusResult<f64>;

    /// Bounded, cheaper focus correction. Returns the score reached.
    fn incremental_focus(&mut self) -> AutofocusResult<f64>;

    /// Score at the current position. Moves nothing.
    fn current_focus_score(&self) -> AutofocusResult<f64>;

    /// Score a single image.
    fn compute_score(&self, image: &ImageBuffer) -> AutofocusResult<f64>;

    /// Turn continuous focus tracking on or off.
    fn enable_continuous_focus(&mut self, enable: bool) -> AutofocusResult<()>;

    /// Whether continuous focus tracking is on.
    fn is_continuous_focus_enabled(&self) -> AutofocusResult<bool>;

    /// Whether continuous focus holds lock.
    fn is_continuous_focus_locked(&self) -> AutofocusResult<bool>;

    /// Names of the properties a caller may adjust.
    fn property_names(&self) -> AutofocusResult<Vec<String>>;

    /// Full description of every property.
    fn properties(&self) -> AutofocusResult<Vec<PropertyItem>>;

    /// Full description of one property.
    fn property(&self, name: &str) -> AutofocusResult<PropertyItem>;

    /// Current value of one property.
    fn property_value(&self, name: &str) -> AutofocusResult<String>;

    /// Write a property from a full description.
    fn set_property(&mut self, item: PropertyItem) -> AutofocusResult<()>;

    /// Write one property value.
    fn set_property_value(&mut self, name: &str, value: &str) -> AutofocusResult<()>;

    /// Hook run after a batch of property edits.
    fn apply_settings(&mut self) -> AutofocusResult<()> {
        Ok(())
    }

    /// Persist property values.
    fn save_settings(&self) -> AutofocusResult<()>;

    /// Restore property values.
    fn load_settings(&mut self) -> AutofocusResult<()>;

    /// Images acquired by the last focus run.
    fn number_of_images(&self) -> AutofocusResult<usize>;

    /// Log `msg` followed by every property.
    fn dump_properties(&self, msg: &str) {
        tracing::info!("{msg}");
        match self.properties() {
            Ok(items) => {
                for item in items {
                    tracing::info!("{item}");
                }
            }
            Err(e) => tracing::warn!(autofocus = %self.name(), error = %e, "Property dump failed"),
        }
    }
}

/// Either autofocus implementation, held by value.
pub enum AutofocusHandle {
    /// Software-resident algorithm with its own properties.
    Software(SoftwareAutofocus),
    /// Proxy to the core's bound autofocus device.
    Hardware(HardwareProxyAutofocus),
}

impl AutofocusHandle {
    /// `"software"` or `"hardware"`.
    pub fn variant(&self) -> &'static str {
        match self {
            AutofocusHandle::Software(_) => "software",
            AutofocusHandle::Hardware(_) => "hardware",
        }
    }

    /// The software variant, if that is what this handle holds.
    pub fn as_software(&self) -> Option<&SoftwareAutofocus> {
        match self {
            AutofocusHandle::Software(af) => Some(af),
            _ => None,
        }
    }

    /// The hardware proxy, if that is what this handle holds.
    pub fn as_hardware(&self) -> Option<&HardwareProxyAutofocus> {
        match self {
            AutofocusHandle::Hardware(af) => Some(af),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn AutofocusCapability {
        match self {
            AutofocusHandle::Software(af) => af,
            AutofocusHandle::Hardware(af) => af,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn AutofocusCapability {
        match self {
            AutofocusHandle::Software(af) => af,
            AutofocusHandle::Hardware(af) => af,
        }
    }
}

impl From<SoftwareAutofocus> for AutofocusHandle {
    fn from(af: SoftwareAutofocus) -> Self {
        AutofocusHandle::Software(af)
    }
}

impl From<HardwareProxyAutofocus> for AutofocusHandle {
    fn from(af: HardwareProxyAutofocus) -> Self {
        AutofocusHandle::Hardware(af)
    }
}

impl AutofocusCapability for AutofocusHandle {
    fn name(&self) -> String {
        self.inner().name()
    }

    fn help_text(&self) -> String {
        self.inner().help_text()
    }

    fn version(&self) -> String {
        self.inner().version()
    }

    fn verbose_status(&self) -> String {
        self.inner().verbose_status()
    }

    fn initialize(&mut self) -> AutofocusResult<()> {
        self.inner_mut().initialize()
    }

    fn full_focus(&mut self) -> AutofocusResult<f64> {
        self.inner_mut().full_focus()
    }

    fn incremental_focus(&mut self) -> AutofocusResult<f64> {
        self.inner_mut().incremental_focus()
    }

    fn current_focus_score(&self) -> AutofocusResult<f64> {
        self.inner().current_focus_score()
    }

    fn compute_score(&self, image: &ImageBuffer) -> AutofocusResult<f64> {
        self.inner().compute_score(image)
    }

    fn enable_continuous_focus(&mut self, enable: bool) -> AutofocusResult<()> {
        self.inner_mut().enable_continuous_focus(enable)
    }

    fn is_continuous_focus_enabled(&self) -> AutofocusResult<bool> {
        self.inner().is_continuous_focus_enabled()
    }

    fn is_continuous_focus_locked(&self) -> AutofocusResult<bool> {
        self.inner().is_continuous_focus_locked()
    }

    fn property_names(&self) -> AutofocusResult<Vec<String>> {
        self.inner().property_names()
    }

    fn properties(&self) -> AutofocusResult<Vec<PropertyItem>> {
        self.inner().properties()
    }

    fn property(&self, name: &str) -> AutofocusResult<PropertyItem> {
        self.inner().property(name)
    }

    fn property_value(&self, name: &str) -> AutofocusResult<String> {
        self.inner().property_value(name)
    }

    fn set_property(&mut self, item: PropertyItem) -> AutofocusResult<()> {
        self.inner_mut().set_property(item)
    }

    fn set_property_value(&mut self, name: &str, value: &str) -> AutofocusResult<()> {
        self.inner_mut().set_property_value(name, value)
    }

    fn apply_settings(&mut self) -> AutofocusResult<()> {
        self.inner_mut().apply_settings()
    }

    fn save_settings(&self) -> AutofocusResult<()> {
        self.inner().save_settings()
    }

    fn load_settings(&mut self) -> AutofocusResult<()> {
        self.inner_mut().load_settings()
    }

    fn number_of_images(&self) -> AutofocusResult<usize> {
        self.inner().number_of_images()
    }

    fn dump_properties(&self, msg: &str) {
        self.inner().dump_properties(msg)
    }
}
