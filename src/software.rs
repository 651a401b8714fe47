//! Software-resident autofocus.
//!
//! [`SoftwareAutofocus`] supplies the property and persistence plumbing; the
//! actual scoring comes from a [`FocusAlgorithm`]. The algorithm declares its
//! properties once at construction and reads them from the registry on every
//! call, so property edits take effect on the next focus run.
//!
//! # Continuous focus
//!
//! Unless the algorithm overrides them, `enable_continuous_focus` fails with
//! `Unsupported` while both continuous queries answer `false`. "No continuous
//! mode" is a steady state, not an error.
//!
//! # Persistence
//!
//! Property *values* are saved under namespace = the algorithm's settings
//! namespace and key = property name. Structure is never persisted: a value
//! stored for a property the algorithm no longer declares is ignored.
//!
//! # Example
//!
//! ```rust,ignore
//! let settings = Arc::new(MemorySettings::new());
//! let mut af = SoftwareAutofocus::new(MyAlgorithm::default(), settings);
//! af.initialize()?;                       // restores saved values
//! af.set_property_value("StepSize", "0.5")?;
//! let score = af.full_focus()?;
//! af.save_settings()?;
//! ```

use std::sync::Arc;

use crate::capability::{AutofocusCapability, ImageBuffer};
use crate::error::{AutofocusError, AutofocusResult};
use crate::property::PropertyItem;
use crate::registry::PropertyRegistry;
use crate::settings::SettingsBridge;

/// Scoring logic plugged into [`SoftwareAutofocus`].
///
/// Implementations read their parameters from the registry passed to each
/// call rather than caching them.
pub trait FocusAlgorithm: Send {
    /// Unique algorithm name. Also the owner id of its properties.
    fn name(&self) -> &str;

    /// Short description.
    fn help_text(&self) -> String {
        self.name().to_string()
    }

    /// Algorithm version.
    fn version(&self) -> String {
        "1.0".to_string()
    }

    /// Namespace under which property values are persisted.
    fn settings_namespace(&self) -> String {
        self.name().to_string()
    }

    /// Register the algorithm's properties and their defaults.
    fn declare_properties(&self, registry: &mut PropertyRegistry);

    /// Complete focus search.
    fn full_focus(&mut self, props: &PropertyRegistry) -> AutofocusResult<f64>;

    /// Bounded focus correction.
    fn incremental_focus(&mut self, props: &PropertyRegistry) -> AutofocusResult<f64>;

    /// Score at the current position.
    fn current_focus_score(&self, props: &PropertyRegistry) -> AutofocusResult<f64>;

    /// Score one image.
    fn compute_score(&self, props: &PropertyRegistry, image: &ImageBuffer) -> AutofocusResult<f64>;

    /// Images acquired by the last focus run.
    fn number_of_images(&self) -> usize {
        0
    }

    /// Status line.
    fn verbose_status(&self) -> String {
        "No message at this time!".to_string()
    }

    /// React to a batch of property edits.
    fn apply_settings(&mut self, _props: &PropertyRegistry) -> AutofocusResult<()> {
        Ok(())
    }

    /// Continuous tracking on/off.
    fn enable_continuous_focus(&mut self, _enable: bool) -> AutofocusResult<()> {
        Err(AutofocusError::Unsupported("enable_continuous_focus"))
    }

    /// Whether continuous tracking is on.
    fn is_continuous_focus_enabled(&self) -> AutofocusResult<bool> {
        Ok(false)
    }

    /// Whether continuous tracking holds lock.
    fn is_continuous_focus_locked(&self) -> AutofocusResult<bool> {
        Ok(false)
    }
}

/// Autofocus implemented in software over an owned property registry.
pub struct SoftwareAutofocus {
    algorithm: Box<dyn FocusAlgorithm>,
    registry: PropertyRegistry,
    settings: Arc<dyn SettingsBridge>,
    namespace: String,
}

impl SoftwareAutofocus {
    /// Wrap `algorithm`, letting it declare its properties.
    pub fn new(algorithm: impl FocusAlgorithm + 'static, settings: Arc<dyn SettingsBridge>) -> Self {
        Self::from_boxed(Box::new(algorithm), settings)
    }

    /// Same as [`SoftwareAutofocus::new`] for an already boxed algorithm.
    pub fn from_boxed(algorithm: Box<dyn FocusAlgorithm>, settings: Arc<dyn SettingsBridge>) -> Self {
        let mut registry = PropertyRegistry::new(algorithm.name());
        algorithm.declare_properties(&mut registry);
        let namespace = algorithm.settings_namespace();
        tracing::debug!(
            algorithm = algorithm.name(),
            properties = registry.len(),
            "Created software autofocus"
        );
        Self {
            algorithm,
            registry,
            settings,
            namespace,
        }
    }

    /// The backing property registry.
    pub fn registry(&self) -> &PropertyRegistry {
        &self.registry
    }

    /// Insert or replace a property after construction.
    pub fn add_property(&mut self, item: PropertyItem) {
        self.registry.add(item);
    }

    /// Namespace used for persisted values.
    pub fn settings_namespace(&self) -> &str {
        &self.namespace
    }
}

impl AutofocusCapability for SoftwareAutofocus {
    fn name(&self) -> String {
        self.algorithm.name().to_string()
    }

    fn help_text(&self) -> String {
        self.algorithm.help_text()
    }

    fn version(&self) -> String {
        self.algorithm.version()
    }

    fn verbose_status(&self) -> String {
        self.algorithm.verbose_status()
    }

    fn initialize(&mut self) -> AutofocusResult<()> {
        self.load_settings()
    }

    fn full_focus(&mut self) -> AutofocusResult<f64> {
        self.algorithm.full_focus(&self.registry)
    }

    fn incremental_focus(&mut self) -> AutofocusResult<f64> {
        self.algorithm.incremental_focus(&self.registry)
    }

    fn current_focus_score(&self) -> AutofocusResult<f64> {
        self.algorithm.current_focus_score(&self.registry)
    }

    fn compute_score(&self, image: &ImageBuffer) -> AutofocusResult<f64> {
        self.algorithm.compute_score(&self.registry, image)
    }

    fn enable_continuous_focus(&mut self, enable: bool) -> AutofocusResult<()> {
        self.algorithm.enable_continuous_focus(enable)
    }

    fn is_continuous_focus_enabled(&self) -> AutofocusResult<bool> {
        self.algorithm.is_continuous_focus_enabled()
    }

    fn is_continuous_focus_locked(&self) -> AutofocusResult<bool> {
        self.algorithm.is_continuous_focus_locked()
    }

    fn property_names(&self) -> AutofocusResult<Vec<String>> {
        Ok(self.registry.names())
    }

    fn properties(&self) -> AutofocusResult<Vec<PropertyItem>> {
        Ok(self.registry.list())
    }

    fn property(&self, name: &str) -> AutofocusResult<PropertyItem> {
        self.registry.get(name).cloned()
    }

    fn property_value(&self, name: &str) -> AutofocusResult<String> {
        self.registry.value(name).map(str::to_string)
    }

    fn set_property(&mut self, item: PropertyItem) -> AutofocusResult<()> {
        self.registry.set(item);
        Ok(())
    }

    fn set_property_value(&mut self, name: &str, value: &str) -> AutofocusResult<()> {
        self.registry.set_value(name, value)
    }

    fn apply_settings(&mut self) -> AutofocusResult<()> {
        self.algorithm.apply_settings(&self.registry)
    }

    fn save_settings(&self) -> AutofocusResult<()> {
        for item in self.registry.iter() {
            self.settings
                .put_string(&self.namespace, &item.name, &item.value)?;
        }
        tracing::info!(
            namespace = %self.namespace,
            count = self.registry.len(),
            "Saved autofocus settings"
        );
        Ok(())
    }

    fn load_settings(&mut self) -> AutofocusResult<()> {
        for item in self.registry.iter_mut() {
            item.value = self
                .settings
                .get_string(&self.namespace, &item.name, &item.value);
        }
        tracing::info!(
            namespace = %self.namespace,
            count = self.registry.len(),
            "Loaded autofocus settings"
        );
        Ok(())
    }

    fn number_of_images(&self) -> AutofocusResult<usize> {
        Ok(self.algorithm.number_of_images())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;

    /// Scores by counting calls; enough to observe dispatch.
    #[derive(Default)]
    struct CountingAlgorithm {
        runs: usize,
    }

    impl FocusAlgorithm for CountingAlgorithm {
        fn name(&self) -> &str {
            "CountingFocus"
        }

        fn declare_properties(&self, registry: &mut PropertyRegistry) {
            registry.create_with_value("Gain", "10");
            registry.create_with_value("Exposure", "50");
            registry.create_with_allowed("Mode", "Fast", ["Fast", "Precise"]);
        }

        fn full_focus(&mut self, props: &PropertyRegistry) -> AutofocusResult<f64> {
            self.runs += 1;
            let gain: f64 = props.value("Gain")?.parse().unwrap_or(0.0);
            Ok(gain * 2.0)
        }

        fn incremental_focus(&mut self, _props: &PropertyRegistry) -> AutofocusResult<f64> {
            self.runs += 1;
            Ok(1.0)
        }

        fn current_focus_score(&self, _props: &PropertyRegistry) -> AutofocusResult<f64> {
            Ok(self.runs as f64)
        }

        fn compute_score(
            &self,
            _props: &PropertyRegistry,
            image: &ImageBuffer,
        ) -> AutofocusResult<f64> {
            Ok(image.pixels.len() as f64)
        }

        fn number_of_images(&self) -> usize {
            self.runs
        }
    }

    struct TrackingAlgorithm {
        enabled: bool,
    }

    impl FocusAlgorithm for TrackingAlgorithm {
        fn name(&self) -> &str {
            "TrackingFocus"
        }

        fn declare_properties(&self, _registry: &mut PropertyRegistry) {}

        fn full_focus(&mut self, _props: &PropertyRegistry) -> AutofocusResult<f64> {
            Ok(0.0)
        }

        fn incremental_focus(&mut self, _props: &PropertyRegistry) -> AutofocusResult<f64> {
            Ok(0.0)
        }

        fn current_focus_score(&self, _props: &PropertyRegistry) -> AutofocusResult<f64> {
            Ok(0.0)
        }

        fn compute_score(
            &self,
            _props: &PropertyRegistry,
            _image: &ImageBuffer,
        ) -> AutofocusResult<f64> {
            Ok(0.0)
        }

        fn enable_continuous_focus(&mut self, enable: bool) -> AutofocusResult<()> {
            self.enabled = enable;
            Ok(())
        }

        fn is_continuous_focus_enabled(&self) -> AutofocusResult<bool> {
            Ok(self.enabled)
        }
    }

    fn counting(settings: Arc<MemorySettings>) -> SoftwareAutofocus {
        SoftwareAutofocus::new(CountingAlgorithm::default(), settings)
    }

    #[test]
    fn test_properties_declared_at_construction() {
        let af = counting(Arc::new(MemorySettings::new()));
        assert_eq!(
            af.property_names().unwrap(),
            vec!["Gain", "Exposure", "Mode"]
        );
        let mode = af.property("Mode").unwrap();
        assert_eq!(mode.device, "CountingFocus");
        assert_eq!(mode.allowed, vec!["Fast", "Precise"]);
    }

    #[test]
    fn test_property_pass_through() {
        let mut af = counting(Arc::new(MemorySettings::new()));

        af.set_property_value("Gain", "20").unwrap();
        assert_eq!(af.property_value("Gain").unwrap(), "20");

        assert!(af
            .set_property_value("Missing", "1")
            .unwrap_err()
            .is_unknown_property());
        assert!(af.property("Missing").unwrap_err().is_unknown_property());
        assert!(af.property_value("Missing").unwrap_err().is_unknown_property());

        af.set_property(PropertyItem::new("CountingFocus", "Missing").with_value("1"))
            .unwrap();
        assert_eq!(af.property_value("Missing").unwrap(), "1");
    }

    #[test]
    fn test_focus_reads_current_properties() {
        let mut af = counting(Arc::new(MemorySettings::new()));
        assert_eq!(af.full_focus().unwrap(), 20.0);

        af.set_property_value("Gain", "3").unwrap();
        assert_eq!(af.full_focus().unwrap(), 6.0);
        assert_eq!(af.incremental_focus().unwrap(), 1.0);
        assert_eq!(af.current_focus_score().unwrap(), 3.0);
        assert_eq!(af.number_of_images().unwrap(), 3);
    }

    #[test]
    fn test_compute_score_delegates() {
        let af = counting(Arc::new(MemorySettings::new()));
        let image = ImageBuffer::new(3, 2, vec![0; 6]).unwrap();
        assert_eq!(af.compute_score(&image).unwrap(), 6.0);
    }

    #[test]
    fn test_continuous_defaults() {
        let mut af = counting(Arc::new(MemorySettings::new()));
        assert!(af.enable_continuous_focus(true).unwrap_err().is_unsupported());
        assert!(!af.is_continuous_focus_enabled().unwrap());
        assert!(!af.is_continuous_focus_locked().unwrap());
    }

    #[test]
    fn test_continuous_override() {
        let mut af = SoftwareAutofocus::new(
            TrackingAlgorithm { enabled: false },
            Arc::new(MemorySettings::new()),
        );
        af.enable_continuous_focus(true).unwrap();
        assert!(af.is_continuous_focus_enabled().unwrap());
        assert!(!af.is_continuous_focus_locked().unwrap());
    }

    #[test]
    fn test_save_then_fresh_load_round_trip() {
        let settings = Arc::new(MemorySettings::new());

        let mut first = counting(settings.clone());
        first.set_property_value("Gain", "42").unwrap();
        first.set_property_value("Mode", "Precise").unwrap();
        first.save_settings().unwrap();

        let mut second = counting(settings);
        assert_eq!(second.property_value("Gain").unwrap(), "10");
        second.initialize().unwrap();

        for name in first.property_names().unwrap() {
            assert_eq!(
                second.property_value(&name).unwrap(),
                first.property_value(&name).unwrap()
            );
        }
    }

    #[test]
    fn test_load_keeps_defaults_when_nothing_saved() {
        let mut af = counting(Arc::new(MemorySettings::new()));
        af.load_settings().unwrap();
        assert_eq!(af.property_value("Exposure").unwrap(), "50");
    }

    #[test]
    fn test_settings_namespaced_by_algorithm() {
        let settings = Arc::new(MemorySettings::new());
        let af = counting(settings.clone());
        af.save_settings().unwrap();

        assert_eq!(settings.get_string("CountingFocus", "Gain", "?"), "10");
        assert_eq!(settings.get_string("TrackingFocus", "Gain", "?"), "?");
    }
}
