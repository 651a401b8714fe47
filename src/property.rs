//! PropertyItem - a single named, text-valued, optionally constrained setting.
//!
//! Values are carried as text so numeric, enumerated and free-form settings
//! marshal the same way. Constraints (`allowed`, limits) are descriptive: they
//! tell the caller what the owner accepts, nothing in this layer enforces them.
//!
//! # Example
//!
//! ```rust
//! use autofocus_core::property::PropertyItem;
//!
//! let offset = PropertyItem::new("ZStage", "Offset")
//!     .with_value("0")
//!     .with_limits(-100.0, 100.0);
//!
//! assert!(offset.has_limits());
//! assert_eq!(offset.lower_limit, Some(-100.0));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single named configuration value exposed by a device or capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyItem {
    /// Identifier of the owning device or capability instance.
    pub device: String,
    /// Property name, unique per owner.
    pub name: String,
    /// Current value as text.
    pub value: String,
    /// Legal values in display order. Empty means unconstrained.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
    /// Lower numeric bound, if the property is range constrained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_limit: Option<f64>,
    /// Upper numeric bound, if the property is range constrained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_limit: Option<f64>,
    /// Value writes must fail when set.
    #[serde(default)]
    pub read_only: bool,
}

impl PropertyItem {
    /// Create an unconstrained property with an empty value.
    pub fn new(device: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the current value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Restrict the property to a finite set of values.
    pub fn with_allowed<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = allowed.into_iter().map(Into::into).collect();
        self
    }

    /// Attach inclusive numeric bounds.
    pub fn with_limits(mut self, lower: f64, upper: f64) -> Self {
        self.lower_limit = Some(lower);
        self.upper_limit = Some(upper);
        self
    }

    /// Mark the property read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// True when either numeric bound is present.
    pub fn has_limits(&self) -> bool {
        self.lower_limit.is_some() || self.upper_limit.is_some()
    }

    /// Advisory check against the allowed set. Always true when unconstrained.
    pub fn is_allowed(&self, value: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|a| a == value)
    }
}

impl fmt::Display for PropertyItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} = {}", self.device, self.name, self.value)?;
        if self.read_only {
            write!(f, " (read-only)")?;
        }
        match (self.lower_limit, self.upper_limit) {
            (Some(lo), Some(hi)) => write!(f, " [{lo}, {hi}]")?,
            (Some(lo), None) => write!(f, " [{lo}, ..)")?,
            (None, Some(hi)) => write!(f, " (.., {hi}]")?,
            (None, None) => {}
        }
        if !self.allowed.is_empty() {
            write!(f, " {{{}}}", self.allowed.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let p = PropertyItem::new("OughtaFocus", "Mode")
            .with_value("Fast")
            .with_allowed(["Fast", "Precise"]);

        assert_eq!(p.device, "OughtaFocus");
        assert_eq!(p.value, "Fast");
        assert!(p.is_allowed("Precise"));
        assert!(!p.is_allowed("Slow"));
        assert!(!p.has_limits());
        assert!(!p.read_only);
    }

    #[test]
    fn test_unconstrained_accepts_anything() {
        let p = PropertyItem::new("dev", "Free");
        assert!(p.is_allowed("whatever"));
    }

    #[test]
    fn test_display() {
        let p = PropertyItem::new("ZStage", "Offset")
            .with_value("3")
            .with_limits(-100.0, 100.0)
            .read_only();
        assert_eq!(p.to_string(), "ZStage.Offset = 3 (read-only) [-100, 100]");
    }

    #[test]
    fn test_serialize_skips_empty_constraints() {
        let p = PropertyItem::new("dev", "Gain").with_value("10");
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("allowed").is_none());
        assert!(json.get("lower_limit").is_none());
        assert_eq!(json["value"], "10");
    }
}
