//! PropertyRegistry - ordered, name-keyed property storage.
//!
//! Backs the software-resident autofocus variant. Listing follows insertion
//! order; lookup is by name. Names are unique: creating or adding a property
//! whose name already exists replaces the old entry in place.
//!
//! Two write paths exist and they differ on purpose:
//!
//! - [`PropertyRegistry::set_value`] only updates an existing entry and fails
//!   with `UnknownProperty` otherwise.
//! - [`PropertyRegistry::set`] is an upsert and creates the entry when absent.
//!
//! Neither path validates against `allowed` or the numeric limits. Whether a
//! constraint is advisory or hard is the caller's call.

use crate::error::{AutofocusError, AutofocusResult};
use crate::property::PropertyItem;

/// Ordered collection of [`PropertyItem`] owned by one device or capability.
#[derive(Debug, Clone, Default)]
pub struct PropertyRegistry {
    owner: String,
    items: Vec<PropertyItem>,
}

impl PropertyRegistry {
    /// Create an empty registry whose entries are stamped with `owner`.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            items: Vec::new(),
        }
    }

    /// Owner identifier written into every created entry.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Insert or replace an empty-valued property.
    pub fn create(&mut self, name: impl Into<String>) {
        let item = PropertyItem::new(self.owner.clone(), name);
        self.upsert(item);
    }

    /// Insert or replace a property with an initial value.
    pub fn create_with_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let item = PropertyItem::new(self.owner.clone(), name).with_value(value);
        self.upsert(item);
    }

    /// Insert or replace a property restricted to `allowed` values.
    pub fn create_with_allowed<I, S>(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        allowed: I,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let item = PropertyItem::new(self.owner.clone(), name)
            .with_value(value)
            .with_allowed(allowed);
        self.upsert(item);
    }

    /// Insert or replace a fully specified property.
    ///
    /// The item is stored as given, including its `device` field.
    pub fn add(&mut self, item: PropertyItem) {
        self.upsert(item);
    }

    /// Look up a property by name.
    pub fn get(&self, name: &str) -> AutofocusResult<&PropertyItem> {
        self.position(name)
            .map(|idx| &self.items[idx])
            .ok_or_else(|| AutofocusError::UnknownProperty(name.to_string()))
    }

    /// Current value of a property.
    pub fn value(&self, name: &str) -> AutofocusResult<&str> {
        self.get(name).map(|item| item.value.as_str())
    }

    /// Update the value of an existing property.
    ///
    /// Fails with `UnknownProperty` when absent and `ReadOnlyProperty` when the
    /// entry is read-only. No constraint validation is performed.
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> AutofocusResult<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| AutofocusError::UnknownProperty(name.to_string()))?;
        let item = &mut self.items[idx];
        if item.read_only {
            return Err(AutofocusError::ReadOnlyProperty(name.to_string()));
        }
        item.value = value.into();
        Ok(())
    }

    /// Insert or replace by `item.name`. Creates the entry when absent.
    pub fn set(&mut self, item: PropertyItem) {
        self.upsert(item);
    }

    /// Snapshot of every property in insertion order.
    pub fn list(&self) -> Vec<PropertyItem> {
        self.items.clone()
    }

    /// Property names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|item| item.name.clone()).collect()
    }

    /// True when a property with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no properties are registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PropertyItem> {
        self.items.iter()
    }

    /// Iterate mutably in insertion order. Bypasses read-only checks.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut PropertyItem> {
        self.items.iter_mut()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|item| item.name == name)
    }

    fn upsert(&mut self, item: PropertyItem) {
        match self.position(&item.name) {
            Some(idx) => self.items[idx] = item,
            None => self.items.push(item),
        }
    }
}
