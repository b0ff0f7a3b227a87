//! Driver registry
//!
//! Holds named driver implementations per category. Plugins register a
//! descriptor plus an operation object at startup (or dynamically); the
//! engines look drivers up by (category, name) or by the category default.

use crate::driver::{DriverCategory, DriverDescriptor, DriverOps};
use crate::error::{MediaError, MediaResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A registered driver. Engines hold these by `Arc` while an instance is
/// bound; the bind count blocks unregistration of a live driver.
pub struct DriverEntry {
    pub descriptor: DriverDescriptor,
    ops: DriverOps,
    bindings: AtomicUsize,
}

impl DriverEntry {
    pub fn ops(&self) -> &DriverOps {
        &self.ops
    }

    pub fn player(&self) -> Option<&Arc<dyn crate::driver::PlayerDriver>> {
        match &self.ops {
            DriverOps::Player(d) => Some(d),
            _ => None,
        }
    }

    pub fn pcm(&self) -> Option<&Arc<dyn crate::driver::PcmDriver>> {
        match &self.ops {
            DriverOps::Pcm(d) => Some(d),
            _ => None,
        }
    }

    pub fn decoder(&self) -> Option<&Arc<dyn crate::driver::DecoderDriver>> {
        match &self.ops {
            DriverOps::Decoder(d) => Some(d),
            _ => None,
        }
    }

    pub fn recorder(&self) -> Option<&Arc<dyn crate::driver::RecorderDriver>> {
        match &self.ops {
            DriverOps::Recorder(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn bind(&self) {
        self.bindings.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn unbind(&self) {
        self.bindings.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn bindings(&self) -> usize {
        self.bindings.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<(DriverCategory, String), Arc<DriverEntry>>,
    defaults: HashMap<DriverCategory, String>,
}

/// Registry of driver plugins, one namespace per category.
#[derive(Default)]
pub struct DriverRegistry {
    inner: Mutex<RegistryInner>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver. Fails with `DuplicateName` if the (category,
    /// name) pair exists. A driver marked default replaces the prior
    /// default for its category under the same lock; the first driver of a
    /// category becomes default either way.
    pub fn register(&self, descriptor: DriverDescriptor, ops: DriverOps) -> MediaResult<()> {
        if descriptor.category != ops.category() {
            return Err(MediaError::Configuration(format!(
                "descriptor category {} does not match ops category {}",
                descriptor.category,
                ops.category()
            )));
        }

        let mut inner = self.inner.lock();
        let key = (descriptor.category, descriptor.name.clone());
        if inner.entries.contains_key(&key) {
            return Err(MediaError::DuplicateName {
                category: descriptor.category,
                name: descriptor.name,
            });
        }

        let category = descriptor.category;
        let name = descriptor.name.clone();
        let make_default =
            descriptor.default_driver || !inner.defaults.contains_key(&category);

        inner.entries.insert(
            key,
            Arc::new(DriverEntry {
                descriptor,
                ops,
                bindings: AtomicUsize::new(0),
            }),
        );
        if make_default {
            inner.defaults.insert(category, name.clone());
        }

        tracing::info!(
            target: "voxkit::media",
            category = %category,
            driver = %name,
            default = make_default,
            "Driver registered"
        );
        Ok(())
    }

    /// Unregister a driver. Fails with `InUse` while any live instance is
    /// bound to it, so references never dangle.
    pub fn unregister(&self, category: DriverCategory, name: &str) -> MediaResult<()> {
        let mut inner = self.inner.lock();
        let key = (category, name.to_string());
        let entry = inner
            .entries
            .get(&key)
            .ok_or_else(|| MediaError::NotFound(format!("driver {category}/{name}")))?;

        let bindings = entry.bindings();
        if bindings > 0 {
            return Err(MediaError::InUse {
                name: name.to_string(),
                bindings,
            });
        }

        inner.entries.remove(&key);
        if inner.defaults.get(&category).map(String::as_str) == Some(name) {
            inner.defaults.remove(&category);
        }
        tracing::info!(
            target: "voxkit::media",
            category = %category,
            driver = name,
            "Driver unregistered"
        );
        Ok(())
    }

    /// Look up a driver by name, or the category default when `name` is
    /// `None`. The returned handle is non-owning with respect to the
    /// registry; binding is the engines' concern.
    pub fn find(
        &self,
        category: DriverCategory,
        name: Option<&str>,
    ) -> MediaResult<Arc<DriverEntry>> {
        let inner = self.inner.lock();
        let name = match name {
            Some(n) => n.to_string(),
            None => inner
                .defaults
                .get(&category)
                .cloned()
                .ok_or_else(|| MediaError::NotFound(format!("default {category} driver")))?,
        };
        inner
            .entries
            .get(&(category, name.clone()))
            .cloned()
            .ok_or_else(|| MediaError::NotFound(format!("driver {category}/{name}")))
    }

    /// Descriptors currently registered for a category.
    pub fn list(&self, category: DriverCategory) -> Vec<DriverDescriptor> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|((c, _), _)| *c == category)
            .map(|(_, e)| e.descriptor.clone())
            .collect()
    }

    /// Name of the current default for a category, if any.
    pub fn default_name(&self, category: DriverCategory) -> Option<String> {
        self.inner.lock().defaults.get(&category).cloned()
    }
}
