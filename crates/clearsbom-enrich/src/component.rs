//! The component seam.
//!
//! The engine annotates caller-owned component records and presumes
//! exactly one capability on them: adding a named string property.
//! Anything richer (CycloneDX models, purl identities, hashes) lives
//! with the caller.

use parking_lot::Mutex;

/// A caller-owned SBOM component record the engine can annotate.
///
/// Implementations must be thread-safe; annotation happens on worker
/// tasks. The engine never adds the same property twice for a single
/// request, but a caller submitting one component against several URIs
/// must accept interleaved annotations.
pub trait Component: Send + Sync {
    /// Attach a named string property to the component.
    fn add_property(&self, name: &str, value: &str);
}

/// Minimal [`Component`]: a name plus an ordered property list.
///
/// Sufficient for tests and for callers that only need the annotations
/// back out.
#[derive(Debug, Default)]
pub struct SimpleComponent {
    name: String,
    properties: Mutex<Vec<(String, String)>>,
}

impl SimpleComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First value recorded under `name`, if any.
    pub fn property(&self, name: &str) -> Option<String> {
        self.properties
            .lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    /// All properties in insertion order.
    pub fn properties(&self) -> Vec<(String, String)> {
        self.properties.lock().clone()
    }
}

impl Component for SimpleComponent {
    fn add_property(&self, name: &str, value: &str) {
        self.properties
            .lock()
            .push((name.to_string(), value.to_string()));
    }
}
