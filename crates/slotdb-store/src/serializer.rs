//! Value serializer registry
//!
//! Stores hold raw bytes. Applications that encode typed values register the
//! serializers they used so that readers can pick matching decoders; the
//! writer only records each serializer's descriptor in the file metadata.

use std::fmt;
use std::sync::Arc;

/// A pluggable value encoder/decoder
///
/// The writer never calls into a serializer; it only records
/// [`value_type`](Self::value_type) and [`name`](Self::name).
pub trait ValueSerializer: Send + Sync {
    /// Stable name of the serializer implementation
    fn name(&self) -> &str;

    /// Name of the value type this serializer handles
    fn value_type(&self) -> &str;
}

/// Serializer entry as recorded in store metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerializerDescriptor {
    /// Handled value type
    pub value_type: String,
    /// Serializer name
    pub serializer: String,
}

/// Ordered set of serializers, at most one per value type
#[derive(Clone, Default)]
pub struct SerializerRegistry {
    serializers: Vec<Arc<dyn ValueSerializer>>,
}

impl SerializerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a serializer, replacing any previous one for the same value type
    pub fn register<S: ValueSerializer + 'static>(&mut self, serializer: S) {
        self.register_shared(Arc::new(serializer));
    }

    /// Register an already shared serializer
    pub fn register_shared(&mut self, serializer: Arc<dyn ValueSerializer>) {
        if let Some(existing) = self
            .serializers
            .iter_mut()
            .find(|s| s.value_type() == serializer.value_type())
        {
            *existing = serializer;
        } else {
            self.serializers.push(serializer);
        }
    }

    /// Serializer registered for `value_type`
    pub fn get(&self, value_type: &str) -> Option<&Arc<dyn ValueSerializer>> {
        self.serializers.iter().find(|s| s.value_type() == value_type)
    }

    /// Number of registered serializers
    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    /// Whether no serializer is registered
    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }

    /// Descriptors in registration order
    pub fn descriptors(&self) -> Vec<SerializerDescriptor> {
        self.serializers
            .iter()
            .map(|s| SerializerDescriptor {
                value_type: s.value_type().to_string(),
                serializer: s.name().to_string(),
            })
            .collect()
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.descriptors()).finish()
    }
}

impl PartialEq for SerializerRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.descriptors() == other.descriptors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, &'static str);

    impl ValueSerializer for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn value_type(&self) -> &str {
            self.1
        }
    }

    #[test]
    fn test_register_replaces_same_type() {
        let mut registry = SerializerRegistry::new();
        assert!(registry.is_empty());

        registry.register(Named("point-v1", "geo.Point"));
        registry.register(Named("color", "gfx.Color"));
        registry.register(Named("point-v2", "geo.Point"));

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("geo.Point").map(|s| s.name().to_string()),
            Some("point-v2".to_string())
        );
        assert_eq!(
            registry.descriptors(),
            vec![
                SerializerDescriptor {
                    value_type: "geo.Point".to_string(),
                    serializer: "point-v2".to_string(),
                },
                SerializerDescriptor {
                    value_type: "gfx.Color".to_string(),
                    serializer: "color".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_registry_equality_by_descriptor() {
        let mut a = SerializerRegistry::new();
        a.register(Named("color", "gfx.Color"));
        let mut b = SerializerRegistry::new();
        b.register(Named("color", "gfx.Color"));

        assert_eq!(a, b);
        assert_ne!(a, SerializerRegistry::new());
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }
}
