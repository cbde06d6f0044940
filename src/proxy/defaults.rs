//! Structural defaults: fabricated empty payloads per resource kind.
//!
//! Served only when upstream answered 403 and no cached copy exists at all.
//! They are never cached and always flagged with `X-Proxy-Default`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::StructuralDefaultsConfig;
use crate::proxy::error::ProxyError;
use crate::proxy::policy::ResourceKind;

#[derive(Debug, Clone, Default)]
pub struct StructuralDefaults {
    shapes: HashMap<ResourceKind, Arc<Value>>,
}

impl StructuralDefaults {
    /// Resolve the configured kind names. Unknown names are a configuration error.
    pub fn from_config(config: &StructuralDefaultsConfig) -> Result<Self, ProxyError> {
        if !config.enabled {
            return Ok(Self::default());
        }
        let mut shapes = HashMap::with_capacity(config.shapes.len());
        for shape in &config.shapes {
            let kind = ResourceKind::from_name(&shape.kind).ok_or_else(|| {
                ProxyError::Config(format!("structural_defaults: unknown kind '{}'", shape.kind))
            })?;
            shapes.insert(kind, Arc::new(shape.body.clone()));
        }
        Ok(Self { shapes })
    }

    pub fn shape_for(&self, kind: ResourceKind) -> Option<Arc<Value>> {
        self.shapes.get(&kind).cloned()
    }
}
