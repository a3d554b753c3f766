//! Config-driven engine manager

use async_trait::async_trait;
use sdgrpc_domain::{
    EngineDescriptor, EngineError, EngineKind, EngineManager, Generation, GenerationRequest,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{self, EngineSpec};
use crate::pipeline::Pipeline;
use crate::ManagerError;

/// Owner string reported for every configured engine
pub const ENGINE_OWNER: &str = "stable-diffusion-grpcserver";

/// One configured engine and the pipeline serving it
struct EngineSlot {
    spec: EngineSpec,
    pipeline: Option<Arc<dyn Pipeline>>,
    /// Held for the duration of a run; one generation per engine at a time
    busy: Mutex<()>,
}

impl EngineSlot {
    fn is_ready(&self) -> bool {
        self.spec.enabled && self.pipeline.is_some()
    }

    fn descriptor(&self) -> EngineDescriptor {
        EngineDescriptor {
            id: self.spec.id.clone(),
            name: self.spec.name.clone(),
            description: self.spec.description.clone(),
            kind: EngineKind::Picture,
            owner: ENGINE_OWNER.to_string(),
            ready: self.is_ready(),
            is_default: self.spec.default,
        }
    }
}

/// Engine manager built from the engines document
///
/// Pipelines are attached by class name with [`with_pipeline`] before the
/// manager is shared. After that the manager is immutable apart from the
/// per-engine run locks, so it can be called from both transports at once.
///
/// [`with_pipeline`]: ConfiguredEngineManager::with_pipeline
///
/// # Examples
///
/// ```
/// use sdgrpc_engine::{ConfiguredEngineManager, EngineSpec};
/// use sdgrpc_domain::EngineManager;
///
/// let manager = ConfiguredEngineManager::from_specs(vec![
///     EngineSpec::new("sd-v1-5", "UnifiedPipeline").as_default(),
/// ])
/// .unwrap();
///
/// // No pipeline attached yet, so the engine is listed but not ready
/// let engines = manager.list_engines();
/// assert_eq!(engines.len(), 1);
/// assert!(!engines[0].ready);
/// ```
pub struct ConfiguredEngineManager {
    slots: Vec<EngineSlot>,
    index: HashMap<String, usize>,
}

impl ConfiguredEngineManager {
    /// Build a manager from already parsed engine specs
    pub fn from_specs(specs: Vec<EngineSpec>) -> Result<Self, ManagerError> {
        config::validate_engines(&specs)?;

        let index = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.id.clone(), i))
            .collect();
        let slots = specs
            .into_iter()
            .map(|spec| EngineSlot {
                spec,
                pipeline: None,
                busy: Mutex::new(()),
            })
            .collect();

        Ok(Self { slots, index })
    }

    /// Build a manager from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ManagerError> {
        Self::from_specs(config::parse_engines(yaml)?)
    }

    /// Build a manager from an engines document on disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ManagerError> {
        let specs = config::load_engines(path.as_ref())?;
        info!(
            path = %path.as_ref().display(),
            engines = specs.len(),
            "Loaded engines document"
        );
        Self::from_specs(specs)
    }

    /// Attach a pipeline to every engine whose `class` matches
    pub fn with_pipeline(mut self, class: &str, pipeline: Arc<dyn Pipeline>) -> Self {
        let mut attached = 0;
        for slot in self.slots.iter_mut().filter(|s| s.spec.class == class) {
            slot.pipeline = Some(Arc::clone(&pipeline));
            attached += 1;
        }
        if attached == 0 {
            warn!(class, "Pipeline registered for a class no engine uses");
        }
        self
    }

    /// Number of configured engines, visible or not
    pub fn engine_count(&self) -> usize {
        self.slots.len()
    }

    /// Engine used when a request names none
    ///
    /// The engine flagged `default`, else the first enabled engine.
    fn default_slot(&self) -> Option<&EngineSlot> {
        self.slots
            .iter()
            .find(|s| s.spec.default)
            .or_else(|| self.slots.iter().find(|s| s.spec.enabled))
    }

    fn resolve(&self, engine_id: Option<&str>) -> Result<&EngineSlot, EngineError> {
        match engine_id {
            Some(id) => self
                .index
                .get(id)
                .map(|&i| &self.slots[i])
                .ok_or_else(|| EngineError::UnknownEngine(id.to_string())),
            None => self.default_slot().ok_or(EngineError::NoDefaultEngine),
        }
    }
}

#[async_trait]
impl EngineManager for ConfiguredEngineManager {
    fn list_engines(&self) -> Vec<EngineDescriptor> {
        self.slots
            .iter()
            .filter(|s| s.spec.visible)
            .map(EngineSlot::descriptor)
            .collect()
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, EngineError> {
        let slot = self.resolve(request.engine_id.as_deref())?;
        let engine_id = slot.spec.id.clone();

        let pipeline = match (&slot.pipeline, slot.spec.enabled) {
            (Some(pipeline), true) => Arc::clone(pipeline),
            _ => return Err(EngineError::NotReady(engine_id)),
        };

        request.params.validate()?;

        let _busy = slot.busy.lock().await;
        debug!(
            engine = %engine_id,
            request_id = %request.request_id,
            samples = request.params.samples,
            "Running generation"
        );

        let images = pipeline
            .run(&slot.spec, &request)
            .await
            .map_err(|e| EngineError::Pipeline {
                engine: engine_id.clone(),
                message: format!("{e:#}"),
            })?;

        Ok(Generation { engine_id, images })
    }
}
