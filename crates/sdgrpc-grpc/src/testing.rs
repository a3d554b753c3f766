//! Test doubles shared by the unit tests of this crate

use async_trait::async_trait;
use sdgrpc_domain::{
    EngineDescriptor, EngineError, EngineManager, GeneratedImage, Generation, GenerationRequest,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Manager that echoes prompts back as image bytes
///
/// Prompt `"fail"` yields a pipeline error and prompt `"panic"` panics.
#[derive(Default)]
pub struct MockManager;

#[async_trait]
impl EngineManager for MockManager {
    fn list_engines(&self) -> Vec<EngineDescriptor> {
        let mut engine = EngineDescriptor::new("mock", "Mock Engine");
        engine.is_default = true;
        vec![engine]
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, EngineError> {
        let prompt = request.positive_prompt();
        match prompt.as_str() {
            "fail" => Err(EngineError::Pipeline {
                engine: "mock".to_string(),
                message: "requested failure".to_string(),
            }),
            "panic" => panic!("requested panic"),
            _ => Ok(Generation {
                engine_id: "mock".to_string(),
                images: request
                    .params
                    .seeds
                    .iter()
                    .map(|&seed| GeneratedImage::png(seed, prompt.clone().into_bytes()))
                    .collect(),
            }),
        }
    }
}

/// Sets its flag when dropped
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Manager whose generations stall far longer than any test runs
///
/// `started` is set once a generation is running, `abandoned` once its
/// future has been dropped.
#[derive(Default)]
pub struct StalledManager {
    pub started: Arc<AtomicBool>,
    pub abandoned: Arc<AtomicBool>,
}

#[async_trait]
impl EngineManager for StalledManager {
    fn list_engines(&self) -> Vec<EngineDescriptor> {
        vec![EngineDescriptor::new("stalled", "Stalled Engine")]
    }

    async fn generate(&self, _request: GenerationRequest) -> Result<Generation, EngineError> {
        let _flag = DropFlag(Arc::clone(&self.abandoned));
        self.started.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Generation {
            engine_id: "stalled".to_string(),
            images: Vec::new(),
        })
    }
}

/// Wait up to two seconds for `flag` to be set
pub async fn wait_for(flag: &AtomicBool) -> bool {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !flag.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}
