//! GenerationService implementation

use futures::FutureExt;
use sdgrpc_domain::{EngineManager, Generation};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::conversions::{
    generation_request_from_proto, image_to_artifact, status_from_engine_error,
};
use crate::proto;
use crate::proto::generation_service_server::GenerationService;

/// Answers buffered ahead of a slow client
const ANSWER_BUFFER: usize = 4;

/// Milliseconds since the Unix epoch
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Implementation of the GenerationService
pub struct GenerationServiceImpl {
    manager: Arc<dyn EngineManager>,
}

impl GenerationServiceImpl {
    /// Create a new service instance bound to the manager
    pub fn new(manager: Arc<dyn EngineManager>) -> Self {
        Self { manager }
    }
}

/// One answer per generated image, in sample order
fn answers(generation: Generation, request_id: &str, received: u64) -> Vec<proto::Answer> {
    let engine_id = generation.engine_id;
    generation
        .images
        .into_iter()
        .enumerate()
        .map(|(index, image)| proto::Answer {
            answer_id: Uuid::now_v7().to_string(),
            request_id: request_id.to_string(),
            received,
            created: unix_millis(),
            meta: Some(proto::AnswerMeta {
                engine_id: Some(engine_id.clone()),
                ..Default::default()
            }),
            artifacts: vec![image_to_artifact(image, index as u32)],
        })
        .collect()
}

#[tonic::async_trait]
impl GenerationService for GenerationServiceImpl {
    type GenerateStream = ReceiverStream<Result<proto::Answer, Status>>;

    async fn generate(
        &self,
        request: Request<proto::Request>,
    ) -> Result<Response<Self::GenerateStream>, Status> {
        let received = unix_millis();
        let mut generation = generation_request_from_proto(request.into_inner())?;
        if generation.request_id.is_empty() {
            generation.request_id = Uuid::now_v7().to_string();
        }
        let request_id = generation.request_id.clone();

        debug!(
            request_id = %request_id,
            engine = ?generation.engine_id,
            samples = generation.params.samples,
            "Generation requested"
        );

        let (tx, rx) = mpsc::channel(ANSWER_BUFFER);
        let manager = Arc::clone(&self.manager);

        tokio::spawn(async move {
            let run = AssertUnwindSafe(manager.generate(generation)).catch_unwind();

            // Dropping `run` abandons the generation when the caller goes away
            let outcome = tokio::select! {
                outcome = run => outcome,
                () = tx.closed() => {
                    debug!(request_id = %request_id, "Caller disconnected, generation abandoned");
                    return;
                }
            };

            match outcome {
                Ok(Ok(generation)) => {
                    for answer in answers(generation, &request_id, received) {
                        if tx.send(Ok(answer)).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!(request_id = %request_id, error = %e, "Generation failed");
                    let _ = tx.send(Err(status_from_engine_error(&e))).await;
                }
                Err(_) => {
                    error!(request_id = %request_id, "Engine manager panicked during generation");
                    let _ = tx
                        .send(Err(Status::internal("Engine manager panicked during generation")))
                        .await;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
