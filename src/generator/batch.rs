use crate::{
    config::GeneratorConfig,
    error::{DndigError, Result},
    files,
    gemini::ImageStreamer,
    generator::{
        session::{GenerationSession, SlotReservation},
        store::ImageStore,
    },
    models::{ChunkEvent, GenerationRequest},
};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Saved images in completion order.
    pub saved_files: Vec<PathBuf>,
    /// Streaming calls started.
    pub attempts: usize,
    /// Calls that ended with an error.
    pub failed_workers: usize,
}

/// Drives a bounded pool of streaming calls until the batch is filled or
/// the attempt budget is spent.
pub struct BatchOrchestrator {
    client: Arc<dyn ImageStreamer>,
    store: Arc<dyn ImageStore>,
    config: GeneratorConfig,
}

#[derive(Clone)]
struct WorkerContext {
    client: Arc<dyn ImageStreamer>,
    store: Arc<dyn ImageStore>,
    request: Arc<GenerationRequest>,
    session: Arc<GenerationSession>,
}

impl BatchOrchestrator {
    pub fn new(
        client: Arc<dyn ImageStreamer>,
        store: Arc<dyn ImageStore>,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    pub async fn run(
        &self,
        request: Arc<GenerationRequest>,
        session: Arc<GenerationSession>,
    ) -> Result<BatchOutcome> {
        let batch_size = request.batch_size();
        let effective_workers = self.config.effective_workers(batch_size);
        let budget = self.config.attempt_budget(batch_size);

        log::debug!(
            "Using {} workers for batch of {} (attempt budget {})",
            effective_workers,
            batch_size,
            budget
        );

        let ctx = WorkerContext {
            client: Arc::clone(&self.client),
            store: Arc::clone(&self.store),
            request,
            session: Arc::clone(&session),
        };

        let mut pool = JoinSet::new();
        let mut attempts = 0;
        let mut failed_workers = 0;

        for _ in 0..effective_workers {
            attempts += 1;
            pool.spawn(run_worker(ctx.clone(), attempts));
        }

        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(Ok(produced)) => log::debug!("Worker finished with {} image(s)", produced),
                Ok(Err(e)) => {
                    failed_workers += 1;
                    log::error!("Worker failed: {}", e);
                }
                Err(e) => {
                    failed_workers += 1;
                    log::error!("Worker task ended abnormally: {}", e);
                }
            }

            if session.saved_count() >= batch_size as usize {
                break;
            }

            if session.images_saved() < batch_size && attempts < budget {
                attempts += 1;
                log::debug!("Submitting replacement worker {}", attempts);
                pool.spawn(run_worker(ctx.clone(), attempts));
            }
        }

        // Every slot is committed at this point, so nothing left in flight
        // holds a reservation.
        pool.shutdown().await;

        let saved_files = session.saved_file_paths();
        if saved_files.is_empty() {
            return Err(DndigError::GenerationExhausted(format!(
                "No images were generated after {} attempt(s)",
                attempts
            )));
        }
        if saved_files.len() < batch_size as usize {
            log::warn!(
                "Generated {} of {} requested image(s)",
                saved_files.len(),
                batch_size
            );
        }

        Ok(BatchOutcome {
            saved_files,
            attempts,
            failed_workers,
        })
    }
}

async fn run_worker(ctx: WorkerContext, worker_id: usize) -> Result<usize> {
    let batch_size = ctx.request.batch_size();
    let mut stream = ctx.client.stream_generate(&ctx.request).await?;
    let mut produced = 0;

    while let Some(event) = stream.next().await {
        let (data, mime_type) = match event? {
            ChunkEvent::NoImage => continue,
            ChunkEvent::Image { data, mime_type } => (data, mime_type),
        };

        let Some(reservation) = ctx.session.try_reserve(batch_size) else {
            log::debug!("Worker {} stopping, batch already complete", worker_id);
            return Ok(produced);
        };

        match ctx.persist(reservation, &data, &mime_type).await {
            Ok(path) => {
                produced += 1;
                log::debug!("Worker {} saved {}", worker_id, path.display());
                if ctx.session.saved_count() >= batch_size as usize {
                    return Ok(produced);
                }
            }
            Err(e) => log::warn!("Worker {} could not save image: {}", worker_id, e),
        }
    }

    Ok(produced)
}

impl WorkerContext {
    async fn persist(
        &self,
        reservation: SlotReservation<'_>,
        data: &[u8],
        mime_type: &str,
    ) -> Result<PathBuf> {
        let staged = self.store.stage(data).await?;

        let title = self.request.title();
        let timestamp = self.session.timestamp();
        let committed = reservation.commit(|index| {
            let file_name = files::image_file_name(title, timestamp, index, mime_type);
            self.store.publish(&staged, &file_name)
        });

        match committed {
            Ok((_, path)) => Ok(path),
            Err(e) => {
                self.store.discard(&staged).await;
                Err(e)
            }
        }
    }
}
