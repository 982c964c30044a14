//! Bounded worker pool for ensembler calls.
//!
//! Ensembler code is blocking user code, so it runs on dedicated OS threads
//! fed through a crossbeam channel. Admission is limited by a semaphore of
//! `workers + queue_depth` permits; a permit is held until the worker has
//! finished the call, even when the waiting request was already dropped.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver, Sender};
use ensembler_plugin_common::{invoke, EnsembleInput, Ensembler, EnsemblerError, Headers, Value};
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::error::RequestError;

struct Job {
    input: EnsembleInput,
    headers: Option<Headers>,
    reply: oneshot::Sender<Result<Value, EnsemblerError>>,
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug)]
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    permits: Arc<Semaphore>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` threads (at least one) serving `ensembler`.
    pub fn start(
        ensembler: Arc<dyn Ensembler>,
        workers: usize,
        queue_depth: usize,
    ) -> std::io::Result<Self> {
        let workers = workers.max(1);
        let (sender, receiver) = channel::bounded::<Job>(workers + queue_depth);
        let handles = (0..workers)
            .map(|idx| {
                let receiver = receiver.clone();
                let ensembler = Arc::clone(&ensembler);
                std::thread::Builder::new()
                    .name(format!("ensembler-worker-{idx}"))
                    .spawn(move || worker_loop(ensembler.as_ref(), &receiver))
            })
            .collect::<std::io::Result<Vec<_>>>()?;
        debug!(workers, queue_depth, "Started ensembler worker pool");
        Ok(Self {
            sender: Some(sender),
            permits: Arc::new(Semaphore::new(workers + queue_depth)),
            workers: handles,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run the ensembler for one request, waiting for a permit when saturated.
    pub async fn run(
        &self,
        input: EnsembleInput,
        headers: Option<Headers>,
    ) -> Result<Value, RequestError> {
        let sender = self.sender.as_ref().ok_or(RequestError::PoolClosed)?;
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RequestError::PoolClosed)?;
        let (reply, response) = oneshot::channel();
        sender
            .send(Job {
                input,
                headers,
                reply,
                _permit: permit,
            })
            .map_err(|_| RequestError::PoolClosed)?;
        let result = response.await.map_err(|_| RequestError::PoolClosed)?;
        Ok(result?)
    }

    /// Stop accepting work and wait for queued jobs to finish.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.permits.close();
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Ensembler worker panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(ensembler: &dyn Ensembler, receiver: &Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        let result = invoke(ensembler, &job.input, job.headers.as_ref()).and_then(check_output);
        // The caller may have timed out; nobody is waiting then.
        let _ = job.reply.send(result);
    }
}

/// Reject values that cannot be written as JSON.
pub fn check_output(value: Value) -> Result<Value, EnsemblerError> {
    let mut stack = vec![&value];
    while let Some(current) = stack.pop() {
        match current {
            Value::Float(number) if !number.is_finite() => {
                return Err(EnsemblerError::Output(format!(
                    "{number} has no JSON representation"
                )));
            }
            Value::List(items) => stack.extend(items.iter()),
            Value::Map(row) => stack.extend(row.iter().map(|(_, value)| value)),
            _ => {}
        }
    }
    Ok(value)
}
