use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::csv::{ParsedCsv, Row, parse_bytes};
use crate::domain::DVError;
use crate::insights::{InsightService, request_insights};

pub type JobId = u64;

#[derive(Debug)]
pub enum JobResult {
    Loaded {
        job: JobId,
        path: PathBuf,
        result: Result<ParsedCsv, DVError>,
        duration_ms: u128,
    },
    Insights {
        job: JobId,
        result: Result<Vec<String>, DVError>,
    },
}

/// Runs file loads and insight calls off the UI thread. Results come back
/// over a channel tagged with the id of the job that produced them.
pub struct Worker {
    tx: Sender<JobResult>,
    rx: Receiver<JobResult>,
    next_job: JobId,
}

impl Default for Worker {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            next_job: 0,
        }
    }
}

impl Worker {
    fn next_id(&mut self) -> JobId {
        self.next_job += 1;
        self.next_job
    }

    pub fn spawn_load(&mut self, path: PathBuf) -> JobId {
        let job = self.next_id();
        let tx = self.tx.clone();
        debug!("Spawning load job {job} for {}", path.display());
        thread::spawn(move || {
            let start_time = Instant::now();
            let result = fs::read(&path)
                .map_err(DVError::FileReadError)
                .and_then(|bytes| parse_bytes(&bytes));
            let duration_ms = start_time.elapsed().as_millis();
            info!("Load job {job} finished in {duration_ms}ms");
            // The receiver only goes away when the session ends.
            let _ = tx.send(JobResult::Loaded {
                job,
                path,
                result,
                duration_ms,
            });
        });
        job
    }

    pub fn spawn_insights(
        &mut self,
        service: Arc<dyn InsightService>,
        headers: Arc<Vec<String>>,
        rows: Arc<Vec<Row>>,
    ) -> JobId {
        let job = self.next_id();
        let tx = self.tx.clone();
        debug!("Spawning insight job {job} for {} rows", rows.len());
        thread::spawn(move || {
            let result = request_insights(service.as_ref(), &headers, &rows);
            let _ = tx.send(JobResult::Insights { job, result });
        });
        job
    }

    pub fn try_recv(&self) -> Option<JobResult> {
        let result = self.rx.try_recv().ok();
        if result.is_some() {
            trace!("Received background job result");
        }
        result
    }

    #[cfg(test)]
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<JobResult> {
        self.rx.recv_timeout(timeout).ok()
    }
}
