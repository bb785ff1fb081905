//! Gallery Vault - Import Worker Pool
//!
//! Fixed set of scoped worker threads draining one pre-filled, closed job
//! queue. Each job is transcoded, sealed and written atomically; failures
//! are reported per job and never stop sibling workers.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::thread;

use crossbeam_channel::bounded;

use super::scanner::ImportJob;
use super::transcode::{transcode_file, TranscodeSettings};
use crate::crypto::Codec;
use crate::error::{VaultError, VaultResult};
use crate::storage::write_atomic;

/// One failed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    pub source: PathBuf,
    pub reason: String,
}

/// Aggregate outcome of a pool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<ImportFailure>,
}

struct JobOutcome {
    source: PathBuf,
    result: VaultResult<()>,
}

/// Import worker pool, created per import call
pub struct ImportPool<'a> {
    codec: &'a Codec,
    settings: TranscodeSettings,
    workers: usize,
}

impl<'a> ImportPool<'a> {
    pub fn new(codec: &'a Codec, settings: TranscodeSettings, workers: usize) -> Self {
        Self {
            codec,
            settings,
            workers: workers.max(1),
        }
    }

    /// Process every job; blocks until all workers have finished
    pub fn run(&self, jobs: Vec<ImportJob>) -> ImportReport {
        let attempted = jobs.len();
        if attempted == 0 {
            return ImportReport::default();
        }

        let (job_tx, job_rx) = bounded::<ImportJob>(attempted);
        let (result_tx, result_rx) = bounded::<JobOutcome>(attempted);

        for job in jobs {
            // Capacity equals the job count, so this never blocks
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);

        let workers = self.workers.min(attempted);
        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();

                scope.spawn(move || {
                    for job in job_rx.iter() {
                        let result = panic::catch_unwind(AssertUnwindSafe(|| self.process(&job)))
                            .unwrap_or_else(|_| {
                                Err(VaultError::TaskFailed("import worker panicked".into()))
                            });

                        let outcome = JobOutcome {
                            source: job.source,
                            result,
                        };
                        if result_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut report = ImportReport {
            attempted,
            ..Default::default()
        };

        for outcome in result_rx.iter() {
            match outcome.result {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    log::warn!("⚠️ Failed to import {}: {}", outcome.source.display(), e);
                    report.failures.push(ImportFailure {
                        source: outcome.source,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.failures.sort_by(|a, b| a.source.cmp(&b.source));
        report
    }

    fn process(&self, job: &ImportJob) -> VaultResult<()> {
        let encoded = transcode_file(&job.source, self.settings)?;
        let sealed = self.codec.encrypt(&encoded)?;
        write_atomic(&job.dest, &sealed)
    }
}
