//! # Worker Loop
//!
//! Polls every consumer in turn, runs each unit of work under a wall-clock limit
//! and sleeps between cycles until shutdown is signalled.

use super::consumer::Consumer;
use crate::config::WorkerConfig;
use crate::constants::log_keys;
use crate::error::QtmError;
use crate::log_context;
use crate::logging::Logger;
use crate::messaging::ReceiveOptions;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Pause after a cycle that found no work
    pub sleep: Duration,
    /// Wall-clock limit per unit of work
    pub work_timeout: Duration,
    pub receive: ReceiveOptions,
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            sleep: config.sleep(),
            work_timeout: config.work_timeout(),
            receive: ReceiveOptions {
                messages_to_receive: config.messages_to_receive,
                message_visibility_timeout: config.message_visibility_timeout_seconds,
                receive_wait_time: config.receive_wait_seconds,
            },
        }
    }
}

/// Outcome counts of one pass over all consumers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub processed: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// The cycle ended early on a broken database connection
    pub aborted: bool,
}

pub struct Worker {
    consumers: Vec<Arc<dyn Consumer>>,
    settings: WorkerSettings,
    logger: Arc<dyn Logger>,
}

impl Worker {
    pub fn new(consumers: Vec<Arc<dyn Consumer>>, settings: WorkerSettings, logger: Arc<dyn Logger>) -> Self {
        Self {
            consumers,
            settings,
            logger,
        }
    }

    /// Run cycles until `shutdown` turns true or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        self.logger.info(
            "Worker started",
            &log_context! { "consumers" => self.consumers.iter().map(|c| c.name()).collect::<Vec<_>>() },
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_cycle(&shutdown).await;
            if *shutdown.borrow() {
                break;
            }
            if report.fetched > 0 && !report.aborted {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.sleep) => {},
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.logger.info("Worker stopped", &log_context!());
    }

    /// One pass over every consumer; shutdown is checked between units
    pub async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let mut report = CycleReport::default();

        for consumer in &self.consumers {
            if *shutdown.borrow() {
                break;
            }

            let work = match consumer.fetch_work(&self.settings.receive).await {
                Ok(work) => work,
                Err(e) => {
                    if self.fail(consumer.as_ref(), &e) {
                        report.aborted = true;
                        return report;
                    }
                    continue;
                }
            };
            report.fetched += work.len();

            for message in work {
                if *shutdown.borrow() {
                    return report;
                }

                let started = Instant::now();
                let message_id = message.id();
                match tokio::time::timeout(self.settings.work_timeout, consumer.run(message)).await {
                    Ok(Ok(())) => {
                        report.processed += 1;
                        self.logger.info(
                            "** Work unit - finished",
                            &log_context! {
                                log_keys::PROCESS => consumer.name(),
                                log_keys::MESSAGE_ID => message_id,
                                log_keys::EXECUTION_TIME => started.elapsed().as_secs_f64(),
                            },
                        );
                    }
                    Ok(Err(e)) => {
                        report.failed += 1;
                        if self.fail(consumer.as_ref(), &e) {
                            report.aborted = true;
                            return report;
                        }
                    }
                    Err(_) => {
                        report.timed_out += 1;
                        self.logger.error(
                            "Work unit exceeded its time limit",
                            &log_context! {
                                log_keys::PROCESS => consumer.name(),
                                log_keys::MESSAGE_ID => message_id,
                                "timeout_seconds" => self.settings.work_timeout.as_secs(),
                            },
                        );
                    }
                }
            }
        }

        report
    }

    /// Log a failure; returns true when the cycle must end
    fn fail(&self, consumer: &dyn Consumer, error: &QtmError) -> bool {
        let context = log_context! { log_keys::PROCESS => consumer.name(), "error" => error.to_string() };
        if error.is_connection_broken() {
            self.logger.critical("Database connection broken, ending work cycle", &context);
            true
        } else {
            self.logger.error("Work unit failed", &context);
            false
        }
    }
}
