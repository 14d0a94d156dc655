//! Job name to consumer factory lookup, populated at startup.

use super::consumer::Consumer;
use crate::error::{QtmError, QtmResult};
use crate::qtm::Qtm;
use std::collections::HashMap;
use std::sync::Arc;

pub type ConsumerFactory = Box<dyn Fn(Arc<Qtm>) -> Arc<dyn Consumer> + Send + Sync>;

#[derive(Default)]
pub struct ConsumerRegistry {
    factories: HashMap<String, ConsumerFactory>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory; a later registration under the same name replaces it
    pub fn register<F>(&mut self, job: &str, factory: F) -> &mut Self
    where
        F: Fn(Arc<Qtm>) -> Arc<dyn Consumer> + Send + Sync + 'static,
    {
        self.factories.insert(job.to_string(), Box::new(factory));
        self
    }

    pub fn contains(&self, job: &str) -> bool {
        self.factories.contains_key(job)
    }

    pub fn job_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn resolve(&self, job: &str, qtm: Arc<Qtm>) -> QtmResult<Arc<dyn Consumer>> {
        self.factories
            .get(job)
            .map(|factory| factory(qtm))
            .ok_or_else(|| QtmError::UnknownJob(job.to_string()))
    }

    /// Resolve every job, failing on the first unknown name
    pub fn resolve_all(&self, jobs: &[String], qtm: Arc<Qtm>) -> QtmResult<Vec<Arc<dyn Consumer>>> {
        jobs.iter().map(|job| self.resolve(job, qtm.clone())).collect()
    }
}
