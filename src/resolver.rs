use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::Doi;
use crate::providers::crossref::{RegistryClient, RegistryRecord};

pub struct DoiResolver<'a> {
    client: &'a dyn RegistryClient,
    sleep: Duration,
    cache: HashMap<Doi, RegistryRecord>,
    lookups: usize,
}

impl<'a> DoiResolver<'a> {
    pub fn new(client: &'a dyn RegistryClient, sleep: Duration) -> Self {
        Self {
            client,
            sleep,
            cache: HashMap::new(),
            lookups: 0,
        }
    }

    pub fn resolve(&mut self, doi: &Doi) -> RegistryRecord {
        if let Some(record) = self.cache.get(doi) {
            debug!("crossref cache hit for {doi}");
            return record.clone();
        }

        let record = match self.client.lookup(doi) {
            Ok(record) => record,
            Err(err) => {
                warn!("crossref lookup for {doi} failed: {err}");
                RegistryRecord::default()
            }
        };
        self.lookups += 1;
        self.cache.insert(doi.clone(), record.clone());
        if !self.sleep.is_zero() {
            thread::sleep(self.sleep);
        }
        record
    }

    pub fn lookups(&self) -> usize {
        self.lookups
    }
}
