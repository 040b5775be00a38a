//! Catalog wrapper that can hold a stream open until the test releases it
//!
//! Once armed, the next `stream` call takes its snapshot from the inner
//! catalog, reports that it has entered, and waits for the release signal
//! before handing the granules back.

use granulite::catalog::{DelegatingCatalog, GranuleIter, QueryCapabilities};
use granulite::{
    CatalogError, CatalogResult, Envelope, GranuleCatalog, GranuleQuery, Record, Schema,
    Transaction,
};
use parking_lot::Mutex;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

pub struct GatedCatalog {
    base: DelegatingCatalog,
    gate: Mutex<Option<Gate>>,
}

/// Test-side ends of an armed gate
pub struct GateHandle {
    pub entered: Receiver<()>,
    pub release: Sender<()>,
}

impl GatedCatalog {
    pub fn new(inner: Arc<dyn GranuleCatalog>) -> Self {
        Self {
            base: DelegatingCatalog::new(inner, true),
            gate: Mutex::new(None),
        }
    }

    /// Hold the next stream until the handle's release is sent
    pub fn arm(&self) -> GateHandle {
        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel();
        *self.gate.lock() = Some(Gate {
            entered: entered_tx,
            release: release_rx,
        });
        GateHandle {
            entered: entered_rx,
            release: release_tx,
        }
    }
}

impl GranuleCatalog for GatedCatalog {
    fn stream(&self, query: &GranuleQuery) -> CatalogResult<GranuleIter<'_>> {
        let gate = self.gate.lock().take();
        let snapshot = self.base.stream(query)?.collect::<CatalogResult<Vec<_>>>()?;
        if let Some(gate) = gate {
            gate.entered.send(()).expect("test dropped the gate");
            gate.release.recv().expect("test dropped the gate");
        }
        Ok(Box::new(snapshot.into_iter().map(Ok::<_, CatalogError>)))
    }

    fn add_granules(&self, type_name: &str, records: Vec<Record>, txn: &Transaction) -> CatalogResult<usize> {
        self.base.add_granules(type_name, records, txn)
    }

    fn remove_granules(&self, query: &GranuleQuery, txn: &Transaction) -> CatalogResult<usize> {
        self.base.remove_granules(query, txn)
    }

    fn commit(&self, txn: &Transaction) -> CatalogResult<usize> {
        self.base.commit(txn)
    }

    fn create_type(&self, schema: Schema) -> CatalogResult<()> {
        self.base.create_type(schema)
    }

    fn remove_type(&self, type_name: &str) -> CatalogResult<()> {
        self.base.remove_type(type_name)
    }

    fn type_names(&self) -> CatalogResult<Vec<String>> {
        self.base.type_names()
    }

    fn schema(&self, type_name: &str) -> CatalogResult<Schema> {
        self.base.schema(type_name)
    }

    fn bounds(&self, type_name: &str) -> CatalogResult<Option<Envelope>> {
        self.base.bounds(type_name)
    }

    fn query_capabilities(&self, type_name: &str) -> CatalogResult<QueryCapabilities> {
        self.base.query_capabilities(type_name)
    }

    fn dispose(&self) -> CatalogResult<()> {
        self.base.dispose()
    }

    fn is_disposed(&self) -> bool {
        self.base.is_disposed()
    }
}
