//! Condo facade: two pure reads, no business logic.

use crate::backend::{self, Backend, Query};
use crate::error::Result;
use crate::models::{Condo, CondoStats};

#[derive(Clone)]
pub struct CondoFacade {
    backend: Backend,
}

impl CondoFacade {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// All participating condos, ordered by name.
    pub async fn all(&self) -> Result<Vec<Condo>> {
        let query = Query::table("condos").order("name", false);
        backend::decode_rows(self.backend.records.select(&query).await?)
    }

    /// Rows of the precomputed `condo_stats` view.
    pub async fn stats(&self) -> Result<Vec<CondoStats>> {
        let query = Query::table("condo_stats");
        backend::decode_rows(self.backend.records.select(&query).await?)
    }
}
