use std::sync::Arc;

use millerp_infra::{
    GlPostingEngine, InMemoryWarehouseStore, InboundService, OutboundService, StockEngine,
};

/// Engines shared by every handler. All of them run against the same store.
pub struct AppServices {
    pub stock: StockEngine<InMemoryWarehouseStore>,
    pub outbound: OutboundService<InMemoryWarehouseStore>,
    pub inbound: InboundService<InMemoryWarehouseStore>,
    pub gl: GlPostingEngine<InMemoryWarehouseStore>,
}

impl AppServices {
    pub fn new(store: Arc<InMemoryWarehouseStore>) -> Self {
        Self {
            stock: StockEngine::new(store.clone()),
            outbound: OutboundService::new(store.clone()),
            inbound: InboundService::new(store.clone()),
            gl: GlPostingEngine::new(store),
        }
    }
}
