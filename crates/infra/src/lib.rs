//! Infrastructure layer: transactional store, stock engine, GL posting and the
//! outbound/inbound workflows built on them.

pub mod config;
pub mod error;
pub mod gl;
pub mod inbound;
pub mod numbering;
pub mod outbound;
pub mod query;
pub mod stock;
pub mod store;


pub use error::{ServiceError, ServiceResult};
pub use gl::{GlPostingEngine, PostingOutcome};
pub use inbound::{
    InboundLineRequest, InboundRequest, InboundService, LoanReturnRequest, LoanReturnResult,
    NewItemInboundRequest, NewItemInboundResult,
};
pub use outbound::{OutboundLineRequest, OutboundRequest, OutboundService};
pub use stock::{LocationReconciliation, MovementResult, StockEngine};
pub use store::{InMemoryWarehouseStore, StoreError, WarehouseStore, WarehouseTx};
