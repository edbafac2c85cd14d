pub mod compensation;
pub mod context;
pub mod order_service;
pub mod stock_plan;

pub use context::{CallContext, CancelHandle};
pub use order_service::{normalize_page, OrderService};
