//! Exchange parameter derivation, the external engine seam, and the driver
//! that wires scope/work-item, HTTP clients, and the engine together for one
//! exchange.

pub mod driver;
pub mod engine;
pub mod filter;

pub use driver::{DriverOutcome, EndpointConfig, ExchangeDriver, ReplyComplete};
pub use engine::{ExchangeCallbacks, ExchangeEngine, ExchangeHandle, ExchangeId, ExchangeParams};
pub use filter::{derive as derive_exchange_plan, ExchangePlan, FilterRejected};
