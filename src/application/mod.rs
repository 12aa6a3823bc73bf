// Application layer - the ledger's callable surface and the hosts around it.
// Services hold the rules, the facade composes them, and the persistent and
// shared hosts supply ordering, time and storage.

mod clock;
mod config;
pub mod error;
mod facade;
mod financing_service;
mod invoice_service;
mod service;
mod shared;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use facade::*;
pub use financing_service::*;
pub use invoice_service::*;
pub use service::*;
pub use shared::*;
