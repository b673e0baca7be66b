/*
[INPUT]:  HTTP submodules
[OUTPUT]: Public HTTP module surface
[POS]:    HTTP layer - module wiring
[UPDATE]: When adding new endpoint modules
*/

pub mod client;
pub mod error;
pub mod market;
pub mod sign;
pub mod trade;
pub mod user;

pub use client::{BinanceClient, ClientConfig, Credentials};
pub use error::{BinanceError, Result};
pub use trade::OrderRequest;
