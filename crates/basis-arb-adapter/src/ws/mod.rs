/*
[INPUT]:  WebSocket submodules
[OUTPUT]: Public WebSocket module surface
[POS]:    WebSocket layer - module wiring
[UPDATE]: When adding new stream modules
*/

pub mod client;
pub mod message;

pub use client::UserDataSocket;
pub use message::{
    LinearAccountUpdate, LinearOrderData, LinearOrderUpdate, SpotAccountUpdate, SpotBalance,
    SpotOrderUpdate, UserDataFrame,
};
