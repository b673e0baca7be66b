/*
[INPUT]:  Submodule definitions
[OUTPUT]: Public types module surface
[POS]:    Data layer - module wiring
[UPDATE]: When adding new type modules
*/

pub mod enums;
pub mod ids;
pub mod models;
pub mod symbol;

pub use enums::{MarketKind, OrderStatus, OrderType, Rounding, Side};
pub use ids::client_order_id;
pub use models::{Market, OrderResponse, decimals_from_step};
pub use symbol::{
    from_exchange, is_linear, kind_of, linear_to_spot, spot_to_linear, to_exchange,
};
