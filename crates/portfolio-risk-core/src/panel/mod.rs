pub mod prepare;
pub mod prices;

#[cfg(test)]
pub(crate) mod test_support;

pub use prepare::{prepare, PreparedPanel};
pub use prices::{Holdings, Position, PricePanel, PriceSource};
