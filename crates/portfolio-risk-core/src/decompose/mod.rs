pub mod component;
pub mod facts;

pub use component::{component_var, ComponentVar};
pub use facts::{risk_facts, CorrelatedPair, RiskFacts, TopContributor};
