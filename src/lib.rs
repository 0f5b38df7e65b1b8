pub mod common;
pub mod configuration;
pub mod proxy;
pub mod selection_method;
pub mod utils;

pub mod prelude {
    pub use crate::common::{ConnectionGuard, Node, SelectError, WeightError};
    pub use crate::configuration::{ConfigSource, Settings};
    pub use crate::proxy::{LoadBalancer, Pool};
    pub use crate::selection_method::{LoadBalancingAlgorithm, SelectionAlgorithm, Selector};
}
