pub mod load_balancer;
pub mod pool;

pub use load_balancer::LoadBalancer;
pub use pool::Pool;
