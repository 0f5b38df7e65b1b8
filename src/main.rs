use color_eyre::eyre::Result;

use lb_elect::prelude::*;
use lb_elect::utils::tracing::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing()?;

    let settings = Settings::new()?;
    let mut load_balancer = LoadBalancer::new(settings)?;

    load_balancer.run().await
}
