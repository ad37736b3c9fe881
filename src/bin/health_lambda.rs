//! Lambda entry point serving the health router behind the API Gateway
//! proxy integration.

use healthstack::routes::create_router;
use lambda_http::{run, Error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // CloudWatch adds its own timestamps
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .init();

    run(create_router()).await
}
