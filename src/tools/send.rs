//! Publishes a single time-value pair, mainly for testing sinks.

use tracing::info;

use crate::args::SendArgs;
use crate::error::AppResult;

use super::ToolContext;

pub async fn run(context: &ToolContext, args: &SendArgs) -> AppResult<()> {
    let client = super::connect(context).await?;
    info!(
        metric = %args.metric,
        timestamp = %args.timestamp,
        value = args.value,
        "sending data point"
    );
    client.publish(&args.metric, args.timestamp, args.value).await?;
    client.close().await;
    Ok(())
}
