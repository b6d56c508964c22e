//! One module per subcommand. Each tool opens a connection to the broker,
//! performs one bounded session, and exits.

pub mod check;
pub mod csv;
pub mod discover;
pub mod energy;
pub mod inspect;
pub mod send;
pub mod slurm;
pub mod spy;
pub mod summary;

use crate::client::Client;
use crate::error::AppResult;

/// Settings shared by every tool.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub server: String,
    pub token: String,
}

pub(crate) async fn connect(context: &ToolContext) -> AppResult<Client> {
    Ok(Client::connect(&context.server, &context.token).await?)
}
