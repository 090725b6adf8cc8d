pub mod cleanup;
pub mod server;

// Internal "interpreter" for `Action`.
mod run;
mod store;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    Cleanup(cleanup::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
