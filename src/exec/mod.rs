pub mod command;
pub mod error;
pub mod mock;
pub mod runner;
pub mod spawner;

#[cfg(test)]
mod tests;

pub use command::{BuildCommand, BuildCommandBuilder};
pub use error::ExecError;
pub use mock::{MockProcessConfig, MockSpawner};
pub use runner::{BuildExecutor, ExecutionSummary};
pub use spawner::{
    ExitStatus, ProcessPipe, ProcessSpawner, SpawnedProcess, StatusFuture, TokioSpawner,
};

use std::sync::Arc;

/// Bundles the spawning capability handed to everything that runs builds.
#[derive(Clone)]
pub struct ExecManager {
    spawner: Arc<dyn ProcessSpawner>,
}

impl ExecManager {
    pub fn new(spawner: Arc<dyn ProcessSpawner>) -> Self {
        Self { spawner }
    }

    pub fn production() -> Self {
        Self::new(Arc::new(TokioSpawner))
    }

    #[cfg(test)]
    pub fn mock() -> (Self, MockSpawner) {
        let mock = MockSpawner::new();
        let spawner = Arc::new(mock.clone()) as Arc<dyn ProcessSpawner>;
        (Self::new(spawner), mock)
    }

    pub fn spawner(&self) -> Arc<dyn ProcessSpawner> {
        Arc::clone(&self.spawner)
    }

    pub fn executor(&self) -> BuildExecutor {
        BuildExecutor::new(Arc::clone(&self.spawner))
    }
}
