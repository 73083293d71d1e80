//! Prefixed unique id generation for runs and checkpoints.

use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default)]
pub struct IdGenerator;

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn run_id(&self) -> String {
        format!("run-{}", Uuid::new_v4())
    }

    #[must_use]
    pub fn checkpoint_id(&self) -> String {
        format!("ckpt-{}", Uuid::new_v4())
    }
}
