//! `noop` implements a no-op pause actuator, one that will accept pause and
//! resume requests and do nothing with them except count them.

use std::convert::Infallible;

use crate::PauseControl as PauseControlTrait;

/// Noop-actuator will no-op, well, everything.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Noop {
    pauses: u32,
    resumes: u32,
}

impl Noop {
    /// Return a new no-op actuator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pause requests received.
    pub fn pauses(&self) -> u32 {
        self.pauses
    }

    /// Number of resume requests received.
    pub fn resumes(&self) -> u32 {
        self.resumes
    }
}

impl PauseControlTrait for Noop {
    type Error = Infallible;

    async fn pause(&mut self) -> Result<(), Infallible> {
        self.pauses += 1;
        tracing::info!(pauses = self.pauses, "pause requested; nothing to pause");
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), Infallible> {
        self.resumes += 1;
        tracing::info!(resumes = self.resumes, "resume requested; nothing to resume");
        Ok(())
    }
}
