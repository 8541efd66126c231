/// Job assembler - frame state machine
///
/// Idle -> Configuring -> FrameOpen -> Flushing -> Idle, plus the terminal
/// Finished state. Every violation is reported as `InvalidState`; nothing
/// is ever inserted on the caller's behalf.

use crate::error::{Error, Result};
use crate::{driver_bail, driver_debug, driver_warn};
use crate::memory::BufferHandle;
use crate::symbol::Viewport;
use super::job::{DrawCommand, Job};

/// Frame state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Idle,
    Configuring,
    FrameOpen,
    Flushing,
    Finished,
}

/// Viewport and clear parameters from the last state setup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSetup {
    pub viewport: Viewport,
    pub width: u32,
    pub height: u32,
    pub clear_color: u32,
}

#[derive(Debug)]
pub struct JobAssembler {
    state: AssemblerState,
    setup: Option<FrameSetup>,
    current: Option<Job>,
    last_job: Option<Job>,
}

impl JobAssembler {
    pub fn new() -> Self {
        Self {
            state: AssemblerState::Idle,
            setup: None,
            current: None,
            last_job: None,
        }
    }

    pub fn state(&self) -> AssemblerState { self.state }

    pub fn setup(&self) -> Option<&FrameSetup> { self.setup.as_ref() }

    /// Job being recorded
    pub fn current_job(&self) -> Option<&Job> { self.current.as_ref() }

    /// Most recently submitted job
    pub fn last_job(&self) -> Option<&Job> { self.last_job.as_ref() }

    fn invalid<T>(&self, operation: &str) -> Result<T> {
        driver_bail!("lima::JobAssembler", Error::InvalidState(format!(
            "{} is not valid in state {:?}", operation, self.state)))
    }

    /// Fail once `finish` has run
    pub fn ensure_active(&self, operation: &str) -> Result<()> {
        if self.state == AssemblerState::Finished {
            return self.invalid(operation);
        }
        Ok(())
    }

    /// Record viewport and clear state
    pub fn state_setup(&mut self, setup: FrameSetup) -> Result<()> {
        match self.state {
            AssemblerState::Idle | AssemblerState::Configuring => {
                self.setup = Some(setup);
                self.state = AssemblerState::Configuring;
                Ok(())
            }
            _ => self.invalid("state_setup"),
        }
    }

    /// Open a frame rendering into `framebuffer`
    pub fn frame_new(&mut self, framebuffer: BufferHandle, uniform_arena: BufferHandle) -> Result<()> {
        let setup = match (self.state, self.setup) {
            (AssemblerState::Configuring, Some(setup)) | (AssemblerState::Idle, Some(setup)) => setup,
            _ => return self.invalid("frame_new"),
        };
        self.current = Some(Job::new(setup.viewport, setup.clear_color, framebuffer, uniform_arena));
        self.state = AssemblerState::FrameOpen;
        Ok(())
    }

    /// Fail unless a frame is open
    pub fn require_frame_open(&self, operation: &str) -> Result<()> {
        if self.state != AssemblerState::FrameOpen {
            return self.invalid(operation);
        }
        Ok(())
    }

    /// Append a draw to the open frame
    pub fn record(&mut self, draw: DrawCommand) -> Result<()> {
        if self.state == AssemblerState::FrameOpen {
            if let Some(job) = self.current.as_mut() {
                job.push(draw);
                return Ok(());
            }
        }
        self.invalid("draw_arrays")
    }

    /// Close the frame and hand out its job for submission
    pub fn begin_flush(&mut self) -> Result<Job> {
        if self.state != AssemblerState::FrameOpen {
            return self.invalid("frame_flush");
        }
        match self.current.take() {
            Some(job) => {
                self.state = AssemblerState::Flushing;
                Ok(job)
            }
            None => self.invalid("frame_flush"),
        }
    }

    /// The submitted job completed
    pub fn complete_flush(&mut self, job: Job) {
        driver_debug!("lima::JobAssembler", "Frame completed with {} draws", job.draws().len());
        self.last_job = Some(job);
        self.state = AssemblerState::Idle;
    }

    /// Drop the open or flushing frame and return to Idle
    ///
    /// Returns the discarded job so its references can be released.
    pub fn abort(&mut self, job: Option<Job>) -> Option<Job> {
        match self.state {
            AssemblerState::FrameOpen | AssemblerState::Flushing => {
                driver_warn!("lima::JobAssembler", "Frame aborted in state {:?}", self.state);
                self.state = AssemblerState::Idle;
                job.or_else(|| self.current.take())
            }
            _ => job,
        }
    }

    /// Terminal transition, only from Idle
    pub fn finish(&mut self) -> Result<()> {
        if self.state != AssemblerState::Idle {
            return self.invalid("finish");
        }
        self.state = AssemblerState::Finished;
        self.setup = None;
        self.last_job = None;
        Ok(())
    }
}

impl Default for JobAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "assembler_tests.rs"]
mod tests;
