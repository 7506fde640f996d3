use super::cmd::CommandEncoder;
use super::device::Device;
use super::error::Result;

/// Blocking one-shot submission helper.
///
/// Records through a closure, submits on the device queue and waits on an
/// internal fence before returning. Intended for setup work such as uploads;
/// frame submission should go through [`crate::Queue::submit`] directly.
///
/// ```no_run
/// # fn upload(device: &mut gfx::Device, src: gfx::Handle<gfx::Buffer>, dst: gfx::Handle<gfx::Buffer>) -> gfx::Result<()> {
/// gfx::CommandExecutor::new(device).execute(|encoder| {
///     encoder.copy_buffer_to_buffer(&gfx::CopyBufferToBuffer {
///         source: src,
///         source_offset: 0,
///         destination: dst,
///         destination_offset: 0,
///         size: 256,
///     })
/// })
/// # }
/// ```
pub struct CommandExecutor<'a> {
    device: &'a mut Device,
    label: String,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(device: &'a mut Device) -> Self {
        Self {
            device,
            label: "gfx.executor".to_string(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// Record with `record` and block until the GPU has finished the work.
    ///
    /// The encoder and fence are released whether or not a stage fails; the
    /// first error is returned.
    pub fn execute<F>(&mut self, record: F) -> Result<()>
    where
        F: FnOnce(&mut CommandEncoder) -> Result<()>,
    {
        log::trace!("executing {}", self.label);
        self.device.execute(&self.label, record)
    }
}
