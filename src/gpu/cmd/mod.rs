//! Backend-agnostic command recording.
//!
//! A [`CommandEncoder`] records [`Command`]s into a plain list. Nothing touches
//! the GPU until the finished [`CommandBuffer`] is submitted, at which point the
//! device validates every referenced handle and the backend replays the list
//! into native command buffers / passes.

use std::sync::atomic::{AtomicU64, Ordering};

use super::error::{GfxError, Result};
use super::structs::*;
use crate::utils::Handle;

/// Bind group slots available to every pipeline.
pub const MAX_BIND_GROUPS: u32 = 4;
pub const MAX_VERTEX_BUFFERS: u32 = 8;

static NEXT_ENCODER_ID: AtomicU64 = AtomicU64::new(1);

//===----------------------------------------------------------------------===//
// Command definitions
//===----------------------------------------------------------------------===//

#[derive(Clone, Debug, PartialEq)]
pub struct BeginRenderPass {
    pub label: Option<String>,
    pub render_pass: Handle<RenderPass>,
    pub framebuffer: Handle<Framebuffer>,
    pub color_clear_values: Vec<Color>,
    pub depth_clear_value: f32,
    pub stencil_clear_value: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CopyBufferToBuffer(CopyBufferToBuffer),
    CopyBufferToTexture(CopyBufferToTexture),
    CopyTextureToBuffer(CopyTextureToBuffer),
    CopyTextureToTexture(CopyTextureToTexture),
    BlitTextureToTexture(BlitTextureToTexture),
    PipelineBarrier {
        memory: Vec<MemoryBarrier>,
        buffers: Vec<BufferBarrier>,
        textures: Vec<TextureBarrier>,
    },
    /// Fill mip levels `base_mip_level + 1 ..` by downsampling from the base.
    /// A `level_count` of zero means every remaining level.
    GenerateMipmaps {
        texture: Handle<Texture>,
        base_mip_level: u32,
        level_count: u32,
    },
    WriteTimestamp {
        query_set: Handle<QuerySet>,
        index: u32,
    },
    /// Copy query results as `u64`s into `destination`.
    ResolveQuerySet {
        query_set: Handle<QuerySet>,
        first_query: u32,
        query_count: u32,
        destination: Handle<Buffer>,
        destination_offset: u64,
    },
    BeginRenderPass(BeginRenderPass),
    BeginComputePass {
        label: Option<String>,
    },
    EndPass,
    SetRenderPipeline(Handle<RenderPipeline>),
    SetComputePipeline(Handle<ComputePipeline>),
    SetBindGroup {
        index: u32,
        bind_group: Handle<BindGroup>,
        dynamic_offsets: Vec<u32>,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: Handle<Buffer>,
        offset: u64,
    },
    SetIndexBuffer {
        buffer: Handle<Buffer>,
        format: IndexFormat,
        offset: u64,
    },
    SetViewport(Viewport),
    SetScissorRect(ScissorRect),
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    },
    DrawIndirect {
        buffer: Handle<Buffer>,
        offset: u64,
    },
    DrawIndexedIndirect {
        buffer: Handle<Buffer>,
        offset: u64,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchIndirect {
        buffer: Handle<Buffer>,
        offset: u64,
    },
    BeginOcclusionQuery {
        query_set: Handle<QuerySet>,
        index: u32,
    },
    EndOcclusionQuery,
}

//===----------------------------------------------------------------------===//
// Command buffers
//===----------------------------------------------------------------------===//

/// Finished, submittable command list.
#[derive(Clone, Debug)]
pub struct CommandBuffer {
    pub(crate) device_id: u64,
    label: Option<String>,
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterate over top-level commands with each pass folded into one item.
    pub fn segments(&self) -> Segments<'_> {
        Segments {
            commands: &self.commands,
        }
    }
}

pub enum Segment<'a> {
    Command(&'a Command),
    RenderPass {
        begin: &'a BeginRenderPass,
        commands: &'a [Command],
    },
    ComputePass {
        label: Option<&'a str>,
        commands: &'a [Command],
    },
}

pub struct Segments<'a> {
    commands: &'a [Command],
}

impl<'a> Segments<'a> {
    fn take_pass(&mut self) -> &'a [Command] {
        let rest = &self.commands[1..];
        let end = rest
            .iter()
            .position(|c| matches!(c, Command::EndPass))
            .unwrap_or(rest.len());
        let body = &rest[..end];
        self.commands = rest.get(end + 1..).unwrap_or(&[]);
        body
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.commands.first()?;
        match first {
            Command::BeginRenderPass(begin) => {
                let commands = self.take_pass();
                Some(Segment::RenderPass { begin, commands })
            }
            Command::BeginComputePass { label } => {
                let commands = self.take_pass();
                Some(Segment::ComputePass {
                    label: label.as_deref(),
                    commands,
                })
            }
            cmd => {
                self.commands = &self.commands[1..];
                Some(Segment::Command(cmd))
            }
        }
    }
}

//===----------------------------------------------------------------------===//
// Encoder
//===----------------------------------------------------------------------===//

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderState {
    Recording,
    Finished,
    /// A state violation happened; every call fails until `reset`.
    Poisoned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PassKind {
    Render,
    Compute,
}

#[derive(Clone, Copy, Debug)]
struct PassScope {
    kind: PassKind,
    pipeline_set: bool,
    index_buffer_set: bool,
    occlusion_active: bool,
}

/// Records commands for one submission.
///
/// Obtained from [`crate::Device::create_command_encoder`]. Encoder-level
/// commands (copies, barriers) are legal only outside passes; pass commands
/// only inside the matching pass.
#[derive(Debug)]
pub struct CommandEncoder {
    id: u64,
    device_id: u64,
    label: Option<String>,
    state: EncoderState,
    scopes: Vec<PassScope>,
    commands: Vec<Command>,
}

impl CommandEncoder {
    pub(crate) fn new(device_id: u64, label: Option<&str>) -> Self {
        let id = NEXT_ENCODER_ID.fetch_add(1, Ordering::Relaxed);
        log::trace!("command encoder {id} created for device {device_id}");
        Self {
            id,
            device_id,
            label: label.map(str::to_owned),
            state: EncoderState::Recording,
            scopes: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    pub fn is_in_pass(&self) -> bool {
        !self.scopes.is_empty()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    fn violation<T>(&mut self, what: &str) -> Result<T> {
        let msg = match self.state {
            EncoderState::Finished => format!("{what}: encoder {} is already finished", self.id),
            EncoderState::Poisoned => format!("{what}: encoder {} is poisoned", self.id),
            EncoderState::Recording => {
                self.state = EncoderState::Poisoned;
                log::warn!("encoder {} poisoned by {what}", self.id);
                format!("{what}: not legal in the current encoder scope")
            }
        };
        Err(GfxError::invalid_state(msg))
    }

    fn ensure_recording(&mut self, what: &str) -> Result<()> {
        if self.state != EncoderState::Recording {
            return self.violation(what);
        }
        Ok(())
    }

    fn ensure_top_level(&mut self, what: &str) -> Result<()> {
        self.ensure_recording(what)?;
        if !self.scopes.is_empty() {
            return self.violation(what);
        }
        Ok(())
    }

    fn ensure_pass(&mut self, kind: Option<PassKind>, what: &str) -> Result<&mut PassScope> {
        self.ensure_recording(what)?;
        let matches = match (self.scopes.last(), kind) {
            (Some(_), None) => true,
            (Some(scope), Some(kind)) => scope.kind == kind,
            (None, _) => false,
        };
        if !matches {
            return self.violation(what);
        }
        self.scopes
            .last_mut()
            .ok_or_else(|| GfxError::invalid_state(format!("{what}: no open pass")))
    }

    fn ensure_pipeline(&mut self, kind: PassKind, what: &str) -> Result<PassScope> {
        let scope = *self.ensure_pass(Some(kind), what)?;
        if !scope.pipeline_set {
            return self.violation(what);
        }
        Ok(scope)
    }

    // Encoder-level commands.

    pub fn copy_buffer_to_buffer(&mut self, copy: &CopyBufferToBuffer) -> Result<()> {
        self.ensure_top_level("copy_buffer_to_buffer")?;
        self.commands.push(Command::CopyBufferToBuffer(*copy));
        Ok(())
    }

    pub fn copy_buffer_to_texture(&mut self, copy: &CopyBufferToTexture) -> Result<()> {
        self.ensure_top_level("copy_buffer_to_texture")?;
        self.commands.push(Command::CopyBufferToTexture(*copy));
        Ok(())
    }

    pub fn copy_texture_to_buffer(&mut self, copy: &CopyTextureToBuffer) -> Result<()> {
        self.ensure_top_level("copy_texture_to_buffer")?;
        self.commands.push(Command::CopyTextureToBuffer(*copy));
        Ok(())
    }

    pub fn copy_texture_to_texture(&mut self, copy: &CopyTextureToTexture) -> Result<()> {
        self.ensure_top_level("copy_texture_to_texture")?;
        self.commands.push(Command::CopyTextureToTexture(*copy));
        Ok(())
    }

    pub fn blit_texture_to_texture(&mut self, blit: &BlitTextureToTexture) -> Result<()> {
        self.ensure_top_level("blit_texture_to_texture")?;
        self.commands.push(Command::BlitTextureToTexture(*blit));
        Ok(())
    }

    pub fn pipeline_barrier(&mut self, barrier: &PipelineBarrier<'_>) -> Result<()> {
        self.ensure_top_level("pipeline_barrier")?;
        self.commands.push(Command::PipelineBarrier {
            memory: barrier.memory_barriers.to_vec(),
            buffers: barrier.buffer_barriers.to_vec(),
            textures: barrier.texture_barriers.to_vec(),
        });
        Ok(())
    }

    /// Downsample every level below mip 0 from the level above it.
    pub fn generate_mipmaps(&mut self, texture: Handle<Texture>) -> Result<()> {
        self.ensure_top_level("generate_mipmaps")?;
        self.commands.push(Command::GenerateMipmaps {
            texture,
            base_mip_level: 0,
            level_count: 0,
        });
        Ok(())
    }

    /// Regenerate `level_count` levels starting at `base_mip_level`. The base
    /// level is the source and is left untouched.
    pub fn generate_mipmaps_range(
        &mut self,
        texture: Handle<Texture>,
        base_mip_level: u32,
        level_count: u32,
    ) -> Result<()> {
        self.ensure_top_level("generate_mipmaps")?;
        if level_count == 0 {
            return Err(GfxError::invalid_argument("mipmap level count must be non-zero"));
        }
        self.commands.push(Command::GenerateMipmaps {
            texture,
            base_mip_level,
            level_count,
        });
        Ok(())
    }

    pub fn write_timestamp(&mut self, query_set: Handle<QuerySet>, index: u32) -> Result<()> {
        self.ensure_top_level("write_timestamp")?;
        self.commands.push(Command::WriteTimestamp { query_set, index });
        Ok(())
    }

    pub fn resolve_query_set(
        &mut self,
        query_set: Handle<QuerySet>,
        first_query: u32,
        query_count: u32,
        destination: Handle<Buffer>,
        destination_offset: u64,
    ) -> Result<()> {
        self.ensure_top_level("resolve_query_set")?;
        if query_count == 0 {
            return Err(GfxError::invalid_argument("resolve needs at least one query"));
        }
        self.commands.push(Command::ResolveQuerySet {
            query_set,
            first_query,
            query_count,
            destination,
            destination_offset,
        });
        Ok(())
    }

    // Pass scopes.

    pub fn begin_render_pass(&mut self, info: &RenderPassBeginInfo<'_>) -> Result<RenderPassEncoder<'_>> {
        self.ensure_top_level("begin_render_pass")?;
        self.scopes.push(PassScope {
            kind: PassKind::Render,
            pipeline_set: false,
            index_buffer_set: false,
            occlusion_active: false,
        });
        self.commands.push(Command::BeginRenderPass(BeginRenderPass {
            label: info.label.map(str::to_owned),
            render_pass: info.render_pass,
            framebuffer: info.framebuffer,
            color_clear_values: info.color_clear_values.to_vec(),
            depth_clear_value: info.depth_clear_value,
            stencil_clear_value: info.stencil_clear_value,
        }));
        Ok(RenderPassEncoder { encoder: self })
    }

    pub fn begin_compute_pass(&mut self, label: Option<&str>) -> Result<ComputePassEncoder<'_>> {
        self.ensure_top_level("begin_compute_pass")?;
        self.scopes.push(PassScope {
            kind: PassKind::Compute,
            pipeline_set: false,
            index_buffer_set: false,
            occlusion_active: false,
        });
        self.commands.push(Command::BeginComputePass {
            label: label.map(str::to_owned),
        });
        Ok(ComputePassEncoder { encoder: self })
    }

    /// Close the innermost open pass.
    pub fn end_pass(&mut self) -> Result<()> {
        if self.ensure_pass(None, "end_pass")?.occlusion_active {
            return self.violation("end_pass with an occlusion query still open");
        }
        self.scopes.pop();
        self.commands.push(Command::EndPass);
        Ok(())
    }

    // Pass-scoped commands.

    pub fn set_render_pipeline(&mut self, pipeline: Handle<RenderPipeline>) -> Result<()> {
        self.ensure_pass(Some(PassKind::Render), "set_pipeline")?
            .pipeline_set = true;
        self.commands.push(Command::SetRenderPipeline(pipeline));
        Ok(())
    }

    pub fn set_compute_pipeline(&mut self, pipeline: Handle<ComputePipeline>) -> Result<()> {
        self.ensure_pass(Some(PassKind::Compute), "set_pipeline")?
            .pipeline_set = true;
        self.commands.push(Command::SetComputePipeline(pipeline));
        Ok(())
    }

    pub fn set_bind_group(
        &mut self,
        index: u32,
        bind_group: Handle<BindGroup>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.ensure_pass(None, "set_bind_group")?;
        if index >= MAX_BIND_GROUPS {
            return Err(GfxError::invalid_argument(format!(
                "bind group index {index} exceeds the maximum of {MAX_BIND_GROUPS}"
            )));
        }
        self.commands.push(Command::SetBindGroup {
            index,
            bind_group,
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
        Ok(())
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: Handle<Buffer>, offset: u64) -> Result<()> {
        self.ensure_pass(Some(PassKind::Render), "set_vertex_buffer")?;
        if slot >= MAX_VERTEX_BUFFERS {
            return Err(GfxError::invalid_argument(format!(
                "vertex buffer slot {slot} exceeds the maximum of {MAX_VERTEX_BUFFERS}"
            )));
        }
        self.commands.push(Command::SetVertexBuffer {
            slot,
            buffer,
            offset,
        });
        Ok(())
    }

    pub fn set_index_buffer(
        &mut self,
        buffer: Handle<Buffer>,
        format: IndexFormat,
        offset: u64,
    ) -> Result<()> {
        self.ensure_pass(Some(PassKind::Render), "set_index_buffer")?
            .index_buffer_set = true;
        self.commands.push(Command::SetIndexBuffer {
            buffer,
            format,
            offset,
        });
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.ensure_pass(Some(PassKind::Render), "set_viewport")?;
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return Err(GfxError::invalid_argument("viewport extent must be positive"));
        }
        if !(0.0..=1.0).contains(&viewport.min_depth) || !(0.0..=1.0).contains(&viewport.max_depth) {
            return Err(GfxError::invalid_argument("viewport depth range must lie in 0..=1"));
        }
        self.commands.push(Command::SetViewport(*viewport));
        Ok(())
    }

    pub fn set_scissor_rect(&mut self, rect: &ScissorRect) -> Result<()> {
        self.ensure_pass(Some(PassKind::Render), "set_scissor_rect")?;
        self.commands.push(Command::SetScissorRect(*rect));
        Ok(())
    }

    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.ensure_pipeline(PassKind::Render, "draw")?;
        self.commands.push(Command::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
        Ok(())
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) -> Result<()> {
        let scope = self.ensure_pipeline(PassKind::Render, "draw_indexed")?;
        if !scope.index_buffer_set {
            return self.violation("draw_indexed without an index buffer");
        }
        self.commands.push(Command::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        });
        Ok(())
    }

    pub fn draw_indirect(&mut self, buffer: Handle<Buffer>, offset: u64) -> Result<()> {
        self.ensure_pipeline(PassKind::Render, "draw_indirect")?;
        self.commands.push(Command::DrawIndirect { buffer, offset });
        Ok(())
    }

    pub fn draw_indexed_indirect(&mut self, buffer: Handle<Buffer>, offset: u64) -> Result<()> {
        let scope = self.ensure_pipeline(PassKind::Render, "draw_indexed_indirect")?;
        if !scope.index_buffer_set {
            return self.violation("draw_indexed_indirect without an index buffer");
        }
        self.commands.push(Command::DrawIndexedIndirect { buffer, offset });
        Ok(())
    }

    pub fn begin_occlusion_query(&mut self, query_set: Handle<QuerySet>, index: u32) -> Result<()> {
        let scope = self.ensure_pass(Some(PassKind::Render), "begin_occlusion_query")?;
        if scope.occlusion_active {
            return self.violation("begin_occlusion_query while another query is open");
        }
        scope.occlusion_active = true;
        self.commands
            .push(Command::BeginOcclusionQuery { query_set, index });
        Ok(())
    }

    pub fn end_occlusion_query(&mut self) -> Result<()> {
        let scope = self.ensure_pass(Some(PassKind::Render), "end_occlusion_query")?;
        if !scope.occlusion_active {
            return self.violation("end_occlusion_query without an open query");
        }
        scope.occlusion_active = false;
        self.commands.push(Command::EndOcclusionQuery);
        Ok(())
    }

    pub fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.ensure_pipeline(PassKind::Compute, "dispatch_workgroups")?;
        self.commands.push(Command::Dispatch { x, y, z });
        Ok(())
    }

    pub fn dispatch_indirect(&mut self, buffer: Handle<Buffer>, offset: u64) -> Result<()> {
        self.ensure_pipeline(PassKind::Compute, "dispatch_indirect")?;
        self.commands.push(Command::DispatchIndirect { buffer, offset });
        Ok(())
    }

    /// Close recording and hand out the command list.
    pub fn finish(&mut self) -> Result<CommandBuffer> {
        self.ensure_top_level("finish")?;
        self.state = EncoderState::Finished;
        log::debug!(
            "encoder {} finished with {} commands",
            self.id,
            self.commands.len()
        );
        Ok(CommandBuffer {
            device_id: self.device_id,
            label: self.label.clone(),
            commands: std::mem::take(&mut self.commands),
        })
    }

    /// Drop everything recorded and start over in `Recording`.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.scopes.clear();
        self.state = EncoderState::Recording;
    }
}

/// Scope guard for an open render pass. Call [`RenderPassEncoder::end`] to
/// close it; dropping the guard leaves the pass open.
pub struct RenderPassEncoder<'a> {
    encoder: &'a mut CommandEncoder,
}

impl RenderPassEncoder<'_> {
    pub fn set_pipeline(&mut self, pipeline: Handle<RenderPipeline>) -> Result<()> {
        self.encoder.set_render_pipeline(pipeline)
    }

    pub fn set_bind_group(
        &mut self,
        index: u32,
        bind_group: Handle<BindGroup>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.encoder.set_bind_group(index, bind_group, dynamic_offsets)
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: Handle<Buffer>, offset: u64) -> Result<()> {
        self.encoder.set_vertex_buffer(slot, buffer, offset)
    }

    pub fn set_index_buffer(
        &mut self,
        buffer: Handle<Buffer>,
        format: IndexFormat,
        offset: u64,
    ) -> Result<()> {
        self.encoder.set_index_buffer(buffer, format, offset)
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.encoder.set_viewport(viewport)
    }

    pub fn set_scissor_rect(&mut self, rect: &ScissorRect) -> Result<()> {
        self.encoder.set_scissor_rect(rect)
    }

    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.encoder
            .draw(vertex_count, instance_count, first_vertex, first_instance)
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.encoder.draw_indexed(
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        )
    }

    pub fn draw_indirect(&mut self, buffer: Handle<Buffer>, offset: u64) -> Result<()> {
        self.encoder.draw_indirect(buffer, offset)
    }

    pub fn draw_indexed_indirect(&mut self, buffer: Handle<Buffer>, offset: u64) -> Result<()> {
        self.encoder.draw_indexed_indirect(buffer, offset)
    }

    pub fn begin_occlusion_query(&mut self, query_set: Handle<QuerySet>, index: u32) -> Result<()> {
        self.encoder.begin_occlusion_query(query_set, index)
    }

    pub fn end_occlusion_query(&mut self) -> Result<()> {
        self.encoder.end_occlusion_query()
    }

    pub fn end(self) -> Result<()> {
        self.encoder.end_pass()
    }
}

/// Scope guard for an open compute pass.
pub struct ComputePassEncoder<'a> {
    encoder: &'a mut CommandEncoder,
}

impl ComputePassEncoder<'_> {
    pub fn set_pipeline(&mut self, pipeline: Handle<ComputePipeline>) -> Result<()> {
        self.encoder.set_compute_pipeline(pipeline)
    }

    pub fn set_bind_group(
        &mut self,
        index: u32,
        bind_group: Handle<BindGroup>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.encoder.set_bind_group(index, bind_group, dynamic_offsets)
    }

    pub fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.encoder.dispatch_workgroups(x, y, z)
    }

    pub fn dispatch_indirect(&mut self, buffer: Handle<Buffer>, offset: u64) -> Result<()> {
        self.encoder.dispatch_indirect(buffer, offset)
    }

    pub fn end(self) -> Result<()> {
        self.encoder.end_pass()
    }
}

//===----------------------------------------------------------------------===//
// Tests
//===----------------------------------------------------------------------===//

#[cfg(test)]
mod tests {
    use super::*;

    fn copy() -> CopyBufferToBuffer {
        CopyBufferToBuffer {
            source: Handle::new(0, 0),
            source_offset: 0,
            destination: Handle::new(1, 0),
            destination_offset: 0,
            size: 16,
        }
    }

    static CLEAR: [Color; 1] = [Color::new(0.0, 0.0, 0.0, 1.0)];

    fn begin_info() -> RenderPassBeginInfo<'static> {
        RenderPassBeginInfo {
            label: None,
            render_pass: Handle::new(0, 0),
            framebuffer: Handle::new(0, 0),
            color_clear_values: &CLEAR,
            depth_clear_value: 1.0,
            stencil_clear_value: 0,
        }
    }

    fn is_invalid_state<T: std::fmt::Debug>(res: Result<T>) -> bool {
        matches!(res, Err(GfxError::InvalidState(_)))
    }

    #[test]
    fn records_and_finishes() {
        let mut enc = CommandEncoder::new(7, Some("upload"));
        enc.copy_buffer_to_buffer(&copy()).unwrap();
        let cmd = enc.finish().unwrap();
        assert_eq!(cmd.device_id, 7);
        assert_eq!(cmd.label(), Some("upload"));
        assert_eq!(cmd.len(), 1);
        assert_eq!(enc.state(), EncoderState::Finished);
    }

    #[test]
    fn finished_encoder_rejects_recording() {
        let mut enc = CommandEncoder::new(1, None);
        enc.finish().unwrap();
        assert!(is_invalid_state(enc.copy_buffer_to_buffer(&copy())));
        assert!(is_invalid_state(enc.begin_compute_pass(None).map(|_| ())));
        assert!(is_invalid_state(enc.finish()));
        // Finished is not poisoned.
        assert_eq!(enc.state(), EncoderState::Finished);
    }

    #[test]
    fn pass_command_outside_pass_poisons() {
        let mut enc = CommandEncoder::new(1, None);
        assert!(is_invalid_state(enc.dispatch_workgroups(1, 1, 1)));
        assert_eq!(enc.state(), EncoderState::Poisoned);
        // Everything fails afterwards, including legal commands.
        assert!(is_invalid_state(enc.copy_buffer_to_buffer(&copy())));
        assert!(is_invalid_state(enc.finish()));

        enc.reset();
        assert_eq!(enc.state(), EncoderState::Recording);
        enc.copy_buffer_to_buffer(&copy()).unwrap();
        assert_eq!(enc.finish().unwrap().len(), 1);
    }

    #[test]
    fn wrong_pass_kind_rejected() {
        let mut enc = CommandEncoder::new(1, None);
        let pass = enc.begin_render_pass(&begin_info()).unwrap();
        drop(pass);
        assert!(is_invalid_state(enc.set_compute_pipeline(Handle::new(0, 0))));
    }

    #[test]
    fn finish_inside_pass_fails() {
        let mut enc = CommandEncoder::new(1, None);
        let _ = enc.begin_compute_pass(Some("cs")).unwrap();
        assert!(enc.is_in_pass());
        assert!(is_invalid_state(enc.finish()));
    }

    #[test]
    fn copies_inside_pass_rejected() {
        let mut enc = CommandEncoder::new(1, None);
        let _ = enc.begin_render_pass(&begin_info()).unwrap();
        assert!(is_invalid_state(enc.copy_buffer_to_buffer(&copy())));
    }

    #[test]
    fn nested_passes_rejected() {
        let mut enc = CommandEncoder::new(1, None);
        let _ = enc.begin_compute_pass(None).unwrap();
        assert!(is_invalid_state(enc.begin_render_pass(&begin_info()).map(|_| ())));
    }

    #[test]
    fn draw_requires_pipeline() {
        let mut enc = CommandEncoder::new(1, None);
        let mut pass = enc.begin_render_pass(&begin_info()).unwrap();
        assert!(is_invalid_state(pass.draw(3, 1, 0, 0)));
    }

    #[test]
    fn indexed_draw_requires_index_buffer() {
        let mut enc = CommandEncoder::new(1, None);
        let mut pass = enc.begin_render_pass(&begin_info()).unwrap();
        pass.set_pipeline(Handle::new(0, 0)).unwrap();
        assert!(is_invalid_state(pass.draw_indexed(3, 1, 0, 0, 0)));
    }

    #[test]
    fn bind_group_index_is_an_argument_error() {
        let mut enc = CommandEncoder::new(1, None);
        let mut pass = enc.begin_compute_pass(None).unwrap();
        assert!(matches!(
            pass.set_bind_group(MAX_BIND_GROUPS, Handle::new(0, 0), &[]),
            Err(GfxError::InvalidArgument(_))
        ));
        pass.set_pipeline(Handle::new(0, 0)).unwrap();
        pass.dispatch_workgroups(1, 1, 1).unwrap();
        pass.end().unwrap();
        assert_eq!(enc.state(), EncoderState::Recording);
    }

    #[test]
    fn occlusion_queries_nest_inside_render_passes_only() {
        let mut enc = CommandEncoder::new(1, None);
        {
            let mut pass = enc.begin_render_pass(&begin_info()).unwrap();
            pass.begin_occlusion_query(Handle::new(0, 0), 0).unwrap();
            pass.end_occlusion_query().unwrap();
            pass.begin_occlusion_query(Handle::new(0, 0), 1).unwrap();
            pass.end_occlusion_query().unwrap();
            pass.end().unwrap();
        }
        assert_eq!(enc.finish().unwrap().len(), 6);

        let mut enc = CommandEncoder::new(1, None);
        assert!(is_invalid_state(enc.begin_occlusion_query(Handle::new(0, 0), 0)));
        assert_eq!(enc.state(), EncoderState::Poisoned);

        let mut enc = CommandEncoder::new(1, None);
        let _ = enc.begin_compute_pass(None).unwrap();
        assert!(is_invalid_state(enc.begin_occlusion_query(Handle::new(0, 0), 0)));
    }

    #[test]
    fn unbalanced_occlusion_queries_poison() {
        let mut enc = CommandEncoder::new(1, None);
        let mut pass = enc.begin_render_pass(&begin_info()).unwrap();
        assert!(is_invalid_state(pass.end_occlusion_query()));

        let mut enc = CommandEncoder::new(1, None);
        let mut pass = enc.begin_render_pass(&begin_info()).unwrap();
        pass.begin_occlusion_query(Handle::new(0, 0), 0).unwrap();
        assert!(is_invalid_state(pass.begin_occlusion_query(Handle::new(0, 0), 1)));

        let mut enc = CommandEncoder::new(1, None);
        let mut pass = enc.begin_render_pass(&begin_info()).unwrap();
        pass.begin_occlusion_query(Handle::new(0, 0), 0).unwrap();
        assert!(is_invalid_state(pass.end()));
        assert_eq!(enc.state(), EncoderState::Poisoned);
    }

    #[test]
    fn timestamps_and_resolves_are_encoder_level() {
        let mut enc = CommandEncoder::new(1, None);
        enc.write_timestamp(Handle::new(0, 0), 0).unwrap();
        enc.write_timestamp(Handle::new(0, 0), 1).unwrap();
        assert!(matches!(
            enc.resolve_query_set(Handle::new(0, 0), 0, 0, Handle::new(1, 0), 0),
            Err(GfxError::InvalidArgument(_))
        ));
        enc.resolve_query_set(Handle::new(0, 0), 0, 2, Handle::new(1, 0), 0)
            .unwrap();
        assert_eq!(enc.finish().unwrap().len(), 3);

        let mut enc = CommandEncoder::new(1, None);
        let _ = enc.begin_render_pass(&begin_info()).unwrap();
        assert!(is_invalid_state(enc.write_timestamp(Handle::new(0, 0), 0)));
    }

    #[test]
    fn mipmap_generation_records_level_ranges() {
        let mut enc = CommandEncoder::new(1, None);
        enc.generate_mipmaps(Handle::new(2, 0)).unwrap();
        enc.generate_mipmaps_range(Handle::new(2, 0), 1, 2).unwrap();
        assert!(matches!(
            enc.generate_mipmaps_range(Handle::new(2, 0), 1, 0),
            Err(GfxError::InvalidArgument(_))
        ));
        let buffer = enc.finish().unwrap();
        assert_eq!(
            buffer.commands()[0],
            Command::GenerateMipmaps {
                texture: Handle::new(2, 0),
                base_mip_level: 0,
                level_count: 0,
            }
        );
        assert!(matches!(
            buffer.commands()[1],
            Command::GenerateMipmaps { base_mip_level: 1, level_count: 2, .. }
        ));

        let mut enc = CommandEncoder::new(1, None);
        let _ = enc.begin_compute_pass(None).unwrap();
        assert!(is_invalid_state(enc.generate_mipmaps(Handle::new(2, 0))));
    }

    #[test]
    fn segments_fold_passes() {
        let mut enc = CommandEncoder::new(1, None);
        enc.copy_buffer_to_buffer(&copy()).unwrap();
        {
            let mut pass = enc.begin_compute_pass(Some("cs")).unwrap();
            pass.set_pipeline(Handle::new(0, 0)).unwrap();
            pass.dispatch_workgroups(4, 1, 1).unwrap();
            pass.end().unwrap();
        }
        {
            let mut pass = enc.begin_render_pass(&begin_info()).unwrap();
            pass.set_pipeline(Handle::new(0, 0)).unwrap();
            pass.draw(3, 1, 0, 0).unwrap();
            pass.end().unwrap();
        }
        let buffer = enc.finish().unwrap();

        let segments: Vec<_> = buffer.segments().collect();
        assert_eq!(segments.len(), 3);
        assert!(matches!(
            segments[0],
            Segment::Command(Command::CopyBufferToBuffer(_))
        ));
        match &segments[1] {
            Segment::ComputePass { label, commands } => {
                assert_eq!(*label, Some("cs"));
                assert_eq!(commands.len(), 2);
            }
            _ => panic!("expected a compute pass"),
        }
        match &segments[2] {
            Segment::RenderPass { begin, commands } => {
                assert_eq!(begin.color_clear_values.len(), 1);
                assert!(matches!(commands[1], Command::Draw { vertex_count: 3, .. }));
            }
            _ => panic!("expected a render pass"),
        }
    }
}
