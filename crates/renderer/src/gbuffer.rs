//! Geometry buffer: the offscreen position/normal/color-spec/depth target of the geometry pass.

use thiserror::Error;

/// Sky color used to clear the color-spec attachment (135, 206, 235).
pub const SKY_COLOR: wgpu::Color = wgpu::Color {
    r: 135.0 / 255.0,
    g: 206.0 / 255.0,
    b: 235.0 / 255.0,
    a: 1.0,
};

/// Usage every attachment needs: written by the geometry pass, read by the composition pass.
pub const ATTACHMENT_USAGE: wgpu::TextureUsages =
    wgpu::TextureUsages::RENDER_ATTACHMENT.union(wgpu::TextureUsages::TEXTURE_BINDING);

/// An attachment of the geometry buffer. Color slots keep their render target index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GBufferSlot {
    /// View-space position, target 0.
    Position,
    /// View-space normal, target 1.
    Normal,
    /// Diffuse color in rgb, specular intensity in a. Target 2.
    ColorSpec,
    Depth,
}

impl GBufferSlot {
    pub const ALL: [GBufferSlot; 4] = [
        GBufferSlot::Position,
        GBufferSlot::Normal,
        GBufferSlot::ColorSpec,
        GBufferSlot::Depth,
    ];

    /// Color slots in render target order.
    pub const COLOR: [GBufferSlot; 3] = [GBufferSlot::Position, GBufferSlot::Normal, GBufferSlot::ColorSpec];

    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            GBufferSlot::Position | GBufferSlot::Normal => wgpu::TextureFormat::Rgba16Float,
            GBufferSlot::ColorSpec => wgpu::TextureFormat::Rgba8Unorm,
            GBufferSlot::Depth => wgpu::TextureFormat::Depth32Float,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GBufferSlot::Position => "GBuffer Position",
            GBufferSlot::Normal => "GBuffer Normal",
            GBufferSlot::ColorSpec => "GBuffer ColorSpec",
            GBufferSlot::Depth => "GBuffer Depth",
        }
    }

    /// Render target index, `None` for depth.
    pub fn color_index(self) -> Option<u32> {
        match self {
            GBufferSlot::Position => Some(0),
            GBufferSlot::Normal => Some(1),
            GBufferSlot::ColorSpec => Some(2),
            GBufferSlot::Depth => None,
        }
    }

    /// Value the geometry pass clears a color slot to. Depth clears to 1.0.
    pub fn clear_color(self) -> wgpu::Color {
        match self {
            GBufferSlot::ColorSpec => SKY_COLOR,
            _ => wgpu::Color::TRANSPARENT,
        }
    }
}

/// Why a geometry buffer is not complete.
#[derive(Debug, Error, PartialEq)]
pub enum GBufferError {
    #[error("geometry buffer has a zero-sized extent ({width}x{height})")]
    ZeroSized { width: u32, height: u32 },
    #[error("{slot:?} attachment is {actual:?}, expected {expected:?}")]
    SizeMismatch {
        slot: GBufferSlot,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("{slot:?} attachment has format {actual:?}, expected {expected:?}")]
    WrongFormat {
        slot: GBufferSlot,
        expected: wgpu::TextureFormat,
        actual: wgpu::TextureFormat,
    },
    #[error("{slot:?} attachment is missing usage {missing:?}")]
    MissingUsage {
        slot: GBufferSlot,
        missing: wgpu::TextureUsages,
    },
    #[error("attachment {index} is {actual:?}, expected {expected:?}")]
    WrongSlot {
        index: usize,
        expected: GBufferSlot,
        actual: GBufferSlot,
    },
    #[error("graphics API rejected the geometry buffer: {0}")]
    Validation(String),
}

/// What an attachment is expected to (or actually does) look like.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentDesc {
    pub slot: GBufferSlot,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

/// Usage attachments are allocated with. Copies out are for readback only.
const ALLOCATED_USAGE: wgpu::TextureUsages = ATTACHMENT_USAGE.union(wgpu::TextureUsages::COPY_SRC);

/// The four attachments of a geometry buffer, in slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct GBufferLayout {
    pub width: u32,
    pub height: u32,
    pub attachments: [AttachmentDesc; 4],
}

impl GBufferLayout {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            attachments: GBufferSlot::ALL.map(|slot| AttachmentDesc {
                slot,
                width,
                height,
                format: slot.format(),
                usage: ALLOCATED_USAGE,
            }),
        }
    }

    pub fn check_complete(&self) -> Result<(), GBufferError> {
        check_attachments(self.width, self.height, &self.attachments)
    }
}

/// Check that `attachments` are the geometry buffer slots in order, all
/// `width`x`height`, with the slot formats and the usages both passes need.
pub(crate) fn check_attachments(width: u32, height: u32, attachments: &[AttachmentDesc]) -> Result<(), GBufferError> {
    if width == 0 || height == 0 {
        return Err(GBufferError::ZeroSized { width, height });
    }

    for (index, expected) in GBufferSlot::ALL.iter().copied().enumerate() {
        let Some(desc) = attachments.get(index) else {
            return Err(GBufferError::Validation(format!("{expected:?} attachment is missing")));
        };
        if desc.slot != expected {
            return Err(GBufferError::WrongSlot {
                index,
                expected,
                actual: desc.slot,
            });
        }
        if (desc.width, desc.height) != (width, height) {
            return Err(GBufferError::SizeMismatch {
                slot: desc.slot,
                expected: (width, height),
                actual: (desc.width, desc.height),
            });
        }
        if desc.format != expected.format() {
            return Err(GBufferError::WrongFormat {
                slot: desc.slot,
                expected: expected.format(),
                actual: desc.format,
            });
        }
        if !desc.usage.contains(ATTACHMENT_USAGE) {
            return Err(GBufferError::MissingUsage {
                slot: desc.slot,
                missing: ATTACHMENT_USAGE - desc.usage,
            });
        }
    }

    Ok(())
}

/// One allocated attachment.
pub struct Attachment {
    pub slot: GBufferSlot,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Attachment {
    fn new(device: &wgpu::Device, desc: &AttachmentDesc) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.slot.label()),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            slot: desc.slot,
            texture,
            view,
        }
    }

    /// What the GPU actually allocated.
    pub fn desc(&self) -> AttachmentDesc {
        AttachmentDesc {
            slot: self.slot,
            width: self.texture.width(),
            height: self.texture.height(),
            format: self.texture.format(),
            usage: self.texture.usage(),
        }
    }
}

/// Offscreen multi-attachment target written by the geometry pass.
pub struct GeometryBuffer {
    width: u32,
    height: u32,
    attachments: [Attachment; 4],
}

impl GeometryBuffer {
    /// Allocate a complete geometry buffer.
    ///
    /// Fails if wgpu reports a validation error while the attachments are
    /// created, or if the allocated textures do not match the layout.
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, GBufferError> {
        let layout = GBufferLayout::new(width, height);
        layout.check_complete()?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let attachments = layout.attachments.map(|desc| Attachment::new(device, &desc));
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(GBufferError::Validation(error.to_string()));
        }

        let gbuffer = Self {
            width,
            height,
            attachments,
        };
        gbuffer.check_complete()?;
        log::info!("Geometry buffer created ({}x{})", width, height);
        Ok(gbuffer)
    }

    /// Run the completeness check against the allocated textures.
    pub fn check_complete(&self) -> Result<(), GBufferError> {
        let descs = self.attachments.each_ref().map(Attachment::desc);
        check_attachments(self.width, self.height, &descs)
    }

    /// Reallocate every attachment at a new size. Bind groups that reference
    /// the old views must be rebuilt by the caller.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> Result<(), GBufferError> {
        *self = Self::new(device, width, height)?;
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn attachment(&self, slot: GBufferSlot) -> &Attachment {
        // ALL order is the storage order.
        match slot {
            GBufferSlot::Position => &self.attachments[0],
            GBufferSlot::Normal => &self.attachments[1],
            GBufferSlot::ColorSpec => &self.attachments[2],
            GBufferSlot::Depth => &self.attachments[3],
        }
    }

    pub fn view(&self, slot: GBufferSlot) -> &wgpu::TextureView {
        &self.attachment(slot).view
    }

    /// Color targets for the geometry pass, cleared each frame.
    pub fn color_attachments(&self) -> [Option<wgpu::RenderPassColorAttachment<'_>>; 3] {
        GBufferSlot::COLOR.map(|slot| {
            Some(wgpu::RenderPassColorAttachment {
                view: self.view(slot),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(slot.clear_color()),
                    store: wgpu::StoreOp::Store,
                },
            })
        })
    }

    /// Depth target for the geometry pass, cleared to the far plane.
    pub fn depth_attachment(&self) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        wgpu::RenderPassDepthStencilAttachment {
            view: self.view(GBufferSlot::Depth),
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless_device;

    #[test]
    fn layout_at_800x600_is_complete() {
        let layout = GBufferLayout::new(800, 600);
        assert_eq!(layout.check_complete(), Ok(()));

        let formats: Vec<_> = layout.attachments.iter().map(|a| a.format).collect();
        assert_eq!(
            formats,
            [
                wgpu::TextureFormat::Rgba16Float,
                wgpu::TextureFormat::Rgba16Float,
                wgpu::TextureFormat::Rgba8Unorm,
                wgpu::TextureFormat::Depth32Float,
            ]
        );
        assert!(layout.attachments.iter().all(|a| (a.width, a.height) == (800, 600)));
    }

    #[test]
    fn slot_order_matches_render_targets() {
        let indices: Vec<_> = GBufferSlot::ALL.iter().map(|s| s.color_index()).collect();
        assert_eq!(indices, [Some(0), Some(1), Some(2), None]);
    }

    #[test]
    fn only_color_spec_clears_to_sky() {
        assert_eq!(GBufferSlot::ColorSpec.clear_color(), SKY_COLOR);
        assert_eq!(GBufferSlot::Position.clear_color(), wgpu::Color::TRANSPARENT);
        assert_eq!(GBufferSlot::Normal.clear_color(), wgpu::Color::TRANSPARENT);

        let bytes = [SKY_COLOR.r, SKY_COLOR.g, SKY_COLOR.b].map(|c| (c * 255.0).round() as u8);
        assert_eq!(bytes, [135, 206, 235]);
    }

    #[test]
    fn tampered_layouts_are_incomplete() {
        let mut layout = GBufferLayout::new(800, 600);
        layout.attachments[1].height = 300;
        assert!(matches!(
            layout.check_complete(),
            Err(GBufferError::SizeMismatch { slot: GBufferSlot::Normal, .. })
        ));

        let mut layout = GBufferLayout::new(800, 600);
        layout.attachments[2].format = wgpu::TextureFormat::Rgba16Float;
        assert!(matches!(layout.check_complete(), Err(GBufferError::WrongFormat { .. })));

        let mut layout = GBufferLayout::new(800, 600);
        layout.attachments[3].usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        assert_eq!(
            layout.check_complete(),
            Err(GBufferError::MissingUsage {
                slot: GBufferSlot::Depth,
                missing: wgpu::TextureUsages::TEXTURE_BINDING,
            })
        );

        let mut layout = GBufferLayout::new(800, 600);
        layout.attachments.swap(0, 1);
        assert!(matches!(layout.check_complete(), Err(GBufferError::WrongSlot { index: 0, .. })));

        assert!(matches!(
            GBufferLayout::new(0, 600).check_complete(),
            Err(GBufferError::ZeroSized { .. })
        ));
    }

    #[test]
    fn allocated_gbuffer_reports_requested_attachments() {
        let Some((device, _queue)) = headless_device() else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let gbuffer = GeometryBuffer::new(&device, 800, 600).unwrap();
        assert_eq!(gbuffer.check_complete(), Ok(()));
        for slot in GBufferSlot::ALL {
            let desc = gbuffer.attachment(slot).desc();
            assert_eq!((desc.width, desc.height), (800, 600));
            assert_eq!(desc.format, slot.format());
        }
    }
}
