//! Mapping from display-level state to wgpu descriptors.

use crate::pixel::PixelFormat;
use crate::state::{
    BlendFactor, BlendMode, BlendOp, CompareFunc, CullMode, DepthStencilState, SamplerState,
};

pub(super) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Texture format used to store `format`, if wgpu has an exact equivalent.
pub(super) fn texture_format(format: PixelFormat) -> Option<wgpu::TextureFormat> {
    match format {
        PixelFormat::Rgba8 => Some(wgpu::TextureFormat::Rgba8Unorm),
        PixelFormat::Bgra8 => Some(wgpu::TextureFormat::Bgra8Unorm),
        PixelFormat::Bgrx8
        | PixelFormat::Bgra4
        | PixelFormat::Bgr5a1
        | PixelFormat::Rgb8
        | PixelFormat::Paletted => None,
    }
}

/// Inverse of `texture_format` for formats the CPU can read back.
pub(super) fn pixel_format(format: wgpu::TextureFormat) -> Option<PixelFormat> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Some(PixelFormat::Rgba8),
        wgpu::TextureFormat::Bgra8Unorm => Some(PixelFormat::Bgra8),
        _ => None,
    }
}

fn blend_factor(f: BlendFactor) -> wgpu::BlendFactor {
    match f {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
    }
}

pub(super) fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    let eq = mode.equation();
    let component = wgpu::BlendComponent {
        src_factor: blend_factor(eq.src),
        dst_factor: blend_factor(eq.dst),
        operation: match eq.op {
            BlendOp::Add => wgpu::BlendOperation::Add,
            BlendOp::Subtract => wgpu::BlendOperation::Subtract,
        },
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

pub(super) fn cull_mode(cull: CullMode) -> Option<wgpu::Face> {
    match cull {
        CullMode::Back => Some(wgpu::Face::Back),
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::None => None,
    }
}

fn compare(func: CompareFunc) -> wgpu::CompareFunction {
    match func {
        CompareFunc::Always => wgpu::CompareFunction::Always,
        CompareFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunc::Greater => wgpu::CompareFunction::Greater,
    }
}

pub(super) fn depth_stencil(state: DepthStencilState) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: state.write,
        depth_compare: compare(state.test.compare()),
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

pub(super) fn sampler_descriptor(state: SamplerState) -> wgpu::SamplerDescriptor<'static> {
    let address = if state.wrap {
        wgpu::AddressMode::Repeat
    } else {
        wgpu::AddressMode::ClampToEdge
    };
    let (filter, mip) = if state.linear {
        (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Linear)
    } else {
        (wgpu::FilterMode::Nearest, wgpu::MipmapFilterMode::Nearest)
    };
    wgpu::SamplerDescriptor {
        label: Some("rivet sampler"),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: mip,
        ..Default::default()
    }
}

/// Index into a four-entry sampler table.
pub(super) fn sampler_index(state: SamplerState) -> usize {
    (state.linear as usize) | ((state.wrap as usize) << 1)
}

pub(super) fn sampler_state(index: usize) -> SamplerState {
    SamplerState {
        linear: index & 1 != 0,
        wrap: index & 2 != 0,
    }
}
