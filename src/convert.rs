//! Pixel conversion from captured frames to the preview window's 0RGB buffer.

use image::ImageFormat;

use crate::traits::{CameraError, FourCC, Frame, Result};

/// Convert YUV values to RGB.
///
/// Uses the ITU-R BT.601 conversion formula. The result is clamped to the
/// 0-255 range.
#[must_use]
#[allow(clippy::many_single_char_names)]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y_f = f32::from(y);
    let u_f = f32::from(u) - 128.0;
    let v_f = f32::from(v) - 128.0;

    let r = 1.402f32.mul_add(v_f, y_f);
    let g = 0.714_14f32.mul_add(-v_f, 0.344_14f32.mul_add(-u_f, y_f));
    let b = 1.772f32.mul_add(u_f, y_f);

    let clamp = |val: f32| -> u8 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            val.clamp(0.0, 255.0) as u8
        }
    };

    (clamp(r), clamp(g), clamp(b))
}

/// Pack an RGB triple into the 0RGB layout minifb expects.
#[must_use]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Decode a frame into 0RGB pixels, row-major, `width * height` long.
pub fn frame_to_xrgb(frame: &Frame, out: &mut Vec<u32>) -> Result<()> {
    let pixels = (frame.format.width as usize) * (frame.format.height as usize);
    out.clear();
    out.reserve(pixels);

    match frame.format.fourcc {
        FourCC::YUYV => yuyv_to_xrgb(&frame.data, out),
        FourCC::RGB3 => rgb24_to_xrgb(&frame.data, out),
        FourCC::MJPG => mjpeg_to_xrgb(&frame.data, frame, out)?,
        other => {
            return Err(CameraError::Unsupported(format!(
                "preview of {other} frames"
            )));
        }
    }

    // Short or truncated buffers are padded black rather than rejected.
    out.resize(pixels, 0);
    Ok(())
}

fn yuyv_to_xrgb(data: &[u8], out: &mut Vec<u32>) {
    for chunk in data.chunks_exact(4) {
        if let [y0, u, y1, v] = *chunk {
            let (r, g, b) = yuv_to_rgb(y0, u, v);
            out.push(pack_rgb(r, g, b));
            let (r, g, b) = yuv_to_rgb(y1, u, v);
            out.push(pack_rgb(r, g, b));
        }
    }
}

fn rgb24_to_xrgb(data: &[u8], out: &mut Vec<u32>) {
    for chunk in data.chunks_exact(3) {
        if let [r, g, b] = *chunk {
            out.push(pack_rgb(r, g, b));
        }
    }
}

fn mjpeg_to_xrgb(data: &[u8], frame: &Frame, out: &mut Vec<u32>) -> Result<()> {
    let decoded = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .map_err(|err| CameraError::StreamError(format!("MJPEG decode failed: {err}")))?
        .to_rgb8();

    if decoded.width() != frame.format.width || decoded.height() != frame.format.height {
        return Err(CameraError::FrameSizeMismatch {
            width: frame.format.width,
            height: frame.format.height,
            actual_width: decoded.width(),
            actual_height: decoded.height(),
        });
    }

    out.extend(decoded.pixels().map(|p| pack_rgb(p.0[0], p.0[1], p.0[2])));
    Ok(())
}
