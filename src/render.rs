use std::borrow::Cow;

use image::{Rgba, imageops::FilterType};
use nalgebra::Point2;

use crate::{PixelBuffer, stack::LayerHandle, stack::LayerStack, viewport::Viewport};

/// One image to paint, in screen space.
#[derive(Debug, Clone)]
pub struct RenderItem<'a> {
    pub layer: LayerHandle,
    pub image: &'a PixelBuffer,
    /// Top-left corner.
    pub position: Point2<f64>,
    pub scale: f64,
    pub opacity: f64,
}

/// Paint list for all visible layers, bottom to top.
///
/// A layer in free-drag mode shows its lifted image, scaled and centred on its anchor.
pub fn render<'a>(stack: &'a LayerStack, viewport: &Viewport) -> Vec<RenderItem<'a>> {
    stack
        .visible()
        .filter_map(|layer| {
            let (image, position, scale) = match (layer.free_drag(), layer.free_drag_rect()) {
                (Some(drag), Some((top_left, _))) => (&drag.image, top_left, layer.layer_scale()),
                _ => (layer.warped_image()?, layer.position, 1.0),
            };
            Some(RenderItem {
                layer: layer.handle(),
                image,
                position: viewport.to_screen(&position),
                scale: scale * viewport.scale,
                opacity: layer.opacity(),
            })
        })
        .collect()
}

fn blend(dst: &mut Rgba<u8>, src: &Rgba<u8>, opacity: f64) {
    let sa = f64::from(src[3]) / 255.0 * opacity;
    if sa <= 0.0 {
        return;
    }
    let da = f64::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let value = (f64::from(src[c]) * sa + f64::from(dst[c]) * da * (1.0 - sa)) / out_a;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Composites `items` source-over onto a transparent `width` x `height` canvas.
pub fn flatten(items: &[RenderItem<'_>], width: u32, height: u32) -> PixelBuffer {
    let mut canvas = PixelBuffer::new(width, height);
    for item in items {
        let image: Cow<'_, PixelBuffer> = if (item.scale - 1.0).abs() > f64::EPSILON {
            let w = (f64::from(item.image.width()) * item.scale).round().max(1.0) as u32;
            let h = (f64::from(item.image.height()) * item.scale).round().max(1.0) as u32;
            Cow::Owned(image::imageops::resize(item.image, w, h, FilterType::Triangle))
        } else {
            Cow::Borrowed(item.image)
        };
        let ox = item.position.x.round() as i64;
        let oy = item.position.y.round() as i64;
        for (x, y, pixel) in image.enumerate_pixels() {
            let (cx, cy) = (ox + i64::from(x), oy + i64::from(y));
            if cx < 0 || cy < 0 || cx >= i64::from(width) || cy >= i64::from(height) {
                continue;
            }
            blend(canvas.get_pixel_mut(cx as u32, cy as u32), pixel, item.opacity);
        }
    }
    canvas
}
