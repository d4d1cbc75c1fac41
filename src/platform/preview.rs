use super::RgbaImage;
use image::imageops::{self, FilterType};

/// Byte offsets of the colour channels inside one source pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOrder {
    pub red: usize,
    pub green: usize,
    pub blue: usize,
    pub alpha: Option<usize>,
}

impl Default for ChannelOrder {
    /// Little-endian BGRX, the common X11 and CoreGraphics layout.
    fn default() -> Self {
        Self {
            red: 2,
            green: 1,
            blue: 0,
            alpha: None,
        }
    }
}

impl ChannelOrder {
    pub const BGRA: ChannelOrder = ChannelOrder {
        red: 2,
        green: 1,
        blue: 0,
        alpha: Some(3),
    };

    /// Derives the order from a visual's channel masks. Falls back to BGRX
    /// for masks that are not byte aligned.
    pub fn from_masks(red_mask: u32, green_mask: u32, blue_mask: u32) -> Self {
        let red = (red_mask.trailing_zeros() / 8) as usize;
        let green = (green_mask.trailing_zeros() / 8) as usize;
        let blue = (blue_mask.trailing_zeros() / 8) as usize;
        if red > 3 || green > 3 || blue > 3 {
            return Self::default();
        }
        Self {
            red,
            green,
            blue,
            alpha: None,
        }
    }
}

/// Converts packed pixel rows into an RGBA image. `stride` is the length of
/// one source row in bytes.
pub fn pixels_to_rgba(
    data: &[u8],
    width: usize,
    height: usize,
    stride: usize,
    bytes_per_pixel: usize,
    order: ChannelOrder,
) -> Option<RgbaImage> {
    if width == 0 || height == 0 || stride < width.checked_mul(bytes_per_pixel)? {
        return None;
    }
    let max_offset = order
        .red
        .max(order.green)
        .max(order.blue)
        .max(order.alpha.unwrap_or(0));
    if bytes_per_pixel < 3 || max_offset >= bytes_per_pixel {
        return None;
    }
    if data.len() < stride.checked_mul(height)? {
        return None;
    }

    let mut out = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let row = &data[y * stride..];
        for x in 0..width {
            let px = &row[x * bytes_per_pixel..];
            let alpha = order.alpha.map_or(255, |a| px[a]);
            out.extend_from_slice(&[px[order.red], px[order.green], px[order.blue], alpha]);
        }
    }
    RgbaImage::from_raw(width as u32, height as u32, out)
}

/// Scales `image` down to fit inside `max_w` x `max_h`, keeping its aspect
/// ratio. Never upscales.
pub fn fit_thumbnail(image: &RgbaImage, max_w: u32, max_h: u32) -> Option<RgbaImage> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || max_w == 0 || max_h == 0 {
        return None;
    }
    let scale = (max_w as f64 / w as f64)
        .min(max_h as f64 / h as f64)
        .min(1.0);
    if scale >= 1.0 {
        return Some(image.clone());
    }
    let dst_w = ((w as f64 * scale).round() as u32).clamp(1, max_w);
    let dst_h = ((h as f64 * scale).round() as u32).clamp(1, max_h);
    Some(imageops::resize(image, dst_w, dst_h, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_order_from_masks() {
        let cases = [
            ((0x00ff_0000, 0x0000_ff00, 0x0000_00ff), ChannelOrder::default()),
            (
                (0x0000_00ff, 0x0000_ff00, 0x00ff_0000),
                ChannelOrder {
                    red: 0,
                    green: 1,
                    blue: 2,
                    alpha: None,
                },
            ),
        ];
        for ((r, g, b), expected) in cases {
            let order = ChannelOrder::from_masks(r, g, b);
            assert_eq!(order, expected, "masks: {r:#x} {g:#x} {b:#x}");
        }
    }

    #[test]
    fn bgrx_rows_with_padding() {
        // 2x1 image, stride padded to 12 bytes.
        let data = [
            10, 20, 30, 0, // b g r x
            40, 50, 60, 0, //
            0, 0, 0, 0, // padding
        ];
        let img = pixels_to_rgba(&data, 2, 1, 12, 4, ChannelOrder::default()).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [30, 20, 10, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [60, 50, 40, 255]);
    }

    #[test]
    fn bgra_keeps_alpha() {
        let data = [1, 2, 3, 128];
        let img = pixels_to_rgba(&data, 1, 1, 4, 4, ChannelOrder::BGRA).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [3, 2, 1, 128]);
    }

    #[test]
    fn rejects_short_buffers() {
        let cases = [
            (vec![0u8; 7], 2, 1, 8, 4),
            (vec![0u8; 8], 0, 1, 8, 4),
            (vec![0u8; 4], 2, 1, 4, 4),
            (vec![0u8; 4], 2, 1, 4, 2),
        ];
        for (data, w, h, stride, bpp) in cases {
            assert!(
                pixels_to_rgba(&data, w, h, stride, bpp, ChannelOrder::default()).is_none(),
                "w={w} h={h} stride={stride} bpp={bpp} len={}",
                data.len()
            );
        }
    }

    #[test]
    fn thumbnail_keeps_aspect_and_never_upscales() {
        let cases = [
            ((800, 400), (200, 200), (200, 100)),
            ((400, 800), (200, 200), (100, 200)),
            ((100, 50), (200, 200), (100, 50)),
        ];
        for ((w, h), (mw, mh), expected) in cases {
            let img = RgbaImage::new(w, h);
            let thumb = fit_thumbnail(&img, mw, mh).unwrap();
            assert_eq!(thumb.dimensions(), expected, "src: {w}x{h} max: {mw}x{mh}");
        }
    }
}
