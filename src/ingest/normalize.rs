use anyhow::{anyhow, Result};

/// Pixel layouts a camera driver may hand back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Yuyv,
}

/// Convert a captured buffer into packed RGB24.
///
/// Buffers longer than the expected size (drivers pad to page boundaries) are
/// truncated; shorter ones are rejected.
pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    let area = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
    match format {
        PixelFormat::Rgb24 => {
            let expected = area
                .checked_mul(3)
                .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))?;
            Ok(take_exact(pixels, expected, "RGB")?.to_vec())
        }
        PixelFormat::Yuyv => {
            if width % 2 != 0 {
                return Err(anyhow!("YUYV frame width {} is not even", width));
            }
            let expected = area
                .checked_mul(2)
                .ok_or_else(|| anyhow!("YUYV frame dimensions overflow"))?;
            Ok(yuyv_to_rgb(take_exact(pixels, expected, "YUYV")?))
        }
    }
}

fn take_exact<'a>(pixels: &'a [u8], expected: usize, label: &str) -> Result<&'a [u8]> {
    pixels.get(..expected).ok_or_else(|| {
        anyhow!(
            "{} frame too short: expected {}, got {}",
            label,
            expected,
            pixels.len()
        )
    })
}

/// Each 4-byte group `Y0 U Y1 V` carries two pixels sharing chroma.
fn yuyv_to_rgb(pixels: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() / 2 * 3);
    for group in pixels.chunks_exact(4) {
        let u = group[1] as f32 - 128.0;
        let v = group[3] as f32 - 128.0;
        for y in [group[0], group[2]] {
            let y = y as f32;
            rgb.push(clamp_to_u8(y + 1.402_f32 * v));
            rgb.push(clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v));
            rgb.push(clamp_to_u8(y + 1.772_f32 * u));
        }
    }
    rgb
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_yuyv_is_gray() -> Result<()> {
        let yuyv = vec![100u8, 128, 100, 128];
        let rgb = normalize_to_rgb(&yuyv, 2, 1, PixelFormat::Yuyv)?;
        assert_eq!(rgb, vec![100u8; 6]);
        Ok(())
    }

    #[test]
    fn padded_rgb_is_truncated() -> Result<()> {
        let mut pixels = vec![7u8; 6];
        pixels.extend_from_slice(&[0u8; 10]);
        let rgb = normalize_to_rgb(&pixels, 2, 1, PixelFormat::Rgb24)?;
        assert_eq!(rgb, vec![7u8; 6]);
        Ok(())
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(normalize_to_rgb(&[0u8; 5], 2, 1, PixelFormat::Rgb24).is_err());
        assert!(normalize_to_rgb(&[0u8; 3], 2, 1, PixelFormat::Yuyv).is_err());
        assert!(normalize_to_rgb(&[0u8; 8], 3, 1, PixelFormat::Yuyv).is_err());
    }
}
