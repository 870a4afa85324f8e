//! In-process animated GIF encoding.

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, RgbImage};
use tracing::debug;

use crate::error::EncoderError;
use crate::EncoderResult;

/// Palette quantization speed (1 slowest/best, 30 fastest).
const QUANTIZE_SPEED: i32 = 10;

/// Encode frames as an infinitely looping GIF with a delay of `1/fps`.
///
/// Fails with [`EncoderError::NoFrames`] if the iterator is empty, and on
/// the first frame that fails to decode.
pub fn encode_gif<I>(frames: I, fps: u32) -> EncoderResult<Vec<u8>>
where
    I: IntoIterator<Item = EncoderResult<RgbImage>>,
{
    if fps == 0 {
        return Err(EncoderError::InvalidInput("frame rate 0".into()));
    }

    let delay = Delay::from_numer_denom_ms(1000, fps);
    let mut out = Vec::new();
    let mut count = 0usize;

    {
        let mut encoder = GifEncoder::new_with_speed(&mut out, QUANTIZE_SPEED);
        encoder.set_repeat(Repeat::Infinite)?;

        for frame in frames {
            let rgba = DynamicImage::ImageRgb8(frame?).into_rgba8();
            encoder.encode_frame(Frame::from_parts(rgba, 0, 0, delay))?;
            count += 1;
        }
        // The trailer is written when the encoder drops.
    }

    if count == 0 {
        return Err(EncoderError::NoFrames);
    }

    debug!(frames = count, bytes = out.len(), fps, "Encoded GIF");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifDecoder;
    use image::{AnimationDecoder, Rgb};
    use std::io::Cursor;

    #[test]
    fn test_encodes_looping_animation() {
        let frames = (0..3u8).map(|i| Ok(RgbImage::from_pixel(6, 4, Rgb([i * 80, 0, 0]))));
        let bytes = encode_gif(frames, 10).unwrap();
        assert_eq!(&bytes[..6], b"GIF89a");

        let decoded = GifDecoder::new(Cursor::new(bytes))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(decoded.len(), 3);
        let (numer, denom) = decoded[0].delay().numer_denom_ms();
        assert_eq!(numer / denom, 100);
    }

    #[test]
    fn test_no_frames_is_error() {
        let result = encode_gif(std::iter::empty::<EncoderResult<RgbImage>>(), 10);
        assert!(matches!(result, Err(EncoderError::NoFrames)));
    }

    #[test]
    fn test_decode_error_propagates() {
        let frames = vec![
            Ok(RgbImage::new(2, 2)),
            Err(EncoderError::MalformedContainer("bad frame".into())),
        ];
        assert!(matches!(
            encode_gif(frames, 5),
            Err(EncoderError::MalformedContainer(_))
        ));
    }
}
