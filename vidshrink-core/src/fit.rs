//! Output size fitting.

use crate::error::TranscodeError;

/// Size computed by [`fit`]. `scale` never exceeds 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fitted {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
}

impl Fitted {
    /// Both dimensions forced to even values no smaller than 2, as video
    /// encoders require.
    pub fn even(&self) -> (u32, u32) {
        (even_at_least_two(self.width), even_at_least_two(self.height))
    }
}

/// Fits `src_w x src_h` inside `max_w x max_h` keeping the aspect ratio.
/// Never upscales.
pub fn fit(src_w: u32, src_h: u32, max_w: u32, max_h: u32) -> Result<Fitted, TranscodeError> {
    if src_w == 0 || src_h == 0 {
        return Err(TranscodeError::InvalidInput(format!(
            "source dimensions must be positive, got {}x{}",
            src_w, src_h
        )));
    }

    let scale = (max_w as f64 / src_w as f64)
        .min(max_h as f64 / src_h as f64)
        .min(1.0);

    Ok(Fitted {
        width: (src_w as f64 * scale).round() as u32,
        height: (src_h as f64 * scale).round() as u32,
        scale,
    })
}

pub fn even_at_least_two(n: u32) -> u32 {
    (n & !1).max(2)
}
