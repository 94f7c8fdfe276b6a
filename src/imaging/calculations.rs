//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Aspect ratio normalized so it is always `>= 1.0`: `max(w/h, h/w)`.
pub fn aspect_ratio(width: u32, height: u32) -> f64 {
    let (w, h) = (width as f64, height as f64);
    (w / h).max(h / w)
}

/// Dimensions after capping the longer side at `max_side`.
///
/// Returns the input unchanged when it already fits. Otherwise the longer
/// side becomes exactly `max_side` and the shorter side is scaled and rounded.
///
/// ```
/// # use photo_variants::imaging::calculations::cap_longer_side;
/// assert_eq!(cap_longer_side((3000, 2000), 1600), (1600, 1067));
/// assert_eq!(cap_longer_side((800, 600), 1600), (800, 600));
/// ```
pub fn cap_longer_side(dims: (u32, u32), max_side: u32) -> (u32, u32) {
    let (w, h) = dims;
    let longer = w.max(h);
    if longer <= max_side {
        return dims;
    }
    let scale = max_side as f64 / longer as f64;
    if w >= h {
        (max_side, scaled(h, scale))
    } else {
        (scaled(w, scale), max_side)
    }
}

/// Dimensions that fit entirely within `bounds`, preserving aspect ratio.
///
/// Thumbnail semantics: the result never exceeds the source dimensions, so a
/// source already inside the bounds is returned as-is.
///
/// ```
/// # use photo_variants::imaging::calculations::fit_within;
/// assert_eq!(fit_within((1600, 1067), (1200, 1600)), (1200, 800));
/// assert_eq!(fit_within((500, 400), (600, 900)), (500, 400));
/// ```
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;
    if src_w <= max_w && src_h <= max_h {
        return source;
    }
    let scale = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    (
        scaled(src_w, scale).min(max_w),
        scaled(src_h, scale).min(max_h),
    )
}

/// Centered square crop box `(x, y, side)` for the given dimensions.
///
/// The side is the shorter dimension; leftover pixels on the longer axis are
/// split evenly, with the odd pixel going to the right/bottom.
pub fn center_square(dims: (u32, u32)) -> (u32, u32, u32) {
    let (w, h) = dims;
    let side = w.min(h);
    ((w - side) / 2, (h - side) / 2, side)
}

fn scaled(value: u32, scale: f64) -> u32 {
    ((value as f64 * scale).round() as u32).max(1)
}
