use crate::models::Size;

/// Largest uniform scale at which `native` fits inside `area`.
///
/// Horizontal and vertical ratios are computed independently and the smaller
/// one wins, so content is never stretched. Returns `None` for an empty
/// native size.
pub fn best_fit_scale(area: Size, native: Size) -> Option<f64> {
    if native.width == 0 || native.height == 0 {
        return None;
    }

    let vertical = f64::from(area.height) / f64::from(native.height);
    let horizontal = f64::from(area.width) / f64::from(native.width);
    Some(vertical.min(horizontal))
}

/// Client size for showing `content` plus the menu bar.
///
/// `frame` is the difference between outer and client size. The window's
/// minimum outer size wins over a smaller content size.
pub fn viewer_client_size(minimum_outer: Size, frame: Size, content: Size, menu_height: u32) -> Size {
    let minimum_client = minimum_outer.saturating_sub(frame);
    Size::new(
        minimum_client.width.max(content.width),
        minimum_client.height.max(content.height + menu_height),
    )
}
