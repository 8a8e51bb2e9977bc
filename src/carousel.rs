//! Current-item tracking for the horizontal project carousel
//!
//! The carousel shows a title slide followed by one slide per image. Slide
//! width depends on the viewport breakpoint; every slide is separated by a
//! fixed gap. [`current_index`] turns a scroll offset into the index of the
//! slide the viewer is looking at: `0` is the title slide, `1..=n` are images.

/// Space between slides in pixels
pub const SLIDE_GAP: f64 = 32.0;

/// Viewport width at which the tablet layout starts
pub const TABLET_MIN_WIDTH: f64 = 768.0;

/// Viewport width at which the desktop layout starts
pub const DESKTOP_MIN_WIDTH: f64 = 1024.0;

/// Layout breakpoint of the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakpoint {
    /// Below 768px, slides take 80% of the container
    Mobile,
    /// 768px to below 1024px, slides take 60%
    Tablet,
    /// 1024px and wider, slides take 40%
    Desktop,
}

impl Breakpoint {
    /// Breakpoint for a viewport width in pixels
    pub fn for_viewport(viewport_width: f64) -> Self {
        if viewport_width >= DESKTOP_MIN_WIDTH {
            Breakpoint::Desktop
        } else if viewport_width >= TABLET_MIN_WIDTH {
            Breakpoint::Tablet
        } else {
            Breakpoint::Mobile
        }
    }

    /// Share of the container one slide occupies
    pub fn slide_factor(&self) -> f64 {
        match self {
            Breakpoint::Mobile => 0.8,
            Breakpoint::Tablet => 0.6,
            Breakpoint::Desktop => 0.4,
        }
    }

    /// Slide width for a container of `container_width` pixels
    pub fn slide_width(&self, container_width: f64) -> f64 {
        container_width * self.slide_factor()
    }
}

/// Index of the slide in view, clamped to `0..=image_count`.
///
/// The title slide stays current until the scroll passes half a slide
/// width. Past the title slide (slide plus gap) the index advances by one
/// per slide stride, rounded to the nearest slide.
pub fn current_index(
    scroll_left: f64,
    container_width: f64,
    viewport_width: f64,
    image_count: usize,
) -> usize {
    let slide_width = Breakpoint::for_viewport(viewport_width).slide_width(container_width);
    let stride = slide_width + SLIDE_GAP;
    let past_title = scroll_left - stride;

    let index = if past_title > 0.0 {
        (past_title / stride).round() as usize + 1
    } else if scroll_left > slide_width / 2.0 {
        1
    } else {
        0
    };

    index.min(image_count)
}
