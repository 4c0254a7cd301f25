/// Distance from the bottom, in layout units, still treated as "at the bottom".
pub const SCROLL_PIN_TOLERANCE: f64 = 10.0;

/// Geometry of a scrollable viewport at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    /// Total height of the scrollable content.
    pub extent: f64,
    /// Visible height of the viewport.
    pub viewport: f64,
    /// Current scroll offset from the top.
    pub offset: f64,
}

impl ScrollMetrics {
    pub fn distance_from_bottom(&self) -> f64 {
        self.extent - self.viewport - self.offset
    }

    /// Offset that shows the last line of content.
    pub fn bottom_offset(&self) -> f64 {
        (self.extent - self.viewport).max(0.0)
    }
}

/// Decision captured before a content mutation is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDecision {
    FollowBottom,
    Hold,
}

impl ScrollDecision {
    /// Where to move the viewport after the new content has been laid out.
    pub fn target_offset(self, laid_out: ScrollMetrics) -> Option<f64> {
        match self {
            ScrollDecision::FollowBottom => Some(laid_out.bottom_offset()),
            ScrollDecision::Hold => None,
        }
    }
}

/// Tracks whether a viewport is pinned to the bottom of its content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnchor {
    pinned: bool,
}

impl ScrollAnchor {
    pub fn new() -> Self {
        Self { pinned: true }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Recomputes `pinned` from a scroll-position observation.
    pub fn observe(&mut self, metrics: ScrollMetrics) {
        self.pinned = metrics.distance_from_bottom() <= SCROLL_PIN_TOLERANCE;
    }

    /// Must be called before the mutation is rendered.
    pub fn begin_update(&self) -> ScrollDecision {
        if self.pinned {
            ScrollDecision::FollowBottom
        } else {
            ScrollDecision::Hold
        }
    }
}

impl Default for ScrollAnchor {
    fn default() -> Self {
        Self::new()
    }
}
