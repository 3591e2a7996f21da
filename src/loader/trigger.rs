//! Load-more trigger sources.

use crate::config::SiteConfig;

/// Why a load was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The "load more" button was pressed.
    Button,
    /// The sentinel element at the end of the list scrolled into view.
    Intersection,
}

/// Vertical geometry of the sentinel element relative to the viewport, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    /// Distance from the top of the viewport to the top of the element
    pub target_top: f64,
    /// Distance from the top of the viewport to the bottom of the element
    pub target_bottom: f64,
    pub viewport_height: f64,
}

/// Edge detector for scroll-triggered loading.
///
/// Reports [`Trigger::Intersection`] only when the sentinel goes from not
/// intersecting to intersecting, so a sentinel that stays on screen does not
/// keep firing.
#[derive(Debug, Clone)]
pub struct IntersectionWatch {
    root_margin_px: f64,
    threshold: f64,
    was_intersecting: bool,
}

impl IntersectionWatch {
    pub fn new(root_margin_px: f64, threshold: f64) -> Self {
        Self {
            root_margin_px,
            threshold: threshold.clamp(0.0, 1.0),
            was_intersecting: false,
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(
            config.intersection_root_margin_px,
            config.intersection_threshold,
        )
    }

    /// Whether `entry` counts as intersecting the margin-expanded viewport.
    pub fn is_intersecting(&self, entry: &IntersectionEntry) -> bool {
        let root_top = -self.root_margin_px;
        let root_bottom = entry.viewport_height + self.root_margin_px;

        let height = entry.target_bottom - entry.target_top;
        if height <= 0.0 {
            return entry.target_top >= root_top && entry.target_top <= root_bottom;
        }

        let visible =
            (entry.target_bottom.min(root_bottom) - entry.target_top.max(root_top)).max(0.0);
        visible > 0.0 && visible / height >= self.threshold
    }

    /// Feed a new observation; returns a trigger on the rising edge only.
    pub fn observe(&mut self, entry: &IntersectionEntry) -> Option<Trigger> {
        let intersecting = self.is_intersecting(entry);
        let rising = intersecting && !self.was_intersecting;
        self.was_intersecting = intersecting;
        rising.then_some(Trigger::Intersection)
    }
}

impl Default for IntersectionWatch {
    fn default() -> Self {
        Self::from_config(&SiteConfig::default())
    }
}
