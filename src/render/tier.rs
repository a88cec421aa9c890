use crate::config::LodConfig;

/// Offset added to the size percentage so a 0% setting still leaves a visible dot.
const SIZE_OFFSET: f32 = 0.5;
/// World units added per square root of the neighbour count.
const DEGREE_GAIN: f32 = 1.6;

/// Detail levels, ordered from cheapest to richest. Chosen purely from the zoom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DetailTier {
    /// Circles and plain edges.
    Minimal,
    Icons,
    Labels,
    EdgeLabels,
    /// Arrowheads and outlines on top of everything else.
    Full,
}

impl DetailTier {
    pub fn for_zoom(k: f32, lod: &LodConfig) -> Self {
        if k >= lod.high_detail_zoom {
            Self::Full
        } else if k >= lod.edge_label_zoom {
            Self::EdgeLabels
        } else if k >= lod.label_zoom {
            Self::Labels
        } else if k >= lod.icon_zoom {
            Self::Icons
        } else {
            Self::Minimal
        }
    }

    pub fn shows_icons(self) -> bool {
        self >= Self::Icons
    }

    pub fn shows_labels(self) -> bool {
        self >= Self::Labels
    }

    pub fn shows_edge_labels(self) -> bool {
        self >= Self::EdgeLabels
    }

    pub fn is_full(self) -> bool {
        self == Self::Full
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Icons => "icons",
            Self::Labels => "labels",
            Self::EdgeLabels => "edge labels",
            Self::Full => "full",
        }
    }
}

/// World-space radius: `base * (pct / 100 + 0.5) + 1.6 * sqrt(degree)`, clamped, then
/// boosted while zoomed out below the icon threshold so nodes stay visible.
pub fn node_radius(degree: usize, k: f32, lod: &LodConfig) -> f32 {
    let base = lod.node_base_size.max(0.5);
    let sized = base * (lod.node_size_pct.max(0.0) / 100.0 + SIZE_OFFSET)
        + DEGREE_GAIN * (degree as f32).sqrt();
    let upper = lod.max_node_size.max(base * SIZE_OFFSET);
    let radius = sized.clamp(base * SIZE_OFFSET, upper);

    if k < lod.icon_zoom {
        radius * lod.zoomed_out_boost.max(1.0)
    } else {
        radius
    }
}
