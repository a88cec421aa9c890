//! Engine tuning. Every field is optional in serialized form and falls back to the
//! documented default.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    Grid,
    #[default]
    Force,
    Hierarchy,
}

impl LayoutMode {
    pub const ALL: [LayoutMode; 3] = [LayoutMode::Grid, LayoutMode::Force, LayoutMode::Hierarchy];

    pub fn label(self) -> &'static str {
        match self {
            Self::Grid => "Grid",
            Self::Force => "Force",
            Self::Hierarchy => "Hierarchy",
        }
    }
}

impl std::str::FromStr for LayoutMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "grid" => Ok(Self::Grid),
            "force" => Ok(Self::Force),
            "hierarchy" | "dag" => Ok(Self::Hierarchy),
            other => Err(format!("unknown layout mode `{other}`")),
        }
    }
}

/// Force simulation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ForceConfig {
    /// Pairwise charge; negative values repel. Default `-120`.
    pub charge_strength: f32,
    /// Spring rest length in world units. Default `70`.
    pub link_distance: f32,
    /// Spring stiffness in `[0, 1]`. Default `0.5`.
    pub link_strength: f32,
    /// Pull of the centroid toward the viewport center, `[0, 1]`. Default `0.1`.
    pub center_strength: f32,
    /// Minimum center distance between two nodes; `0` disables collision. Default `14`.
    pub collision_radius: f32,
    /// Per-tick alpha decay. Default `0.0228` (about 300 ticks from 1 to 0.001).
    pub alpha_decay: f32,
    /// The simulation stops once alpha falls below this. Default `0.001`.
    pub alpha_min: f32,
    /// Fraction of velocity removed each tick. Default `0.4`.
    pub velocity_decay: f32,
    /// Upper bound on ticks for a full layout pass. Default `300`.
    pub cooldown_iterations: usize,
    /// Alpha target while a node is dragged. Default `0.3`.
    pub reheat_alpha_target: f32,
    /// Barnes-Hut opening angle. Default `0.9`.
    pub theta: f32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            charge_strength: -120.0,
            link_distance: 70.0,
            link_strength: 0.5,
            center_strength: 0.1,
            collision_radius: 14.0,
            alpha_decay: 0.0228,
            alpha_min: 0.001,
            velocity_decay: 0.4,
            cooldown_iterations: 300,
            reheat_alpha_target: 0.3,
            theta: 0.9,
        }
    }
}

/// Zoom thresholds and node sizing for the level-of-detail renderer.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LodConfig {
    /// Icons appear at or above this zoom. Default `0.6`.
    pub icon_zoom: f32,
    /// Node labels appear at or above this zoom. Default `0.9`.
    pub label_zoom: f32,
    /// Edge labels appear at or above this zoom. Default `1.5`.
    pub edge_label_zoom: f32,
    /// Everything renders at full fidelity at or above this zoom. Default `2.5`.
    pub high_detail_zoom: f32,
    /// Edges shorter than this on screen (pixels) are skipped. Default `1.5`.
    pub edge_min_screen_length: f32,
    /// World-space base radius. Default `5`.
    pub node_base_size: f32,
    /// Node size percentage. Default `100`.
    pub node_size_pct: f32,
    /// Radius cap before the zoomed-out boost. Default `22`.
    pub max_node_size: f32,
    /// Radius multiplier below the icon threshold. Default `1.6`.
    pub zoomed_out_boost: f32,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            icon_zoom: 0.6,
            label_zoom: 0.9,
            edge_label_zoom: 1.5,
            high_detail_zoom: 2.5,
            edge_min_screen_length: 1.5,
            node_base_size: 5.0,
            node_size_pct: 100.0,
            max_node_size: 22.0,
            zoomed_out_boost: 1.6,
        }
    }
}

/// Label decluttering parameters.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Base label font size in points. Default `12`.
    pub base_font_size: f32,
    /// Node label font size percentage. Default `100`.
    pub font_size_pct: f32,
    /// Edge label font size percentage. Default `85`.
    pub edge_font_size_pct: f32,
    /// Label box size percentage, applied on top of the font size. Default `100`.
    pub label_size_pct: f32,
    /// Padding added around each label box before collision tests. Default `3`.
    pub margin: f32,
    /// Graphs with fewer candidates than this use exact pairwise tests. Default `400`.
    pub exact_threshold: usize,
    /// Spatial hash cell size in pixels. Default `64`.
    pub cell_size: f32,
    /// Cap on labels placed by priority. Default `250`.
    pub max_labels: usize,
    /// Minimum seconds between recomputations. Default `0.2`.
    pub throttle_secs: f64,
    /// Quiet time after the last wheel event before labels return. Default `0.18`.
    pub zoom_settle_secs: f64,
    /// Labels longer than this are truncated. Default `32`.
    pub max_chars: usize,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            base_font_size: 12.0,
            font_size_pct: 100.0,
            edge_font_size_pct: 85.0,
            label_size_pct: 100.0,
            margin: 3.0,
            exact_threshold: 400,
            cell_size: 64.0,
            max_labels: 250,
            throttle_secs: 0.2,
            zoom_settle_secs: 0.18,
            max_chars: 32,
        }
    }
}

impl LabelConfig {
    pub fn font_size(&self) -> f32 {
        (self.base_font_size * self.font_size_pct / 100.0).max(4.0)
    }

    pub fn edge_font_size(&self) -> f32 {
        (self.base_font_size * self.edge_font_size_pct / 100.0).max(4.0)
    }
}

/// Pointer gesture parameters.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Side length in pixels of the square each node occupies for marquee tests. Default `8`.
    pub hit_box_size: f32,
    /// Pointer travel in pixels that turns a press into a drag. Default `5`.
    pub drag_threshold: f32,
    /// Pixel tolerance for edge picking. Default `4`.
    pub edge_pick_tolerance: f32,
    /// Multiplicative zoom per wheel pixel. Default `0.0018`.
    pub wheel_zoom_speed: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            hit_box_size: 8.0,
            drag_threshold: 5.0,
            edge_pick_tolerance: 4.0,
            wheel_zoom_speed: 0.0018,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout_mode: LayoutMode,
    pub show_icons: bool,
    pub show_labels: bool,
    /// Force and hierarchy passes above this node count run on a worker thread. Default `200`.
    pub worker_threshold: usize,
    /// Curvature step between parallel edges. Default `0.25`.
    pub parallel_edge_spacing: f32,
    pub force: ForceConfig,
    pub lod: LodConfig,
    pub labels: LabelConfig,
    pub interaction: InteractionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            layout_mode: LayoutMode::Force,
            show_icons: true,
            show_labels: true,
            worker_threshold: 200,
            parallel_edge_spacing: 0.25,
            force: ForceConfig::default(),
            lod: LodConfig::default(),
            labels: LabelConfig::default(),
            interaction: InteractionConfig::default(),
        }
    }
}
