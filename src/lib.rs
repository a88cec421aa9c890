//! Interactive link-chart engine: layout, level-of-detail rendering, label
//! decluttering and pointer interaction for investigation graphs drawn with egui.

pub mod config;
pub mod graph;
pub mod icons;
pub mod interaction;
pub mod labels;
pub mod layout;
pub mod render;
pub mod selection;
pub mod spatial;
pub mod util;
pub mod view;
pub mod viewport;

pub use config::{EngineConfig, LayoutMode};
pub use graph::{DataSummary, EdgeInput, GraphModel, NodeInput};
pub use interaction::{GraphEvent, PointerInput};
pub use view::{FrameError, FrameStats, GraphView};
