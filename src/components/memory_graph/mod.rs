//! Interactive document/memory graph: viewport, hit-testing, gestures,
//! batched canvas rendering, and popover placement.

mod component;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod layout;
pub mod listeners;
pub mod popover;
pub mod render;
pub mod scheduler;
pub mod source;
pub mod spatial;
pub mod surface;
pub mod types;
pub mod viewport;

pub use component::{MemoryGraphCanvas, ViewportInfo};
pub use config::GraphConfig;
pub use engine::{FrameReport, GraphEngine};
pub use error::GraphError;
pub use input::{GraphIntent, InputEvent};
pub use layout::ForceLayout;
pub use popover::{Placement, PopoverPlacer, PopoverRequest, Side};
pub use source::{FetchTracker, GraphSource, InMemorySource};
pub use types::{DocumentData, Edge, EdgeType, GraphData, MemoryData, Node, NodeKind, RenderState};
pub use viewport::{ViewportState, WorldRect};
