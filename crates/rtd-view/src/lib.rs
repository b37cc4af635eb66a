pub mod activity;
pub mod coalesce;
pub mod layout;
pub mod project;

pub use activity::{aggregate_activity, KnightActivity, SPARK_BUCKETS};
pub use coalesce::Coalescer;
pub use layout::{layout_steps, DanglingRef, Layout, LayoutError, Position};
pub use project::{project, ChainView, Projector, RenderState, StepVisual, RENDER_DEBOUNCE};
