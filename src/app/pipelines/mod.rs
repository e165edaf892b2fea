pub mod dispatch_pipeline;
pub mod split_pipeline;

pub use dispatch_pipeline::{execute_dispatch, DispatchPipeline, DispatchReport, DispatchRequest};
pub use split_pipeline::{execute_split, SplitPipeline};
