//! Content-side rendering: page skeleton, pipeline orchestration and
//! interaction bookkeeping

pub mod debounce;
pub mod instrumentation;
pub mod orchestrator;
pub mod page;
pub mod state;

pub use debounce::Debouncer;
pub use instrumentation::{ImageStatus, ImageTracker, Listeners};
pub use orchestrator::{ContentPipeline, Interaction};
pub use page::{Page, PageTheme};
pub use state::{ContentDocument, Platform, RenderMode, SetHtmlPayload};
