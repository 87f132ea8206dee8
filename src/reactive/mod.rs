//! Reactive state cells and the pass-based effect scheduler
//!
//! - [`Store`] holds the cells. Reads see committed values; writes are pending
//!   until the scheduler commits them.
//! - [`Runtime`] owns a store plus registered effects and views, and runs
//!   them in passes until no dependency changes remain.
//!
//! ```rust,ignore
//! let mut runtime: Runtime<Completion, ViewModel> = Runtime::new(64);
//! let offset = runtime.declare("offset", 0u32);
//! runtime.register_effect("fetch", &[offset.id()], move |cx| {
//!     let at = *cx.get(offset);
//!     cx.spawn(async move { fetch(at).await });
//!     Ok(())
//! });
//! runtime.flush(&mut view)?;
//! ```

mod scheduler;
mod store;

pub use scheduler::{Cx, FlushReport, Runtime, Task};
pub use store::{CellId, State, Store};
