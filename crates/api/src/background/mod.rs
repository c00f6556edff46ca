//! Long-running tasks spawned at startup. Each stops when its
//! [`CancellationToken`](tokio_util::sync::CancellationToken) fires.

pub mod catalog_refresh;
