use std::net::SocketAddr;
use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::engine::SimController;
use crate::server::router;

/// Simulator served over loopback HTTP for the lifetime of the value.
///
/// Owns its own tokio runtime so blocking clients can talk to it from a
/// plain `#[test]`. Dropping it shuts the server down.
pub struct SimServer {
    addr: SocketAddr,
    sim: Arc<SimController>,
    _runtime: Runtime,
}

impl SimServer {
    pub fn start() -> std::io::Result<Self> {
        Self::start_with(Arc::new(SimController::new()))
    }

    pub fn start_with(sim: Arc<SimController>) -> std::io::Result<Self> {
        let runtime = Runtime::new()?;
        let listener = runtime.block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))?;
        let addr = listener.local_addr()?;
        let app = router(sim.clone());
        runtime.spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!(error = %e, "simulator server exited");
            }
        });
        Ok(Self {
            addr,
            sim,
            _runtime: runtime,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn sim(&self) -> &Arc<SimController> {
        &self.sim
    }
}
