//! # UnifiedPush Binding Controller
//!
//! Watches `mobile-client-binding-secret` secrets and keeps Android variants
//! in a UnifiedPush server, plus their mirror ConfigMaps, in step with them.
//!
//! 1. **Added binding secret** - registers the variant if its `googleKey` is new,
//!    mirrors it into `<name>-config-map`, then deletes the binding secret
//! 2. **Deleted ServiceBinding secret** - deletes the mirror ConfigMap, then the variant

use anyhow::Result;
use ups_binding_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(
        init.secrets,
        init.dispatcher,
        init.server_state,
        init.config,
    )
    .await
}
