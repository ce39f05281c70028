// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use rollcall_app::{Completion, GatewayOp, Outcome, RecordGateway, Request, perform};
use rollcall_tui::{AppRuntime, InternalEvent};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, warn};

/// Runs each gateway call on its own thread so the console keeps drawing
/// while a slow backend answers.
pub struct GatewayRuntime {
    gateway: Arc<dyn RecordGateway>,
}

impl GatewayRuntime {
    pub fn new(gateway: Arc<dyn RecordGateway>) -> Self {
        Self { gateway }
    }
}

impl AppRuntime for GatewayRuntime {
    fn perform(&mut self, op: &GatewayOp) -> Outcome {
        perform(self.gateway.as_ref(), op)
    }

    fn spawn_request(&mut self, request: Request, tx: Sender<InternalEvent>) -> Result<()> {
        let gateway = Arc::clone(&self.gateway);
        thread::Builder::new()
            .name(format!("rollcall-{}", request.op.name()))
            .spawn(move || {
                debug!(op = request.op.name(), "request started");
                let outcome = perform(gateway.as_ref(), &request.op);
                if tx
                    .send(InternalEvent::Completed(Completion::new(request, outcome)))
                    .is_err()
                {
                    warn!("console exited before the request completed");
                }
            })
            .context("spawn request thread")?;
        Ok(())
    }
}
