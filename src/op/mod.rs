//! Query and retrieve orchestration
//!
//! Every operation follows the same lifecycle: build and configure a fresh
//! client, open the association, run the request, then always release the
//! association, flush the tracker and stop the operation's workers before
//! the result is composed.

mod executor;
mod find;
mod get;
mod request;

use std::time::Instant;

use dimse::{DimseCommand, QueryRetrieveScu, Result as DimseResult};
use futures_util::future::BoxFuture;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::param::{AdvancedParams, DicomNode};
use crate::state::OperationResult;

pub(crate) use executor::Schedulers;
pub use find::{FindBuilder, FindRequest};
pub use get::{GetBuilder, GetRequest};
#[cfg(feature = "dcmtk_cli")]
pub use find::{find, find_with};
#[cfg(feature = "dcmtk_cli")]
pub use get::{get, get_with};
pub use request::add_attributes;

/// Apply the nodes and advanced settings to a freshly built client
pub(crate) fn configure_client<C>(
    scu: &mut C,
    params: &AdvancedParams,
    calling: &DicomNode,
    called: &DicomNode,
) -> Result<()>
where
    C: QueryRetrieveScu + ?Sized,
{
    let mut rq = scu.associate_request().clone();
    params.configure_connect(&mut rq, scu.remote_connection_mut(), called);
    params.configure_bind(&mut rq, scu.connection_mut(), calling);
    *scu.associate_request_mut() = rq;

    params.configure(scu.connection_mut());

    let mut remote = scu.remote_connection_mut().clone();
    params.configure_tls(scu.connection_mut(), &mut remote)?;
    *scu.remote_connection_mut() = remote;
    Ok(())
}

/// Run a blocking operation outside of any runtime the caller is on.
///
/// An operation drives and drops its own runtimes, which tokio refuses to do
/// from a thread that is already inside a runtime context.
pub(crate) fn off_runtime<T, F>(operation: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    if Handle::try_current().is_err() {
        return operation();
    }
    debug!("Called from an async context, moving the operation to its own thread");
    std::thread::scope(|scope| scope.spawn(operation).join())
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

/// Drive one association through open, `execute` and close.
///
/// The association is closed exactly once whatever `execute` returned. A
/// close failure is logged and never replaces the outcome of the request.
pub(crate) fn run_association<C, F>(
    client: &mut C,
    schedulers: Schedulers,
    command: DimseCommand,
    execute: F,
) -> OperationResult
where
    C: QueryRetrieveScu + ?Sized,
    F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, DimseResult<()>>,
{
    let tool = command.scu_name();
    let progress = client.progress().clone();
    let calling = client.associate_request().calling_aet.clone();
    let called = client.associate_request().called_aet.clone();

    let start = Instant::now();
    let outcome = schedulers.block_on(async {
        client.open().await?;
        execute(&mut *client).await
    });
    let elapsed = start.elapsed();

    if let Err(e) = schedulers.block_on(client.close()) {
        if e.is_interruption() {
            warn!("Closing {} interrupted: {}", tool, e);
        } else {
            error!("Closing {}: {}", tool, e);
        }
    }
    progress.complete();
    schedulers.shutdown();

    match outcome {
        Ok(()) => {
            let summary = match command {
                DimseCommand::Find => "C-Find",
                DimseCommand::Get => "Objects retrieved",
            };
            let time_message = format!(
                "{} from {} to {} in {}ms",
                summary,
                calling,
                called,
                elapsed.as_millis()
            );
            info!("{}", time_message);
            debug!(snapshot = ?progress.snapshot(), "{} finished", tool);
            OperationResult::build(progress, Some(time_message), None)
        }
        Err(e) => {
            error!("{}: {}", tool, e);
            OperationResult::build(progress, None, Some(e.into()))
        }
    }
}
