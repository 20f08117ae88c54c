//! Per-operation SMB sessions
//!
//! A [`ScopedSession`] owns the backend's lock and the connection, session
//! and mount it acquired. A watcher task holds the lock guard and the list
//! of acquired resources; once the scope token is cancelled it releases the
//! resources in reverse order, drops the guard and exits. The scope token is
//! a child of the caller's token, so cancellation reaches it directly, and
//! both [`ScopedSession::close`] and `Drop` cancel it, so every exit path
//! ends in the same teardown.

use naivefs_core::{FsError, FsResult};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::transport::{ShareConnection, ShareSession, ShareTransport, ShareTree, SmbAuth};

enum Resource {
    Connection(Arc<dyn ShareConnection>),
    Session(Arc<dyn ShareSession>),
    Tree(Arc<dyn ShareTree>),
}

impl Resource {
    async fn release(self) {
        let (stage, result) = match self {
            Resource::Tree(tree) => ("umount", tree.umount().await),
            Resource::Session(session) => ("logoff", session.logoff().await),
            Resource::Connection(conn) => ("close", conn.close().await),
        };
        if let Err(e) = result {
            tracing::warn!(stage, error = %e, "smb teardown step failed");
        }
    }
}

#[derive(Default)]
struct Acquired {
    resources: Vec<Resource>,
    torn_down: bool,
}

impl Acquired {
    /// Record a freshly acquired resource. After teardown started the
    /// resource is handed back so the caller releases it itself.
    fn push(&mut self, resource: Resource) -> Result<(), Resource> {
        if self.torn_down {
            return Err(resource);
        }
        self.resources.push(resource);
        Ok(())
    }

    fn take_all(&mut self) -> Vec<Resource> {
        self.torn_down = true;
        std::mem::take(&mut self.resources)
    }
}

async fn watch(scope: CancellationToken, acquired: Arc<Mutex<Acquired>>, guard: OwnedMutexGuard<()>) {
    scope.cancelled().await;
    let resources = acquired.lock().take_all();
    for resource in resources.into_iter().rev() {
        resource.release().await;
    }
    drop(guard);
    tracing::debug!("smb session released");
}

/// Parameters for opening a session
pub(crate) struct SessionTarget<'a> {
    pub addr: &'a str,
    pub auth: &'a SmbAuth,
    pub share: &'a str,
}

/// A mounted share held for exactly one logical operation
pub struct ScopedSession {
    tree: Arc<dyn ShareTree>,
    scope: CancellationToken,
    watcher: Option<JoinHandle<()>>,
}

/// Teardown handle for a session that is still being set up
struct Opening {
    scope: CancellationToken,
    acquired: Arc<Mutex<Acquired>>,
    watcher: Option<JoinHandle<()>>,
}

impl Opening {
    async fn step<T, F>(&self, fut: F) -> FsResult<T>
    where
        F: Future<Output = FsResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.scope.cancelled() => Err(FsError::Cancelled),
            result = fut => result,
        }
    }

    async fn mount(
        &self,
        transport: &dyn ShareTransport,
        target: &SessionTarget<'_>,
    ) -> FsResult<Arc<dyn ShareTree>> {
        let conn = self.step(transport.connect(target.addr)).await?;
        self.record(Resource::Connection(conn.clone())).await?;

        let session = self.step(conn.authenticate(target.auth)).await?;
        self.record(Resource::Session(session.clone())).await?;

        let tree = self.step(session.mount(target.share)).await?;
        self.record(Resource::Tree(tree.clone())).await?;
        Ok(tree)
    }

    async fn record(&self, resource: Resource) -> FsResult<()> {
        let rejected = self.acquired.lock().push(resource);
        match rejected {
            Ok(()) => Ok(()),
            Err(resource) => {
                resource.release().await;
                Err(FsError::Cancelled)
            }
        }
    }

    async fn abort(mut self) {
        self.scope.cancel();
        if let Some(watcher) = self.watcher.take() {
            if let Err(e) = watcher.await {
                tracing::warn!(error = %e, "smb teardown task failed");
            }
        }
    }
}

impl Drop for Opening {
    fn drop(&mut self) {
        if self.watcher.is_some() {
            self.scope.cancel();
        }
    }
}

impl ScopedSession {
    /// Take the lock, then connect, authenticate and mount.
    ///
    /// Whatever was acquired before a failure or cancellation is released
    /// before the lock is.
    pub(crate) async fn open(
        lock: Arc<tokio::sync::Mutex<()>>,
        transport: &dyn ShareTransport,
        target: SessionTarget<'_>,
        cancel: &CancellationToken,
    ) -> FsResult<Self> {
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FsError::Cancelled),
            guard = lock.lock_owned() => guard,
        };

        let scope = cancel.child_token();
        let acquired = Arc::new(Mutex::new(Acquired::default()));
        let watcher = tokio::spawn(watch(scope.clone(), acquired.clone(), guard));
        let mut opening = Opening { scope, acquired, watcher: Some(watcher) };

        tracing::debug!(addr = target.addr, share = target.share, "opening smb session");
        let mounted = opening.mount(transport, &target).await;
        match mounted {
            Ok(tree) => Ok(Self {
                tree,
                scope: opening.scope.clone(),
                watcher: opening.watcher.take(),
            }),
            Err(e) => {
                opening.abort().await;
                Err(e)
            }
        }
    }

    pub fn tree(&self) -> &Arc<dyn ShareTree> {
        &self.tree
    }

    /// Run one operation on the mounted tree, abandoning it with
    /// [`FsError::Cancelled`] once the session's cancellation fires.
    pub async fn run<T, F, Fut>(&self, op: F) -> FsResult<T>
    where
        F: FnOnce(Arc<dyn ShareTree>) -> Fut,
        Fut: Future<Output = FsResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.scope.cancelled() => Err(FsError::Cancelled),
            result = op(self.tree.clone()) => result,
        }
    }

    /// Release the mount, session and connection and wait until the lock
    /// has been handed back.
    pub async fn close(mut self) {
        self.scope.cancel();
        if let Some(watcher) = self.watcher.take() {
            if let Err(e) = watcher.await {
                tracing::warn!(error = %e, "smb teardown task failed");
            }
        }
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}
