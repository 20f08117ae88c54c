//! In-memory transports
//!
//! Stand-ins for an SMB server and an S3 bucket that keep everything in a
//! map. They count connections and sessions, can add a fixed latency to
//! every protocol step and can be told to fail, which makes the backends'
//! locking, teardown and lazy-initialisation behaviour observable without a
//! real server.

pub use share::{MemoryShare, ShareStats};

#[cfg(feature = "s3")]
pub use object::MemoryObjectStore;

mod share {
    use async_trait::async_trait;
    use bytes::Bytes;
    use naivefs_core::{FsError, FsResult};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::smb::transport::{
        ShareConnection, ShareSession, ShareTransport, ShareTree, SmbAuth, SmbFileInfo,
    };

    #[derive(Debug, Clone)]
    enum Node {
        Dir,
        File(Bytes),
    }

    /// Connection bookkeeping of a [`MemoryShare`]
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ShareStats {
        pub connects: usize,
        pub open_connections: usize,
        pub open_sessions: usize,
        pub open_mounts: usize,
        /// Highest number of simultaneously open connections seen
        pub peak_connections: usize,
    }

    #[derive(Default)]
    struct Counters {
        connects: AtomicUsize,
        open_connections: AtomicUsize,
        open_sessions: AtomicUsize,
        open_mounts: AtomicUsize,
        peak_connections: AtomicUsize,
    }

    struct State {
        share: String,
        credentials: Mutex<Option<(String, String)>>,
        latency: Mutex<Duration>,
        refuse: AtomicBool,
        nodes: Mutex<BTreeMap<String, Node>>,
        counters: Counters,
    }

    impl State {
        async fn delay(&self) {
            let latency = *self.latency.lock();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
        }
    }

    /// A single SMB share held in memory
    #[derive(Clone)]
    pub struct MemoryShare {
        state: Arc<State>,
    }

    /// `dir\file.txt` and `/dir/file.txt` both become `dir/file.txt`.
    fn normalize(path: &str) -> String {
        path.split(['\\', '/'])
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn parent_of(key: &str) -> &str {
        key.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
    }

    fn name_of(key: &str) -> &str {
        key.rsplit_once('/').map(|(_, name)| name).unwrap_or(key)
    }

    impl MemoryShare {
        pub fn new(share: impl Into<String>) -> Self {
            Self {
                state: Arc::new(State {
                    share: share.into(),
                    credentials: Mutex::new(None),
                    latency: Mutex::new(Duration::ZERO),
                    refuse: AtomicBool::new(false),
                    nodes: Mutex::new(BTreeMap::new()),
                    counters: Counters::default(),
                }),
            }
        }

        /// Require NTLM authentication with these credentials
        pub fn with_credentials(self, username: &str, password: &str) -> Self {
            *self.state.credentials.lock() = Some((username.to_string(), password.to_string()));
            self
        }

        /// Delay every protocol step, including teardown, by `latency`
        pub fn with_latency(self, latency: Duration) -> Self {
            *self.state.latency.lock() = latency;
            self
        }

        pub fn refuse_connections(&self, refuse: bool) {
            self.state.refuse.store(refuse, Ordering::SeqCst);
        }

        pub fn stats(&self) -> ShareStats {
            let c = &self.state.counters;
            ShareStats {
                connects: c.connects.load(Ordering::SeqCst),
                open_connections: c.open_connections.load(Ordering::SeqCst),
                open_sessions: c.open_sessions.load(Ordering::SeqCst),
                open_mounts: c.open_mounts.load(Ordering::SeqCst),
                peak_connections: c.peak_connections.load(Ordering::SeqCst),
            }
        }

        /// Whether anything exists at the share path
        pub fn contains(&self, path: &str) -> bool {
            let key = normalize(path);
            key.is_empty() || self.state.nodes.lock().contains_key(&key)
        }
    }

    /// Flips once from open to closed, decrementing `counter` exactly once.
    struct Liveness<'a> {
        open: &'a AtomicBool,
        counter: &'a AtomicUsize,
    }

    impl Liveness<'_> {
        fn close(&self) {
            if self.open.swap(false, Ordering::SeqCst) {
                self.counter.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl ShareTransport for MemoryShare {
        async fn connect(&self, addr: &str) -> FsResult<Arc<dyn ShareConnection>> {
            let state = &self.state;
            state.delay().await;
            if state.refuse.load(Ordering::SeqCst) {
                return Err(FsError::Network(format!("connection refused: {}", addr)));
            }
            let c = &state.counters;
            c.connects.fetch_add(1, Ordering::SeqCst);
            let open = c.open_connections.fetch_add(1, Ordering::SeqCst) + 1;
            c.peak_connections.fetch_max(open, Ordering::SeqCst);
            Ok(Arc::new(MemoryConnection {
                state: state.clone(),
                open: AtomicBool::new(true),
            }))
        }
    }

    struct MemoryConnection {
        state: Arc<State>,
        open: AtomicBool,
    }

    #[async_trait]
    impl ShareConnection for MemoryConnection {
        async fn authenticate(&self, auth: &SmbAuth) -> FsResult<Arc<dyn ShareSession>> {
            self.state.delay().await;
            if !self.open.load(Ordering::SeqCst) {
                return Err(FsError::Network("connection closed".into()));
            }
            let accepted = match &*self.state.credentials.lock() {
                Some((user, pass)) => matches!(
                    auth,
                    SmbAuth::Ntlm { username, password, .. } if username == user && password == pass
                ),
                None => true,
            };
            if !accepted {
                return Err(FsError::AuthFailed("logon failure".into()));
            }
            self.state.counters.open_sessions.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MemorySession {
                state: self.state.clone(),
                open: AtomicBool::new(true),
            }))
        }

        async fn close(&self) -> FsResult<()> {
            self.state.delay().await;
            Liveness { open: &self.open, counter: &self.state.counters.open_connections }.close();
            Ok(())
        }
    }

    struct MemorySession {
        state: Arc<State>,
        open: AtomicBool,
    }

    #[async_trait]
    impl ShareSession for MemorySession {
        async fn mount(&self, share: &str) -> FsResult<Arc<dyn ShareTree>> {
            self.state.delay().await;
            if !self.open.load(Ordering::SeqCst) {
                return Err(FsError::Network("session logged off".into()));
            }
            if share != self.state.share {
                return Err(FsError::provider("smb", format!("bad network name: {}", share)));
            }
            self.state.counters.open_mounts.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MemoryTree {
                state: self.state.clone(),
                open: AtomicBool::new(true),
            }))
        }

        async fn logoff(&self) -> FsResult<()> {
            self.state.delay().await;
            Liveness { open: &self.open, counter: &self.state.counters.open_sessions }.close();
            Ok(())
        }
    }

    struct MemoryTree {
        state: Arc<State>,
        open: AtomicBool,
    }

    impl MemoryTree {
        async fn enter(&self) -> FsResult<()> {
            self.state.delay().await;
            if !self.open.load(Ordering::SeqCst) {
                return Err(FsError::Network("tree disconnected".into()));
            }
            Ok(())
        }

        fn require_dir(nodes: &BTreeMap<String, Node>, key: &str) -> FsResult<()> {
            match nodes.get(key) {
                _ if key.is_empty() => Ok(()),
                Some(Node::Dir) => Ok(()),
                Some(Node::File(_)) => Err(FsError::NotADirectory(key.to_string())),
                None => Err(FsError::NotFound(key.to_string())),
            }
        }

        fn put_file(&self, path: &str, data: Bytes) -> FsResult<()> {
            let key = normalize(path);
            let mut nodes = self.state.nodes.lock();
            Self::require_dir(&nodes, parent_of(&key))?;
            if key.is_empty() || matches!(nodes.get(&key), Some(Node::Dir)) {
                return Err(FsError::provider("smb", format!("is a directory: {}", path)));
            }
            nodes.insert(key, Node::File(data));
            Ok(())
        }
    }

    #[async_trait]
    impl ShareTree for MemoryTree {
        async fn stat(&self, path: &str) -> FsResult<SmbFileInfo> {
            self.enter().await?;
            let key = normalize(path);
            if key.is_empty() {
                return Ok(SmbFileInfo::directory(""));
            }
            match self.state.nodes.lock().get(&key) {
                Some(Node::Dir) => Ok(SmbFileInfo::directory(name_of(&key))),
                Some(Node::File(data)) => Ok(SmbFileInfo::file(name_of(&key), data.len() as u64)),
                None => Err(FsError::NotFound(path.to_string())),
            }
        }

        async fn create(&self, path: &str, _mode: u32) -> FsResult<()> {
            self.enter().await?;
            self.put_file(path, Bytes::new())
        }

        async fn mkdir_all(&self, path: &str, _mode: u32) -> FsResult<()> {
            self.enter().await?;
            let key = normalize(path);
            let mut nodes = self.state.nodes.lock();
            let mut prefix = String::new();
            for segment in key.split('/').filter(|s| !s.is_empty()) {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(segment);
                match nodes.get(&prefix) {
                    Some(Node::File(_)) => return Err(FsError::NotADirectory(prefix)),
                    Some(Node::Dir) => {}
                    None => {
                        nodes.insert(prefix.clone(), Node::Dir);
                    }
                }
            }
            Ok(())
        }

        async fn remove_all(&self, path: &str) -> FsResult<()> {
            self.enter().await?;
            let key = normalize(path);
            let mut nodes = self.state.nodes.lock();
            if key.is_empty() {
                nodes.clear();
                return Ok(());
            }
            let nested = format!("{}/", key);
            nodes.retain(|k, _| k != &key && !k.starts_with(&nested));
            Ok(())
        }

        async fn read_file(&self, path: &str) -> FsResult<Bytes> {
            self.enter().await?;
            match self.state.nodes.lock().get(&normalize(path)) {
                Some(Node::File(data)) => Ok(data.clone()),
                Some(Node::Dir) => Err(FsError::provider("smb", format!("is a directory: {}", path))),
                None => Err(FsError::NotFound(path.to_string())),
            }
        }

        async fn write_file(&self, path: &str, data: Bytes, _mode: u32) -> FsResult<()> {
            self.enter().await?;
            self.put_file(path, data)
        }

        async fn read_dir(&self, path: &str) -> FsResult<Vec<SmbFileInfo>> {
            self.enter().await?;
            let key = normalize(path);
            let nodes = self.state.nodes.lock();
            Self::require_dir(&nodes, &key)?;
            Ok(nodes
                .iter()
                .filter(|(k, _)| !k.is_empty() && parent_of(k) == key)
                .map(|(k, node)| match node {
                    Node::Dir => SmbFileInfo::directory(name_of(k)),
                    Node::File(data) => SmbFileInfo::file(name_of(k), data.len() as u64),
                })
                .collect())
        }

        async fn umount(&self) -> FsResult<()> {
            self.state.delay().await;
            Liveness { open: &self.open, counter: &self.state.counters.open_mounts }.close();
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        async fn mounted(share: &MemoryShare) -> Arc<dyn ShareTree> {
            let conn = share.connect("memory:445").await.unwrap();
            let session = conn.authenticate(&SmbAuth::Anonymous).await.unwrap();
            session.mount("data").await.unwrap()
        }

        #[tokio::test]
        async fn test_write_requires_parent() {
            let share = MemoryShare::new("data");
            let tree = mounted(&share).await;

            let err = tree.write_file("d\\f.txt", Bytes::new(), 0o777).await.unwrap_err();
            assert!(err.is_not_found());

            tree.mkdir_all("d", 0o777).await.unwrap();
            tree.write_file("d\\f.txt", Bytes::from_static(b"abc"), 0o777).await.unwrap();
            assert_eq!(tree.stat("d\\f.txt").await.unwrap().end_of_file, 3);
        }

        #[tokio::test]
        async fn test_remove_all_is_recursive() {
            let share = MemoryShare::new("data");
            let tree = mounted(&share).await;
            tree.mkdir_all("a\\b\\c", 0o777).await.unwrap();
            tree.create("a\\b\\c\\f", 0o777).await.unwrap();
            tree.create("ab", 0o777).await.unwrap();

            tree.remove_all("a").await.unwrap();
            assert!(!share.contains("a\\b\\c\\f"));
            assert!(!share.contains("a"));
            assert!(share.contains("ab"));
        }

        #[tokio::test]
        async fn test_unmounted_tree_rejects_operations() {
            let share = MemoryShare::new("data");
            let tree = mounted(&share).await;
            assert_eq!(share.stats().open_mounts, 1);

            tree.umount().await.unwrap();
            tree.umount().await.unwrap();
            assert_eq!(share.stats().open_mounts, 0);
            assert!(tree.stat("").await.is_err());
        }

        #[tokio::test]
        async fn test_credentials_are_checked() {
            let share = MemoryShare::new("data").with_credentials("alice", "secret");
            let conn = share.connect("memory:445").await.unwrap();

            let err = conn.authenticate(&SmbAuth::Anonymous).await.err().unwrap();
            assert!(matches!(err, FsError::AuthFailed(_)));

            let auth = SmbAuth::Ntlm {
                username: "alice".into(),
                password: "secret".into(),
                domain: None,
            };
            assert!(conn.authenticate(&auth).await.is_ok());
        }
    }
}

#[cfg(feature = "s3")]
mod object {
    use async_trait::async_trait;
    use bytes::Bytes;
    use naivefs_core::{FsError, FsResult};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::s3::client::{ObjectClient, ObjectConnector, ObjectInfo, ObjectListing};
    use crate::s3::S3Config;

    struct State {
        bucket: String,
        objects: Mutex<BTreeMap<String, Bytes>>,
        constructions: AtomicUsize,
        construct_delay: Duration,
        fail_construct: AtomicBool,
        offline: AtomicBool,
    }

    /// A single S3 bucket held in memory.
    ///
    /// Doubles as the [`ObjectConnector`] that builds clients for it.
    #[derive(Clone)]
    pub struct MemoryObjectStore {
        state: Arc<State>,
    }

    impl MemoryObjectStore {
        pub fn new(bucket: impl Into<String>) -> Self {
            Self::build(bucket.into(), Duration::ZERO)
        }

        /// Clients take `delay` to construct, widening the window in which
        /// concurrent first uses could race.
        pub fn with_construct_delay(bucket: impl Into<String>, delay: Duration) -> Self {
            Self::build(bucket.into(), delay)
        }

        fn build(bucket: String, construct_delay: Duration) -> Self {
            Self {
                state: Arc::new(State {
                    bucket,
                    objects: Mutex::new(BTreeMap::new()),
                    constructions: AtomicUsize::new(0),
                    construct_delay,
                    fail_construct: AtomicBool::new(false),
                    offline: AtomicBool::new(false),
                }),
            }
        }

        /// Number of clients built so far
        pub fn constructions(&self) -> usize {
            self.state.constructions.load(Ordering::SeqCst)
        }

        pub fn fail_construction(&self, fail: bool) {
            self.state.fail_construct.store(fail, Ordering::SeqCst);
        }

        /// Make every request fail with a network error
        pub fn set_offline(&self, offline: bool) {
            self.state.offline.store(offline, Ordering::SeqCst);
        }

        pub fn keys(&self) -> Vec<String> {
            self.state.objects.lock().keys().cloned().collect()
        }

        fn check(&self, bucket: &str) -> FsResult<()> {
            if self.state.offline.load(Ordering::SeqCst) {
                return Err(FsError::Network("connection reset by peer".into()));
            }
            if bucket != self.state.bucket {
                return Err(FsError::provider("s3", format!("NoSuchBucket: {}", bucket)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ObjectConnector for MemoryObjectStore {
        async fn connect(&self, config: &S3Config) -> FsResult<Arc<dyn ObjectClient>> {
            if !self.state.construct_delay.is_zero() {
                tokio::time::sleep(self.state.construct_delay).await;
            }
            if self.state.fail_construct.load(Ordering::SeqCst) {
                return Err(FsError::Config(format!("invalid endpoint: {}", config.endpoint)));
            }
            self.state.constructions.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(self.clone()))
        }
    }

    #[async_trait]
    impl ObjectClient for MemoryObjectStore {
        async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> FsResult<()> {
            self.check(bucket)?;
            self.state.objects.lock().insert(key.to_string(), data);
            Ok(())
        }

        async fn get_object(&self, bucket: &str, key: &str) -> FsResult<Bytes> {
            self.check(bucket)?;
            self.state
                .objects
                .lock()
                .get(key)
                .cloned()
                .ok_or_else(|| FsError::NotFound(key.to_string()))
        }

        async fn stat_object(&self, bucket: &str, key: &str) -> FsResult<ObjectInfo> {
            self.check(bucket)?;
            self.state
                .objects
                .lock()
                .get(key)
                .map(|data| ObjectInfo { key: key.to_string(), size: data.len() as u64 })
                .ok_or_else(|| FsError::NotFound(key.to_string()))
        }

        async fn remove_object(&self, bucket: &str, key: &str) -> FsResult<()> {
            self.check(bucket)?;
            self.state.objects.lock().remove(key);
            Ok(())
        }

        async fn list_objects(&self, bucket: &str, prefix: &str) -> FsResult<ObjectListing> {
            self.check(bucket)?;
            let mut listing = ObjectListing::default();
            for (key, data) in self.state.objects.lock().range(prefix.to_string()..) {
                let Some(rest) = key.strip_prefix(prefix) else { break };
                match rest.split_once('/') {
                    Some((dir, _)) => {
                        let common = format!("{}{}/", prefix, dir);
                        if listing.common_prefixes.last() != Some(&common) {
                            listing.common_prefixes.push(common);
                        }
                    }
                    None => listing.objects.push(ObjectInfo {
                        key: key.clone(),
                        size: data.len() as u64,
                    }),
                }
            }
            Ok(listing)
        }
    }
}
