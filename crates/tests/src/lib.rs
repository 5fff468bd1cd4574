//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 去重、扇出顺序、插件通道排队的端到端场景
//! - 通道清理与重连

#[cfg(test)]
mod contract_tests {
    use contracts::{ConfigVersion, LoaderConfig};

    #[test]
    fn test_contracts_compile() {
        let _ = ConfigVersion::V1;
    }

    #[test]
    fn test_default_config_round_trips_through_loader() {
        let toml = config_loader::ConfigLoader::to_toml(&LoaderConfig::default()).unwrap();
        let config =
            config_loader::ConfigLoader::load_from_str(&toml, config_loader::ConfigFormat::Toml)
                .unwrap();
        assert_eq!(config.loader.worker_threads, 3);
    }
}

#[cfg(test)]
mod support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{
        ContractError, CoverReader, ImageData, LoaderConfig, PluginHost, PluginId, SourceType,
        TargetSize,
    };
    use image_loader::ImageLoader;
    use synchronizer::SimpleImage;

    /// Host that only records what it was asked to do
    #[derive(Default)]
    pub struct RecordingHost {
        pub connects: AtomicUsize,
        pub disconnects: AtomicUsize,
    }

    impl RecordingHost {
        pub fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        pub fn disconnects(&self) -> usize {
            self.disconnects.load(Ordering::SeqCst)
        }
    }

    impl PluginHost for RecordingHost {
        fn connect(&self, _plugin: &PluginId) {
            self.connects.fetch_add(1, Ordering::SeqCst);
        }

        fn disconnect(&self, _plugin: &PluginId) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Plugin endpoint that renders a 1x1 bitmap per request
    #[derive(Default)]
    pub struct MockReader {
        pub paths: Mutex<Vec<String>>,
        pub active: AtomicUsize,
        pub max_active: AtomicUsize,
        pub delay: Duration,
    }

    impl MockReader {
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        pub fn paths(&self) -> Vec<String> {
            self.paths.lock().unwrap().clone()
        }
    }

    impl CoverReader for MockReader {
        fn read_bitmap(&self, path: &str, _target: TargetSize) -> Result<ImageData, ContractError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.paths.lock().unwrap().push(path.to_string());
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(ImageData::rgba8(1, 1, vec![255u8; 4]))
        }
    }

    pub fn loader(host: Arc<RecordingHost>) -> Arc<ImageLoader> {
        Arc::new(
            ImageLoader::builder(LoaderConfig::default(), host)
                .build()
                .unwrap(),
        )
    }

    /// Local image whose fetch takes `delay` and counts invocations
    pub fn slow_image(
        id: &str,
        kind: SourceType,
        delay: Duration,
        calls: &Arc<AtomicUsize>,
    ) -> Arc<SimpleImage> {
        let calls = Arc::clone(calls);
        Arc::new(SimpleImage::new(id, kind, move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(delay);
            Ok(ImageData::encoded(vec![0x89, b'P', b'N', b'G']))
        }))
    }

    /// Callback that reports on a oneshot channel
    pub fn notify() -> (contracts::SyncCallback, tokio::sync::oneshot::Receiver<()>) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        (
            Box::new(move || {
                let _ = tx.send(());
            }),
            rx,
        )
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex};
    use std::time::Duration;

    use contracts::{
        ContractError, CoverReader, ImageData, ImageProxy, PluginId, SourceType, TargetSize,
    };
    use synchronizer::{ChannelState, PluginImage, SimpleImage};
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    use crate::support::{loader, notify, slow_image, MockReader, RecordingHost};

    const WAIT: Duration = Duration::from_secs(5);

    /// Three concurrent requests on an unsynchronized file image resolve once
    /// and call back A, B, C in order.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_file_image_three_callbacks_in_order() {
        let loader = loader(Arc::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let h1 = slow_image("h1", SourceType::File, Duration::from_millis(50), &calls);

        let order = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        for tag in ["A", "B", "C"] {
            let order = Arc::clone(&order);
            let tx = tx.clone();
            loader.request_synchronization(
                h1.clone(),
                Box::new(move || {
                    order.lock().unwrap().push(tag);
                    let _ = tx.send(());
                }),
            );
        }

        for _ in 0..3 {
            timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);
        assert!(h1.is_synchronized());
    }

    /// A service request made before the plugin connects runs once the
    /// connection arrives 20ms later.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_service_request_before_connect() {
        let host = Arc::new(RecordingHost::default());
        let loader = loader(Arc::clone(&host));
        let plugin = PluginId::from("P");
        let h2 = Arc::new(PluginImage::new(plugin.clone(), "/library/h2.fb2"));
        let reader = Arc::new(MockReader::default());

        let (done, rx) = notify();
        loader.request_synchronization(h2.clone(), done);
        assert_eq!(host.connects(), 1);
        assert_eq!(loader.channels().state(&plugin), Some(ChannelState::Connecting));

        let connector = Arc::clone(&loader);
        let endpoint = Arc::clone(&reader);
        let plugin_id = plugin.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            connector.channels().on_connected(&plugin_id, endpoint);
        });

        timeout(WAIT, rx).await.unwrap().unwrap();

        assert_eq!(reader.paths(), vec!["/library/h2.fb2".to_string()]);
        assert!(h2.is_synchronized());
        assert_eq!(loader.channels().pending_len(&plugin), 0);
    }

    /// Requests racing in from many threads still launch one resolution
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dedup_across_threads() {
        const THREADS: usize = 8;

        let loader = loader(Arc::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let image = slow_image("shared", SourceType::Network, Duration::from_millis(200), &calls);
        let delivered = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let loader = Arc::clone(&loader);
                let image = image.clone();
                let delivered = Arc::clone(&delivered);
                let barrier = Arc::clone(&barrier);
                let tx = tx.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    loader.request_synchronization(
                        image,
                        Box::new(move || {
                            delivered.fetch_add(1, Ordering::SeqCst);
                            let _ = tx.send(());
                        }),
                    );
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for _ in 0..THREADS {
            timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(delivered.load(Ordering::SeqCst), THREADS);
        let metrics = loader.metrics();
        assert_eq!(metrics.started, 1);
        assert_eq!(metrics.joined, THREADS as u64 - 1);
    }

    /// Requests queued while connecting are served in submission order, one
    /// at a time.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_queued_requests_keep_submission_order() {
        let loader = loader(Arc::default());
        let plugin = PluginId::from("org.example.comics");
        let reader = Arc::new(MockReader::with_delay(Duration::from_millis(5)));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let paths: Vec<String> = (0..5).map(|i| format!("/comics/{i}.cbz")).collect();
        for path in &paths {
            let tx = tx.clone();
            loader.request_synchronization(
                Arc::new(PluginImage::new(plugin.clone(), path)),
                Box::new(move || {
                    let _ = tx.send(());
                }),
            );
        }
        assert_eq!(loader.channels().pending_len(&plugin), 5);

        loader.channels().on_connected(&plugin, reader.clone());
        for _ in 0..paths.len() {
            timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        }

        assert_eq!(reader.paths(), paths);
        assert_eq!(reader.max_active.load(Ordering::SeqCst), 1);
    }

    /// `clear` drops every channel; the next service request starts over
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_clear_then_reconnect() {
        let host = Arc::new(RecordingHost::default());
        let loader = loader(Arc::clone(&host));
        let plugin = PluginId::from("org.example.pdf");
        let reader = Arc::new(MockReader::default());

        let first = Arc::new(PluginImage::new(plugin.clone(), "/a.pdf"));
        let (done, rx) = notify();
        loader.request_synchronization(first.clone(), done);
        loader.channels().on_connected(&plugin, reader.clone());
        timeout(WAIT, rx).await.unwrap().unwrap();

        loader.clear();
        assert!(loader.channels().is_empty());
        assert_eq!(host.disconnects(), 1);

        let second = Arc::new(PluginImage::new(plugin.clone(), "/b.pdf"));
        let (done, rx) = notify();
        loader.request_synchronization(second.clone(), done);
        assert_eq!(loader.channels().state(&plugin), Some(ChannelState::Connecting));
        assert_eq!(host.connects(), 2);

        loader.channels().on_connected(&plugin, reader.clone());
        timeout(WAIT, rx).await.unwrap().unwrap();
        assert!(second.is_synchronized());
        assert_eq!(reader.paths().len(), 2);
    }

    /// Disconnect keeps the channel record, unlike `clear`. The next request
    /// reuses it and asks the host to connect again.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disconnect_keeps_channel_record() {
        let host = Arc::new(RecordingHost::default());
        let loader = loader(Arc::clone(&host));
        let plugin = PluginId::from("org.example.djvu");
        let reader = Arc::new(MockReader::default());

        let (done, rx) = notify();
        loader.request_synchronization(Arc::new(PluginImage::new(plugin.clone(), "/x.djvu")), done);
        loader.channels().on_connected(&plugin, reader.clone());
        timeout(WAIT, rx).await.unwrap().unwrap();

        loader.channels().on_disconnected(&plugin);
        assert_eq!(loader.channels().len(), 1);
        assert_eq!(loader.channels().state(&plugin), Some(ChannelState::Disconnected));

        let (done, rx) = notify();
        loader.request_synchronization(Arc::new(PluginImage::new(plugin.clone(), "/y.djvu")), done);
        assert_eq!(loader.channels().state(&plugin), Some(ChannelState::Connecting));
        assert_eq!(loader.channels().len(), 1);
        assert_eq!(host.connects(), 2);

        loader.channels().on_connected(&plugin, reader.clone());
        timeout(WAIT, rx).await.unwrap().unwrap();
        assert_eq!(reader.paths(), vec!["/x.djvu", "/y.djvu"]);
    }

    /// An outdated image reports unsynchronized and resolves again
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stale_image_resolves_again() {
        let loader = loader(Arc::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let image = Arc::new(
            synchronizer::SimpleImage::new("feed", SourceType::Network, {
                let calls = Arc::clone(&calls);
                move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(contracts::ImageData::encoded(vec![1u8, 2]))
                }
            })
            .with_expiry(Duration::from_millis(30)),
        );

        let (done, rx) = notify();
        loader.request_synchronization(image.clone(), done);
        timeout(WAIT, rx).await.unwrap().unwrap();

        sleep(Duration::from_millis(40)).await;
        assert!(!image.is_synchronized());

        let (done, rx) = notify();
        loader.request_synchronization(image.clone(), done);
        timeout(WAIT, rx).await.unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// A file on disk is read once and its bytes attached
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_file_on_disk_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.png");
        std::fs::write(&path, b"\x89PNG cover").unwrap();

        let loader = loader(Arc::default());
        let cover = Arc::new(SimpleImage::file(&path));
        let (done, rx) = notify();
        loader.request_synchronization(cover.clone(), done);
        timeout(WAIT, rx).await.unwrap().unwrap();

        assert!(cover.is_synchronized());
        assert_eq!(cover.real_image().unwrap().len(), 10);

        // Removed file: the cached bytes stay, a fresh handle fails
        std::fs::remove_file(&path).unwrap();
        let missing = Arc::new(SimpleImage::file(&path));
        let (done, rx) = notify();
        loader.request_synchronization(missing.clone(), done);
        timeout(WAIT, rx).await.unwrap().unwrap();
        assert!(!missing.is_synchronized());
        assert!(cover.is_synchronized());
    }

    struct ExplodingReader;

    impl CoverReader for ExplodingReader {
        fn read_bitmap(&self, path: &str, _target: TargetSize) -> Result<ImageData, ContractError> {
            panic!("renderer crashed on {path}");
        }
    }

    /// A reader that panics still completes every waiter and frees the id
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_reader_completes_waiters() {
        let loader = loader(Arc::default());
        let plugin = PluginId::from("P");
        let image = Arc::new(PluginImage::new(plugin.clone(), "/library/bad.pdf"));

        let (first, rx1) = notify();
        let (second, rx2) = notify();
        loader.request_synchronization(image.clone(), first);
        loader.request_synchronization(image.clone(), second);
        loader
            .channels()
            .on_connected(&plugin, Arc::new(ExplodingReader));

        timeout(WAIT, rx1).await.unwrap().unwrap();
        timeout(WAIT, rx2).await.unwrap().unwrap();
        assert!(!image.is_synchronized());
        assert_eq!(loader.in_flight(), 0);

        // A later request starts a fresh resolution on a working endpoint
        let reader = Arc::new(MockReader::default());
        loader.channels().on_connected(&plugin, reader.clone());
        let (done, rx) = notify();
        loader.request_synchronization(image.clone(), done);
        timeout(WAIT, rx).await.unwrap().unwrap();
        assert!(image.is_synchronized());
        assert_eq!(reader.paths(), vec!["/library/bad.pdf".to_string()]);
    }

    /// A fetch that panics completes its caller and the next request retries
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_fetch_completes_and_retries() {
        let loader = loader(Arc::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let image = Arc::new(SimpleImage::new("flaky", SourceType::Network, move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("connection reset");
            }
            Ok(ImageData::encoded(vec![1u8, 2, 3]))
        }));

        let (done, rx) = notify();
        loader.request_synchronization(image.clone(), done);
        timeout(WAIT, rx).await.unwrap().unwrap();
        assert!(!image.is_synchronized());
        assert_eq!(loader.in_flight(), 0);

        let (done, rx) = notify();
        loader.request_synchronization(image.clone(), done);
        timeout(WAIT, rx).await.unwrap().unwrap();
        assert!(image.is_synchronized());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// Already synchronized images call back before the request returns
    #[tokio::test]
    async fn test_fast_path_is_synchronous() {
        let loader = loader(Arc::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let image = slow_image("ready", SourceType::File, Duration::ZERO, &calls);
        image.slot().attach(contracts::ImageData::encoded(vec![1u8]));

        let fired = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&fired);
        loader.request_synchronization(
            image,
            Box::new(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(loader.in_flight(), 0);
    }
}

#[cfg(test)]
mod embedding_tests {
    use std::io::Read;

    use embedding::{apply_prefix, derive_key, EmbeddingReader, EMBEDDED_PREFIX_LEN};

    #[test]
    fn test_only_prefix_is_transformed() {
        let original: Vec<u8> = (0..1500u32).map(|i| (i % 256) as u8).collect();
        let key = derive_key("urn:uuid:7d4a");
        let mut encoded = original.clone();
        apply_prefix(&key, 0, &mut encoded);

        let boundary = EMBEDDED_PREFIX_LEN as usize;
        assert_eq!(encoded[boundary..], original[boundary..]);

        let mut decoded = Vec::new();
        EmbeddingReader::with_key(encoded.as_slice(), key)
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, original);
    }
}
