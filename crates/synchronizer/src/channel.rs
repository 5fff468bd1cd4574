//! ChannelManager - one managed connection per external plugin
//!
//! Lifecycle per plugin:
//!
//! ```text
//! Disconnected --submit--> Connecting --on_connected--> Connected
//!      ^                                                    |
//!      +------------------- on_disconnected ----------------+
//! ```
//!
//! Work submitted while connecting waits in a FIFO queue and is drained onto
//! the channel's single worker once the endpoint arrives. A disconnect keeps
//! the record so the next submit reconnects through it; `clear` drops every
//! record.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{CoverReader, PluginHost, PluginId};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument};

use crate::executor::WorkerPool;

/// Deferred request for a plugin; receives the endpoint current at dispatch
pub type WorkItem = Box<dyn FnOnce(Option<Arc<dyn CoverReader>>) + Send + 'static>;

/// Connection state of one plugin channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

struct ChannelInner {
    state: ChannelState,
    pending: VecDeque<WorkItem>,
    endpoint: Option<Arc<dyn CoverReader>>,
    /// Set once the record has been removed by `clear`
    closed: bool,
}

struct PluginChannel {
    plugin: PluginId,
    inner: Mutex<ChannelInner>,
    /// Serializes every request to this plugin
    executor: WorkerPool,
}

impl PluginChannel {
    fn new(plugin: PluginId, runtime: &Handle) -> Self {
        let executor = WorkerPool::spawn(format!("plugin:{plugin}"), 1, runtime);
        Self {
            plugin,
            inner: Mutex::new(ChannelInner {
                state: ChannelState::Disconnected,
                pending: VecDeque::new(),
                endpoint: None,
                closed: false,
            }),
            executor,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, endpoint: Option<Arc<dyn CoverReader>>, item: WorkItem) {
        self.executor.execute(Box::new(move || item(endpoint)));
    }

    fn transition(&self, inner: &mut ChannelInner, next: ChannelState) {
        if inner.state != next {
            debug!(
                plugin = %self.plugin,
                from = inner.state.as_str(),
                to = next.as_str(),
                "Channel state change"
            );
            inner.state = next;
            observability::record_channel_transition(&self.plugin, next.as_str());
        }
    }
}

/// Registry of plugin channels
pub struct ChannelManager {
    host: Arc<dyn PluginHost>,
    runtime: Handle,
    channels: Mutex<HashMap<PluginId, Arc<PluginChannel>>>,
}

impl ChannelManager {
    /// Create an empty manager; channel workers are spawned on `runtime`
    pub fn new(host: Arc<dyn PluginHost>, runtime: Handle) -> Self {
        Self {
            host,
            runtime,
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<PluginId, Arc<PluginChannel>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn channel(&self, plugin: &PluginId) -> Option<Arc<PluginChannel>> {
        self.registry().get(plugin).cloned()
    }

    fn channel_or_create(&self, plugin: &PluginId) -> Arc<PluginChannel> {
        let mut channels = self.registry();
        Arc::clone(channels.entry(plugin.clone()).or_insert_with(|| {
            debug!(plugin = %plugin, "Creating plugin channel");
            Arc::new(PluginChannel::new(plugin.clone(), &self.runtime))
        }))
    }

    /// Queue or dispatch a request for `plugin`.
    ///
    /// A disconnected (or freshly created) channel moves to connecting and
    /// the host is asked to connect; the request waits in the queue.
    #[instrument(level = "debug", name = "channel_submit", skip(self, item), fields(plugin = %plugin))]
    pub fn submit(&self, plugin: &PluginId, item: WorkItem) {
        let mut item = Some(item);

        let needs_connect = loop {
            let channel = self.channel_or_create(plugin);
            let mut inner = channel.lock();
            if inner.closed {
                // Lost a race with clear(); the next lookup creates a fresh record
                continue;
            }
            let Some(item) = item.take() else {
                break false;
            };

            match inner.state {
                ChannelState::Connected => {
                    let endpoint = inner.endpoint.clone();
                    channel.dispatch(endpoint, item);
                    break false;
                }
                ChannelState::Connecting => {
                    inner.pending.push_back(item);
                    observability::record_pending_depth(plugin, inner.pending.len());
                    break false;
                }
                ChannelState::Disconnected => {
                    inner.pending.push_back(item);
                    observability::record_pending_depth(plugin, inner.pending.len());
                    channel.transition(&mut inner, ChannelState::Connecting);
                    break true;
                }
            }
        };

        if needs_connect {
            debug!(plugin = %plugin, "Requesting plugin connection");
            self.host.connect(plugin);
        }
    }

    /// The host reports the plugin endpoint is available
    #[instrument(name = "channel_on_connected", skip(self, endpoint), fields(plugin = %plugin))]
    pub fn on_connected(&self, plugin: &PluginId, endpoint: Arc<dyn CoverReader>) {
        let Some(channel) = self.channel(plugin) else {
            debug!(plugin = %plugin, "Connect signal for unknown plugin ignored");
            return;
        };

        let mut inner = channel.lock();
        if inner.closed {
            debug!(plugin = %plugin, "Connect signal for cleared channel ignored");
            return;
        }

        inner.endpoint = Some(Arc::clone(&endpoint));
        channel.transition(&mut inner, ChannelState::Connected);

        let drained = inner.pending.len();
        for item in inner.pending.drain(..) {
            channel.dispatch(Some(Arc::clone(&endpoint)), item);
        }
        observability::record_pending_depth(plugin, 0);

        info!(plugin = %plugin, drained, "Plugin connected");
    }

    /// The host reports the plugin endpoint went away.
    ///
    /// The record is kept; already dispatched requests keep running.
    #[instrument(name = "channel_on_disconnected", skip(self), fields(plugin = %plugin))]
    pub fn on_disconnected(&self, plugin: &PluginId) {
        let Some(channel) = self.channel(plugin) else {
            debug!(plugin = %plugin, "Disconnect signal for unknown plugin ignored");
            return;
        };

        let mut inner = channel.lock();
        inner.endpoint = None;
        channel.transition(&mut inner, ChannelState::Disconnected);

        info!(plugin = %plugin, pending = inner.pending.len(), "Plugin disconnected");
    }

    /// Disconnect every plugin and drop every channel record.
    ///
    /// Requests still waiting for a connection are handed to their worker
    /// without an endpoint, so their callers still get completion.
    #[instrument(name = "channel_clear", skip(self))]
    pub fn clear(&self) {
        let channels: Vec<_> = self.registry().drain().collect();

        for (plugin, channel) in channels {
            let flushed = {
                let mut inner = channel.lock();
                inner.closed = true;
                inner.endpoint = None;
                channel.transition(&mut inner, ChannelState::Disconnected);
                let flushed = inner.pending.len();
                for item in inner.pending.drain(..) {
                    channel.dispatch(None, item);
                }
                flushed
            };
            observability::record_pending_depth(&plugin, 0);

            self.host.disconnect(&plugin);
            info!(plugin = %plugin, flushed, "Plugin channel cleared");
        }
    }

    /// Current state of a plugin's channel, if a record exists
    pub fn state(&self, plugin: &PluginId) -> Option<ChannelState> {
        self.channel(plugin).map(|channel| channel.lock().state)
    }

    /// Requests waiting for a connection
    pub fn pending_len(&self, plugin: &PluginId) -> usize {
        self.channel(plugin)
            .map(|channel| channel.lock().pending.len())
            .unwrap_or(0)
    }

    /// Number of channel records
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }
}
