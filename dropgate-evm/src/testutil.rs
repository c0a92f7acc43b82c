//! Test doubles for the wallet endpoint, namespace, runtime, and notifier.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dropgate::notify::{NoticeLevel, Notifier};
use serde_json::Value;
use tokio::sync::broadcast;
use url::Url;

use crate::discovery::InjectedNamespace;
use crate::endpoint::{EndpointError, EndpointEvent, EndpointFlags, WalletEndpoint};
use crate::runtime::HostRuntime;

/// Scripted wallet endpoint recording every request.
pub(crate) struct MockEndpoint {
    flags: EndpointFlags,
    latency: Mutex<Duration>,
    script: Mutex<HashMap<String, VecDeque<Result<Value, EndpointError>>>>,
    fallback: Mutex<HashMap<String, Result<Value, EndpointError>>>,
    calls: Mutex<Vec<(String, Value)>>,
    events: broadcast::Sender<EndpointEvent>,
}

impl MockEndpoint {
    pub(crate) fn with_flags(flags: EndpointFlags) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            flags,
            latency: Mutex::new(Duration::ZERO),
            script: Mutex::new(HashMap::new()),
            fallback: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            events,
        })
    }

    /// A real MetaMask: private namespace marker plus generic flag.
    pub(crate) fn metamask() -> Arc<Self> {
        Self::with_flags(EndpointFlags {
            is_metamask: true,
            has_metamask_internal: true,
            ..EndpointFlags::default()
        })
    }

    /// Trust Wallet impersonating MetaMask via the generic flag.
    pub(crate) fn trust() -> Arc<Self> {
        Self::with_flags(EndpointFlags {
            is_metamask: true,
            is_trust: true,
            ..EndpointFlags::default()
        })
    }

    /// Queues a one-shot response for `method` (consumed in FIFO order).
    pub(crate) fn stub(&self, method: &str, result: Result<Value, EndpointError>) {
        self.script
            .lock()
            .expect("script lock")
            .entry(method.to_owned())
            .or_default()
            .push_back(result);
    }

    /// Sets a repeating response used when no one-shot stub remains.
    pub(crate) fn stub_default(&self, method: &str, result: Result<Value, EndpointError>) {
        self.fallback
            .lock()
            .expect("fallback lock")
            .insert(method.to_owned(), result);
    }

    /// Delays every request by `latency`.
    pub(crate) fn set_latency(&self, latency: Duration) {
        *self.latency.lock().expect("latency lock") = latency;
    }

    /// All requested method names, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    /// Number of requests made for `method`.
    pub(crate) fn calls_of(&self, method: &str) -> usize {
        self.calls().iter().filter(|m| *m == method).count()
    }

    /// Params of every request made for `method`, in order.
    pub(crate) fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Emits an endpoint event to all subscribers.
    pub(crate) fn emit(&self, event: EndpointEvent) {
        // Send fails only when nobody is subscribed, which tests may do.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletEndpoint for MockEndpoint {
    async fn request(&self, method: &str, params: Value) -> Result<Value, EndpointError> {
        let latency = *self.latency.lock().expect("latency lock");
        if latency > Duration::ZERO {
            tokio::time::sleep(latency).await;
        }
        self.calls
            .lock()
            .expect("calls lock")
            .push((method.to_owned(), params));
        if let Some(result) = self
            .script
            .lock()
            .expect("script lock")
            .get_mut(method)
            .and_then(VecDeque::pop_front)
        {
            return result;
        }
        if let Some(result) = self.fallback.lock().expect("fallback lock").get(method) {
            return result.clone();
        }
        Err(EndpointError::new(
            -32601,
            format!("unscripted method {method}"),
        ))
    }

    fn flags(&self) -> EndpointFlags {
        self.flags
    }

    fn subscribe(&self) -> broadcast::Receiver<EndpointEvent> {
        self.events.subscribe()
    }
}

/// Injected namespace double.
#[derive(Default)]
pub(crate) struct MockNamespace {
    providers: Option<Vec<Arc<dyn WalletEndpoint>>>,
    root: Option<Arc<dyn WalletEndpoint>>,
}

impl MockNamespace {
    pub(crate) fn with_providers(providers: Vec<Arc<MockEndpoint>>) -> Self {
        Self {
            providers: Some(
                providers
                    .into_iter()
                    .map(|p| p as Arc<dyn WalletEndpoint>)
                    .collect(),
            ),
            root: None,
        }
    }

    pub(crate) fn with_root(root: Arc<MockEndpoint>) -> Self {
        Self {
            providers: None,
            root: Some(root),
        }
    }
}

impl InjectedNamespace for MockNamespace {
    fn providers(&self) -> Option<Vec<Arc<dyn WalletEndpoint>>> {
        self.providers.clone()
    }

    fn root(&self) -> Option<Arc<dyn WalletEndpoint>> {
        self.root.clone()
    }
}

/// Host runtime double recording redirects and reloads.
pub(crate) struct MockRuntime {
    mobile: bool,
    url: Url,
    pub(crate) redirects: Mutex<Vec<String>>,
    pub(crate) reloads: AtomicUsize,
}

impl MockRuntime {
    pub(crate) fn desktop() -> Self {
        Self::at("https://claim.example.com/airdrop", false)
    }

    pub(crate) fn mobile() -> Self {
        Self::at("https://claim.example.com/airdrop", true)
    }

    pub(crate) fn at(url: &str, mobile: bool) -> Self {
        Self {
            mobile,
            url: Url::parse(url).expect("test URL parses"),
            redirects: Mutex::new(Vec::new()),
            reloads: AtomicUsize::new(0),
        }
    }

    pub(crate) fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl HostRuntime for MockRuntime {
    fn is_mobile(&self) -> bool {
        self.mobile
    }

    fn current_url(&self) -> Url {
        self.url.clone()
    }

    fn redirect(&self, url: &str) {
        self.redirects.lock().expect("redirects lock").push(url.to_owned());
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

/// Notifier double collecting every message.
#[derive(Default)]
pub(crate) struct CollectingNotifier {
    pub(crate) messages: Mutex<Vec<(NoticeLevel, String)>>,
}

impl CollectingNotifier {
    pub(crate) fn messages_at(&self, level: NoticeLevel) -> Vec<String> {
        self.messages
            .lock()
            .expect("messages lock")
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.messages
            .lock()
            .expect("messages lock")
            .push((level, message.to_owned()));
    }
}
