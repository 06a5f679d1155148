//! Request dispatch
//!
//! Hands the caller's URI handler a request augmented with a `post`
//! delivery marker, then polls the callback location embedded in the
//! request until the responder answers or the caller cancels.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;
use url::Url;

use crate::callback::{gen_callback, ExtractCallback, DEFAULT_RELAY_URL};
use crate::poll::{poll, CancelHandle, PollOutcome};
use crate::{Result, TransportError};

/// Default cadence at which the relay is polled for a response
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(2000);

/// Query parameter marking how the responder should deliver its reply
const DELIVERY_MODE_PARAM: (&str, &str) = ("type", "post");

/// Relay transport configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Relay base address callbacks are built on
    pub relay_url: String,
    /// Interval between relay fetches
    pub polling_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            polling_interval: DEFAULT_POLLING_INTERVAL,
        }
    }
}

/// Delivers a prepared request URI to the responding party.
///
/// How delivery happens (QR modal, deep link) is the handler's business.
/// The handler receives a [`CancelHandle`] it may store, e.g. to wire a
/// cancel button in a UI.
pub trait UriHandler: Send + Sync {
    fn handle(&self, request_uri: &str, cancel: CancelHandle);
}

impl<F> UriHandler for F
where
    F: Fn(&str, CancelHandle) + Send + Sync,
{
    fn handle(&self, request_uri: &str, cancel: CancelHandle) {
        self(request_uri, cancel)
    }
}

/// One in-flight polling operation.
///
/// Resolves to exactly one terminal outcome: a payload, a relay-reported
/// error, or a cancellation.
pub struct PollHandle {
    cancel: CancelHandle,
    task: JoinHandle<Result<PollOutcome>>,
}

impl PollHandle {
    /// Stop polling before the next scheduled fetch
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The cancellation switch, for wiring into UIs or timeouts
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Wait for the terminal outcome
    pub async fn wait(self) -> Result<PollOutcome> {
        self.task.await?
    }
}

/// Relay transport for a single request/response exchange.
///
/// Generic over the capability that digs the callback location out of a
/// signed-token request URI, keeping the transport decoupled from any
/// particular token format.
pub struct RelayTransport<E> {
    config: RelayConfig,
    client: reqwest::Client,
    extract_callback: E,
}

impl<E: ExtractCallback> RelayTransport<E> {
    /// Create a transport with the default relay and polling cadence
    pub fn new(extract_callback: E) -> Result<Self> {
        Self::with_config(extract_callback, RelayConfig::default())
    }

    pub fn with_config(extract_callback: E, config: RelayConfig) -> Result<Self> {
        Url::parse(&config.relay_url).map_err(|err| {
            TransportError::Configuration(format!("relay URL {:?}: {err}", config.relay_url))
        })?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| TransportError::Configuration(err.to_string()))?;
        Ok(Self {
            config,
            client,
            extract_callback,
        })
    }

    /// Build a fresh, unguessable callback location on this relay
    pub fn gen_callback(&self) -> String {
        gen_callback(&self.config.relay_url)
    }

    /// Whether the callback embedded in `request_uri` points at this relay.
    ///
    /// Lets a multi-transport dispatcher decide if this transport should
    /// handle the response.
    pub fn is_own_callback(&self, request_uri: &str) -> bool {
        self.extract_callback
            .extract(request_uri)
            .is_some_and(|callback| callback.starts_with(&self.config.relay_url))
    }

    /// Dispatch a request and start polling for its response.
    ///
    /// `request_uri` must already carry a callback location placed there
    /// upstream. The URI handed to `uri_handler` additionally carries the
    /// `type=post` delivery marker.
    pub fn dispatch(&self, uri_handler: &dyn UriHandler, request_uri: &str) -> Result<PollHandle> {
        let callback = self
            .extract_callback
            .extract(request_uri)
            .ok_or(TransportError::MissingCallback)?;

        let augmented = append_query_param(request_uri, DELIVERY_MODE_PARAM)?;

        let cancel = CancelHandle::new();
        uri_handler.handle(&augmented, cancel.clone());

        info!(%callback, "dispatched request, polling for response");

        let task = {
            let client = self.client.clone();
            let interval = self.config.polling_interval;
            let cancel = cancel.clone();
            tokio::spawn(async move { poll(&client, &callback, interval, &cancel).await })
        };

        Ok(PollHandle { cancel, task })
    }
}

/// Append a query parameter with stable, round-trippable encoding
fn append_query_param(uri: &str, (key, value): (&str, &str)) -> Result<String> {
    let mut url = Url::parse(uri)?;
    url.query_pairs_mut().append_pair(key, value);
    Ok(url.into())
}
