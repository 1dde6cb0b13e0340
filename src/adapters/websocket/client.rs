//! Per-socket protocol state machine.
//!
//! A [`Client`] starts unregistered. A `register` frame gives it an identity
//! and a callback URL and publishes it to the hub; from then on `message`
//! frames are redirected to the front-end mirror, the callback webhook, or
//! both, according to [`RedirectConfig`]. Registering again overwrites the
//! identity, and a previous identity is withdrawn from the hub.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::adapters::callback::forward_detached;
use crate::config::RedirectConfig;
use crate::domain::{
    ClientId, ConnectionId, InboundPayload, OutboundPayload, ProtocolError, Redirects, MESSAGE,
    REGISTER,
};
use crate::ports::CallbackForwarder;

use super::hub::{ClientEntry, HubHandle, Target, WeakHubHandle};

/// One browser session bound to one connection.
pub struct Client {
    id: Option<ClientId>,
    callback: String,
    connection_id: ConnectionId,
    outbound: mpsc::UnboundedSender<OutboundPayload>,
    hub: WeakHubHandle,
    forwarder: Arc<dyn CallbackForwarder>,
    redirects: RedirectConfig,
}

impl Client {
    /// Create an unregistered client writing its frames to `outbound`.
    pub fn new(
        connection_id: ConnectionId,
        outbound: mpsc::UnboundedSender<OutboundPayload>,
        hub: WeakHubHandle,
        forwarder: Arc<dyn CallbackForwarder>,
        redirects: RedirectConfig,
    ) -> Self {
        Self {
            id: None,
            callback: String::new(),
            connection_id,
            outbound,
            hub,
            forwarder,
            redirects,
        }
    }

    pub fn id(&self) -> Option<&ClientId> {
        self.id.as_ref()
    }

    pub fn callback(&self) -> &str {
        &self.callback
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn is_registered(&self) -> bool {
        self.id.is_some() && !self.callback.is_empty()
    }

    /// Route a decoded frame by its `type`. Unknown types are ignored.
    pub fn dispatch(&mut self, payload: InboundPayload) -> Result<(), ProtocolError> {
        match payload.kind.as_str() {
            REGISTER => self.register(payload),
            MESSAGE => self.redirect(payload).map(|redirects| {
                tracing::trace!(connection_id = %self.connection_id, %redirects, "Message redirected");
            }),
            other => {
                tracing::trace!(connection_id = %self.connection_id, kind = other, "Ignoring frame");
                Ok(())
            }
        }
    }

    /// Take the identity and callback from `payload` and publish this client
    /// to the hub.
    ///
    /// A non-empty `trigger` is forwarded to the callback as if the client
    /// had sent it.
    pub fn register(&mut self, payload: InboundPayload) -> Result<(), ProtocolError> {
        tracing::trace!(connection_id = %self.connection_id, from = %payload.from, "Registering client");

        let id = ClientId::new(payload.from).ok_or(ProtocolError::BlankFrom)?;
        if payload.callback.is_empty() {
            return Err(ProtocolError::BlankCallback);
        }

        let hub = self.hub()?;
        if let Some(previous) = self.id.as_ref().filter(|previous| **previous != id) {
            tracing::debug!(
                connection_id = %self.connection_id,
                %previous,
                client_id = %id,
                "Client changed identity"
            );
            hub.unregister(previous.clone(), self.connection_id)
                .map_err(|_| ProtocolError::HubUnavailable)?;
        }

        self.id = Some(id.clone());
        self.callback = payload.callback;

        hub.register(ClientEntry {
            id,
            connection_id: self.connection_id,
            outbound: self.outbound.clone(),
        })
        .map_err(|_| ProtocolError::HubUnavailable)?;

        if !payload.trigger.is_empty() {
            self.redirect_to_callback(payload.trigger);
        }

        Ok(())
    }

    /// Send a message to every enabled redirect.
    pub fn redirect(&self, payload: InboundPayload) -> Result<Redirects, ProtocolError> {
        let id = match &self.id {
            Some(id) if !self.callback.is_empty() => id.clone(),
            _ => return Err(ProtocolError::NeedRegistration),
        };

        let mut redirects = Redirects::default();

        if self.redirects.redirect_to_frontend {
            tracing::trace!(client_id = %id, "Redirecting message to frontend");
            let outbound =
                OutboundPayload::message(id.as_str(), id.as_str(), payload.message.clone());
            self.hub()?
                .send(Target::Client(id.clone()), outbound)
                .map_err(|_| ProtocolError::HubUnavailable)?;
            redirects.frontend = true;
        }

        if self.redirects.redirect_to_callback {
            self.redirect_to_callback(payload.message.text);
            redirects.callback = true;
        }

        if !redirects.any() {
            return Err(ProtocolError::NoRedirects);
        }

        Ok(redirects)
    }

    /// Remove this client from the hub, if it ever registered.
    pub fn leave(&self) {
        let (Some(id), Some(hub)) = (&self.id, self.hub.upgrade()) else {
            return;
        };
        if hub.unregister(id.clone(), self.connection_id).is_err() {
            tracing::debug!(client_id = %id, "Hub already stopped");
        }
    }

    fn redirect_to_callback(&self, text: String) {
        let from = self.id.as_ref().map(ClientId::to_string).unwrap_or_default();
        forward_detached(self.forwarder.clone(), self.callback.clone(), from, text);
    }

    fn hub(&self) -> Result<HubHandle, ProtocolError> {
        self.hub.upgrade().ok_or(ProtocolError::HubUnavailable)
    }
}
