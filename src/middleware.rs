//! Tower middleware that fronts a service with an admission gate.
//!
//! The layer knows nothing about *how* admission works; it extracts an
//! identity from the request, asks an [`Admit`] implementation, and either
//! forwards the request or fails with the evaluated [`Decision`]. Transports
//! map [`AdmitError`] variants onto their own status codes (rejection and
//! missing identity are 4xx-shaped, gate failures 5xx-shaped).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

use crate::error::GateError;
use crate::gate::{Admit, Decision};

/// Error type produced by [`GateService`].
#[derive(thiserror::Error, Debug)]
pub enum AdmitError<E> {
    /// The gate evaluated the request and did not grant it.
    #[error("admission rejected: {0:?}")]
    Rejected(Decision),
    /// No identity could be extracted from the request.
    #[error("request carries no identity")]
    MissingIdentity,
    /// The gate itself failed (configuration or backing store).
    #[error("gate failure: {0}")]
    Gate(#[source] GateError),
    /// The wrapped service failed after admission.
    #[error(transparent)]
    Inner(E),
}

impl<E> AdmitError<E> {
    /// The evaluated decision, when the request was rejected.
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            AdmitError::Rejected(decision) => Some(decision),
            _ => None,
        }
    }
}

/// Extracts the throttling identity from a request.
pub trait IdentityExtractor<Req>: Send + Sync {
    /// Return the identity, or `None` if the request carries none.
    fn identity(&self, request: &Req) -> Option<String>;
}

impl<Req, F> IdentityExtractor<Req> for F
where
    F: Fn(&Req) -> Option<String> + Send + Sync,
{
    fn identity(&self, request: &Req) -> Option<String> {
        self(request)
    }
}

/// A layer that gates requests through an [`Admit`] implementation.
pub struct GateLayer<G, X> {
    gate: Arc<G>,
    extractor: Arc<X>,
}

impl<G, X> GateLayer<G, X> {
    /// Create a new gate layer.
    pub fn new(gate: G, extractor: X) -> Self {
        Self { gate: Arc::new(gate), extractor: Arc::new(extractor) }
    }
}

impl<G, X> Clone for GateLayer<G, X> {
    fn clone(&self) -> Self {
        Self { gate: self.gate.clone(), extractor: self.extractor.clone() }
    }
}

impl<S, G, X> Layer<S> for GateLayer<G, X> {
    type Service = GateService<S, G, X>;

    fn layer(&self, service: S) -> Self::Service {
        GateService { inner: service, gate: self.gate.clone(), extractor: self.extractor.clone() }
    }
}

/// Middleware service that enforces admission before calling the inner
/// service.
pub struct GateService<S, G, X> {
    inner: S,
    gate: Arc<G>,
    extractor: Arc<X>,
}

impl<S: Clone, G, X> Clone for GateService<S, G, X> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: self.gate.clone(),
            extractor: self.extractor.clone(),
        }
    }
}

impl<S, G, X, Req> Service<Req> for GateService<S, G, X>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    G: Admit + 'static,
    X: IdentityExtractor<Req> + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = AdmitError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(AdmitError::Inner)
    }

    fn call(&mut self, request: Req) -> Self::Future {
        let gate = self.gate.clone();
        let extractor = self.extractor.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(identity) = extractor.identity(&request) else {
                return Err(AdmitError::MissingIdentity);
            };
            match gate.admit(&identity).await {
                Ok(decision) if decision.is_granted() => {
                    inner.call(request).await.map_err(AdmitError::Inner)
                }
                Ok(decision) => Err(AdmitError::Rejected(decision)),
                Err(error) => Err(AdmitError::Gate(error)),
            }
        })
    }
}
