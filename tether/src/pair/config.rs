//! Pair construction and per-call options.

use std::rc::Rc;
use std::time::Duration;

use crate::error::PairError;
use crate::pair::core::{EffectWrapper, ErrorSink, Pair};

/// Default window for a `call` to receive its correlated result.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(500);

/// Default window for a `notify` to receive its acknowledgement.
pub const DEFAULT_EMIT_TIMEOUT: Duration = Duration::from_millis(500);

/// Builder for [`Pair`].
///
/// A pair needs a non-empty name (it prefixes correlation ids and tags
/// logs) and an error sink for failures that belong to no particular call.
///
/// ```ignore
/// let pair = Pair::builder("renderer")
///     .timeout(Duration::from_millis(250))
///     .on_error(|err| tracing::error!(error = %err, "pair failure"))
///     .build()?;
/// ```
pub struct PairBuilder {
    name: String,
    timeout: Duration,
    emit_timeout: Duration,
    error_sink: Option<ErrorSink>,
    wrap_effects: Option<EffectWrapper>,
}

impl PairBuilder {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeout: DEFAULT_CALL_TIMEOUT,
            emit_timeout: DEFAULT_EMIT_TIMEOUT,
            error_sink: None,
            wrap_effects: None,
        }
    }

    /// Default result window for `call`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default acknowledgement window for `emit`.
    pub fn emit_timeout(mut self, timeout: Duration) -> Self {
        self.emit_timeout = timeout;
        self
    }

    /// Sink receiving failures not attributable to a caller: protocol
    /// anomalies and synchronous send failures on replies and acks.
    pub fn on_error(mut self, sink: impl Fn(PairError) + 'static) -> Self {
        self.error_sink = Some(Rc::new(sink));
        self
    }

    /// Wrapper invoked around the delivery of each inbound notification to
    /// local listeners: the seam for hosts that need a change-detection
    /// hook. The wrapped closure must be invoked exactly once; the default
    /// wrapper calls straight through.
    pub fn wrap_effects(mut self, wrapper: impl Fn(&mut dyn FnMut()) + 'static) -> Self {
        self.wrap_effects = Some(Rc::new(wrapper));
        self
    }

    /// Validate and build the pair.
    ///
    /// Fails with [`PairError::MissingName`] on an empty name and
    /// [`PairError::MissingErrorHandler`] when no sink was provided.
    pub fn build(self) -> Result<Pair, PairError> {
        if self.name.is_empty() {
            return Err(PairError::MissingName);
        }
        let error_sink = self.error_sink.ok_or(PairError::MissingErrorHandler)?;
        let wrap_effects = self
            .wrap_effects
            .unwrap_or_else(|| Rc::new(|deliver: &mut dyn FnMut()| deliver()));

        Ok(Pair::from_parts(
            self.name,
            self.timeout,
            self.emit_timeout,
            error_sink,
            wrap_effects,
        ))
    }
}

/// Per-operation overrides for `call_with` / `emit_with`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions {
    /// Override of the pair's default window for this operation.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    /// Options with an explicit timeout.
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}
