// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span handle used by the flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + initial stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("vkid_sso.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Overwrites the `stage` field with the stage just reached.
	pub fn record_stage(&self, stage: &'static str) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("stage", stage);
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a flow failure with its full source chain.
///
/// Server-side failures (`status >= 500`) are logged at `error`, rejected requests at `warn`.
pub fn log_flow_failure(
	kind: FlowKind,
	stage: &'static str,
	status: u16,
	error: &(dyn StdError + 'static),
) {
	#[cfg(feature = "tracing")]
	{
		let chain = error_chain(error);

		if status >= 500 {
			tracing::error!(flow = kind.as_str(), stage, status, error = %chain, "VK ID flow failed");
		} else {
			tracing::warn!(flow = kind.as_str(), stage, status, error = %chain, "VK ID flow rejected");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, stage, status, error);
	}
}

/// Logs a completed flow step.
pub fn log_flow_success(kind: FlowKind, detail: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(flow = kind.as_str(), detail, "VK ID flow completed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, detail);
	}
}

/// Joins an error and its sources with `: `.
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
	let mut rendered = error.to_string();
	let mut source = error.source();

	while let Some(inner) = source {
		rendered.push_str(": ");
		rendered.push_str(&inner.to_string());

		source = inner.source();
	}

	rendered
}
