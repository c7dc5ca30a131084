//! Statsd reporting for the content service.
//!
//! Metrics are emitted with the [`metric!`](crate::metric) macro. Until [`configure_statsd`]
//! has been called they are silently dropped, which is what tests and the CLI without a
//! `metrics.statsd` setting rely on.

use std::collections::BTreeMap;
use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use cadence::{Metric, MetricBuilder, StatsdClient, UdpMetricSink};

use crate::config;

static CLIENT: OnceLock<MetricsClient> = OnceLock::new();

#[doc(hidden)]
pub mod prelude {
    pub use cadence::prelude::*;
}

/// A statsd client that attaches the configured custom tags to everything it sends.
#[derive(Debug)]
pub struct MetricsClient {
    statsd: StatsdClient,
    custom_tags: BTreeMap<String, String>,
}

impl MetricsClient {
    pub fn statsd(&self) -> &StatsdClient {
        &self.statsd
    }

    pub fn send<'a, T>(&'a self, mut metric: MetricBuilder<'a, '_, T>)
    where
        T: Metric + From<String>,
    {
        for (tag, value) in &self.custom_tags {
            metric = metric.with_tag(tag, value);
        }
        metric.send()
    }
}

/// Starts reporting metrics to the statsd server named in `config`.
///
/// Does nothing if no server is configured. Fails if the server address cannot be resolved
/// or reporting was already set up.
pub fn configure_statsd(config: &config::Metrics) -> Result<()> {
    let Some(host) = &config.statsd else {
        return Ok(());
    };

    let addrs: Vec<_> = host
        .as_str()
        .to_socket_addrs()
        .context("failed to resolve statsd host")?
        .collect();
    let socket = UdpSocket::bind("0.0.0.0:0").context("failed to bind statsd socket")?;
    socket.set_nonblocking(true)?;
    let sink = UdpMetricSink::from(&addrs[..], socket).context("failed to create statsd sink")?;

    let client = MetricsClient {
        statsd: StatsdClient::from_sink(&config.prefix, sink),
        custom_tags: config.custom_tags.clone(),
    };
    CLIENT
        .set(client)
        .map_err(|_| anyhow::anyhow!("statsd reporting is already configured"))?;

    tracing::info!(host = %host, prefix = %config.prefix, "Reporting metrics to statsd");
    Ok(())
}

/// Calls `f` with the statsd client, if reporting is configured.
#[inline(always)]
pub fn with_client(f: impl FnOnce(&MetricsClient)) {
    if let Some(client) = CLIENT.get() {
        f(client);
    }
}

/// Emits a counter, gauge or timer, with optional `"tag" => value` pairs.
///
/// ```ignore
/// metric!(counter("modules.access") += 1, "kind" => "category");
/// metric!(gauge("modules.size_bytes") = 4096);
/// metric!(timer("modules.fetch.duration") = start.elapsed());
/// ```
#[macro_export]
macro_rules! metric {
    (@send $method:ident($id:expr, $value:expr) $(, $k:expr => $v:expr)*) => {{
        use $crate::metrics::prelude::*;
        $crate::metrics::with_client(|client| {
            client.send(client.statsd().$method($id, $value)$(.with_tag($k, $v))*);
        })
    }};
    (counter($id:expr) += $value:expr $(, $k:expr => $v:expr)* $(,)?) => {
        $crate::metric!(@send count_with_tags($id, $value) $(, $k => $v)*)
    };
    (gauge($id:expr) = $value:expr $(, $k:expr => $v:expr)* $(,)?) => {
        $crate::metric!(@send gauge_with_tags($id, $value) $(, $k => $v)*)
    };
    (timer($id:expr) = $value:expr $(, $k:expr => $v:expr)* $(,)?) => {
        $crate::metric!(@send time_with_tags($id, $value) $(, $k => $v)*)
    };
}
