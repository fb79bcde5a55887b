//! DogStatsD Recorder
//!
//! Non-blocking UDP push of collector snapshots. If the client cannot be
//! created the recorder logs once and drops everything afterwards.

use dogstatsd::{Client, Options};
use std::sync::Arc;

use super::recorder::MetricsRecorder;
use crate::config::StatsdConfig;

#[derive(Clone)]
pub struct StatsdMetrics {
    client: Arc<Option<Client>>,
    prefix: String,
    global_tags: Vec<String>,
}

impl StatsdMetrics {
    pub fn new(config: &StatsdConfig) -> Self {
        let client = match Client::new(Options {
            to_addr: config.addr.clone(),
            ..Default::default()
        }) {
            Ok(c) => {
                tracing::info!(addr = %config.addr, "DogStatsD client ready");
                Some(c)
            }
            Err(e) => {
                tracing::warn!(addr = %config.addr, error = %e, "Failed to create DogStatsD client, metrics disabled");
                None
            }
        };

        StatsdMetrics {
            client: Arc::new(client),
            prefix: config.prefix.clone(),
            global_tags: config.tags.clone(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn metric_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.prefix, name)
        }
    }

    fn merge_tags(&self, tags: &[&str]) -> Vec<String> {
        self.global_tags
            .iter()
            .cloned()
            .chain(tags.iter().map(|s| s.to_string()))
            .collect()
    }
}

impl MetricsRecorder for StatsdMetrics {
    fn histogram(&self, name: &str, value: f64, tags: &[&str]) {
        if let Some(ref client) = *self.client {
            let metric_name = self.metric_name(name);
            if let Err(e) = client.histogram(&metric_name, value.to_string(), self.merge_tags(tags)) {
                tracing::trace!(metric = %metric_name, error = %e, "statsd send failed");
            }
        }
    }

    fn gauge(&self, name: &str, value: f64, tags: &[&str]) {
        if let Some(ref client) = *self.client {
            let metric_name = self.metric_name(name);
            if let Err(e) = client.gauge(&metric_name, value.to_string(), self.merge_tags(tags)) {
                tracing::trace!(metric = %metric_name, error = %e, "statsd send failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use std::time::Duration;

    #[test]
    fn test_unreachable_agent_is_harmless() {
        let config = StatsdConfig {
            addr: "127.0.0.1:0".to_string(),
            ..StatsdConfig::default()
        };
        let metrics = StatsdMetrics::new(&config);
        metrics.gauge("postfix_scope_collector_success", 1.0, &[]);
        metrics.histogram("postfix_queue_size_bytes", 10.0, &["queue_name:deferred"]);
    }

    #[test]
    fn test_gauge_reaches_agent() {
        let agent = UdpSocket::bind("127.0.0.1:0").unwrap();
        agent.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let config = StatsdConfig {
            addr: agent.local_addr().unwrap().to_string(),
            prefix: "mail".to_string(),
            tags: vec!["env:test".to_string()],
            ..StatsdConfig::default()
        };
        let metrics = StatsdMetrics::new(&config);
        assert!(metrics.is_connected());
        metrics.gauge("postfix_scope_collector_success", 1.0, &["collector:postfix_queue"]);

        let mut buf = [0u8; 512];
        let n = agent.recv(&mut buf).unwrap();
        let packet = String::from_utf8_lossy(&buf[..n]);
        assert!(packet.starts_with("mail.postfix_scope_collector_success:1|g"), "{}", packet);
        assert!(packet.contains("env:test"));
        assert!(packet.contains("collector:postfix_queue"));
    }
}
