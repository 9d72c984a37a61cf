//! The virtual backend: a TTL-cached, in-process query surface over the
//! synthetic telemetry generators.
//!
//! This crate is the only thing the presentation layer sees. On any query
//! the backend lazily (re)generates the dataset for the configured default
//! window, then answers purely from the cached arrays with filter, sort and
//! paginate operations. Alert acknowledge/resolve are the only mutations.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;

use common::config::Configuration;
use common::model::TimeWindow;
use common::model::alert::{AlertEvent, AlertRule};
use common::model::log::LogEntry;
use common::model::metric::TimeSeries;
use common::model::topology::ServiceTopology;
use common::model::trace::Trace;
use common::sampling::Sampler;

use synthesizer::alerts::{AlertConfig, AlertEventGenerator, AlertStatistics};
use synthesizer::logs::{LogStreamConfig, LogStreamGenerator};
use synthesizer::metrics::{MetricSeriesGenerator, default_models};
use synthesizer::topology::build_service_dependency_graph;
use synthesizer::traces::{TraceConfig, TraceTreeGenerator};

pub mod cache;
pub mod error;
pub mod export;
pub mod query;

use cache::CacheSlot;
pub use cache::TelemetryType;
pub use error::QuerierError;
pub use query::alerts::AlertQuery;
pub use query::logs::{LogQuery, LogStatistics};
pub use query::metrics::MetricQuery;
pub use query::traces::{TraceQuery, TraceSortField};
pub use query::{Pagination, SearchResults, SortOrder};

/// Per-type salts so one seed still yields distinct streams per telemetry
/// family.
const METRICS_SEED_SALT: u64 = 0x6d65_7472;
const TRACES_SEED_SALT: u64 = 0x7472_6163;
const LOGS_SEED_SALT: u64 = 0x6c6f_6773;
const ALERTS_SEED_SALT: u64 = 0x616c_7274;

/// Log search envelope: one page of entries plus statistics over the whole
/// match set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LogSearchResults {
    pub logs: Vec<LogEntry>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub statistics: LogStatistics,
    pub execution_time_ms: f64,
}

/// Entries surrounding a target log line, for the drill-down detail view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LogContext {
    pub target: LogEntry,
    /// Entries immediately before the target, ascending
    pub before: Vec<LogEntry>,
    /// Entries immediately after the target, ascending
    pub after: Vec<LogEntry>,
}

#[derive(Clone)]
struct AlertDataset {
    rules: Vec<AlertRule>,
    events: Vec<AlertEvent>,
}

/// Trace lookup surface consumed by the presentation layer.
#[async_trait]
pub trait TraceQuerier: Send + Sync {
    async fn find_by_id(&self, trace_id: &str) -> Result<Option<Trace>, QuerierError>;
    async fn find_traces(&self, query: TraceQuery) -> Result<SearchResults<Trace>, QuerierError>;
}

pub struct VirtualBackend {
    config: Configuration,
    metrics: CacheSlot<Arc<Vec<TimeSeries>>>,
    traces: CacheSlot<Arc<Vec<Trace>>>,
    logs: CacheSlot<Arc<Vec<LogEntry>>>,
    alerts: CacheSlot<AlertDataset>,
}

impl VirtualBackend {
    /// Build a backend owning its own cache. Construct once per session and
    /// share behind an `Arc`; there is no global instance.
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            metrics: CacheSlot::new(),
            traces: CacheSlot::new(),
            logs: CacheSlot::new(),
            alerts: CacheSlot::new(),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// The window every cached snapshot covers, anchored at now.
    pub fn default_window(&self) -> TimeWindow {
        let width = chrono::Duration::from_std(self.config.cache.window)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        let end = Utc::now();
        TimeWindow::new(end - width, end)
    }

    fn sampler(&self, salt: u64) -> Sampler {
        match self.config.seed {
            Some(seed) => Sampler::seeded(seed ^ salt),
            None => Sampler::from_entropy(),
        }
    }

    fn trace_generation_config(&self, window: TimeWindow) -> TraceConfig {
        let traces = &self.config.traces;
        TraceConfig {
            services: self.config.services.names.clone(),
            min_depth: traces.min_depth,
            max_depth: traces.max_depth,
            error_rate: traces.error_rate,
            duration_min_ms: traces.duration_min_ms,
            duration_max_ms: traces.duration_max_ms,
            branch_probability: traces.branch_probability,
            timeout_ms: traces.timeout_ms,
            window,
        }
    }

    fn log_generation_config(&self, window: TimeWindow) -> LogStreamConfig {
        let logs = &self.config.logs;
        LogStreamConfig {
            window,
            services: self.config.services.names.clone(),
            average_logs_per_minute: logs.average_logs_per_minute,
            peak_hour_multiplier: logs.peak_hour_multiplier,
            level_weights: logs.level_weights.clone(),
            trace_correlation_probability: logs.trace_correlation_probability,
        }
    }

    fn alert_generation_config(&self, window: TimeWindow) -> AlertConfig {
        let alerts = &self.config.alerts;
        AlertConfig {
            window,
            services: self.config.services.names.clone(),
            event_density_per_day: alerts.event_density_per_day,
            avg_duration_minutes: alerts.avg_duration_minutes,
            unresolved_probability: alerts.unresolved_probability,
            acknowledge_probability: alerts.acknowledge_probability,
        }
    }

    async fn ensure_metrics(&self) -> Result<Arc<Vec<TimeSeries>>, QuerierError> {
        let window = self.default_window();
        let step = self.config.metrics.step;
        let services = self.config.services.names.clone();
        let sampler = self.sampler(METRICS_SEED_SALT);
        self.metrics
            .get_or_populate(self.config.cache.ttl, move || {
                let started = Instant::now();
                let mut generator = MetricSeriesGenerator::new(sampler);
                let mut series = Vec::new();
                for service in &services {
                    for model in default_models() {
                        series.push(generator.generate(&model, service, window, step)?);
                    }
                }
                log::debug!(
                    "regenerated {} metric series in {:?}",
                    series.len(),
                    started.elapsed()
                );
                Ok(Arc::new(series))
            })
            .await
    }

    async fn ensure_traces(&self) -> Result<Arc<Vec<Trace>>, QuerierError> {
        let generation_config = self.trace_generation_config(self.default_window());
        let count = self.config.traces.count;
        let sampler = self.sampler(TRACES_SEED_SALT);
        self.traces
            .get_or_populate(self.config.cache.ttl, move || {
                let started = Instant::now();
                let mut generator = TraceTreeGenerator::new(sampler);
                let traces = generator.generate_traces(&generation_config, count)?;
                log::debug!(
                    "regenerated {} traces in {:?}",
                    traces.len(),
                    started.elapsed()
                );
                Ok(Arc::new(traces))
            })
            .await
    }

    async fn ensure_logs(&self) -> Result<Arc<Vec<LogEntry>>, QuerierError> {
        // Logs correlate against the current trace snapshot, so that is
        // materialized first.
        let traces = self.ensure_traces().await?;
        let generation_config = self.log_generation_config(self.default_window());
        let sampler = self.sampler(LOGS_SEED_SALT);
        self.logs
            .get_or_populate(self.config.cache.ttl, move || {
                let started = Instant::now();
                let mut generator = LogStreamGenerator::new(sampler);
                let entries = generator.generate_logs(&generation_config, &traces)?;
                log::debug!(
                    "regenerated {} log entries in {:?}",
                    entries.len(),
                    started.elapsed()
                );
                Ok(Arc::new(entries))
            })
            .await
    }

    async fn ensure_alerts(&self) -> Result<AlertDataset, QuerierError> {
        let generation_config = self.alert_generation_config(self.default_window());
        let sampler = self.sampler(ALERTS_SEED_SALT);
        self.alerts
            .get_or_populate(self.config.cache.ttl, move || {
                let mut generator = AlertEventGenerator::new(sampler);
                let rules = generator.generate_alert_rules(&generation_config)?;
                let events = generator.generate_alert_events(&generation_config, &rules)?;
                log::debug!(
                    "regenerated {} alert rules with {} events",
                    rules.len(),
                    events.len()
                );
                Ok(AlertDataset { rules, events })
            })
            .await
    }

    // --- metrics -----------------------------------------------------------

    pub async fn fetch_metrics(
        &self,
        query: MetricQuery,
    ) -> Result<Vec<TimeSeries>, QuerierError> {
        query.validate()?;
        let cached = self.ensure_metrics().await?;
        Ok(query::metrics::select_series(&cached, &query))
    }

    // --- traces ------------------------------------------------------------

    pub async fn search_traces(
        &self,
        query: TraceQuery,
    ) -> Result<SearchResults<Trace>, QuerierError> {
        query.validate()?;
        let started = Instant::now();
        let cached = self.ensure_traces().await?;
        let matches = query::traces::filter_traces(&cached, &query);
        Ok(results_page(matches, query.pagination, started))
    }

    pub async fn get_trace_by_id(
        &self,
        trace_id: &str,
    ) -> Result<Option<Trace>, QuerierError> {
        let cached = self.ensure_traces().await?;
        Ok(cached.iter().find(|t| t.trace_id == trace_id).cloned())
    }

    /// Derive the dependency graph from the cached traces in scope.
    pub async fn get_service_topology(
        &self,
        window: TimeWindow,
        services: Option<Vec<String>>,
    ) -> Result<ServiceTopology, QuerierError> {
        if window.is_empty() {
            return Err(QuerierError::InvalidQuery(
                "time range start must precede end".to_string(),
            ));
        }
        let cached = self.ensure_traces().await?;
        let in_scope: Vec<Trace> = cached
            .iter()
            .filter(|t| window.contains(t.start_time))
            .filter(|t| match &services {
                Some(names) => t.services.iter().any(|s| names.contains(s)),
                None => true,
            })
            .cloned()
            .collect();
        Ok(build_service_dependency_graph(&in_scope))
    }

    // --- logs --------------------------------------------------------------

    pub async fn search_logs(&self, query: LogQuery) -> Result<LogSearchResults, QuerierError> {
        let started = Instant::now();
        let cached = self.ensure_logs().await?;
        let matches = query::logs::filter_logs(&cached, &query)?;
        let statistics = query::logs::log_statistics(&matches);
        let total = matches.len();
        let items = query::paginate(&matches, query.pagination);
        let normalized = query.pagination.normalized();
        Ok(LogSearchResults {
            logs: items,
            total,
            page: normalized.page,
            page_size: normalized.page_size,
            statistics,
            execution_time_ms: elapsed_ms(started),
        })
    }

    /// Up to `before`/`after` entries around the target, in stream order.
    /// Unknown IDs are `None`, not an error.
    pub async fn get_log_context(
        &self,
        log_id: &str,
        before: usize,
        after: usize,
    ) -> Result<Option<LogContext>, QuerierError> {
        let cached = self.ensure_logs().await?;
        let Some(position) = cached.iter().position(|e| e.id == log_id) else {
            return Ok(None);
        };
        let start = position.saturating_sub(before);
        let end = (position + 1 + after).min(cached.len());
        Ok(Some(LogContext {
            target: cached[position].clone(),
            before: cached[start..position].to_vec(),
            after: cached[position + 1..end].to_vec(),
        }))
    }

    // --- alerts ------------------------------------------------------------

    pub async fn alert_rules(&self) -> Result<Vec<AlertRule>, QuerierError> {
        Ok(self.ensure_alerts().await?.rules)
    }

    pub async fn search_alerts(
        &self,
        query: AlertQuery,
    ) -> Result<SearchResults<AlertEvent>, QuerierError> {
        query.validate()?;
        let started = Instant::now();
        let dataset = self.ensure_alerts().await?;
        let matches = query::alerts::filter_events(&dataset.events, &query);
        Ok(results_page(matches, query.pagination, started))
    }

    pub async fn alert_statistics(&self) -> Result<AlertStatistics, QuerierError> {
        let dataset = self.ensure_alerts().await?;
        Ok(synthesizer::alerts::calculate_alert_statistics(
            &dataset.events,
        ))
    }

    /// Acknowledge an alert event. Unknown IDs are `None`; acknowledging an
    /// already-acknowledged event returns it unchanged.
    pub async fn acknowledge_alert(
        &self,
        event_id: &str,
        user: &str,
    ) -> Result<Option<AlertEvent>, QuerierError> {
        self.ensure_alerts().await?;
        let event_id = event_id.to_string();
        let user = user.to_string();
        let updated = self
            .alerts
            .mutate(move |dataset| {
                dataset.events.iter_mut().find(|e| e.id == event_id).map(|event| {
                    event.acknowledge(&user, Utc::now());
                    event.clone()
                })
            })
            .await
            .flatten();
        Ok(updated)
    }

    /// Resolve an alert event. Unknown IDs are `None`.
    pub async fn resolve_alert(
        &self,
        event_id: &str,
    ) -> Result<Option<AlertEvent>, QuerierError> {
        self.ensure_alerts().await?;
        let event_id = event_id.to_string();
        let updated = self
            .alerts
            .mutate(move |dataset| {
                dataset.events.iter_mut().find(|e| e.id == event_id).map(|event| {
                    event.resolve(Utc::now());
                    event.clone()
                })
            })
            .await
            .flatten();
        Ok(updated)
    }

    // --- cache control ------------------------------------------------------

    /// Force regeneration of one telemetry family on its next query.
    /// Invalidating traces also drops logs, whose trace correlations would
    /// otherwise dangle.
    pub async fn refresh(&self, telemetry_type: TelemetryType) {
        match telemetry_type {
            TelemetryType::Metrics => self.metrics.invalidate().await,
            TelemetryType::Traces => {
                self.traces.invalidate().await;
                self.logs.invalidate().await;
            }
            TelemetryType::Logs => self.logs.invalidate().await,
            TelemetryType::Alerts => self.alerts.invalidate().await,
        }
    }

    pub async fn refresh_all(&self) {
        self.metrics.invalidate().await;
        self.traces.invalidate().await;
        self.logs.invalidate().await;
        self.alerts.invalidate().await;
    }
}

#[async_trait]
impl TraceQuerier for VirtualBackend {
    async fn find_by_id(&self, trace_id: &str) -> Result<Option<Trace>, QuerierError> {
        self.get_trace_by_id(trace_id).await
    }

    async fn find_traces(&self, query: TraceQuery) -> Result<SearchResults<Trace>, QuerierError> {
        self.search_traces(query).await
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1_000.0
}

fn results_page<T: Clone>(
    matches: Vec<T>,
    pagination: Pagination,
    started: Instant,
) -> SearchResults<T> {
    let total = matches.len();
    let items = query::paginate(&matches, pagination);
    let normalized = pagination.normalized();
    SearchResults {
        items,
        total,
        page: normalized.page,
        page_size: normalized.page_size,
        execution_time_ms: elapsed_ms(started),
    }
}
