//! Metrics and tracing for query execution and binding.
//!
//! Instruments are registered on an OpenTelemetry meter provider backed by
//! a Prometheus registry; [`QueryMetrics::render`] produces the text
//! exposition format for a scrape endpoint.

#[cfg(feature = "metrics")]
pub use meters::{QueryMetrics, METRICS};

#[cfg(feature = "metrics")]
mod meters {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider as _};
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, Registry, TextEncoder};
    use std::time::Duration;

    pub static METRICS: Lazy<QueryMetrics> = Lazy::new(QueryMetrics::init);

    pub struct QueryMetrics {
        registry: Registry,
        _provider: SdkMeterProvider,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub cardinality_violations_total: Counter<u64>,
        pub binding_failures_total: Counter<u64>,
        pub rows_bound_total: Counter<u64>,
    }

    impl QueryMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let provider = match opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
            {
                Ok(exporter) => SdkMeterProvider::builder().with_reader(exporter).build(),
                Err(e) => {
                    log::warn!("prometheus exporter unavailable, metrics will not be exported: {e}");
                    SdkMeterProvider::builder().build()
                }
            };
            let meter = provider.meter("quickquery");

            let queries_total = meter
                .u64_counter("quickquery_queries_total")
                .with_description("Total statements executed")
                .build();

            let query_errors_total = meter
                .u64_counter("quickquery_query_errors_total")
                .with_description("Statements rejected by the data source")
                .build();

            let query_duration = meter
                .f64_histogram("quickquery_query_duration_seconds")
                .with_description("Duration of statements")
                .build();

            let cardinality_violations_total = meter
                .u64_counter("quickquery_cardinality_violations_total")
                .with_description("Results whose row count broke the expected cardinality")
                .build();

            let binding_failures_total = meter
                .u64_counter("quickquery_binding_failures_total")
                .with_description("Rows that failed strict binding")
                .build();

            let rows_bound_total = meter
                .u64_counter("quickquery_rows_bound_total")
                .with_description("Rows bound into typed instances")
                .build();

            Self {
                registry,
                _provider: provider,
                queries_total,
                query_errors_total,
                query_duration,
                cardinality_violations_total,
                binding_failures_total,
                rows_bound_total,
            }
        }

        pub fn record_query(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_cardinality_violation(&self) {
            self.cardinality_violations_total.add(1, &[]);
        }

        pub fn record_binding_failure(&self) {
            self.binding_failures_total.add(1, &[]);
        }

        pub fn record_rows_bound(&self, rows: u64) {
            self.rows_bound_total.add(rows, &[]);
        }

        /// Prometheus text exposition of every recorded metric.
        pub fn render(&self) -> String {
            let mut buffer = Vec::new();
            if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
                log::warn!("failed to encode metrics: {e}");
                return String::new();
            }
            String::from_utf8(buffer).unwrap_or_default()
        }
    }

}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn execute_query_span(sql: &str) -> Span {
        info_span!("quickquery.execute", db.system = "postgresql", db.statement = sql)
    }

    pub fn materialize_span(type_name: &str, rows: usize) -> Span {
        info_span!("quickquery.materialize", bind.type_name = type_name, bind.rows = rows)
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("quickquery.transaction.begin")
    }

    pub fn finish_transaction_span(sql: &str) -> Span {
        info_span!("quickquery.transaction.finish", db.statement = sql)
    }

    pub fn connect_span() -> Span {
        info_span!("quickquery.connect", db.system = "postgresql")
    }
}
