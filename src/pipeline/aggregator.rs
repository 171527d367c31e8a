//! Concurrent search across every configured backend.

use futures_util::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::{
    BackendReport, BackendSpec, BackendStatus, Credentials, SearchQuery, SearchReport, SearchResult,
    DEFAULT_MAX_RESULTS,
};
use crate::pipeline::AggregateError;
use crate::sources::{AdapterError, Source, SourceRegistry};
use crate::utils::{deduplicate_results, validate_query, ValidationError};

/// Fans a query out to backends and merges what comes back
///
/// One slow or broken backend never fails the search: it shows up as a
/// `Failed` line in the report next to the other backends' results.
#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: SourceRegistry,
    max_results: usize,
}

enum Plan {
    Settled(BackendStatus),
    Run {
        source: Arc<dyn Source>,
        query: SearchQuery,
        timeout: Duration,
    },
}

impl Aggregator {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Results requested from each backend
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Search every registered source with its default configuration
    pub async fn search_all(
        &self,
        query: &str,
        credentials: &Credentials,
    ) -> Result<SearchReport, AggregateError> {
        let specs = self.registry.backend_specs();
        self.search(query, &specs, credentials).await
    }

    /// Search the given backends concurrently
    ///
    /// Results are grouped by backend in `backends` order and deduplicated by
    /// normalized link, first occurrence winning.
    pub async fn search(
        &self,
        query: &str,
        backends: &[BackendSpec],
        credentials: &Credentials,
    ) -> Result<SearchReport, AggregateError> {
        let query = validate_query(query).map_err(|e| match e {
            ValidationError::EmptyQuery => AggregateError::EmptyQuery,
            other => AggregateError::InvalidQuery(other.to_string()),
        })?;

        let plans: Vec<Plan> = backends
            .iter()
            .map(|spec| self.plan(spec, &query, credentials))
            .collect();

        let attempted = plans.iter().filter(|p| matches!(p, Plan::Run { .. })).count();
        tracing::debug!(query = %query, backends = backends.len(), attempted, "Starting search");

        let outcomes = join_all(plans.into_iter().map(|plan| async move {
            match plan {
                Plan::Settled(status) => (status, Vec::new()),
                Plan::Run {
                    source,
                    query,
                    timeout,
                } => run_backend(source, query, timeout).await,
            }
        }))
        .await;

        let mut merged = Vec::new();
        let mut reports = Vec::with_capacity(backends.len());
        for (spec, (status, results)) in backends.iter().zip(outcomes) {
            merged.extend(results);
            reports.push(BackendReport {
                name: spec.name.clone(),
                status,
            });
        }

        let results = deduplicate_results(merged);
        tracing::info!(query = %query, results = results.len(), "Search finished");

        Ok(SearchReport {
            query,
            results,
            backends: reports,
        })
    }

    fn plan(&self, spec: &BackendSpec, query: &str, credentials: &Credentials) -> Plan {
        if !spec.enabled {
            return Plan::Settled(BackendStatus::Disabled);
        }

        let Some(source) = self.registry.get(&spec.name) else {
            return Plan::Settled(BackendStatus::Failed {
                error: AdapterError::new(&spec.name, "no adapter registered"),
            });
        };

        let mut required: BTreeSet<String> = spec.required_credentials.clone();
        required.extend(source.required_credentials().iter().map(|c| c.to_string()));

        let missing = credentials.missing(&required);
        if !missing.is_empty() {
            tracing::debug!(backend = %spec.name, ?missing, "Skipping backend without credentials");
            return Plan::Settled(BackendStatus::Skipped {
                missing_credentials: missing,
            });
        }

        Plan::Run {
            source: Arc::clone(source),
            query: SearchQuery::new(query)
                .max_results(self.max_results)
                .credentials(credentials.subset(&required)),
            timeout: spec.timeout,
        }
    }
}

async fn run_backend(
    source: Arc<dyn Source>,
    query: SearchQuery,
    limit: Duration,
) -> (BackendStatus, Vec<SearchResult>) {
    let started = Instant::now();

    match tokio::time::timeout(limit, source.search(&query)).await {
        Ok(Ok(results)) => {
            let results: Vec<SearchResult> = results
                .into_iter()
                .filter(|r| {
                    let valid = r.has_valid_link();
                    if !valid {
                        tracing::debug!(source = source.id(), link = %r.link, "Dropping result with invalid link");
                    }
                    valid
                })
                .collect();

            tracing::info!(
                source = source.id(),
                results = results.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Backend completed"
            );
            (
                BackendStatus::Completed {
                    results: results.len(),
                },
                results,
            )
        }
        Ok(Err(err)) => {
            tracing::warn!(source = source.id(), error = %err, "Backend failed");
            (
                BackendStatus::Failed {
                    error: AdapterError::from_source_error(source.name(), &err),
                },
                Vec::new(),
            )
        }
        Err(_) => {
            tracing::warn!(source = source.id(), timeout_secs = limit.as_secs_f64(), "Backend timed out");
            (
                BackendStatus::Failed {
                    error: AdapterError::new(
                        source.name(),
                        format!("timed out after {:.1}s", limit.as_secs_f64()),
                    ),
                },
                Vec::new(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResultKind, SearchStatus};
    use crate::sources::mock::make_result;
    use crate::sources::MockSource;

    fn registry(sources: Vec<MockSource>) -> SourceRegistry {
        let mut registry = SourceRegistry::empty();
        for source in sources {
            registry.register(Arc::new(source));
        }
        registry
    }

    fn specs(names: &[&str]) -> Vec<BackendSpec> {
        names.iter().map(|n| BackendSpec::new(*n)).collect()
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let aggregator = Aggregator::new(SourceRegistry::empty());
        let err = aggregator
            .search("   ", &[], &Credentials::new())
            .await
            .unwrap_err();
        assert_eq!(err, AggregateError::EmptyQuery);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_search() {
        let aggregator = Aggregator::new(registry(vec![
            MockSource::named("a").with_links(&["https://a.org/1.pdf"]),
            MockSource::named("b").fail_with("boom"),
            MockSource::named("c").with_links(&["https://c.org/2.pdf"]),
        ]));

        let report = aggregator
            .search("rust", &specs(&["a", "b", "c"]), &Credentials::new())
            .await
            .unwrap();

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.status(), SearchStatus::Found { count: 2 });
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "b");
        assert!(failures[0].1.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_order_follows_backend_order_and_dedups() {
        let aggregator = Aggregator::new(registry(vec![
            MockSource::named("a").with_links(&["https://x.org/p.pdf?ref=a", "https://x.org/q.pdf"]),
            MockSource::named("b").with_links(&["https://x.org/p.pdf/", "https://x.org/r.pdf"]),
        ]));

        for _ in 0..3 {
            let report = aggregator
                .search("q", &specs(&["b", "a"]), &Credentials::new())
                .await
                .unwrap();

            let links: Vec<&str> = report.results.iter().map(|r| r.link.as_str()).collect();
            assert_eq!(
                links,
                vec!["https://x.org/p.pdf/", "https://x.org/r.pdf", "https://x.org/q.pdf"]
            );
            assert_eq!(report.results[0].source_name, "b");
        }
    }

    #[tokio::test]
    async fn test_disabled_skipped_and_unknown_backends() {
        let paid = MockSource::named("paid")
            .requiring("API_KEY")
            .with_links(&["https://p.org/1.pdf"]);
        let aggregator = Aggregator::new(registry(vec![
            MockSource::named("off").with_links(&["https://o.org/1.pdf"]),
            paid,
        ]));

        let backends = vec![
            BackendSpec::new("off").enabled(false),
            BackendSpec::new("paid"),
            BackendSpec::new("ghost"),
        ];

        let report = aggregator
            .search("q", &backends, &Credentials::new().with("API_KEY", "  "))
            .await
            .unwrap();

        assert_eq!(report.status(), SearchStatus::NoResults);
        assert_eq!(report.backends[0].status, BackendStatus::Disabled);
        assert_eq!(
            report.backends[1].status,
            BackendStatus::Skipped {
                missing_credentials: vec!["API_KEY".to_string()]
            }
        );
        assert!(matches!(
            &report.backends[2].status,
            BackendStatus::Failed { error } if error.message == "no adapter registered"
        ));
    }

    #[tokio::test]
    async fn test_credentialed_backend_runs() {
        let aggregator = Aggregator::new(registry(vec![MockSource::named("paid")
            .requiring("API_KEY")
            .with_links(&["https://p.org/1.pdf"])]));

        let report = aggregator
            .search(
                "q",
                &specs(&["paid"]),
                &Credentials::new().with("API_KEY", "k").with("OTHER", "x"),
            )
            .await
            .unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.backends[0].status, BackendStatus::Completed { results: 1 });
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let aggregator = Aggregator::new(registry(vec![
            MockSource::named("fast1").with_links(&["https://a.org/1.pdf"]),
            MockSource::named("slow")
                .with_links(&["https://s.org/1.pdf"])
                .delay(Duration::from_secs(10)),
            MockSource::named("fast2").with_links(&["https://b.org/1.pdf"]),
        ]));

        let backends: Vec<BackendSpec> = ["fast1", "slow", "fast2"]
            .iter()
            .map(|n| BackendSpec::new(*n).timeout(Duration::from_millis(200)))
            .collect();

        let started = Instant::now();
        let report = aggregator.search("q", &backends, &Credentials::new()).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.results.len(), 2);
        assert!(report.backends[1].status.is_failed());
    }

    #[tokio::test]
    async fn test_invalid_links_are_dropped() {
        let source = MockSource::named("m");
        source.set_results(vec![
            make_result("https://ok.org/a.pdf", "m", ResultKind::DirectArtifact),
            make_result("ftp://files.org/b.pdf", "m", ResultKind::DirectArtifact),
            make_result("", "m", ResultKind::DirectArtifact),
        ]);
        let aggregator = Aggregator::new(registry(vec![source]));

        let report = aggregator.search("q", &specs(&["m"]), &Credentials::new()).await.unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.backends[0].status, BackendStatus::Completed { results: 1 });
    }

    #[tokio::test]
    async fn test_kind_is_preserved() {
        let aggregator = Aggregator::new(registry(vec![MockSource::named("books")
            .landing_pages()
            .with_links(&["https://books.org/ebooks/1"])]));

        let report = aggregator.search_all("q", &Credentials::new()).await.unwrap();
        assert_eq!(report.results[0].kind, ResultKind::LandingPage);
        assert_eq!(report.direct_artifacts().count(), 0);
    }
}
