//! End-to-end rendering through the public registry API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use tally_metrics::{
    Error, LabelSet, LabelShape, MetricKind, Registry, SampleValue, exponential_buckets,
};

#[test]
fn counter_round_trip() {
    let registry = Registry::new();
    let requests = registry
        .create_counter("requests_total", Some("Total requests"), 0.0, LabelShape::empty())
        .unwrap();
    requests.increment(5.0).unwrap();

    assert_eq!(
        registry.get_metrics(),
        "# HELP requests_total Total requests\n\
         # TYPE requests_total counter\n\
         requests_total 5\n"
    );
}

#[test]
fn negative_increment_leaves_counter_unchanged() {
    let registry = Registry::new();
    let counter = registry
        .create_counter("jobs_total", None, 0.0, LabelShape::empty())
        .unwrap();
    counter.increment(2.0).unwrap();

    let err = counter.increment(-1.0).unwrap_err();
    assert!(err.is_usage());
    assert_eq!(counter.get(&LabelSet::empty()), Some(2.0));
    assert!(registry.get_metrics().ends_with("jobs_total 2\n"));
}

#[test]
fn label_quotes_are_escaped() {
    let registry = Registry::new();
    let hits = registry
        .create_counter("hits_total", None, 0.0, LabelShape::new(["path"]).unwrap())
        .unwrap();
    hits.increment_with(1.0, &LabelSet::new([("path", r#"/say "hi""#)]).unwrap())
        .unwrap();

    assert!(
        registry
            .get_metrics()
            .contains(r#"hits_total{path="/say \"hi\""} 1"#)
    );
}

#[test]
fn histogram_buckets_are_cumulative() {
    let registry = Registry::new();
    let latency = registry
        .create_histogram(
            "latency_seconds",
            Some("Request latency"),
            Some(vec![1.0, 5.0, 10.0]),
            LabelShape::empty(),
        )
        .unwrap();
    for value in [0.5, 3.0, 7.0, 20.0] {
        latency.observe(value).unwrap();
    }

    assert_eq!(
        registry.get_metrics(),
        "# HELP latency_seconds Request latency\n\
         # TYPE latency_seconds histogram\n\
         latency_seconds_bucket{le=\"1\"} 1\n\
         latency_seconds_bucket{le=\"5\"} 2\n\
         latency_seconds_bucket{le=\"10\"} 3\n\
         latency_seconds_bucket{le=\"+Inf\"} 4\n\
         latency_seconds_sum 30.5\n\
         latency_seconds_count 4\n"
    );
}

#[test]
fn summary_median_of_small_dataset() {
    let registry = Registry::new();
    let rpc = registry
        .create_summary("rpc_seconds", None, Some(vec![0.5]), LabelShape::empty())
        .unwrap();
    for value in [4.0, 1.0, 5.0, 2.0, 3.0] {
        rpc.observe(value).unwrap();
    }

    assert_eq!(
        registry.get_metrics(),
        "# TYPE rpc_seconds summary\n\
         rpc_seconds{quantile=\"0.5\"} 3\n\
         rpc_seconds_sum 15\n\
         rpc_seconds_count 5\n"
    );
}

#[test]
fn labeled_histogram_puts_le_last() {
    let registry = Registry::new();
    let sizes = registry
        .create_histogram(
            "payload_bytes",
            None,
            Some(exponential_buckets(100.0, 10.0, 2)),
            LabelShape::new(["route", "method"]).unwrap(),
        )
        .unwrap();
    let labels = LabelSet::new([("route", "/upload"), ("method", "POST")]).unwrap();
    sizes.observe_with(250.0, &labels).unwrap();

    let text = registry.get_metrics();
    assert!(text.contains("payload_bytes_bucket{method=\"POST\",route=\"/upload\",le=\"100\"} 0\n"));
    assert!(text.contains("payload_bytes_bucket{method=\"POST\",route=\"/upload\",le=\"1000\"} 1\n"));
    assert!(text.contains("payload_bytes_bucket{method=\"POST\",route=\"/upload\",le=\"+Inf\"} 1\n"));
}

#[test]
fn registration_is_idempotent() {
    let registry = Registry::new();
    let first = registry
        .create_counter("jobs_total", None, 0.0, LabelShape::new(["queue"]).unwrap())
        .unwrap();
    let second = registry
        .create_counter("jobs_total", Some("Jobs"), 0.0, LabelShape::new(["queue"]).unwrap())
        .unwrap();
    assert!(first.same_metric(&second));

    let labels = LabelSet::new([("queue", "mail")]).unwrap();
    first.increment_with(1.0, &labels).unwrap();
    second.increment_with(1.0, &labels).unwrap();
    assert_eq!(first.get(&labels), Some(2.0));
    assert_eq!(registry.len(), 1);

    let err = registry
        .create_gauge("jobs_total", None, 0.0, LabelShape::new(["queue"]).unwrap())
        .unwrap_err();
    assert_eq!(err, Error::KindConflict {
        name: "jobs_total".into(),
        existing: MetricKind::Counter,
        requested: MetricKind::Gauge,
    });
    assert!(err.is_configuration());
}

#[test]
fn families_render_in_registration_order() {
    let registry = Registry::new();
    registry
        .create_gauge("zeta", None, 1.0, LabelShape::empty())
        .unwrap();
    registry
        .create_gauge("alpha", None, 2.0, LabelShape::empty())
        .unwrap();

    assert_eq!(
        registry.get_metrics(),
        "# TYPE zeta gauge\nzeta 1\n# TYPE alpha gauge\nalpha 2\n"
    );
}

#[test]
fn info_renders_single_sample() {
    let registry = Registry::new();
    let build = registry
        .create_info(
            "build",
            Some("Build metadata"),
            LabelShape::new(["version", "commit"]).unwrap(),
        )
        .unwrap();
    build
        .record(&LabelSet::new([("version", "0.1.0"), ("commit", "abc123")]).unwrap())
        .unwrap();

    assert_eq!(
        registry.get_metrics(),
        "# HELP build_info Build metadata\n\
         # TYPE build_info gauge\n\
         build_info{commit=\"abc123\",version=\"0.1.0\"} 1\n"
    );
}

#[test]
fn snapshot_serializes_to_json() {
    let registry = Registry::new();
    registry
        .create_counter("requests_total", None, 3.0, LabelShape::empty())
        .unwrap();

    let snapshot = registry.snapshot();
    assert_eq!(
        snapshot.families[0].series[0].value,
        SampleValue::Counter { value: 3.0 }
    );

    let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(json["families"][0]["name"], "requests_total");
    assert_eq!(json["families"][0]["kind"], "counter");
    assert_eq!(json["families"][0]["series"][0]["value"]["type"], "counter");
    assert_eq!(json["families"][0]["series"][0]["value"]["value"], 3.0);
}

#[test]
fn sample_names_stay_unique() {
    let registry = Registry::new();
    let build = registry
        .create_info("build", None, LabelShape::new(["version"]).unwrap())
        .unwrap();
    build
        .record(&LabelSet::new([("version", "1")]).unwrap())
        .unwrap();
    let err = registry
        .create_gauge("build_info", None, 0.0, LabelShape::new(["version"]).unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::NameCollision { .. }));

    let latency = registry
        .create_histogram("latency", None, Some(vec![1.0]), LabelShape::empty())
        .unwrap();
    latency.observe(0.5).unwrap();
    let err = registry
        .create_counter("latency_count", None, 0.0, LabelShape::empty())
        .unwrap_err();
    assert!(err.is_configuration());

    let text = registry.get_metrics();
    assert_eq!(text.matches("# TYPE build_info").count(), 1);
    assert_eq!(
        text.lines()
            .filter(|line| line.starts_with("latency_count"))
            .count(),
        1
    );
}
