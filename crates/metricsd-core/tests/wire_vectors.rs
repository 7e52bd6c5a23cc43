//! Wire-format vector tests: decode a metric, normalize it, report the outcome.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use metricsd_core::integrity::{compute_hash, verify};
use metricsd_core::{Metric, MetricKind};

struct Vector {
    description: &'static str,
    json: &'static str,
    expect_error: Option<&'static str>,
}

const VECTORS: &[Vector] = &[
    Vector {
        description: "gauge with value",
        json: r#"{"id":"Alloc","type":"gauge","value":1024.5}"#,
        expect_error: None,
    },
    Vector {
        description: "counter with delta",
        json: r#"{"id":"PollCount","type":"counter","delta":1}"#,
        expect_error: None,
    },
    Vector {
        description: "counter with stray value",
        json: r#"{"id":"PollCount","type":"counter","delta":1,"value":3.5}"#,
        expect_error: None,
    },
    Vector {
        description: "unknown type",
        json: r#"{"id":"x","type":"histogram","value":1}"#,
        expect_error: Some("UNKNOWN_METRIC_TYPE"),
    },
    Vector {
        description: "gauge without value",
        json: r#"{"id":"Alloc","type":"gauge","delta":4}"#,
        expect_error: Some("BAD_FORMAT"),
    },
    Vector {
        description: "counter without payload",
        json: r#"{"id":"PollCount","type":"counter"}"#,
        expect_error: Some("BAD_FORMAT"),
    },
];

#[test]
fn wire_vectors() {
    for v in VECTORS {
        let m: Metric = serde_json::from_str(v.json).expect(v.description);
        let res = m.normalize();

        if let Some(code) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.client_code().as_str(), code, "vector={}", v.description);
            continue;
        }

        let m = res.expect("expected normalized metric");
        match m.kind {
            MetricKind::Gauge => assert!(m.value.is_some() && m.delta.is_none(), "vector={}", v.description),
            MetricKind::Counter => assert!(m.delta.is_some() && m.value.is_none(), "vector={}", v.description),
            MetricKind::Unknown(_) => panic!("vector={} normalized an unknown kind", v.description),
        }
    }
}

#[test]
fn hash_survives_the_wire() {
    let key = b"shared";
    let mut m = Metric::gauge("RandomValue", 0.25);
    m.hash = Some(compute_hash(&m, key).unwrap());

    let json = serde_json::to_string(&m).unwrap();
    let decoded: Metric = serde_json::from_str(&json).unwrap();
    verify(&decoded, key).unwrap();
}
