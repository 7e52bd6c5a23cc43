//! Keyed integrity hashes for metrics (HMAC-SHA256).
//!
//! The MAC input is `"<id>:<type>:<payload>"` where counters render as base-10
//! integers and gauges with six fractional digits. Hashes travel as lowercase
//! hex. Without the shared key a client cannot forge a valid hash, which is the
//! only spoofing defense of the otherwise unauthenticated push protocol.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{MetricsError, Result};
use crate::metric::{Metric, MetricKind};

type HmacSha256 = Hmac<Sha256>;

fn canonical(metric: &Metric) -> Result<String> {
    if metric.delta.is_none() && metric.value.is_none() {
        return Err(MetricsError::MissingPayload(metric.id.clone()));
    }
    match &metric.kind {
        MetricKind::Counter => {
            let delta = metric
                .delta
                .ok_or_else(|| MetricsError::MissingPayload(metric.id.clone()))?;
            Ok(format!("{}:{}:{}", metric.id, metric.kind, delta))
        }
        MetricKind::Gauge => {
            let value = metric
                .value
                .ok_or_else(|| MetricsError::MissingPayload(metric.id.clone()))?;
            Ok(format!("{}:{}:{:.6}", metric.id, metric.kind, value))
        }
        MetricKind::Unknown(s) => Err(MetricsError::UnknownMetricType(s.clone())),
    }
}

fn mac_for(metric: &Metric, key: &[u8]) -> Result<HmacSha256> {
    if key.is_empty() {
        return Err(MetricsError::EmptyKey);
    }
    let src = canonical(metric)?;
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| MetricsError::Internal(format!("hmac init failed: {e}")))?;
    mac.update(src.as_bytes());
    Ok(mac)
}

/// Compute the hex-encoded keyed hash of the metric's current payload.
pub fn compute_hash(metric: &Metric, key: &[u8]) -> Result<String> {
    let mac = mac_for(metric, key)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Replace `metric.hash` with a hash over its current payload.
pub fn stamp(metric: &mut Metric, key: &[u8]) -> Result<()> {
    metric.hash = Some(compute_hash(metric, key)?);
    Ok(())
}

/// Check the metric's hash against its payload.
///
/// Succeeds without checking when the metric carries no hash or no key is
/// configured. Comparison is constant-time.
pub fn verify(metric: &Metric, key: &[u8]) -> Result<()> {
    let Some(given_hex) = metric.hash() else {
        return Ok(());
    };
    if key.is_empty() {
        return Ok(());
    }

    let mac = mac_for(metric, key)?;
    let verdict = match hex::decode(given_hex) {
        Ok(given) => mac.clone().verify_slice(&given).is_ok(),
        Err(_) => false,
    };
    if verdict {
        return Ok(());
    }

    let computed = hex::encode(mac.finalize().into_bytes());
    tracing::warn!(
        id = %metric.id,
        kind = %metric.kind,
        received = %given_hex,
        computed = %computed,
        "metric hash mismatch"
    );
    Err(MetricsError::IntegrityMismatch {
        id: metric.id.clone(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const KEY: &[u8] = b"secret";

    #[test]
    fn known_counter_vector() {
        let m = Metric::counter("GetSetZip44", 3_380_724_506);
        let key = b"/var/folders/x3/8ccpsdrn7cz5q4vnsjj4_rdh0000gn/T/OxSICpv";
        assert_eq!(
            compute_hash(&m, key).unwrap(),
            "c0979f8d2b6951d1d74fb363eadcf8984cd0e5e2dc2fc5c8ff1eb5d766cf12e8"
        );
    }

    #[test]
    fn compute_requires_key_and_payload() {
        let m = Metric::gauge("g", 1.0);
        assert!(matches!(compute_hash(&m, b""), Err(MetricsError::EmptyKey)));

        let mut empty = Metric::gauge("g", 1.0);
        empty.value = None;
        assert!(matches!(
            compute_hash(&empty, KEY),
            Err(MetricsError::MissingPayload(_))
        ));

        let mut bogus = Metric::gauge("g", 1.0);
        bogus.kind = MetricKind::Unknown("bogus".into());
        assert!(matches!(
            compute_hash(&bogus, KEY),
            Err(MetricsError::UnknownMetricType(_))
        ));
    }

    #[test]
    fn gauge_and_counter_with_same_name_hash_differently() {
        let g = compute_hash(&Metric::gauge("x", 1.0), KEY).unwrap();
        let c = compute_hash(&Metric::counter("x", 1), KEY).unwrap();
        assert_ne!(g, c);
        assert_eq!(g.len(), 64);
    }

    #[test]
    fn verify_accepts_stamped_metric() {
        let mut m = Metric::gauge("Alloc", 1234.5);
        stamp(&mut m, KEY).unwrap();
        verify(&m, KEY).unwrap();
    }

    #[test]
    fn verify_is_opt_in() {
        let m = Metric::counter("c", 5);
        verify(&m, KEY).unwrap();
        verify(&m, b"").unwrap();
        verify(&m, b"another key").unwrap();
    }

    #[test]
    fn verify_skips_when_key_missing() {
        let mut m = Metric::counter("c", 5);
        m.hash = Some("deadbeef".into());
        verify(&m, b"").unwrap();
    }

    #[test]
    fn single_bit_flip_in_delta_is_detected() {
        let mut m = Metric::counter("PollCount", 0b1011_0110);
        stamp(&mut m, KEY).unwrap();
        for bit in 0..64 {
            let mut tampered = m.clone();
            tampered.delta = m.delta.map(|d| d ^ (1i64 << bit));
            assert!(
                matches!(verify(&tampered, KEY), Err(MetricsError::IntegrityMismatch { .. })),
                "bit {bit} not detected"
            );
        }
    }

    #[test]
    fn single_bit_flip_in_value_is_detected() {
        let mut m = Metric::gauge("HeapAlloc", 123_456.75);
        stamp(&mut m, KEY).unwrap();
        // Low mantissa bits vanish in the six-digit rendering; flip the ones that show.
        for bit in 30..64 {
            let mut tampered = m.clone();
            tampered.value = m.value.map(|v| f64::from_bits(v.to_bits() ^ (1u64 << bit)));
            assert!(
                verify(&tampered, KEY).is_err(),
                "bit {bit} not detected"
            );
        }
    }

    #[test]
    fn wrong_key_and_garbage_hash_are_mismatches() {
        let mut m = Metric::gauge("g", 3.0);
        stamp(&mut m, KEY).unwrap();
        assert!(matches!(
            verify(&m, b"other"),
            Err(MetricsError::IntegrityMismatch { .. })
        ));

        m.hash = Some("not-hex".into());
        assert!(matches!(
            verify(&m, KEY),
            Err(MetricsError::IntegrityMismatch { .. })
        ));
    }
}
