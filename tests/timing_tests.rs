//! Statistical timing harness for secret verification
//!
//! Compares median verification time for secrets that differ from the stored
//! one at the first byte, at the last byte, and in length. Noisy on shared
//! machines, so ignored by default:
//!
//! ```text
//! cargo test --release --test timing_tests -- --ignored
//! ```

use std::time::{Duration, Instant};

use aaa_server::auth::SecretVerifier;
use aaa_server::config::SecretHashConfig;

const SAMPLES: usize = 200;
const STORED: &str = "k3Y7-v8Qz-2pLm-9xWt-4nRb-6cHs-1fDj-5gKa";

fn median(verifier: &SecretVerifier, hash: &str, submitted: &str) -> Duration {
    let mut samples: Vec<Duration> = (0..SAMPLES)
        .map(|_| {
            let start = Instant::now();
            let _ = std::hint::black_box(verifier.verify(submitted, hash));
            start.elapsed()
        })
        .collect();
    samples.sort();
    samples[SAMPLES / 2]
}

fn ratio(a: Duration, b: Duration) -> f64 {
    let (a, b) = (a.as_secs_f64(), b.as_secs_f64());
    a.max(b) / a.min(b)
}

#[test]
#[ignore = "timing-sensitive; run explicitly"]
fn verification_time_independent_of_mismatch_position_and_length() {
    let verifier = SecretVerifier::new(&SecretHashConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
        max_concurrent: 4,
    })
    .unwrap();
    let hash = verifier.hash(STORED).unwrap();

    let mut first_byte = STORED.to_string();
    first_byte.replace_range(0..1, "X");
    let mut last_byte = STORED.to_string();
    let last = last_byte.len() - 1;
    last_byte.replace_range(last.., "X");

    let correct = median(&verifier, &hash, STORED);
    let early = median(&verifier, &hash, &first_byte);
    let late = median(&verifier, &hash, &last_byte);
    let short = median(&verifier, &hash, "k");
    let long = median(&verifier, &hash, &STORED.repeat(4));
    let decoy = {
        let mut samples: Vec<Duration> = (0..SAMPLES)
            .map(|_| {
                let start = Instant::now();
                let _ = std::hint::black_box(verifier.verify_decoy(STORED));
                start.elapsed()
            })
            .collect();
        samples.sort();
        samples[SAMPLES / 2]
    };

    // Argon2 cost dominates; the digest comparison must not add a measurable
    // position- or length-dependent component.
    assert!(ratio(early, late) < 1.10, "early={early:?} late={late:?}");
    assert!(ratio(correct, late) < 1.10, "correct={correct:?} late={late:?}");
    assert!(ratio(short, long) < 1.25, "short={short:?} long={long:?}");
    assert!(ratio(decoy, late) < 1.25, "decoy={decoy:?} late={late:?}");
}
