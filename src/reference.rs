use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

pub fn generate(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 1_000_000;
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();

    format!("{}-{}-{:06}-{}", prefix.to_uppercase(), millis, seq, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keeps_prefix_and_shape() {
        let r = generate("psk");
        let parts: Vec<&str> = r.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "PSK");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 12);
    }

    #[test]
    fn no_collisions_in_a_burst() {
        let refs: HashSet<String> = (0..10_000).map(|_| generate("FLW")).collect();
        assert_eq!(refs.len(), 10_000);
    }

    #[test]
    fn unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..1000).map(|_| generate("PSK")).collect::<Vec<_>>()))
            .collect();
        let mut all = HashSet::new();
        for h in handles {
            for r in h.join().unwrap() {
                assert!(all.insert(r));
            }
        }
    }
}
