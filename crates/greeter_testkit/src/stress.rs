//! Stress tests for the greeting resolver.
//!
//! Many threads resolve a small set of names through one resolver, so
//! operational writes for the same name race through the pipeline.

use greeter_core::GreetingResolver;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total resolves attempted.
    pub total_ops: usize,
    /// Resolves that returned a greeting.
    pub successful_ops: usize,
    /// Resolves that returned an error.
    pub failed_ops: usize,
    /// Wall time of the run.
    pub duration: Duration,
    /// Resolves per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };
        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total resolves: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for a stress run.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of resolving threads.
    pub threads: usize,
    /// Resolves per thread.
    pub resolves_per_thread: usize,
    /// Number of distinct names cycled through.
    pub distinct_names: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            resolves_per_thread: 250,
            distinct_names: 16,
        }
    }
}

impl StressConfig {
    /// The names a run resolves.
    pub fn names(&self) -> Vec<String> {
        (0..self.distinct_names.max(1))
            .map(|i| format!("user-{i}"))
            .collect()
    }
}

/// Resolves names from many threads at once.
///
/// Does not wait for the operational writes to settle.
pub fn stress_concurrent_resolves(
    resolver: &GreetingResolver,
    config: &StressConfig,
) -> StressTestResult {
    let names = Arc::new(config.names());
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let resolver = resolver.clone();
            let names = Arc::clone(&names);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let resolves = config.resolves_per_thread;

            thread::spawn(move || {
                for i in 0..resolves {
                    let name = &names[(t + i) % names.len()];
                    match resolver.resolve(name) {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestRegistry;
    use greeter_core::View;

    #[test]
    fn small_concurrent_run() {
        let registry = TestRegistry::memory();
        let config = StressConfig {
            threads: 4,
            resolves_per_thread: 50,
            distinct_names: 5,
        };

        let result = stress_concurrent_resolves(&registry.resolver, &config);
        assert_eq!(result.total_ops, 200);
        assert_eq!(result.failed_ops, 0);

        registry.settle();
        let served = registry.admin.list(View::Operational).unwrap();
        assert_eq!(served.len(), 5);
        assert!(registry.feed.failures().is_empty());
    }
}
