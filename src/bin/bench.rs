//! Hardware and scheduler benchmark binary.
//!
//! Measures single-process throughput of both CPU flavors running their
//! ancestors, and draw cost of each scheduling policy.
//! Run with: `cargo run --release --bin bench`

use std::sync::Arc;
use std::time::{Duration, Instant};

use avida::config::{HardwareConfig, SlicingMethod};
use avida::environment::{Environment, FIXED_INPUTS};
use avida::hardware::context::AvidaContext;
use avida::hardware::create_hardware;
use avida::hardware::genome::Genome;
use avida::hardware::isa::{HardwareKind, InstructionSet};
use avida::hardware::merit::Merit;
use avida::hardware::mutation::MutationConfig;
use avida::organism::{OrgIo, Phenotype};
use avida::schedule::create_schedule;

// ---------------------------------------------------------------------------
// Benchmark harness
// ---------------------------------------------------------------------------

struct BenchResult {
    name: &'static str,
    iterations: u64,
    total: Duration,
    /// Operations (ticks or draws) per iteration.
    ops_per_iter: u64,
}

impl BenchResult {
    fn avg(&self) -> Duration {
        self.total / self.iterations.max(1) as u32
    }

    fn print(&self) {
        let avg = self.avg();
        let ns_per_op = avg.as_nanos() as f64 / self.ops_per_iter.max(1) as f64;
        println!(
            "  {:<30} {:>7} iters {:>10.3} us/iter {:>10} ops  {:>8.1} ns/op",
            self.name,
            self.iterations,
            avg.as_nanos() as f64 / 1000.0,
            self.ops_per_iter,
            ns_per_op,
        );
    }
}

/// Runs `f` for at least `min_duration`; `f` returns the operations it did.
fn bench<F>(name: &'static str, min_duration: Duration, mut f: F) -> BenchResult
where
    F: FnMut() -> u64,
{
    // Warmup
    for _ in 0..3 {
        f();
    }

    let mut iterations = 0u64;
    let mut ops = 0u64;
    let start = Instant::now();
    while start.elapsed() < min_duration {
        ops = f();
        iterations += 1;
    }

    BenchResult {
        name,
        iterations,
        total: start.elapsed(),
        ops_per_iter: ops,
    }
}

const TICKS_PER_RUN: u64 = 10_000;
const DRAWS_PER_RUN: u64 = 100_000;

/// Runs the ancestor for `TICKS_PER_RUN` ticks, reloading it after every
/// divide.
fn run_ancestor(kind: HardwareKind, config: &Arc<HardwareConfig>) -> u64 {
    let set = Arc::new(InstructionSet::default_for(kind));
    let genome = Genome::ancestor(&set).expect("ancestor");
    let mut hardware = create_hardware(kind, Arc::clone(&set), Arc::clone(config)).expect("hardware");
    hardware.load_genome(&genome).expect("load");

    let env = Arc::new(Environment::logic9());
    let phenotype = Phenotype::injected(1.0, env.num_tasks(), genome.len());
    let mut io = OrgIo::new(env, FIXED_INPUTS, phenotype);
    let mut ctx = AvidaContext::new(1);
    for _ in 0..TICKS_PER_RUN {
        hardware.single_process(&mut ctx, &mut io);
        io.phenotype.tick();
        if !io.take_offspring().is_empty() {
            hardware.load_genome(&genome).expect("reload");
        }
    }
    TICKS_PER_RUN
}

fn main() {
    let min = Duration::from_secs(2);

    println!("Avida Benchmarks (each runs for >= 2s)\n");
    println!(
        "  {:<30} {:>7}       {:>14} {:>10}  {:>10}",
        "benchmark", "iters", "avg time", "ops/iter", "ns/op"
    );
    println!("  {}", "-".repeat(82));

    let config = Arc::new(HardwareConfig {
        mutations: MutationConfig::none(),
        ..HardwareConfig::default()
    });

    // 1. Single-process throughput
    bench("heads ancestor", min, || run_ancestor(HardwareKind::Heads, &config)).print();
    bench("4stack ancestor", min, || run_ancestor(HardwareKind::FourStack, &config)).print();

    // 2. Scheduler draws over 3600 slots with varied merit
    for (name, method) in [
        ("schedule constant", SlicingMethod::Constant),
        ("schedule probabilistic", SlicingMethod::Probabilistic),
        ("schedule integrated", SlicingMethod::Integrated),
    ] {
        let mut schedule = create_schedule(method, 3600, 30);
        for id in 0..3600 {
            schedule.adjust(id, &Merit::new(1.0 + (id % 17) as f64));
        }
        let mut ctx = AvidaContext::new(2);
        bench(name, min, || {
            for _ in 0..DRAWS_PER_RUN {
                std::hint::black_box(schedule.next_id(&mut ctx));
            }
            DRAWS_PER_RUN
        })
        .print();
    }
}
