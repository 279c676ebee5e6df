//! Compile-time benchmarks.
//!
//! Sources are generated so the workloads scale by function count:
//! - `sizes`: straight-line functions, 10 to 1000 of them
//! - `features`: loops, containers, classes and imports
//!
//! ## Profiling with Puffin
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

use std::fmt::Write as _;
use std::hint::black_box;
use std::path::Path;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use neopyc::{CompileOptions, Compiler, MemoryLoader};

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

/// Print the total time of every top-level scope across recorded frames.
#[cfg(feature = "profile-with-puffin")]
fn print_profiling_stats() {
    use std::collections::HashMap;

    use puffin::Reader;

    let Some(frame_view) = FRAME_VIEW.get() else {
        return;
    };
    let view = frame_view.lock();
    let scopes = view.scope_collection();

    let mut timings: HashMap<String, i64> = HashMap::new();
    for frame in view.recent_frames() {
        let Ok(unpacked) = frame.unpacked() else {
            continue;
        };
        for (_, stream_info) in unpacked.thread_streams.iter() {
            let Ok(top) = Reader::from_start(&stream_info.stream).read_top_scopes() else {
                continue;
            };
            for scope in top {
                if let Some(details) = scopes.fetch_by_id(&scope.id) {
                    *timings.entry(details.name().to_string()).or_insert(0) += scope.record.duration_ns;
                }
            }
        }
    }

    let mut entries: Vec<_> = timings.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    println!("\n=== Profiling Summary ===");
    for (name, ns) in entries {
        println!("  {name:30} {:>10.2?}", std::time::Duration::from_nanos(ns as u64));
    }
}

#[cfg(not(feature = "profile-with-puffin"))]
fn print_profiling_stats() {}

/// `count` public functions doing a little arithmetic and branching.
fn straight_line(count: usize) -> String {
    let mut source = String::new();
    for i in 0..count {
        let _ = write!(
            source,
            "@public\ndef f{i}(a: int, b: int) -> int:\n    c = a * {i} + b\n    if c > 100:\n        return c - 1\n    return c + 1\n\n"
        );
    }
    source
}

const LOOPS: &str = "\
from typing import List

@public
def total(values: List[int]) -> int:
    result = 0
    for value in values:
        if value < 0:
            continue
        result += value
    for i in range(10):
        result = result * 2 - i
    return result
";

const CONTAINERS: &str = "\
from typing import Dict, List

@public
def build() -> Dict[str, int]:
    counts: Dict[str, int] = {'total': 0}
    names = ['a', 'b', 'c']
    for name in names:
        counts[name] = len(name)
    items: List[int] = [1]
    items.append(3)
    items[-1] = 4
    return counts
";

const CLASSES: &str = "\
class Account:
    owner: str = ''
    balance: int = 0

    def __init__(self, owner: str):
        self.owner = owner

    def deposit(self, amount: int) -> int:
        self.balance = self.balance + amount
        return self.balance

@public
def open(owner: str) -> int:
    account = Account(owner)
    return account.deposit(10)
";

fn size_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let compiler = Compiler::new();
    let mut group = c.benchmark_group("compile/sizes");

    for count in [10, 100, 1000] {
        let source = straight_line(count);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_function(format!("functions_{count}"), |b| {
            b.iter(|| {
                let contract = compiler.compile_source(black_box(&source)).unwrap();
                end_profiling_frame();
                black_box(contract.bytecode.len())
            });
        });
    }

    group.finish();
    print_profiling_stats();
}

fn feature_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let compiler = Compiler::new();
    let unoptimized = Compiler::with_options(CompileOptions::new().optimize(false));
    let mut group = c.benchmark_group("compile/features");

    for (name, source) in [("loops", LOOPS), ("containers", CONTAINERS), ("classes", CLASSES)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let contract = compiler.compile_source(black_box(source)).unwrap();
                end_profiling_frame();
                black_box(contract.methods.len())
            });
        });
    }

    group.bench_function("loops_unoptimized", |b| {
        b.iter(|| black_box(unoptimized.compile_source(black_box(LOOPS)).unwrap().bytecode.len()));
    });

    let loader = MemoryLoader::new()
        .with_file("app/main.py", "from lib import helper\n\n@public\ndef run(x: int) -> int:\n    return helper(x)\n")
        .with_file("app/lib.py", "scale: int = 3\n\ndef helper(x: int) -> int:\n    return x * scale\n");
    group.bench_function("imports", |b| {
        b.iter(|| {
            let contract = compiler
                .compile_with_loader(Path::new("app/main.py"), black_box(&loader))
                .unwrap();
            black_box(contract.methods.len())
        });
    });

    group.finish();
    print_profiling_stats();
}

criterion_group!(benches, size_benchmarks, feature_benchmarks);
criterion_main!(benches);
