/// Some simple benchmarks of random node models.
///
/// Each benchmark solves a batch of random intersections, as a network loading procedure would
/// once per time step. Batches vary in size, in the maximum number of legs per node and in
/// whether they are solved sequentially or across a thread pool.
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use traflow_core::node_model::{NodeModel, NodeModelSettings, NodeModelSettingsBuilder};
use traflow_core::test_utils::make_random_inputs;

struct SettingsSetup {
    name: String,
    settings: NodeModelSettings,
}

fn random_benchmark(
    c: &mut Criterion,
    group_name: &str,
    num_nodes: &[usize],
    legs: &[usize],
    setups: &[SettingsSetup],
    sample_size: Option<usize>,
) {
    let mut group = c.benchmark_group(group_name);
    if let Some(n) = sample_size {
        group.sample_size(n);
    }

    for &n_nodes in num_nodes {
        for &n_legs in legs {
            // Make a consistent random number generator
            // ChaCha8 should be consistent across builds and platforms
            let mut rng = ChaCha8Rng::seed_from_u64(0);
            let inputs = make_random_inputs(n_nodes, n_legs, n_legs, &mut rng).expect("Failed to make random nodes.");

            group.throughput(Throughput::Elements(n_nodes as u64));

            for setup in setups {
                let model = NodeModel::new(setup.settings);
                let parameter_string = format!("{n_nodes} * {n_legs} * {}", &setup.name);

                group.bench_with_input(
                    BenchmarkId::new("random-nodes", parameter_string),
                    &(n_nodes, n_legs),
                    |b, _n| b.iter(|| model.run_batch(&inputs).expect("Failed to solve batch.")),
                );
            }
        }
    }

    group.finish();
}

fn bench_sequential(c: &mut Criterion) {
    let setups = vec![SettingsSetup {
        name: "sequential".to_string(),
        settings: NodeModelSettings::default(),
    }];

    random_benchmark(c, "random-nodes-sequential", &[100, 1000, 10000], &[2, 4, 8], &setups, None);
}

fn bench_threads(c: &mut Criterion) {
    let setups: Vec<_> = [1, 2, 4, 8]
        .into_iter()
        .map(|threads| SettingsSetup {
            name: format!("threads-{threads}"),
            settings: NodeModelSettingsBuilder::default().parallel().threads(threads).build(),
        })
        .collect();

    random_benchmark(c, "random-nodes-threads", &[10000, 100000], &[4], &setups, Some(10));
}

criterion_group!(benches, bench_sequential, bench_threads);
criterion_main!(benches);
