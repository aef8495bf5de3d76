use criterion::{black_box, criterion_group, criterion_main, Criterion};
use planner::{
    CapacityPlanner, HardwareProfile, InitialBinCount, InstanceType, Replica, Strategy, Topic,
    VolumeClass,
};
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

fn workload() -> Vec<Replica> {
    let topics = vec![
        Topic::new("t1", 1_000_000, 234, 70)
            .consumers(4)
            .replays(2, vec![3_000_000, 4_000_000]),
        Topic::new("t2", 2_000_000, 234, 80)
            .consumers(3)
            .replays(1, vec![4_000_000]),
        Topic::new("t3", 3_000_000, 234, 100)
            .consumers(5)
            .replays(2, vec![5_000_000, 6_000_000]),
    ];
    topics
        .into_iter()
        .map(|t| t.replication_factor(2).max_consumer_lag_secs(20))
        .flat_map(|t| t.replicas().expect("invalid topic"))
        .collect()
}

pub fn bfd_benchmark(c: &mut Criterion) {
    let replicas = workload();
    let profile = HardwareProfile::new(InstanceType::M4_4X, VolumeClass::St1);
    for &dynamic in &[true, false] {
        let planner = CapacityPlanner::new(
            profile.clone(),
            Strategy::BestFitDecreasing {
                dynamic,
                initial: InitialBinCount::LowerBound,
            },
        );
        let name = if dynamic { "BFD dynamic" } else { "BFD static" };
        c.bench_function(name, |b| {
            b.iter(|| {
                planner
                    .solve(black_box(&replicas), &mut ChaChaRng::seed_from_u64(0))
                    .expect("packing failed")
            })
        });
    }
}

criterion_group!(benches, bfd_benchmark);
criterion_main!(benches);
