use criterion::{criterion_group, criterion_main, Criterion};
use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};
use scan2bim_algorithms::{structure_measures::compute_features, voxel_grid::downsample};
use scan2bim_core::{nalgebra::Vector3, Label, Point, PointCloud};

const NUM_POINTS_SMALL: usize = 1000;
const NUM_POINTS_MEDIUM: usize = 10000;
const NUM_POINTS_BIG: usize = 100000;

/// Random points on the floor and two walls of a 10x10x3 room
fn random_room_point<R: Rng + ?Sized>(rng: &mut R) -> Point {
    let along = rng.sample(Uniform::new(0.0, 10.0));
    let height = rng.sample(Uniform::new(0.0, 3.0));
    let (position, label) = match rng.sample(Uniform::new(0u8, 3)) {
        0 => (
            Vector3::new(along, rng.sample(Uniform::new(0.0, 10.0)), 0.0),
            Label::Floor,
        ),
        1 => (Vector3::new(along, 0.0, height), Label::Wall),
        _ => (Vector3::new(0.0, along, height), Label::Wall),
    };
    Point::new(position, Vector3::new(30000, 30000, 30000)).with_label(label)
}

fn get_dummy_room(num_points: usize) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(42);
    (0..num_points).map(|_| random_room_point(&mut rng)).collect()
}

fn bench(c: &mut Criterion) {
    for (testname, num_points) in [
        ("small", NUM_POINTS_SMALL),
        ("medium", NUM_POINTS_MEDIUM),
        ("big", NUM_POINTS_BIG),
    ]
    .iter()
    {
        let cloud = get_dummy_room(*num_points);
        c.bench_function(&format!("compute_features_{}", testname), |b| {
            b.iter(|| compute_features(&cloud, 0.4))
        });
        c.bench_function(&format!("downsample_{}", testname), |b| {
            b.iter(|| downsample(&cloud, 0.05))
        });
    }
}

criterion_group! {
    name = structure_measures;
    config = Criterion::default().sample_size(10);
    targets = bench
}
criterion_main!(structure_measures);
