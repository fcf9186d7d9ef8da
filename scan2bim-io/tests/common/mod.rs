use rand::{rngs::StdRng, Rng, SeedableRng};
use scan2bim_core::{nalgebra::Vector3, Label, Point, PointCloud};

/// Random points with millimeter coordinates, so that they survive the LAS integer quantization unchanged
pub fn random_cloud(count: usize, seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let position = Vector3::new(
                rng.gen_range(0..10_000) as f64 / 1000.0,
                rng.gen_range(0..10_000) as f64 / 1000.0,
                rng.gen_range(0..3_000) as f64 / 1000.0,
            );
            let color = Vector3::new(rng.gen(), rng.gen(), rng.gen());
            let mut point =
                Point::new(position, color).with_label(Label::ALL[rng.gen_range(0..5)]);
            point.intensity = Some(rng.gen());
            point
        })
        .collect()
}
