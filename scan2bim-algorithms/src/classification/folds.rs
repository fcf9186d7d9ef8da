use std::collections::BTreeMap;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use scan2bim_core::PipelineError;

/// Training and held-out samples of one cross-validation round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Assigns every sample to one of `num_folds` folds so that each fold's class proportions approximate those of the
/// whole dataset. The samples of each class are shuffled with a generator seeded with `seed` and dealt round-robin over
/// the folds; the deal continues across classes, so fold sizes differ by at most one.
///
/// Returns the fold index of every sample.
///
/// # Errors
///
/// If `num_folds` is less than 2 or larger than the number of samples
pub fn stratified_fold_assignment(
    targets: &[usize],
    num_folds: usize,
    seed: u64,
) -> Result<Vec<usize>, PipelineError> {
    if num_folds < 2 {
        return Err(PipelineError::configuration(format!(
            "cross-validation needs at least 2 folds, got {}",
            num_folds
        )));
    }
    if num_folds > targets.len() {
        return Err(PipelineError::configuration(format!(
            "cannot split {} training rows into {} folds",
            targets.len(),
            num_folds
        )));
    }

    let mut samples_per_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (sample, target) in targets.iter().enumerate() {
        samples_per_class.entry(*target).or_default().push(sample);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0; targets.len()];
    let mut next_fold = 0;
    for (class, samples) in samples_per_class.iter_mut() {
        if samples.len() < num_folds {
            log::warn!(
                "Class {} has only {} training rows, some of the {} folds will not contain it",
                class,
                samples.len(),
                num_folds
            );
        }
        samples.shuffle(&mut rng);
        for sample in samples.iter() {
            assignment[*sample] = next_fold;
            next_fold = (next_fold + 1) % num_folds;
        }
    }
    Ok(assignment)
}

/// Turns a fold assignment into one [FoldSplit] per fold. The test sets partition the samples, each training set is the
/// complement of its test set
pub fn fold_splits(assignment: &[usize], num_folds: usize) -> Vec<FoldSplit> {
    (0..num_folds)
        .map(|fold| {
            let (test, train) = (0..assignment.len()).partition(|sample| assignment[*sample] == fold);
            FoldSplit { train, test }
        })
        .collect()
}
