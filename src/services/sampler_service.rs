use crate::models::category::CategorySet;
use crate::models::question::Sampled;
use crate::models::survey::SampleSize;
use rand::seq::{index, SliceRandom};
use rand::Rng;

pub struct SamplerService;

impl SamplerService {
    /// Picks pool indices to present. Per category, a group smaller than `k`
    /// is taken whole; otherwise exactly `k` are drawn without replacement.
    /// The result keeps pool order; presentation order is `shuffle`'s job.
    pub fn sample<T: Sampled>(
        pool: &[T],
        categories: &CategorySet,
        size: SampleSize,
        rng: &mut impl Rng,
    ) -> Vec<usize> {
        match size {
            SampleSize::All => (0..pool.len()).collect(),
            SampleSize::Overall(k) => {
                let all: Vec<usize> = (0..pool.len()).collect();
                Self::draw(&all, k, rng)
            }
            SampleSize::PerCategory(k) => {
                let mut picked = Vec::new();
                for category in categories.iter() {
                    let group: Vec<usize> = pool
                        .iter()
                        .enumerate()
                        .filter(|(_, item)| item.group() == category.id)
                        .map(|(idx, _)| idx)
                        .collect();
                    picked.extend(Self::draw(&group, k, rng));
                }
                picked.sort_unstable();
                picked
            }
        }
    }

    fn draw(group: &[usize], k: usize, rng: &mut impl Rng) -> Vec<usize> {
        if group.len() <= k {
            return group.to_vec();
        }
        let mut chosen: Vec<usize> = index::sample(rng, group.len(), k)
            .into_iter()
            .map(|i| group[i])
            .collect();
        chosen.sort_unstable();
        chosen
    }

    /// Random permutation of `order`.
    pub fn shuffle(order: &mut [usize], rng: &mut impl Rng) {
        order.shuffle(rng);
    }
}
