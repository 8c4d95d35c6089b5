//! Contact structure of a population.
//!
//! Individuals meet in groups. The two layer network places every individual in exactly one
//! household and in a number of communities. Groups are not simulation entities, only
//! individuals are.

use derive_more::Display;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand_distr::Exp1;
use std::collections::{BTreeSet, HashMap};

use crate::core::{EntityId, SimRng};
use crate::errors::{GillespieError, Result};

/// Setting in which the members of a group meet.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum GroupContext {
    #[display("HH")]
    Household,
    #[display("CC")]
    Community,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub context: GroupContext,
    pub members: Vec<EntityId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContactNetwork {
    groups: Vec<Group>,
    // group indices of each individual
    memberships: Vec<Vec<usize>>,
}

impl ContactNetwork {
    /// Create a network from explicit groups.
    pub fn from_groups(n_individuals: usize, groups: Vec<Group>) -> Result<Self> {
        let mut memberships = vec![Vec::new(); n_individuals];
        for (idx, group) in groups.iter().enumerate() {
            for member in &group.members {
                let groups_of_member = memberships.get_mut(member.index()).ok_or_else(|| {
                    GillespieError::InvalidParameter {
                        key: "groups".to_string(),
                        reason: format!("member {member} of group {idx} is not an individual"),
                    }
                })?;
                if !groups_of_member.contains(&idx) {
                    groups_of_member.push(idx);
                }
            }
        }
        Ok(Self {
            groups,
            memberships,
        })
    }

    /// Sample a two layer network of households and communities.
    ///
    /// Household sizes follow a flat Dirichlet share of the individuals beyond one per household.
    /// Community memberships are formed by preferential attachment: every membership opens a new
    /// community with probability `p_community` and joins an existing community with probability
    /// proportional to its size otherwise.
    pub fn two_layer(
        n_individuals: usize,
        n_households: usize,
        n_communities: usize,
        p_community: f64,
        rng: &mut SimRng,
    ) -> Result<Self> {
        if n_households == 0 || n_households > n_individuals {
            return Err(GillespieError::InvalidParameter {
                key: "n_households".to_string(),
                reason: format!("must be between 1 and n_individuals={n_individuals}"),
            });
        }
        if !(0. ..=1.).contains(&p_community) {
            return Err(GillespieError::InvalidParameter {
                key: "p_community".to_string(),
                reason: "must be a probability".to_string(),
            });
        }

        let mut groups = Vec::new();

        // household layer
        let sizes = household_sizes(n_individuals, n_households, rng);
        let mut stubs: Vec<usize> = sizes
            .iter()
            .enumerate()
            .flat_map(|(household, &size)| std::iter::repeat_n(household, size))
            .collect();
        stubs.shuffle(rng);
        groups.extend(sizes.iter().map(|_| Group {
            context: GroupContext::Household,
            members: Vec::new(),
        }));
        for (individual, &household) in stubs.iter().enumerate() {
            groups[household].members.push(EntityId(individual));
        }

        // community layer
        let offset = groups.len();
        let mut attachments: Vec<usize> = Vec::new();
        for individual in (0..n_individuals).map(EntityId) {
            for _ in 0..n_communities {
                let community = match attachments.choose(rng) {
                    Some(&community) if rng.random::<f64>() >= p_community => community,
                    _ => {
                        groups.push(Group {
                            context: GroupContext::Community,
                            members: Vec::new(),
                        });
                        groups.len() - 1
                    }
                };
                if !groups[community].members.contains(&individual) {
                    groups[community].members.push(individual);
                    attachments.push(community);
                }
            }
        }

        log::debug!(
            "Sampled network with {} households and {} communities",
            offset,
            groups.len() - offset
        );
        Self::from_groups(n_individuals, groups)
    }

    pub fn n_individuals(&self) -> usize {
        self.memberships.len()
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, idx: usize) -> Option<&Group> {
        self.groups.get(idx)
    }

    /// Label of a group, e.g. `HH3`.
    pub fn group_name(&self, idx: usize) -> String {
        match self.groups.get(idx) {
            Some(group) => format!("{}{idx}", group.context),
            None => format!("?{idx}"),
        }
    }

    /// Groups of `individual` in `context`.
    pub fn groups_of(&self, individual: EntityId, context: GroupContext) -> Vec<usize> {
        self.memberships
            .get(individual.index())
            .map(|groups| {
                groups
                    .iter()
                    .copied()
                    .filter(|&idx| self.groups[idx].context == context)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Assign `seed_state` to up to `n_seeds` individuals and `default_state` to everybody else.
    ///
    /// Seeds are found by drawing a random non-empty group and a random member of it, for at most
    /// `2 * n_seeds` attempts.
    pub fn seed_initial_state<S: Copy>(
        &self,
        n_seeds: usize,
        default_state: S,
        seed_state: S,
        rng: &mut SimRng,
    ) -> HashMap<EntityId, S> {
        let mut initial_state: HashMap<EntityId, S> = (0..self.n_individuals())
            .map(|idx| (EntityId(idx), default_state))
            .collect();

        let mut seeds = BTreeSet::new();
        for _ in 0..2 * n_seeds {
            if seeds.len() >= n_seeds {
                break;
            }
            let Some(group) = self.groups.choose(rng) else {
                break;
            };
            if let Some(&individual) = group.members.choose(rng) {
                seeds.insert(individual);
            }
        }
        if seeds.len() < n_seeds {
            log::warn!("Seeded {} of {n_seeds} individuals", seeds.len());
        }

        for seed in seeds {
            initial_state.insert(seed, seed_state);
        }
        initial_state
    }
}

fn household_sizes(n_individuals: usize, n_households: usize, rng: &mut SimRng) -> Vec<usize> {
    let draws: Vec<f64> = (0..n_households).map(|_| rng.sample(Exp1)).collect();
    let total: f64 = draws.iter().sum();
    let surplus = (n_individuals - n_households) as f64;
    let mut sizes: Vec<i64> = draws
        .iter()
        .map(|draw| match total > 0. {
            true => (draw / total * surplus).round() as i64 + 1,
            false => 1,
        })
        .collect();

    // the last household absorbs rounding errors
    let target = n_individuals as i64;
    let mut sum: i64 = sizes.iter().sum();
    while sum != target {
        let Some(last) = sizes.last_mut() else {
            break;
        };
        *last += target - sum;
        if *last < 1 {
            sizes.pop();
        }
        sum = sizes.iter().sum();
    }
    sizes.into_iter().map(|size| size.max(0) as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn households_partition_individuals() {
        let mut rng = SimRng::seed_from_u64(0x12b342b71);
        let network = ContactNetwork::two_layer(100, 25, 2, 0.25, &mut rng).unwrap();

        let households: Vec<&Group> = network
            .groups()
            .iter()
            .filter(|group| group.context == GroupContext::Household)
            .collect();
        assert!(households.len() <= 25);
        assert!(households.iter().all(|group| !group.members.is_empty()));
        assert_eq!(
            households
                .iter()
                .map(|group| group.members.len())
                .sum::<usize>(),
            100
        );
        for individual in (0..100).map(EntityId) {
            assert_eq!(network.groups_of(individual, GroupContext::Household).len(), 1);
        }
    }

    #[test]
    fn communities_follow_membership_count() {
        let mut rng = SimRng::seed_from_u64(3);
        let network = ContactNetwork::two_layer(50, 10, 2, 0.3, &mut rng).unwrap();
        for individual in (0..50).map(EntityId) {
            let communities = network.groups_of(individual, GroupContext::Community);
            assert!((1..=2).contains(&communities.len()));
        }
    }

    #[test]
    fn household_sizes_sum_up() {
        let mut rng = SimRng::seed_from_u64(11);
        for (n, h) in [(10, 10), (10, 1), (37, 5), (1000, 3)] {
            let sizes = household_sizes(n, h, &mut rng);
            assert_eq!(sizes.iter().sum::<usize>(), n);
            assert!(sizes.iter().all(|&size| size >= 1));
        }
    }

    #[test]
    fn invalid_shape_is_rejected() {
        let mut rng = SimRng::seed_from_u64(0);
        assert!(ContactNetwork::two_layer(5, 0, 1, 0.5, &mut rng).is_err());
        assert!(ContactNetwork::two_layer(5, 6, 1, 0.5, &mut rng).is_err());
        assert!(ContactNetwork::two_layer(5, 2, 1, 1.5, &mut rng).is_err());
    }

    #[test]
    fn group_names_carry_context() {
        let groups = vec![
            Group {
                context: GroupContext::Household,
                members: vec![EntityId(0), EntityId(1)],
            },
            Group {
                context: GroupContext::Community,
                members: vec![EntityId(1)],
            },
        ];
        let network = ContactNetwork::from_groups(2, groups).unwrap();
        assert_eq!(network.group_name(0), "HH0");
        assert_eq!(network.group_name(1), "CC1");
        assert_eq!(network.groups_of(EntityId(1), GroupContext::Community), vec![1]);
        assert!(
            ContactNetwork::from_groups(
                1,
                vec![Group {
                    context: GroupContext::Household,
                    members: vec![EntityId(4)],
                }]
            )
            .is_err()
        );
    }

    #[test]
    fn seeding_marks_distinct_individuals() {
        let mut rng = SimRng::seed_from_u64(5);
        let network = ContactNetwork::two_layer(40, 10, 1, 0.5, &mut rng).unwrap();
        let initial_state = network.seed_initial_state(4, 'S', 'E', &mut rng);

        assert_eq!(initial_state.len(), 40);
        let seeded = initial_state.values().filter(|&&state| state == 'E').count();
        assert!((1..=4).contains(&seeded));
    }
}
