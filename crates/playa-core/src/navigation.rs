//! The per-item episode pointer state machine.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::{EpisodePointer, Item};

/// Where to move an item's current-episode pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    First,
    Prev,
    Next,
    Finished,
    Random,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Prev => "prev",
            Self::Next => "next",
            Self::Finished => "finished",
            Self::Random => "random",
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the pointer reached from `current` over `ids` (display order).
pub fn resolve<R: Rng + ?Sized>(
    ids: &[i64],
    current: EpisodePointer,
    destination: Destination,
    rng: &mut R,
) -> EpisodePointer {
    if ids.is_empty() {
        return match destination {
            Destination::First | Destination::Prev => EpisodePointer::BeforeStart,
            Destination::Next | Destination::Finished => EpisodePointer::Finished,
            Destination::Random => current,
        };
    }

    let len = ids.len() as isize;
    // BeforeStart and Finished sit one past the end; an unknown id sits one
    // before the start.
    let index: isize = match current {
        EpisodePointer::At(id) => ids
            .iter()
            .position(|e| *e == id)
            .map_or(-1, |i| i as isize),
        EpisodePointer::BeforeStart | EpisodePointer::Finished => len,
    };

    let target = match destination {
        Destination::First => Some(0),
        Destination::Prev => Some((index - 1).max(0)),
        Destination::Next => Some(index + 1).filter(|i| *i < len),
        Destination::Finished => None,
        Destination::Random => {
            if ids.len() == 1 {
                return current;
            }
            // Uniform over every index except the current one.
            let excluded = (0..len).contains(&index);
            let span = if excluded { len - 1 } else { len };
            let mut pick = rng.gen_range(0..span);
            if excluded && pick >= index {
                pick += 1;
            }
            Some(pick)
        }
    };

    match target {
        Some(i) => EpisodePointer::At(ids[i as usize]),
        None => EpisodePointer::Finished,
    }
}

/// Move `item`'s pointer. Returns `true` when it changed.
pub fn navigate<R: Rng + ?Sized>(item: &mut Item, destination: Destination, rng: &mut R) -> bool {
    let next = resolve(item.episode_ids(), item.current_episode, destination, rng);
    let changed = next != item.current_episode;
    item.current_episode = next;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn nav(ids: &[i64], current: EpisodePointer, destination: Destination) -> EpisodePointer {
        resolve(ids, current, destination, &mut rng())
    }

    #[test]
    fn test_next_walks_to_finished() {
        let ids = [1, 2];
        let p = nav(&ids, EpisodePointer::At(1), Destination::Next);
        assert_eq!(p, EpisodePointer::At(2));
        let p = nav(&ids, p, Destination::Next);
        assert_eq!(p, EpisodePointer::Finished);
        let p = nav(&ids, p, Destination::Next);
        assert_eq!(p, EpisodePointer::Finished);
    }

    #[test]
    fn test_zero_episodes() {
        let p = nav(&[], EpisodePointer::At(4), Destination::Prev);
        assert_eq!(p, EpisodePointer::BeforeStart);
        let p = nav(&[], p, Destination::Prev);
        assert_eq!(p, EpisodePointer::BeforeStart);
        assert_eq!(
            nav(&[], EpisodePointer::BeforeStart, Destination::Next),
            EpisodePointer::Finished
        );
        assert_eq!(
            nav(&[], EpisodePointer::BeforeStart, Destination::Finished),
            EpisodePointer::Finished
        );
        assert_eq!(
            nav(&[], EpisodePointer::Finished, Destination::Random),
            EpisodePointer::Finished
        );
    }

    #[test]
    fn test_prev_clamps_at_first() {
        let ids = [1, 2, 3];
        assert_eq!(
            nav(&ids, EpisodePointer::At(1), Destination::Prev),
            EpisodePointer::At(1)
        );
    }

    #[test]
    fn test_before_start_counts_as_past_end() {
        let ids = [1, 2, 3];
        assert_eq!(
            nav(&ids, EpisodePointer::BeforeStart, Destination::Prev),
            EpisodePointer::At(3)
        );
        assert_eq!(
            nav(&ids, EpisodePointer::BeforeStart, Destination::Next),
            EpisodePointer::Finished
        );
        assert_eq!(
            nav(&ids, EpisodePointer::Finished, Destination::First),
            EpisodePointer::At(1)
        );
    }

    #[test]
    fn test_unknown_id_counts_as_before_first() {
        let ids = [1, 2, 3];
        assert_eq!(
            nav(&ids, EpisodePointer::At(99), Destination::Next),
            EpisodePointer::At(1)
        );
        assert_eq!(
            nav(&ids, EpisodePointer::At(99), Destination::Prev),
            EpisodePointer::At(1)
        );
    }

    #[test]
    fn test_random_never_repeats_current() {
        let ids = [1, 2, 3, 4];
        let mut rng = rng();
        for _ in 0..200 {
            let p = resolve(&ids, EpisodePointer::At(3), Destination::Random, &mut rng);
            assert_ne!(p, EpisodePointer::At(3));
            assert!(matches!(p, EpisodePointer::At(id) if ids.contains(&id)));
        }
    }

    #[test]
    fn test_random_reaches_every_other_episode() {
        let ids = [1, 2, 3];
        let mut rng = rng();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(resolve(&ids, EpisodePointer::At(1), Destination::Random, &mut rng));
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_random_with_one_episode_is_noop() {
        assert_eq!(
            nav(&[5], EpisodePointer::At(5), Destination::Random),
            EpisodePointer::At(5)
        );
        assert_eq!(
            nav(&[5], EpisodePointer::BeforeStart, Destination::Random),
            EpisodePointer::BeforeStart
        );
    }
}
