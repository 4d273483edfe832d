//! Episode and item ordering, and display buckets.

use std::cmp::Ordering;

use crate::models::{Episode, EpisodePointer, Item};
use crate::normalize::base_cmp;

/// Which display list an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Unfinished,
    Finished,
    Archived,
}

pub fn bucket_of(item: &Item) -> Bucket {
    if item.is_archived {
        Bucket::Archived
    } else if item.current_episode == EpisodePointer::Finished {
        Bucket::Finished
    } else {
        Bucket::Unfinished
    }
}

/// Playback order: `order_num`, `released_on`, `season_num`, `episode_num`,
/// then filename (or name) ignoring case and accents, then id.
/// Missing values sort first.
pub fn compare_episodes(a: &Episode, b: &Episode) -> Ordering {
    a.order_num
        .cmp(&b.order_num)
        .then_with(|| a.released_on.cmp(&b.released_on))
        .then_with(|| a.season_num.cmp(&b.season_num))
        .then_with(|| a.episode_num.cmp(&b.episode_num))
        .then_with(|| cmp_text(episode_label(a), episode_label(b)))
        .then_with(|| a.id.cmp(&b.id))
}

fn episode_label(episode: &Episode) -> Option<&str> {
    episode.filename.as_deref().or(episode.name.as_deref())
}

fn cmp_text(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => base_cmp(a, b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

/// Display order: most recently watched first (never-watched last), then
/// alpha name, then creation time, then id.
pub fn compare_items(a: &Item, b: &Item) -> Ordering {
    let watched = |item: &Item| item.last_watched_at.filter(|t| *t > 0);
    match (watched(a), watched(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| base_cmp(a.alpha_name(), b.alpha_name()))
    .then_with(|| a.created_at.cmp(&b.created_at))
    .then_with(|| a.id.cmp(&b.id))
}

/// Re-sort an item's episode list, reversed when the item asks for it.
pub fn sort_episodes(item: &mut Item) {
    let mut episodes: Vec<&Episode> = item.episodes().collect();
    episodes.sort_by(|a, b| compare_episodes(a, b));
    let mut ids: Vec<i64> = episodes.iter().filter_map(|e| e.id).collect();
    if item.order_is_reversed {
        ids.reverse();
    }
    item.set_episode_order(ids);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemRecord, ItemType, Source};

    fn ep(id: i64, season: Option<i64>, episode: Option<i64>, filename: Option<&str>) -> Episode {
        Episode {
            id: Some(id),
            item_id: 1,
            season_num: season,
            episode_num: episode,
            filename: filename.map(String::from),
            ..Default::default()
        }
    }

    fn item(name: &str, id: i64) -> Item {
        let mut item = Item::from_record(ItemRecord {
            name: Some(name.into()),
            ..ItemRecord::new(ItemType::Show, Source::External)
        });
        item.id = Some(id);
        item
    }

    #[test]
    fn test_episode_order_by_numbers() {
        let a = ep(1, Some(1), Some(2), None);
        let b = ep(2, Some(1), Some(10), None);
        let c = ep(3, Some(2), Some(1), None);
        assert_eq!(compare_episodes(&a, &b), Ordering::Less);
        assert_eq!(compare_episodes(&b, &c), Ordering::Less);
        assert_eq!(compare_episodes(&a, &c), Ordering::Less);
    }

    #[test]
    fn test_missing_numbers_sort_first() {
        let unnumbered = ep(5, None, None, Some("extras.mkv"));
        let numbered = ep(1, Some(1), Some(1), None);
        assert_eq!(compare_episodes(&unnumbered, &numbered), Ordering::Less);
    }

    #[test]
    fn test_filename_tiebreak_ignores_case_and_accents() {
        let a = ep(2, None, None, Some("épisode b.mkv"));
        let b = ep(1, None, None, Some("Episode C.mkv"));
        assert_eq!(compare_episodes(&a, &b), Ordering::Less);

        let same_a = ep(1, None, None, Some("Été.mkv"));
        let same_b = ep(2, None, None, Some("ete.mkv"));
        assert_eq!(compare_episodes(&same_a, &same_b), Ordering::Less);
    }

    #[test]
    fn test_order_num_dominates() {
        let mut a = ep(1, Some(9), Some(9), None);
        let mut b = ep(2, Some(1), Some(1), None);
        a.order_num = Some(0);
        b.order_num = Some(1);
        assert_eq!(compare_episodes(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_sort_is_idempotent_and_reversible() {
        let mut show = item("Foo", 1);
        for e in [
            ep(3, Some(1), Some(3), None),
            ep(1, Some(1), Some(1), None),
            ep(2, Some(1), Some(2), None),
        ] {
            show.insert_episode(e);
        }
        sort_episodes(&mut show);
        assert_eq!(show.episode_ids(), &[1, 2, 3]);
        sort_episodes(&mut show);
        assert_eq!(show.episode_ids(), &[1, 2, 3]);

        show.order_is_reversed = true;
        sort_episodes(&mut show);
        assert_eq!(show.episode_ids(), &[3, 2, 1]);
    }

    #[test]
    fn test_items_recently_watched_first() {
        let mut a = item("Zed", 1);
        let b = item("Alpha", 2);
        let mut c = item("Mid", 3);
        a.last_watched_at = Some(200);
        c.last_watched_at = Some(100);
        let mut items = [b.clone(), c.clone(), a.clone()];
        items.sort_by(compare_items);
        let names: Vec<&str> = items.iter().map(|i| i.name()).collect();
        assert_eq!(names, ["Zed", "Mid", "Alpha"]);
    }

    #[test]
    fn test_items_alpha_name_ignores_articles() {
        let a = item("The Wire", 1);
        let b = item("Veep", 2);
        assert_eq!(compare_items(&b, &a), Ordering::Less);
    }

    #[test]
    fn test_items_zero_watched_counts_as_never() {
        let mut a = item("Alpha", 1);
        let mut b = item("Beta", 2);
        a.last_watched_at = Some(0);
        b.last_watched_at = None;
        assert_eq!(compare_items(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_bucket_of() {
        let mut show = item("Foo", 1);
        assert_eq!(bucket_of(&show), Bucket::Unfinished);
        show.current_episode = EpisodePointer::Finished;
        assert_eq!(bucket_of(&show), Bucket::Finished);
        show.is_archived = true;
        assert_eq!(bucket_of(&show), Bucket::Archived);
    }
}
