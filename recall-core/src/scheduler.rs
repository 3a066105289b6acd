//! Choosing what to quiz next.
//!
//! The most urgent key is the learned one with the lowest predicted recall
//! right now. Unlearned keys never come up.

use chrono::{DateTime, Utc};

use crate::facts::Key;
use crate::recall::RecallModel;

/// Learned keys with their predicted recall, most urgent first.
///
/// The sort is stable: keys with equal recall keep their input order.
pub fn rank<'a>(
    models: &'a [(Key, Option<RecallModel>)],
    now: DateTime<Utc>,
) -> Vec<(&'a Key, f64)> {
    let mut ranked: Vec<(&Key, f64)> = models
        .iter()
        .filter_map(|(key, model)| model.as_ref().map(|m| (key, m.predict_recall(now))))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked
}

/// The learned key with the lowest predicted recall, first in input order on ties.
pub fn select_next(models: &[(Key, Option<RecallModel>)], now: DateTime<Utc>) -> Option<Key> {
    let mut best: Option<(&Key, f64)> = None;
    for (key, model) in models {
        let Some(model) = model else { continue };
        let recall = model.predict_recall(now);
        match best {
            Some((_, lowest)) if recall >= lowest => {}
            _ => best = Some((key, recall)),
        }
    }
    best.map(|(key, _)| key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recall::Strength;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    /// Model whose predicted recall at `now()` is the Beta mean `a / (a + b)`.
    fn at_mean(a: f64, b: f64) -> Option<RecallModel> {
        Some(RecallModel {
            strength: Strength::new(a, b, 1.0).unwrap(),
            last_seen: now() - Duration::hours(1),
        })
    }

    fn key(s: &str) -> Key {
        Key::from_raw(format!("model/{s}/meaning"))
    }

    #[test]
    fn test_picks_lowest_recall_and_skips_unknown() {
        let models = vec![
            (key("A"), None),
            (key("B"), at_mean(9.0, 1.0)),
            (key("C"), at_mean(3.0, 7.0)),
        ];
        assert_eq!(select_next(&models, now()), Some(key("C")));
    }

    #[test]
    fn test_nothing_learned() {
        assert_eq!(select_next(&[], now()), None);
        let models = vec![(key("A"), None), (key("B"), None)];
        assert_eq!(select_next(&models, now()), None);
    }

    #[test]
    fn test_ties_go_to_first() {
        let models = vec![
            (key("A"), at_mean(5.0, 5.0)),
            (key("B"), at_mean(5.0, 5.0)),
        ];
        assert_eq!(select_next(&models, now()), Some(key("A")));
        let reversed = vec![models[1].clone(), models[0].clone()];
        assert_eq!(select_next(&reversed, now()), Some(key("B")));
    }

    #[test]
    fn test_deterministic() {
        let models = vec![
            (key("A"), at_mean(4.0, 6.0)),
            (key("B"), at_mean(2.0, 8.0)),
        ];
        let first = select_next(&models, now());
        for _ in 0..10 {
            assert_eq!(select_next(&models, now()), first);
        }
    }

    #[test]
    fn test_rank_orders_and_agrees_with_select() {
        let models = vec![
            (key("A"), at_mean(5.0, 5.0)),
            (key("B"), None),
            (key("C"), at_mean(1.0, 9.0)),
            (key("D"), at_mean(5.0, 5.0)),
        ];
        let ranked: Vec<&str> = rank(&models, now())
            .into_iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(
            ranked,
            vec!["model/C/meaning", "model/A/meaning", "model/D/meaning"]
        );
        assert_eq!(
            select_next(&models, now()).as_ref(),
            rank(&models, now()).first().map(|(k, _)| *k)
        );
    }
}
