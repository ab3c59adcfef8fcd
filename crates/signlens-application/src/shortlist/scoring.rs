//! Stage B: heuristic scoring of vocabulary entries against Stage A features.

use signlens_core::translation::ShortlistFeatures;
use signlens_core::vocabulary::VocabularyEntry;

const EXACT_LABEL: u32 = 6;
const LABEL_MENTION: u32 = 2;
const HAND_SHAPE: u32 = 3;
const LOCATION: u32 = 2;
const MOTION: u32 = 2;

fn keywords(raw: &[String]) -> impl Iterator<Item = String> + '_ {
    raw.iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
}

/// Scores one entry. Blank keywords never match.
pub fn score(entry: &VocabularyEntry, features: &ShortlistFeatures) -> u32 {
    let haystack = entry.haystack();
    let name = entry.sign_name.to_lowercase();
    let hits = |raw: &[String], weight: u32| -> u32 {
        keywords(raw).filter(|k| haystack.contains(k.as_str())).count() as u32 * weight
    };

    let labels: u32 = keywords(&features.candidate_labels)
        .map(|label| {
            if label == name {
                EXACT_LABEL
            } else if haystack.contains(label.as_str()) {
                LABEL_MENTION
            } else {
                0
            }
        })
        .sum();

    labels
        + hits(&features.hand_shape_keywords, HAND_SHAPE)
        + hits(&features.location_keywords, LOCATION)
        + hits(&features.motion_keywords, MOTION)
}

/// Picks up to `limit` entries with a positive score, best first.
///
/// Ties keep vocabulary order. When nothing scores, the first `limit`
/// entries are returned as-is, so the result is empty only for an empty
/// vocabulary (or a zero limit).
pub fn shortlist(
    vocabulary: &[VocabularyEntry],
    features: &ShortlistFeatures,
    limit: usize,
) -> Vec<VocabularyEntry> {
    let mut ranked: Vec<(u32, &VocabularyEntry)> = vocabulary
        .iter()
        .map(|entry| (score(entry, features), entry))
        .filter(|(score, _)| *score > 0)
        .collect();

    if ranked.is_empty() {
        return vocabulary.iter().take(limit).cloned().collect();
    }

    // Stable sort: equal scores stay in vocabulary order.
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked
        .into_iter()
        .take(limit)
        .map(|(_, entry)| entry.clone())
        .collect()
}
