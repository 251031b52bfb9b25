//! Trailing window of user/assistant exchanges injected as prompt context.

use crate::types::{ChatTurn, Role};

/// Select the last `max_pairs` complete user/assistant pairs from `history`.
///
/// Turns with other roles are dropped first. The remaining turns are walked two
/// at a time from the start; a slot whose first turn is not `user` or whose
/// second turn is not `assistant` is discarded as a whole and the walk does
/// not re-align. Two consecutive user turns therefore cost the exchange that
/// follows them. Callers rely on this pairing, so keep it stable.
///
/// An unpaired trailing turn (the question being answered) never appears in
/// the output. `max_pairs <= 0` disables history.
pub fn window(history: &[ChatTurn], max_pairs: i64) -> Vec<ChatTurn> {
    if max_pairs <= 0 || history.is_empty() {
        return Vec::new();
    }

    let relevant: Vec<&ChatTurn> = history
        .iter()
        .filter(|turn| turn.role.is_conversational())
        .collect();

    let pairs: Vec<[&ChatTurn; 2]> = relevant
        .chunks_exact(2)
        .filter(|slot| slot[0].role == Role::User && slot[1].role == Role::Assistant)
        .map(|slot| [slot[0], slot[1]])
        .collect();

    let keep = usize::try_from(max_pairs).unwrap_or(usize::MAX);
    let start = pairs.len().saturating_sub(keep);

    pairs[start..]
        .iter()
        .flat_map(|pair| pair.iter().map(|turn| (*turn).clone()))
        .collect()
}
