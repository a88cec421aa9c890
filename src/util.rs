use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Truncates `label` to at most `max_chars` characters, appending an ellipsis when cut.
pub fn short_label(label: &str, max_chars: usize) -> std::borrow::Cow<'_, str> {
    if max_chars == 0 {
        return std::borrow::Cow::Borrowed("");
    }

    match label.char_indices().nth(max_chars) {
        None => std::borrow::Cow::Borrowed(label),
        Some(_) => {
            let keep = max_chars.saturating_sub(1);
            let cut = label
                .char_indices()
                .nth(keep)
                .map(|(offset, _)| offset)
                .unwrap_or(label.len());
            std::borrow::Cow::Owned(format!("{}…", &label[..cut]))
        }
    }
}

/// Deterministic pair in `[-1, 1]` derived from `id`.
pub fn stable_pair(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    let x = ((hash & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    let y = (((hash >> 32) & 0xffff_ffff) as f64 / u32::MAX as f64) as f32;
    ((x * 2.0) - 1.0, (y * 2.0) - 1.0)
}

pub fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
