use xxhash_rust::xxh3::Xxh3;

/// Hash a sequence of parts with xxh3 so digests are stable across builds and platforms.
///
/// Each part is length-prefixed so `["ab", "c"]` and `["a", "bc"]` never collide.
pub fn stable_hash_parts<'a, I>(parts: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Xxh3::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hasher.digest()
}

pub fn stable_hash_str(value: &str) -> u64 {
    stable_hash_parts([value])
}
