/// Read-through caching over [`crate::db::Cache`].
///
/// Evaluates to `Ok(value)` from the cache when `$key` is present. On a miss
/// the future `$block` is awaited, its value queued for a background write
/// with `$ttl` seconds to live, and returned. Errors from either step are
/// propagated with `?`, so the enclosing function must return
/// [`crate::error::AppResult`].
///
/// ```rust,ignore
/// let ids: Vec<MovieId> = cached!(cache, CacheKey::Popular(limit), ttl, async {
///     repository.popular_movies(limit).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        match $cache.get_from_cache(&key).await? {
            Some(hit) => {
                tracing::debug!(key = %key, "Cache hit");
                Ok(hit)
            }
            None => {
                let value = $block.await?;
                $cache.set_in_background(&key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
