//! KV key conventions. These strings are compatibility-sensitive: other
//! consumers of the cache address the same keys.

pub const POST_VIEW_COUNT_PREFIX: &str = "post_view_count:";
pub const POST_VIEW_BLOOM_PREFIX: &str = "post_view_bloom:";
pub const POST_RANK_KEY: &str = "post_rank";
pub const HOT_POST_RANK_KEY: &str = "hot_post_rank";
pub const POSTS_HASH_KEY: &str = "posts";
pub const POST_DETAIL_PREFIX: &str = "post_detail:";
pub const POST_DETAIL_TEMP_PREFIX: &str = "post_detail:temp:";

pub fn view_count_key(post_id: i64) -> String {
    format!("{POST_VIEW_COUNT_PREFIX}{post_id}")
}

pub fn bloom_key(post_id: i64) -> String {
    format!("{POST_VIEW_BLOOM_PREFIX}{post_id}")
}

pub fn detail_key(post_id: i64) -> String {
    format!("{POST_DETAIL_PREFIX}{post_id}")
}

pub fn detail_temp_key(post_id: i64) -> String {
    format!("{POST_DETAIL_TEMP_PREFIX}{post_id}")
}

pub fn summary_temp_key(nanos: u128) -> String {
    format!("{POSTS_HASH_KEY}_temp_{nanos}")
}

pub fn parse_view_count_key(key: &str) -> Option<i64> {
    key.strip_prefix(POST_VIEW_COUNT_PREFIX)?.parse().ok()
}

/// Post id of a final (non-temp) detail key.
pub fn parse_detail_key(key: &str) -> Option<i64> {
    if key.starts_with(POST_DETAIL_TEMP_PREFIX) {
        return None;
    }
    key.strip_prefix(POST_DETAIL_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_count_keys_round_trip() {
        assert_eq!(parse_view_count_key(&view_count_key(123)), Some(123));
        assert_eq!(parse_view_count_key("post_view_count:garbage"), None);
        assert_eq!(parse_view_count_key("other:123"), None);
    }

    #[test]
    fn detail_keys_exclude_temp_namespace() {
        assert_eq!(parse_detail_key("post_detail:42"), Some(42));
        assert_eq!(parse_detail_key("post_detail:temp:42"), None);
        assert_eq!(parse_detail_key("post_detail:not-a-number"), None);
    }

    #[test]
    fn temp_keys_use_the_documented_shapes() {
        assert_eq!(detail_temp_key(7), "post_detail:temp:7");
        assert_eq!(summary_temp_key(1_000), "posts_temp_1000");
    }
}
