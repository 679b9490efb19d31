// Diesel table definitions, kept in sync with migrations/sqlite.

diesel::table! {
    articles (content_id) {
        content_id -> Text,
        title -> Text,
        author_name -> Text,
        author_alias -> Nullable<Text>,
        likes_count -> Integer,
        comments_count -> Integer,
        engagement_score -> Double,
        published_at -> Nullable<Text>,
        article_url -> Nullable<Text>,
        description -> Text,
        first_seen -> Text,
        last_updated -> Text,
    }
}

diesel::table! {
    engagement_history (id) {
        id -> Integer,
        content_id -> Text,
        likes_count -> Integer,
        comments_count -> Integer,
        engagement_score -> Double,
        snapshot_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(articles, engagement_history);
