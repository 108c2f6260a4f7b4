//! Diesel table definitions.

diesel::table! {
    stories (story_id) {
        story_id -> Uuid,
        title -> Text,
        prompt -> Text,
        user_id -> Nullable<Text>,
        status -> Text,
        error -> Nullable<Text>,
        story_metadata -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    scenes (scene_id) {
        scene_id -> Uuid,
        story_id -> Uuid,
        sequence -> Int4,
        title -> Text,
        text -> Text,
        image_prompt -> Text,
        image_url -> Nullable<Text>,
        audio_url -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(scenes -> stories (story_id));
diesel::allow_tables_to_appear_in_same_query!(stories, scenes);
