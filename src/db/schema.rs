table! {
    publisher_records (id) {
        id -> Int4,
        content_type -> Varchar,
        is_draft -> Bool,
        linked -> Nullable<Int4>,
        modified_at -> Timestamp,
        published_at -> Nullable<Timestamp>,
        publication_start -> Nullable<Timestamp>,
        publication_end -> Nullable<Timestamp>,
        fields -> Jsonb,
    }
}

table! {
    publisher_requests (id) {
        id -> Int4,
        action -> crate::db::types::Request_action,
        state -> crate::db::types::Request_state,
        target_type -> Varchar,
        target_id -> Int4,
        request_timestamp -> Timestamp,
        request_user -> Int4,
        request_note -> Nullable<Text>,
        response_timestamp -> Nullable<Timestamp>,
        response_user -> Nullable<Int4>,
        response_note -> Nullable<Text>,
    }
}

allow_tables_to_appear_in_same_query!(
    publisher_records,
    publisher_requests,
);
