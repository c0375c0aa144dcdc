diesel::table! {
    app_users (id) {
        id -> Text,
        display_name -> Text,
        avatar_url -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    projects (id) {
        id -> Text,
        name -> Text,
        description -> Nullable<Text>,
        owner_id -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    project_members (project_id, user_id) {
        project_id -> Text,
        user_id -> Text,
        joined_at -> Timestamptz,
    }
}

diesel::table! {
    tasks (id) {
        id -> Int8,
        project_id -> Text,
        content -> Text,
        status -> Text,
        assignee -> Nullable<Text>,
        due_date -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    chat_messages (id) {
        id -> Int8,
        project_id -> Text,
        user_id -> Text,
        user_name -> Text,
        content -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    invitations (id) {
        id -> Text,
        project_id -> Text,
        inviter_id -> Text,
        invitee_id -> Text,
        status -> Text,
        created_at -> Timestamptz,
        responded_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(project_members -> projects (project_id));
diesel::joinable!(project_members -> app_users (user_id));
diesel::joinable!(tasks -> projects (project_id));
diesel::joinable!(chat_messages -> projects (project_id));
diesel::joinable!(invitations -> projects (project_id));

diesel::allow_tables_to_appear_in_same_query!(
    app_users,
    projects,
    project_members,
    tasks,
    chat_messages,
    invitations,
);
