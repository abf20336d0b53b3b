// Mirrors migrations/schema.sql.

diesel::table! {
    users (id) {
        id -> Integer,
        role -> Text,
        name -> Text,
        phone -> Text,
        city -> Text,
        email -> Text,
        password_hash -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    jobs (id) {
        id -> Integer,
        owner_id -> Integer,
        service_type -> Text,
        city -> Text,
        district -> Text,
        address_note -> Text,
        ac_type -> Text,
        units -> Integer,
        floor -> Text,
        urgent -> Bool,
        time_window -> Text,
        description -> Text,
        status -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    proposals (id) {
        id -> Integer,
        job_id -> Integer,
        provider_id -> Integer,
        price -> Integer,
        available_time -> Text,
        warranty -> Text,
        note -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    provider_profiles (id) {
        id -> Integer,
        user_id -> Integer,
        display_name -> Text,
        shop_name -> Text,
        city -> Text,
        specialties -> Text,
        bio -> Text,
        verified_identity -> Bool,
        verified_business -> Bool,
        verified_license -> Bool,
        verified_at -> Nullable<Timestamp>,
        identity_doc_url -> Text,
        business_doc_url -> Text,
        license_doc_url -> Text,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    provider_portfolio (id) {
        id -> Integer,
        user_id -> Integer,
        image_url -> Text,
        service_type -> Text,
        caption -> Text,
        created_at -> Timestamp,
    }
}

diesel::joinable!(jobs -> users (owner_id));
diesel::joinable!(proposals -> jobs (job_id));
diesel::joinable!(proposals -> users (provider_id));
diesel::joinable!(provider_profiles -> users (user_id));
diesel::joinable!(provider_portfolio -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    jobs,
    proposals,
    provider_portfolio,
    provider_profiles,
    users,
);
