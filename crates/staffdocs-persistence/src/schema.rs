//! Diesel table declarations matching `migrations/`.

diesel::table! {
    employees (id) {
        id -> Text,
        name -> Text,
        hired_at -> Date,
    }
}

diesel::table! {
    document_types (id) {
        id -> Text,
        name -> Text,
    }
}

diesel::table! {
    documents (id) {
        id -> Text,
        employee_id -> Text,
        document_type_id -> Text,
        pending -> Bool,
    }
}

diesel::joinable!(documents -> employees (employee_id));
diesel::joinable!(documents -> document_types (document_type_id));

diesel::allow_tables_to_appear_in_same_query!(employees, document_types, documents);
