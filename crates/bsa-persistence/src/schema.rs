// Diesel schema de las tablas BSA y de las vistas del registro que consulta.
// Tablas: bsa_label, bsa_domain_in_use, registered_domain, reserved_domain,
// bsa_download, execution_lock
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    bsa_label (label) {
        label -> Text,
        creation_time_ts -> BigInt,
    }
}
diesel::table! {
    bsa_domain_in_use (label, tld) {
        label -> Text,
        tld -> Text,
        reason -> Text,
    }
}
diesel::table! {
    registered_domain (domain_name, creation_time_ts) {
        domain_name -> Text,
        creation_time_ts -> BigInt,
        deletion_time_ts -> BigInt,
    }
}
diesel::table! {
    reserved_domain (domain_name) {
        domain_name -> Text,
    }
}
diesel::table! {
    bsa_download (job_id) {
        job_id -> BigInt,
        creation_time_ts -> BigInt,
        update_time_ts -> BigInt,
        stage -> Text,
        block_list_checksums -> Text,
    }
}
diesel::table! {
    execution_lock (resource_name) {
        resource_name -> Text,
        owner -> Text,
        token -> Text,
        acquired_time_ts -> BigInt,
        expire_time_ts -> BigInt,
    }
}
allow_tables_to_appear_in_same_query!(bsa_label, bsa_domain_in_use);
