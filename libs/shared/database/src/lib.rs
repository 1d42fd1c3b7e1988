pub mod supabase;

pub use supabase::{is_not_found, is_unique_violation, SupabaseClient, SupabaseError};
