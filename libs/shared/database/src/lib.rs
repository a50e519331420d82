pub mod query;
pub mod supabase;

pub use query::PostgrestQuery;
pub use supabase::{SupabaseClient, SupabaseError};
