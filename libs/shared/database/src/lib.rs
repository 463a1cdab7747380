pub mod supabase;

pub use supabase::{SortOrder, SupabaseClient};
