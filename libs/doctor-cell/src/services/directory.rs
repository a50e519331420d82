use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};

use crate::models::{DirectoryColumns, DirectoryError, DirectoryFilter, DoctorDirectorySchema, PublicDoctor};

const PROFILE_EMBED: &str = "profile:profiles!inner(nombre_completo,avatar_url,ciudad)";
const SPECIALTY_EMBED: &str = "specialty:specialties(id,name)";

/// Public listing of verified doctors over either schema generation.
pub struct DoctorDirectoryService {
    supabase: Arc<SupabaseClient>,
    schema: DoctorDirectorySchema,
}

impl DoctorDirectoryService {
    pub fn new(config: &AppConfig) -> Self {
        let schema = DoctorDirectorySchema::parse(&config.doctor_directory_schema).unwrap_or_default();
        Self::with_client(Arc::new(SupabaseClient::with_server_key(config)), schema)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, schema: DoctorDirectorySchema) -> Self {
        Self { supabase, schema }
    }

    pub fn build_query(&self, filter: &DirectoryFilter) -> PostgrestQuery {
        let cols = self.schema.columns();
        let select = format!(
            "id,{},{},{},{},{},{},{},{},{}",
            cols.profile_fk,
            cols.specialty_fk,
            cols.verified,
            cols.featured,
            cols.years_experience,
            cols.bio,
            cols.fee,
            PROFILE_EMBED,
            SPECIALTY_EMBED,
        );

        let mut query = PostgrestQuery::table(cols.table)
            .select(&select)
            .eq(cols.verified, true);

        if let Some(specialty_id) = filter.specialty_id {
            query = query.eq(cols.specialty_fk, specialty_id);
        }
        if filter.featured_only {
            query = query.eq(cols.featured, true);
        }

        query
            .order(cols.featured, false)
            .order_nulls_last(cols.years_experience, false)
            .limit(filter.limit)
    }

    pub async fn list(&self, filter: &DirectoryFilter) -> Result<Vec<PublicDoctor>, DirectoryError> {
        let query = self.build_query(filter);
        debug!("Listing public doctors from {}", query.table_name());

        let rows: Vec<Value> = self.supabase.select(&query, None).await?;
        let cols = self.schema.columns();

        Ok(rows.iter().filter_map(|row| normalize_row(row, &cols)).collect())
    }
}

fn uuid_field(row: &Value, key: &str) -> Option<Uuid> {
    row.get(key).and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

fn string_field(row: &Value, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Maps one row of either schema onto `PublicDoctor`. Rows without an id are
/// skipped.
fn normalize_row(row: &Value, cols: &DirectoryColumns) -> Option<PublicDoctor> {
    let id = uuid_field(row, "id")?;
    let profile = row.get("profile").cloned().unwrap_or(Value::Null);
    let specialty = row.get("specialty").cloned().unwrap_or(Value::Null);

    Some(PublicDoctor {
        id,
        profile_id: uuid_field(row, cols.profile_fk),
        nombre_completo: string_field(&profile, "nombre_completo").unwrap_or_default(),
        avatar_url: string_field(&profile, "avatar_url"),
        ciudad: string_field(&profile, "ciudad"),
        specialty_id: uuid_field(&specialty, "id").or_else(|| uuid_field(row, cols.specialty_fk)),
        specialty_name: string_field(&specialty, "name"),
        years_experience: row.get(cols.years_experience).and_then(Value::as_i64),
        bio: string_field(row, cols.bio),
        consultation_fee: row.get(cols.fee).and_then(Value::as_f64),
        featured: row.get(cols.featured).and_then(Value::as_bool).unwrap_or(false),
    })
}
