use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, QueryBuilder, Row};

use crate::model::{document_id, merge_patch, project, Collection, Document};
use crate::query::{Filter, FindOptions, Literal, Predicate, SortDirection};
use crate::store::traits::{DocumentStore, Store};

/// Documents live in one JSONB table keyed by (collection, id). Filters and
/// sort keys become parameterized `#>` path expressions, so field names from
/// the query string never reach the SQL text.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn field_path(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, collection: Collection, filter: &Filter) {
    builder.push(" WHERE collection = ");
    builder.push_bind(collection.as_str());
    for (field, predicate) in filter.iter() {
        builder.push(" AND ");
        push_predicate(builder, field, predicate);
    }
}

fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, field: &str, predicate: &Predicate) {
    let path = field_path(field);
    match predicate {
        Predicate::Equals(literal) => push_membership(builder, path, literal.candidates()),
        Predicate::In(literals) => {
            let candidates = literals.iter().flat_map(Literal::candidates).collect();
            push_membership(builder, path, candidates);
        }
        Predicate::Compare(comparison, literal) => {
            // Differently typed JSONB values still order; require equal types
            builder.push("(jsonb_typeof(data #> ");
            builder.push_bind(path.clone());
            builder.push("::text[]) = jsonb_typeof(");
            builder.push_bind(literal.value().clone());
            builder.push("::jsonb) AND data #> ");
            builder.push_bind(path);
            builder.push("::text[] ");
            builder.push(comparison.sql_operator());
            builder.push(" ");
            builder.push_bind(literal.value().clone());
            builder.push("::jsonb)");
        }
    }
}

/// Field equals one of `candidates`, or is an array containing one.
fn push_membership(builder: &mut QueryBuilder<'_, Postgres>, path: Vec<String>, candidates: Vec<Value>) {
    builder.push("EXISTS (SELECT 1 FROM jsonb_array_elements(");
    builder.push_bind(Value::Array(candidates));
    builder.push("::jsonb) AS candidate(v) WHERE data #> ");
    builder.push_bind(path.clone());
    builder.push("::text[] = candidate.v OR (jsonb_typeof(data #> ");
    builder.push_bind(path.clone());
    builder.push("::text[]) = 'array' AND data #> ");
    builder.push_bind(path);
    builder.push("::text[] @> jsonb_build_array(candidate.v)))");
}

fn decode_rows(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Document>> {
    rows.into_iter()
        .map(|row| {
            row.try_get::<Json<Document>, _>("data")
                .map(|json| json.0)
                .context("Failed to decode stored document")
        })
        .collect()
}

#[async_trait::async_trait]
impl DocumentStore for PostgresStore {
    async fn find(&self, collection: Collection, options: &FindOptions) -> Result<Vec<Document>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT data FROM documents");
        push_scope(&mut builder, collection, &options.filter);

        if !options.sort.is_empty() {
            builder.push(" ORDER BY ");
            let mut keys = builder.separated(", ");
            for key in &options.sort {
                keys.push("data #> ");
                keys.push_bind_unseparated(field_path(&key.field));
                keys.push_unseparated(match key.direction {
                    SortDirection::Ascending => "::text[] ASC NULLS LAST",
                    SortDirection::Descending => "::text[] DESC NULLS LAST",
                });
            }
        }
        builder.push(" OFFSET ");
        builder.push_bind(i64::try_from(options.skip).unwrap_or(i64::MAX));
        if let Some(limit) = options.limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to query {}", collection))?;

        let documents = decode_rows(rows)?;
        Ok(match &options.projection {
            Some(fields) => documents.iter().map(|document| project(document, fields)).collect(),
            None => documents,
        })
    }

    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch {} {}", collection, id))?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(decode_rows(vec![row])?.pop())
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM documents");
        push_scope(&mut builder, collection, filter);

        let row = builder
            .build()
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", collection))?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }

    async fn insert(&self, collection: Collection, document: Document) -> Result<Document> {
        let id = document_id(&document)
            .ok_or_else(|| anyhow!("Document inserted into {} has no id", collection))?
            .to_string();

        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection.as_str())
            .bind(&id)
            .bind(Json(&document))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to insert {} {}", collection, id))?;

        Ok(document)
    }

    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<Option<Document>> {
        let mut tx = self.pool.begin().await.context("Failed to start transaction")?;

        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .with_context(|| format!("Failed to lock {} {}", collection, id))?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut document = row.try_get::<Json<Document>, _>("data")?.0;
        merge_patch(&mut document, patch);

        sqlx::query("UPDATE documents SET data = $3 WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .bind(Json(&document))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to update {} {}", collection, id))?;
        tx.commit().await.context("Failed to commit update")?;

        Ok(Some(document))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete {} {}", collection, id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM documents");
        push_scope(&mut builder, collection, filter);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete from {}", collection))?;
        Ok(result.rows_affected())
    }

    async fn find_within_radius(
        &self,
        collection: Collection,
        field: &str,
        latitude: f64,
        longitude: f64,
        radius: f64,
    ) -> Result<Vec<Document>> {
        let mut lat_path = field_path(field);
        lat_path.extend(["coordinates".to_string(), "1".to_string()]);
        let mut lng_path = field_path(field);
        lng_path.extend(["coordinates".to_string(), "0".to_string()]);

        let rows = sqlx::query(
            r#"
            SELECT data FROM (
                SELECT data,
                    CASE WHEN jsonb_typeof(data #> $2::text[]) = 'number'
                        THEN (data #>> $2::text[])::float8 END AS lat,
                    CASE WHEN jsonb_typeof(data #> $3::text[]) = 'number'
                        THEN (data #>> $3::text[])::float8 END AS lng
                FROM documents
                WHERE collection = $1
            ) AS located
            WHERE lat IS NOT NULL AND lng IS NOT NULL
              AND 2 * asin(least(1.0, sqrt(
                    power(sin(radians(lat - $4) / 2), 2)
                    + cos(radians($4)) * cos(radians(lat)) * power(sin(radians(lng - $5) / 2), 2)
                  ))) <= $6
            "#,
        )
        .bind(collection.as_str())
        .bind(lat_path)
        .bind(lng_path)
        .bind(latitude)
        .bind(longitude)
        .bind(radius)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed radius search on {}", collection))?;

        decode_rows(rows)
    }
}

impl Store for PostgresStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{translate, Comparison};

    #[test]
    fn test_filter_sql_is_parameterized() {
        let descriptor = translate([
            ("name", "x'); DROP TABLE documents; --"),
            ("averageCost[lte]", "10000"),
        ])
        .unwrap();

        let mut builder = QueryBuilder::<Postgres>::new("SELECT data FROM documents");
        push_scope(&mut builder, Collection::Bootcamps, &descriptor.filter);
        let sql = builder.sql();

        assert!(!sql.contains("DROP TABLE"));
        assert!(sql.contains("<= $"));
        assert!(sql.starts_with("SELECT data FROM documents WHERE collection = $1 AND "));
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(Comparison::Gt.sql_operator(), ">");
        assert_eq!(Comparison::Lte.sql_operator(), "<=");
        assert_eq!(field_path("location.city"), vec!["location", "city"]);
    }
}
