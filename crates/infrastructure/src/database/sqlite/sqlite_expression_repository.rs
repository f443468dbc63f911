use async_trait::async_trait;
use calc_core::{
    Expression, ExpressionRepository, ExpressionStatus, SchedulerError, SchedulerResult,
};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

const SELECT_COLUMNS: &str = "id, source, status, result, tree, created_at, updated_at";

pub struct SqliteExpressionRepository {
    pool: SqlitePool,
}

impl SqliteExpressionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_expression(row: &SqliteRow) -> SchedulerResult<Expression> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<ExpressionStatus>()
            .map_err(SchedulerError::database_error)?;

        Ok(Expression {
            id: row.try_get("id")?,
            source: row.try_get("source")?,
            status,
            result: row.try_get("result")?,
            tree: row.try_get("tree")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ExpressionRepository for SqliteExpressionRepository {
    #[instrument(skip(self, expression), fields(source = %expression.source))]
    async fn create(&self, expression: &Expression) -> SchedulerResult<Expression> {
        let sql = format!(
            "INSERT INTO expressions (source, status, result, tree, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&expression.source)
            .bind(expression.status.to_string())
            .bind(expression.result)
            .bind(expression.tree.as_deref())
            .bind(expression.created_at)
            .bind(expression.updated_at)
            .fetch_one(&self.pool)
            .await?;

        let created = Self::row_to_expression(&row)?;
        debug!(expression_id = created.id, "stored expression");
        Ok(created)
    }

    #[instrument(skip(self), fields(expression_id = %id))]
    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Expression>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM expressions WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_expression).transpose()
    }

    #[instrument(skip(self))]
    async fn list(&self) -> SchedulerResult<Vec<Expression>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM expressions ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(Self::row_to_expression).collect()
    }

    #[instrument(skip(self), fields(expression_id = %id, status = %status))]
    async fn update_status(
        &self,
        id: i64,
        status: &ExpressionStatus,
        result: f64,
    ) -> SchedulerResult<()> {
        let outcome =
            sqlx::query("UPDATE expressions SET status = ?, result = ?, updated_at = ? WHERE id = ?")
                .bind(status.to_string())
                .bind(result)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if outcome.rows_affected() == 0 {
            return Err(SchedulerError::expression_not_found(id));
        }
        Ok(())
    }

    #[instrument(skip(self, tree), fields(expression_id = %id))]
    async fn save_tree(&self, id: i64, tree: Option<&[u8]>) -> SchedulerResult<()> {
        let outcome = sqlx::query("UPDATE expressions SET tree = ?, updated_at = ? WHERE id = ?")
            .bind(tree)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if outcome.rows_affected() == 0 {
            return Err(SchedulerError::expression_not_found(id));
        }
        Ok(())
    }

    async fn health_check(&self) -> SchedulerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
