use super::*;

/// Persistence surface for the share pipeline. Both writers return whether
/// the (height, header, nonce) triple was already on record, so callers can
/// classify duplicates.
#[async_trait]
pub(crate) trait ShareStore: Send + Sync {
    async fn write_share(
        &self,
        login: &str,
        worker: &str,
        params: &[String],
        share_difficulty: u64,
        height: u64,
        expiry: Duration,
    ) -> Result<bool>;

    async fn write_block(
        &self,
        login: &str,
        worker: &str,
        params: &[String],
        share_difficulty: u64,
        block_difficulty: U256,
        height: u64,
        expiry: Duration,
    ) -> Result<bool>;
}

pub(crate) struct Database {
    pool: PgPool,
}

impl Database {
    pub(crate) async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .context("failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Drops shares past their hashrate-window expiry. Blocks are kept
    /// forever.
    pub(crate) async fn prune_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM shares WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ShareStore for Database {
    async fn write_share(
        &self,
        login: &str,
        worker: &str,
        params: &[String],
        share_difficulty: u64,
        height: u64,
        expiry: Duration,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO shares (login, worker, height, header_hash, nonce, difficulty, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW() + make_interval(secs => $7))
            ON CONFLICT (height, header_hash, nonce) DO NOTHING
            "#,
        )
        .bind(login)
        .bind(worker)
        .bind(i64::try_from(height)?)
        .bind(&params[1])
        .bind(&params[0])
        .bind(i64::try_from(share_difficulty)?)
        .bind(expiry.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 0)
    }

    async fn write_block(
        &self,
        login: &str,
        worker: &str,
        params: &[String],
        share_difficulty: u64,
        block_difficulty: U256,
        height: u64,
        expiry: Duration,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO shares (login, worker, height, header_hash, nonce, difficulty, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW() + make_interval(secs => $7))
            ON CONFLICT (height, header_hash, nonce) DO NOTHING
            "#,
        )
        .bind(login)
        .bind(worker)
        .bind(i64::try_from(height)?)
        .bind(&params[1])
        .bind(&params[0])
        .bind(i64::try_from(share_difficulty)?)
        .bind(expiry.as_secs_f64())
        .execute(&mut *tx)
        .await?;

        let exists = result.rows_affected() == 0;

        if !exists {
            sqlx::query(
                r#"
                INSERT INTO blocks (login, worker, height, header_hash, nonce, difficulty)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (height, header_hash, nonce) DO NOTHING
                "#,
            )
            .bind(login)
            .bind(worker)
            .bind(i64::try_from(height)?)
            .bind(&params[1])
            .bind(&params[0])
            .bind(format!("0x{}", hex::encode(block_difficulty.to_big_endian())))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(exists)
    }
}
