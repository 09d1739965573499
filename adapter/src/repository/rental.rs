use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_new::new;

use kernel::model::{
    id::{RentalId, UserId},
    rental::{
        event::{
            BeginCompletion, ConfirmReturn, CreateRental, FinalizeCompletion, SettlePayout,
            UpdatePayoutStatus, UpdateStatus,
        },
        Rental,
    },
};
use kernel::repository::rental::RentalRepository;
use shared::error::{AppError, AppResult};

use crate::database::{model::rental::RentalRow, ConnectionPool};

// items / users と JOIN して Rental を組み立てるための共通 SELECT
const SELECT_RENTAL: &str = r#"
    SELECT
        r.rental_id,
        r.item_id,
        i.item_name,
        i.owned_by AS owner_id,
        o.user_name AS owner_name,
        r.renter_id,
        u.user_name AS renter_name,
        r.status,
        r.start_date,
        r.end_date,
        r.total_price,
        r.fee_percent,
        r.owner_confirmed_return,
        r.renter_confirmed_return,
        r.auto_completed,
        r.completed_at,
        r.payout_eligible_at,
        r.auto_complete_at,
        r.payout_frozen,
        r.payout_status,
        r.payout_transfer_id,
        r.requested_at
    FROM rentals AS r
    INNER JOIN items AS i ON r.item_id = i.item_id
    INNER JOIN users AS o ON i.owned_by = o.user_id
    INNER JOIN users AS u ON r.renter_id = u.user_id
"#;

#[derive(new)]
pub struct RentalRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl RentalRepository for RentalRepositoryImpl {
    // レンタルリクエストを登録する
    async fn create(&self, event: CreateRental) -> AppResult<RentalId> {
        let mut tx = self.db.begin().await?;

        // トランザクション分離レベルを SERIALIZABLE に設定する
        self.set_transaction_serializable(&mut tx).await?;

        // 事前のチェックとして、以下を調べる。
        // - 指定のアイテム ID をもつアイテムが存在するか
        // - 存在した場合、受付中（is_active）か
        // - 希望期間が承認済み・進行中のレンタルと重なっていないか
        {
            let item_row: Option<(bool,)> =
                sqlx::query_as("SELECT is_active FROM items WHERE item_id = $1")
                    .bind(event.item_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(AppError::SpecificOperationError)?;

            let Some((is_active,)) = item_row else {
                return Err(AppError::EntityNotFound(format!(
                    "アイテム（{}）が見つかりませんでした。",
                    event.item_id
                )));
            };

            if !is_active {
                return Err(AppError::UnprocessableEntity(format!(
                    "アイテム（{}）は現在レンタルを受け付けていません。",
                    event.item_id
                )));
            }

            // 重複条件：existing.start < new.end AND new.start < existing.end
            let overlap: Option<(RentalId,)> = sqlx::query_as(
                r#"
                SELECT rental_id
                FROM rentals
                WHERE item_id = $1
                  AND status IN ('approved', 'active')
                  AND start_date < $3
                  AND $2 < end_date
                LIMIT 1
                "#,
            )
            .bind(event.item_id)
            .bind(event.start_date)
            .bind(event.end_date)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

            if overlap.is_some() {
                return Err(AppError::UnprocessableEntity(format!(
                    "アイテム（{}）は指定期間にすでにレンタルが存在します。",
                    event.item_id
                )));
            }
        }

        let rental_id = RentalId::new();
        let res = sqlx::query(
            r#"
            INSERT INTO rentals
            (rental_id, item_id, renter_id, status, start_date, end_date,
             total_price, fee_percent, requested_at)
            VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8)
            "#,
        )
        .bind(rental_id)
        .bind(event.item_id)
        .bind(event.rented_by)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(event.total_price)
        .bind(event.fee_percent)
        .bind(event.requested_at)
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No rental record has been created".into(),
            ));
        }

        tx.commit().await.map_err(AppError::TransactionError)?;

        Ok(rental_id)
    }

    async fn find_by_id(&self, rental_id: RentalId) -> AppResult<Rental> {
        let row: Option<RentalRow> =
            sqlx::query_as(&format!("{SELECT_RENTAL} WHERE r.rental_id = $1"))
                .bind(rental_id)
                .fetch_optional(self.db.inner_ref())
                .await
                .map_err(AppError::SpecificOperationError)?;

        row.ok_or_else(|| {
            AppError::EntityNotFound(format!("レンタル（{}）が見つかりませんでした。", rental_id))
        })?
        .try_into()
    }

    async fn find_all(&self) -> AppResult<Vec<Rental>> {
        let rows: Vec<RentalRow> =
            sqlx::query_as(&format!("{SELECT_RENTAL} ORDER BY r.requested_at DESC"))
                .fetch_all(self.db.inner_ref())
                .await
                .map_err(AppError::SpecificOperationError)?;

        rows.into_iter().map(Rental::try_from).collect()
    }

    async fn find_by_renter_id(&self, user_id: UserId) -> AppResult<Vec<Rental>> {
        let rows: Vec<RentalRow> = sqlx::query_as(&format!(
            "{SELECT_RENTAL} WHERE r.renter_id = $1 ORDER BY r.requested_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        rows.into_iter().map(Rental::try_from).collect()
    }

    async fn count_completed_by_renter(&self, user_id: UserId) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM rentals WHERE renter_id = $1 AND status = 'completed'",
        )
        .bind(user_id)
        .fetch_one(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)
    }

    async fn update_status(&self, event: UpdateStatus) -> AppResult<()> {
        let res = sqlx::query("UPDATE rentals SET status = $1 WHERE rental_id = $2 AND status = $3")
            .bind(event.to.as_ref())
            .bind(event.rental_id)
            .bind(event.from.as_ref())
            .execute(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(self.classify_stale_update(event.rental_id, event.from.as_ref()).await);
        }

        Ok(())
    }

    async fn begin_completion(&self, event: BeginCompletion) -> AppResult<()> {
        let res = sqlx::query(
            r#"
            UPDATE rentals
            SET status = 'pending_completion',
                owner_confirmed_return = TRUE,
                auto_complete_at = $2
            WHERE rental_id = $1 AND status = 'active'
            "#,
        )
        .bind(event.rental_id)
        .bind(event.auto_complete_at)
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(self.classify_stale_update(event.rental_id, "active").await);
        }

        Ok(())
    }

    // 借り手フラグの書き込みと読み直しを同一トランザクションで行う。
    // 完了させるかどうかの判断は必ずこの戻り値で行う（check-after-write）
    async fn set_renter_confirmation(&self, event: ConfirmReturn) -> AppResult<Rental> {
        let mut tx = self.db.begin().await?;

        self.set_transaction_serializable(&mut tx).await?;

        // すでに確認済みの場合はフラグも auto_completed も動かさない
        let res = sqlx::query(
            r#"
            UPDATE rentals
            SET renter_confirmed_return = TRUE,
                auto_completed = CASE
                    WHEN renter_confirmed_return THEN auto_completed
                    ELSE $2
                END
            WHERE rental_id = $1 AND status = 'pending_completion'
            "#,
        )
        .bind(event.rental_id)
        .bind(event.auto_completed)
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            tx.rollback().await.map_err(AppError::TransactionError)?;
            return Err(self
                .classify_stale_update(event.rental_id, "pending_completion")
                .await);
        }

        let row: RentalRow = sqlx::query_as(&format!("{SELECT_RENTAL} WHERE r.rental_id = $1"))
            .bind(event.rental_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

        tx.commit().await.map_err(AppError::TransactionError)?;

        row.try_into()
    }

    // completed_at 未設定のレコードにだけ効く UPDATE。
    // 同時に完了判定へ到達した呼び出しのうち 1 つだけが true を受け取る
    async fn finalize_completion(&self, event: FinalizeCompletion) -> AppResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE rentals
            SET status = 'completed_pending_payout',
                completed_at = $2,
                payout_eligible_at = $3,
                auto_completed = $4,
                payout_frozen = FALSE
            WHERE rental_id = $1
              AND status = 'pending_completion'
              AND completed_at IS NULL
            "#,
        )
        .bind(event.rental_id)
        .bind(event.completed_at)
        .bind(event.payout_eligible_at)
        .bind(event.auto_completed)
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        Ok(res.rows_affected() > 0)
    }

    async fn cancel(&self, rental_id: RentalId) -> AppResult<()> {
        let res = sqlx::query(
            r#"
            UPDATE rentals
            SET status = 'cancelled'
            WHERE rental_id = $1
              AND status IN ('pending', 'approved', 'active',
                             'pending_completion', 'completed_pending_payout')
            "#,
        )
        .bind(rental_id)
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(self.classify_stale_update(rental_id, "非終端状態").await);
        }

        Ok(())
    }

    async fn freeze_payout(&self, rental_id: RentalId) -> AppResult<()> {
        let res = sqlx::query(
            r#"
            UPDATE rentals
            SET payout_frozen = TRUE
            WHERE rental_id = $1 AND status = 'completed_pending_payout'
            "#,
        )
        .bind(rental_id)
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(self
                .classify_stale_update(rental_id, "completed_pending_payout")
                .await);
        }

        Ok(())
    }

    async fn update_payout_status(&self, event: UpdatePayoutStatus) -> AppResult<()> {
        let res = sqlx::query("UPDATE rentals SET payout_status = $1 WHERE rental_id = $2")
            .bind(event.payout_status.as_ref())
            .bind(event.rental_id)
            .execute(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::EntityNotFound(format!(
                "レンタル（{}）が見つかりませんでした。",
                event.rental_id
            )));
        }

        Ok(())
    }

    async fn settle_payout(&self, event: SettlePayout) -> AppResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE rentals
            SET status = 'completed',
                payout_status = 'completed',
                payout_transfer_id = $2
            WHERE rental_id = $1
              AND status = 'completed_pending_payout'
              AND payout_frozen = FALSE
            "#,
        )
        .bind(event.rental_id)
        .bind(event.transfer_id)
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        Ok(res.rows_affected() > 0)
    }

    async fn find_auto_complete_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Rental>> {
        let rows: Vec<RentalRow> = sqlx::query_as(&format!(
            r#"{SELECT_RENTAL}
            WHERE r.status = 'pending_completion'
              AND r.renter_confirmed_return = FALSE
              AND r.auto_complete_at <= $1
            ORDER BY r.auto_complete_at ASC
            "#
        ))
        .bind(now)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        rows.into_iter().map(Rental::try_from).collect()
    }

    async fn find_payout_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Rental>> {
        let rows: Vec<RentalRow> = sqlx::query_as(&format!(
            r#"{SELECT_RENTAL}
            WHERE r.status = 'completed_pending_payout'
              AND r.payout_frozen = FALSE
              AND r.payout_status = 'pending'
              AND r.payout_eligible_at <= $1
            ORDER BY r.payout_eligible_at ASC
            "#
        ))
        .bind(now)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        rows.into_iter().map(Rental::try_from).collect()
    }
}

impl RentalRepositoryImpl {
    // 状態付き UPDATE を使うにあたり、トランザクション分離レベルを
    // SERIALIZABLE にするために内部的に使うメソッド
    async fn set_transaction_serializable(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> AppResult<()> {
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut **tx)
            .await
            .map_err(AppError::SpecificOperationError)?;
        Ok(())
    }

    // 状態付き UPDATE が 0 行だった原因を切り分ける。
    // レコード自体が無ければ NotFound、あれば状態不一致として返す
    async fn classify_stale_update(&self, rental_id: RentalId, expected: &str) -> AppError {
        let current: Result<Option<String>, _> =
            sqlx::query_scalar("SELECT status FROM rentals WHERE rental_id = $1")
                .bind(rental_id)
                .fetch_optional(self.db.inner_ref())
                .await;

        match current {
            Ok(Some(status)) => AppError::InvalidStateTransition(format!(
                "レンタル（{}）の状態は {} のため、{} からの遷移はできません。",
                rental_id, status, expected
            )),
            Ok(None) => AppError::EntityNotFound(format!(
                "レンタル（{}）が見つかりませんでした。",
                rental_id
            )),
            Err(e) => AppError::SpecificOperationError(e),
        }
    }
}
