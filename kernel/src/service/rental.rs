use std::sync::Arc;

use chrono::{DateTime, Utc};
use derive_new::new;
use rust_decimal::Decimal;
use serde_json::json;

use shared::error::{AppError, AppResult};

use crate::clock::Clock;
use crate::gateway::{deposit::DepositService, payment::PaymentGateway, payout::PayoutGateway};
use crate::model::{
    fee::FeeTable,
    id::{ItemId, RentalId, UserId},
    rental::{
        event::{
            BeginCompletion, ConfirmReturn, CreateRental, FinalizeCompletion, SettlePayout,
            UpdatePayoutStatus, UpdateStatus,
        },
        PayoutStatus, Rental, RentalStatus,
    },
};
use crate::notifier::Notifier;
use crate::repository::{item::ItemRepository, rental::RentalRepository};

// 送金適格性チェックの結果。適格前・凍結中の呼び出しはエラーではなくこの値で返す
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutCheckOutcome {
    NotYetEligible,
    Settled,
}

// レンタルのライフサイクル遷移を一手に引き受けるサービス。
// 台帳への書き込みが確定してから通知を送り、通知の失敗は飲み込む
#[derive(new)]
pub struct RentalLifecycleService {
    rental_repository: Arc<dyn RentalRepository>,
    item_repository: Arc<dyn ItemRepository>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    payment_gateway: Arc<dyn PaymentGateway>,
    payout_gateway: Arc<dyn PayoutGateway>,
    deposit_service: Arc<dyn DepositService>,
    fee_table: FeeTable,
}

impl RentalLifecycleService {
    // 借り手がレンタルをリクエストする。pending で作成し、貸し手に通知する
    pub async fn request_rental(
        &self,
        item_id: ItemId,
        rented_by: UserId,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> AppResult<RentalId> {
        if start_date >= end_date {
            return Err(AppError::UnprocessableEntity(
                "開始日時は終了日時より前である必要があります。".into(),
            ));
        }

        let item = self
            .item_repository
            .find_by_id(item_id)
            .await?
            .ok_or_else(|| {
                AppError::EntityNotFound(format!("アイテム（{}）が見つかりませんでした。", item_id))
            })?;

        if !item.is_active {
            return Err(AppError::UnprocessableEntity(format!(
                "アイテム（{}）は現在レンタルを受け付けていません。",
                item_id
            )));
        }
        if item.owner.owner_id == rented_by {
            return Err(AppError::UnprocessableEntity(
                "自分が出品したアイテムはレンタルできません。".into(),
            ));
        }

        // 料金は日数（切り上げ）× 日額。手数料率はこの時点の値で固定する
        let seconds = (end_date - start_date).num_seconds();
        let days = (seconds + 86_399) / 86_400;
        let total_price = item.price_per_day * Decimal::from(days);

        let completed_count = self
            .rental_repository
            .count_completed_by_renter(rented_by)
            .await?;
        let fee_percent = self
            .fee_table
            .fee_percent(total_price, Some(completed_count as u32));

        let now = self.clock.now();
        let rental_id = self
            .rental_repository
            .create(CreateRental::new(
                item_id,
                rented_by,
                now,
                start_date,
                end_date,
                total_price,
                fee_percent,
            ))
            .await?;

        self.dispatch(
            item.owner.owner_id,
            "新しいレンタルリクエスト",
            &format!("{} に新しいレンタルリクエストが届きました。", item.item_name),
            json!({ "rentalId": rental_id.to_string() }),
        )
        .await;

        Ok(rental_id)
    }

    pub async fn approve_rental(
        &self,
        rental_id: RentalId,
        requested_user: UserId,
    ) -> AppResult<()> {
        let rental = self.rental_repository.find_by_id(rental_id).await?;
        self.ensure_owner(&rental, requested_user)?;

        self.rental_repository
            .update_status(UpdateStatus::new(
                rental_id,
                RentalStatus::Pending,
                RentalStatus::Approved,
            ))
            .await?;

        self.dispatch(
            rental.renter.user_id,
            "リクエストが承認されました",
            &format!(
                "{} のレンタルリクエストが承認されました。決済に進んでください。",
                rental.item.item_name
            ),
            json!({ "rentalId": rental_id.to_string() }),
        )
        .await;

        Ok(())
    }

    pub async fn decline_rental(
        &self,
        rental_id: RentalId,
        requested_user: UserId,
    ) -> AppResult<()> {
        let rental = self.rental_repository.find_by_id(rental_id).await?;
        self.ensure_owner(&rental, requested_user)?;

        self.rental_repository
            .update_status(UpdateStatus::new(
                rental_id,
                RentalStatus::Pending,
                RentalStatus::Declined,
            ))
            .await?;

        self.dispatch(
            rental.renter.user_id,
            "リクエストが辞退されました",
            &format!(
                "{} のレンタルリクエストは承認されませんでした。",
                rental.item.item_name
            ),
            json!({ "rentalId": rental_id.to_string() }),
        )
        .await;

        Ok(())
    }

    // 決済 Webhook からの遷移。決済プロバイダへの照会が取れたときだけ active にする
    pub async fn activate_rental(&self, rental_id: RentalId) -> AppResult<()> {
        let rental = self.rental_repository.find_by_id(rental_id).await?;
        if rental.status != RentalStatus::Approved {
            return Err(AppError::InvalidStateTransition(format!(
                "現在の状態（{}）では決済確認を受け付けられません。",
                rental.status
            )));
        }

        let confirmed = self.payment_gateway.charge_confirmed(rental_id).await?;
        if !confirmed {
            return Err(AppError::UnprocessableEntity(
                "決済が確認できませんでした。".into(),
            ));
        }

        self.rental_repository
            .update_status(UpdateStatus::new(
                rental_id,
                RentalStatus::Approved,
                RentalStatus::Active,
            ))
            .await?;

        let body = format!("{} のレンタルが開始されました。", rental.item.item_name);
        let metadata = json!({ "rentalId": rental_id.to_string() });
        self.dispatch(rental.renter.user_id, "レンタル開始", &body, metadata.clone())
            .await;
        self.dispatch(rental.item.owner_id, "レンタル開始", &body, metadata)
            .await;

        Ok(())
    }

    // 貸し手による完了報告。end_date より前はタイムロックで拒否する
    pub async fn mark_complete(&self, rental_id: RentalId, requested_user: UserId) -> AppResult<()> {
        let rental = self.rental_repository.find_by_id(rental_id).await?;
        self.ensure_owner(&rental, requested_user)?;

        if rental.status != RentalStatus::Active {
            return Err(AppError::InvalidStateTransition(format!(
                "現在の状態（{}）では完了報告できません。",
                rental.status
            )));
        }

        let now = self.clock.now();
        if !rental.completion_unlocked(now) {
            return Err(AppError::CompletionTooEarly(format!(
                "終了日時（{}）より前に完了報告はできません。",
                rental.end_date
            )));
        }

        let auto_complete_at = Rental::auto_complete_deadline(rental.end_date);
        self.rental_repository
            .begin_completion(BeginCompletion::new(rental_id, auto_complete_at))
            .await?;

        self.dispatch(
            rental.renter.user_id,
            "返却確認のお願い",
            &format!(
                "{} の返却を確認してください。{} までに確認がない場合は自動的に完了します。",
                rental.item.item_name, auto_complete_at
            ),
            json!({ "rentalId": rental_id.to_string() }),
        )
        .await;

        Ok(())
    }

    // 借り手による返却確認。書き込み後に読み直した状態で完了判定する
    pub async fn confirm_return(
        &self,
        rental_id: RentalId,
        requested_user: UserId,
    ) -> AppResult<()> {
        let rental = self.rental_repository.find_by_id(rental_id).await?;
        if rental.renter.user_id != requested_user {
            return Err(AppError::ForbiddenOperation(
                "返却確認は借り手のみが行えます。".into(),
            ));
        }

        let updated = self
            .rental_repository
            .set_renter_confirmation(ConfirmReturn::new(rental_id, false))
            .await?;

        self.try_finalize(&updated, false).await
    }

    // 自動完了タイマー。auto_complete_at を過ぎても借り手の確認がないものを
    // 借り手に代わって確認し、完了させる
    pub async fn run_auto_complete_pass(&self) -> AppResult<usize> {
        let now = self.clock.now();
        let due = self.rental_repository.find_auto_complete_due(now).await?;

        let mut fired = 0;
        for rental in due {
            // 抽出後に借り手が確認した場合は状態ガードに弾かれるだけで害はない
            match self
                .rental_repository
                .set_renter_confirmation(ConfirmReturn::new(rental.rental_id, true))
                .await
            {
                Ok(updated) => {
                    self.try_finalize(&updated, true).await?;
                    fired += 1;
                }
                Err(AppError::InvalidStateTransition(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(fired)
    }

    // 異議申し立て。送金を凍結するだけで、レンタルの状態は変えない
    pub async fn file_dispute(&self, rental_id: RentalId) -> AppResult<()> {
        self.rental_repository.freeze_payout(rental_id).await
    }

    // 送金適格性チェック。適格前・凍結中は何もせず NotYetEligible を返す（冪等）
    pub async fn check_payout(&self, rental_id: RentalId) -> AppResult<PayoutCheckOutcome> {
        let rental = self.rental_repository.find_by_id(rental_id).await?;

        // キャンセル後などに着弾したチェックは状態不一致を検出して何もしない
        let now = self.clock.now();
        if !rental.payout_ready(now) {
            return Ok(PayoutCheckOutcome::NotYetEligible);
        }
        // 失敗済みの送金は明示的な retry 操作でのみ再試行する
        if rental.payout_status != PayoutStatus::Pending {
            return Ok(PayoutCheckOutcome::NotYetEligible);
        }

        self.release_payout(&rental).await.map(|settled| {
            if settled {
                PayoutCheckOutcome::Settled
            } else {
                PayoutCheckOutcome::NotYetEligible
            }
        })
    }

    // 送金解放タイマー。保留期間を過ぎた未送金レンタルをまとめて処理する
    pub async fn run_payout_pass(&self) -> AppResult<usize> {
        let now = self.clock.now();
        let due = self.rental_repository.find_payout_due(now).await?;

        let mut settled = 0;
        for rental in due {
            match self.release_payout(&rental).await {
                Ok(true) => settled += 1,
                Ok(false) => {}
                Err(e) => {
                    // 1 件の失敗でパス全体は止めない
                    tracing::error!(
                        error.message = %e,
                        rental_id = %rental.rental_id,
                        "送金処理に失敗しました"
                    );
                }
            }
        }

        Ok(settled)
    }

    // 失敗した送金の手動再試行
    pub async fn retry_payout(&self, rental_id: RentalId) -> AppResult<()> {
        let rental = self.rental_repository.find_by_id(rental_id).await?;
        if rental.status != RentalStatus::CompletedPendingPayout {
            return Err(AppError::InvalidStateTransition(format!(
                "現在の状態（{}）では送金を再試行できません。",
                rental.status
            )));
        }
        if rental.payout_status != PayoutStatus::Failed {
            return Err(AppError::UnprocessableEntity(
                "失敗した送金のみ再試行できます。".into(),
            ));
        }
        let now = self.clock.now();
        if !rental.payout_ready(now) {
            return Err(AppError::UnprocessableEntity(
                "送金はまだ解放できません。".into(),
            ));
        }

        self.release_payout(&rental).await.map(|_| ())
    }

    // どちらの当事者でも非終端状態ならキャンセルできる。送金は発生しない
    pub async fn cancel_rental(&self, rental_id: RentalId, requested_user: UserId) -> AppResult<()> {
        let rental = self.rental_repository.find_by_id(rental_id).await?;
        if rental.item.owner_id != requested_user && rental.renter.user_id != requested_user {
            return Err(AppError::ForbiddenOperation(
                "キャンセルはレンタルの当事者のみが行えます。".into(),
            ));
        }

        self.rental_repository.cancel(rental_id).await?;

        // 相手方にだけ知らせる
        let counterparty = if rental.item.owner_id == requested_user {
            rental.renter.user_id
        } else {
            rental.item.owner_id
        };
        self.dispatch(
            counterparty,
            "レンタルがキャンセルされました",
            &format!("{} のレンタルはキャンセルされました。", rental.item.item_name),
            json!({ "rentalId": rental_id.to_string() }),
        )
        .await;

        Ok(())
    }

    // 書き込み後の状態で両者確認がそろっていれば完了を確定する。
    // 同時に走る確認処理のうち、確定の UPDATE が効いた側だけが
    // デポジット解放と通知を行う
    async fn try_finalize(&self, rental: &Rental, auto_completed: bool) -> AppResult<()> {
        if !rental.both_confirmed() || rental.completed_at.is_some() {
            return Ok(());
        }

        let now = self.clock.now();
        let payout_eligible_at = Rental::payout_hold_until(now);
        let won = self
            .rental_repository
            .finalize_completion(FinalizeCompletion::new(
                rental.rental_id,
                now,
                payout_eligible_at,
                auto_completed,
            ))
            .await?;
        if !won {
            return Ok(());
        }

        // デポジット解放は完了をブロックしない
        if let Err(e) = self.deposit_service.release(rental.rental_id).await {
            tracing::warn!(
                error.message = %e,
                rental_id = %rental.rental_id,
                "デポジット解放に失敗しました"
            );
        }

        let (title, body) = if auto_completed {
            (
                "レンタルが自動完了しました",
                format!(
                    "{} は返却確認期限を過ぎたため自動的に完了しました。",
                    rental.item.item_name
                ),
            )
        } else {
            (
                "レンタルが完了しました",
                format!("{} のレンタルが完了しました。", rental.item.item_name),
            )
        };
        let metadata = json!({
            "rentalId": rental.rental_id.to_string(),
            "payoutEligibleAt": payout_eligible_at.to_rfc3339(),
        });
        self.dispatch(rental.renter.user_id, title, &body, metadata.clone())
            .await;
        self.dispatch(rental.item.owner_id, title, &body, metadata)
            .await;

        Ok(())
    }

    // 送金を実行する。失敗しても status は巻き戻さず payout_status だけ failed にする
    async fn release_payout(&self, rental: &Rental) -> AppResult<bool> {
        self.rental_repository
            .update_payout_status(UpdatePayoutStatus::new(
                rental.rental_id,
                PayoutStatus::Processing,
            ))
            .await?;

        match self
            .payout_gateway
            .transfer(rental.rental_id, rental.item.owner_id, rental.payout_amount())
            .await
        {
            Ok(transfer) => {
                let settled = self
                    .rental_repository
                    .settle_payout(SettlePayout::new(rental.rental_id, transfer.transfer_id))
                    .await?;
                if settled {
                    self.dispatch(
                        rental.item.owner_id,
                        "送金が完了しました",
                        &format!(
                            "{} の売上 {} を送金しました。",
                            rental.item.item_name,
                            rental.payout_amount()
                        ),
                        json!({ "rentalId": rental.rental_id.to_string() }),
                    )
                    .await;
                } else {
                    tracing::warn!(
                        rental_id = %rental.rental_id,
                        "送金には成功しましたが、状態遷移が競合したため確定できませんでした"
                    );
                }
                Ok(settled)
            }
            Err(e) => {
                self.rental_repository
                    .update_payout_status(UpdatePayoutStatus::new(
                        rental.rental_id,
                        PayoutStatus::Failed,
                    ))
                    .await?;
                Err(AppError::PayoutFailed(format!("送金に失敗しました: {e}")))
            }
        }
    }

    fn ensure_owner(&self, rental: &Rental, requested_user: UserId) -> AppResult<()> {
        if rental.item.owner_id != requested_user {
            return Err(AppError::ForbiddenOperation(
                "この操作はアイテムの所有者のみが行えます。".into(),
            ));
        }
        Ok(())
    }

    // 通知の失敗は業務遷移を巻き戻さない。ログに残すだけにする
    async fn dispatch(&self, user_id: UserId, title: &str, body: &str, metadata: serde_json::Value) {
        if let Err(e) = self.notifier.notify(user_id, title, body, metadata).await {
            tracing::warn!(
                error.message = %e,
                user_id = %user_id,
                "通知の送信に失敗しました"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use chrono::Duration;

    use super::*;
    use crate::model::item::{event::CreateItem, event::DeactivateItem, Item};
    use crate::model::rental::RentalItem;
    use crate::model::user::{ItemOwner, RentalParty};

    fn owner_id() -> UserId {
        "11111111-1111-1111-1111-111111111111".parse().unwrap()
    }

    fn renter_id() -> UserId {
        "22222222-2222-2222-2222-222222222222".parse().unwrap()
    }

    fn item_id() -> ItemId {
        "33333333-3333-3333-3333-333333333333".parse().unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn sample_rental_item() -> RentalItem {
        RentalItem {
            item_id: item_id(),
            item_name: "キャンプ用テント".into(),
            owner_id: owner_id(),
            owner_name: "Owner Taro".into(),
        }
    }

    fn rental_in(status: RentalStatus, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Rental {
        Rental {
            rental_id: RentalId::new(),
            item: sample_rental_item(),
            renter: RentalParty {
                user_id: renter_id(),
                user_name: "Renter Hanako".into(),
            },
            status,
            start_date,
            end_date,
            total_price: Decimal::from(150),
            fee_percent: Decimal::from(10),
            owner_confirmed_return: false,
            renter_confirmed_return: false,
            auto_completed: false,
            completed_at: None,
            payout_eligible_at: None,
            auto_complete_at: None,
            payout_frozen: false,
            payout_status: PayoutStatus::Pending,
            payout_transfer_id: None,
            requested_at: start_date - Duration::days(1),
        }
    }

    #[derive(Default)]
    struct FakeLedger {
        rentals: Mutex<HashMap<RentalId, Rental>>,
    }

    impl FakeLedger {
        fn insert(&self, rental: Rental) -> RentalId {
            let rental_id = rental.rental_id;
            self.rentals.lock().unwrap().insert(rental_id, rental);
            rental_id
        }

        fn get(&self, rental_id: RentalId) -> Rental {
            self.rentals.lock().unwrap().get(&rental_id).unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl RentalRepository for FakeLedger {
        async fn create(&self, event: CreateRental) -> AppResult<RentalId> {
            let rental = Rental {
                rental_id: RentalId::new(),
                item: sample_rental_item(),
                renter: RentalParty {
                    user_id: event.rented_by,
                    user_name: "Renter Hanako".into(),
                },
                status: RentalStatus::Pending,
                start_date: event.start_date,
                end_date: event.end_date,
                total_price: event.total_price,
                fee_percent: event.fee_percent,
                owner_confirmed_return: false,
                renter_confirmed_return: false,
                auto_completed: false,
                completed_at: None,
                payout_eligible_at: None,
                auto_complete_at: None,
                payout_frozen: false,
                payout_status: PayoutStatus::Pending,
                payout_transfer_id: None,
                requested_at: event.requested_at,
            };
            Ok(self.insert(rental))
        }

        async fn find_by_id(&self, rental_id: RentalId) -> AppResult<Rental> {
            self.rentals
                .lock()
                .unwrap()
                .get(&rental_id)
                .cloned()
                .ok_or_else(|| {
                    AppError::EntityNotFound(format!(
                        "レンタル（{}）が見つかりませんでした。",
                        rental_id
                    ))
                })
        }

        async fn find_all(&self) -> AppResult<Vec<Rental>> {
            Ok(self.rentals.lock().unwrap().values().cloned().collect())
        }

        async fn find_by_renter_id(&self, user_id: UserId) -> AppResult<Vec<Rental>> {
            Ok(self
                .rentals
                .lock()
                .unwrap()
                .values()
                .filter(|r| r.renter.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn count_completed_by_renter(&self, user_id: UserId) -> AppResult<i64> {
            Ok(self
                .rentals
                .lock()
                .unwrap()
                .values()
                .filter(|r| r.renter.user_id == user_id && r.status == RentalStatus::Completed)
                .count() as i64)
        }

        async fn update_status(&self, event: UpdateStatus) -> AppResult<()> {
            let mut rentals = self.rentals.lock().unwrap();
            let rental = rentals.get_mut(&event.rental_id).ok_or_else(|| {
                AppError::EntityNotFound("specified rental not found".into())
            })?;
            if rental.status != event.from {
                return Err(AppError::InvalidStateTransition(format!(
                    "expected {}, got {}",
                    event.from, rental.status
                )));
            }
            rental.status = event.to;
            Ok(())
        }

        async fn begin_completion(&self, event: BeginCompletion) -> AppResult<()> {
            let mut rentals = self.rentals.lock().unwrap();
            let rental = rentals.get_mut(&event.rental_id).ok_or_else(|| {
                AppError::EntityNotFound("specified rental not found".into())
            })?;
            if rental.status != RentalStatus::Active {
                return Err(AppError::InvalidStateTransition(format!(
                    "expected active, got {}",
                    rental.status
                )));
            }
            rental.status = RentalStatus::PendingCompletion;
            rental.owner_confirmed_return = true;
            rental.auto_complete_at = Some(event.auto_complete_at);
            Ok(())
        }

        async fn set_renter_confirmation(&self, event: ConfirmReturn) -> AppResult<Rental> {
            let mut rentals = self.rentals.lock().unwrap();
            let rental = rentals.get_mut(&event.rental_id).ok_or_else(|| {
                AppError::EntityNotFound("specified rental not found".into())
            })?;
            if rental.status != RentalStatus::PendingCompletion {
                return Err(AppError::InvalidStateTransition(format!(
                    "expected pending_completion, got {}",
                    rental.status
                )));
            }
            if !rental.renter_confirmed_return {
                rental.renter_confirmed_return = true;
                rental.auto_completed = event.auto_completed;
            }
            Ok(rental.clone())
        }

        async fn finalize_completion(&self, event: FinalizeCompletion) -> AppResult<bool> {
            let mut rentals = self.rentals.lock().unwrap();
            let rental = rentals.get_mut(&event.rental_id).ok_or_else(|| {
                AppError::EntityNotFound("specified rental not found".into())
            })?;
            if rental.status != RentalStatus::PendingCompletion || rental.completed_at.is_some() {
                return Ok(false);
            }
            rental.status = RentalStatus::CompletedPendingPayout;
            rental.completed_at = Some(event.completed_at);
            rental.payout_eligible_at = Some(event.payout_eligible_at);
            rental.payout_frozen = false;
            rental.auto_completed = event.auto_completed;
            Ok(true)
        }

        async fn cancel(&self, rental_id: RentalId) -> AppResult<()> {
            let mut rentals = self.rentals.lock().unwrap();
            let rental = rentals.get_mut(&rental_id).ok_or_else(|| {
                AppError::EntityNotFound("specified rental not found".into())
            })?;
            if rental.status.is_terminal() {
                return Err(AppError::InvalidStateTransition(format!(
                    "cannot cancel from {}",
                    rental.status
                )));
            }
            rental.status = RentalStatus::Cancelled;
            Ok(())
        }

        async fn freeze_payout(&self, rental_id: RentalId) -> AppResult<()> {
            let mut rentals = self.rentals.lock().unwrap();
            let rental = rentals.get_mut(&rental_id).ok_or_else(|| {
                AppError::EntityNotFound("specified rental not found".into())
            })?;
            if rental.status != RentalStatus::CompletedPendingPayout {
                return Err(AppError::InvalidStateTransition(format!(
                    "expected completed_pending_payout, got {}",
                    rental.status
                )));
            }
            rental.payout_frozen = true;
            Ok(())
        }

        async fn update_payout_status(&self, event: UpdatePayoutStatus) -> AppResult<()> {
            let mut rentals = self.rentals.lock().unwrap();
            let rental = rentals.get_mut(&event.rental_id).ok_or_else(|| {
                AppError::EntityNotFound("specified rental not found".into())
            })?;
            rental.payout_status = event.payout_status;
            Ok(())
        }

        async fn settle_payout(&self, event: SettlePayout) -> AppResult<bool> {
            let mut rentals = self.rentals.lock().unwrap();
            let rental = rentals.get_mut(&event.rental_id).ok_or_else(|| {
                AppError::EntityNotFound("specified rental not found".into())
            })?;
            if rental.status != RentalStatus::CompletedPendingPayout || rental.payout_frozen {
                return Ok(false);
            }
            rental.status = RentalStatus::Completed;
            rental.payout_status = PayoutStatus::Completed;
            rental.payout_transfer_id = Some(event.transfer_id);
            Ok(true)
        }

        async fn find_auto_complete_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Rental>> {
            Ok(self
                .rentals
                .lock()
                .unwrap()
                .values()
                .filter(|r| {
                    r.status == RentalStatus::PendingCompletion
                        && !r.renter_confirmed_return
                        && r.auto_complete_at.map_or(false, |at| at <= now)
                })
                .cloned()
                .collect())
        }

        async fn find_payout_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Rental>> {
            Ok(self
                .rentals
                .lock()
                .unwrap()
                .values()
                .filter(|r| {
                    r.status == RentalStatus::CompletedPendingPayout
                        && !r.payout_frozen
                        && r.payout_status == PayoutStatus::Pending
                        && r.payout_eligible_at.map_or(false, |at| at <= now)
                })
                .cloned()
                .collect())
        }
    }

    struct FakeItemRepository {
        active: AtomicBool,
    }

    impl FakeItemRepository {
        fn new() -> Self {
            Self {
                active: AtomicBool::new(true),
            }
        }

        fn sample_item(&self) -> Item {
            Item {
                item_id: item_id(),
                item_name: "キャンプ用テント".into(),
                description: "4 人用".into(),
                price_per_day: Decimal::from(50),
                deposit_amount: Decimal::from(100),
                address: "東京都".into(),
                is_active: self.active.load(Ordering::SeqCst),
                owner: ItemOwner {
                    owner_id: owner_id(),
                    owner_name: "Owner Taro".into(),
                },
            }
        }
    }

    #[async_trait::async_trait]
    impl ItemRepository for FakeItemRepository {
        async fn create(&self, _event: CreateItem) -> AppResult<ItemId> {
            Ok(ItemId::new())
        }

        async fn find_all(&self) -> AppResult<Vec<Item>> {
            Ok(vec![self.sample_item()])
        }

        async fn find_by_id(&self, item_id: ItemId) -> AppResult<Option<Item>> {
            let item = self.sample_item();
            Ok((item.item_id == item_id).then_some(item))
        }

        async fn deactivate(&self, _event: DeactivateItem) -> AppResult<()> {
            self.active.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(UserId, String, String)>>,
        fail: AtomicBool,
    }

    impl RecordingNotifier {
        fn sent_to(&self, user_id: UserId) -> Vec<(String, String)> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(to, _, _)| *to == user_id)
                .map(|(_, title, body)| (title.clone(), body.clone()))
                .collect()
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(
            &self,
            user_id: UserId,
            title: &str,
            body: &str,
            _metadata: serde_json::Value,
        ) -> AppResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::ExternalServiceError("notifier down".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((user_id, title.into(), body.into()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakePaymentGateway {
        confirmed: AtomicBool,
    }

    #[async_trait::async_trait]
    impl PaymentGateway for FakePaymentGateway {
        async fn charge_confirmed(&self, _rental_id: RentalId) -> AppResult<bool> {
            Ok(self.confirmed.load(Ordering::SeqCst))
        }
    }

    #[derive(Default)]
    struct FakePayoutGateway {
        fail: AtomicBool,
        calls: Mutex<Vec<(RentalId, UserId, Decimal)>>,
    }

    #[async_trait::async_trait]
    impl PayoutGateway for FakePayoutGateway {
        async fn transfer(
            &self,
            rental_id: RentalId,
            owner_id: UserId,
            amount: Decimal,
        ) -> AppResult<crate::gateway::payout::PayoutTransfer> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::ExternalServiceError("transfer rejected".into()));
            }
            self.calls.lock().unwrap().push((rental_id, owner_id, amount));
            Ok(crate::gateway::payout::PayoutTransfer {
                transfer_id: "tr_test_1".into(),
            })
        }
    }

    #[derive(Default)]
    struct FakeDepositService {
        calls: Mutex<Vec<RentalId>>,
        fail: AtomicBool,
    }

    #[async_trait::async_trait]
    impl DepositService for FakeDepositService {
        async fn release(&self, rental_id: RentalId) -> AppResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::ExternalServiceError("deposit api down".into()));
            }
            self.calls.lock().unwrap().push(rental_id);
            Ok(())
        }
    }

    struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        fn set(&self, now: DateTime<Utc>) {
            *self.0.lock().unwrap() = now;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    struct Harness {
        service: RentalLifecycleService,
        ledger: Arc<FakeLedger>,
        items: Arc<FakeItemRepository>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<FixedClock>,
        payment: Arc<FakePaymentGateway>,
        payout: Arc<FakePayoutGateway>,
        deposit: Arc<FakeDepositService>,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(FakeLedger::default());
        let items = Arc::new(FakeItemRepository::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(FixedClock(Mutex::new(at("2025-06-01T00:00:00Z"))));
        let payment = Arc::new(FakePaymentGateway::default());
        let payout = Arc::new(FakePayoutGateway::default());
        let deposit = Arc::new(FakeDepositService::default());
        let service = RentalLifecycleService::new(
            ledger.clone(),
            items.clone(),
            notifier.clone(),
            clock.clone(),
            payment.clone(),
            payout.clone(),
            deposit.clone(),
            FeeTable::default(),
        );
        Harness {
            service,
            ledger,
            items,
            notifier,
            clock,
            payment,
            payout,
            deposit,
        }
    }

    #[tokio::test]
    async fn request_creates_pending_rental_with_frozen_fee() -> anyhow::Result<()> {
        let h = harness();
        // 50/日 × 3 日 = 150 なので中間帯の 10% になる
        let rental_id = h
            .service
            .request_rental(
                item_id(),
                renter_id(),
                at("2025-06-10T00:00:00Z"),
                at("2025-06-13T00:00:00Z"),
            )
            .await?;

        let rental = h.ledger.get(rental_id);
        assert_eq!(rental.status, RentalStatus::Pending);
        assert_eq!(rental.total_price, Decimal::from(150));
        assert_eq!(rental.fee_percent, Decimal::from(10));
        // 貸し手に 1 通
        assert_eq!(h.notifier.sent_to(owner_id()).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn request_applies_loyalty_discount_over_threshold() -> anyhow::Result<()> {
        let h = harness();
        // 完了済み 12 件でしきい値 10 を超えているので 10% - 2% = 8%
        for _ in 0..12 {
            h.ledger.insert(rental_in(
                RentalStatus::Completed,
                at("2025-01-01T00:00:00Z"),
                at("2025-01-02T00:00:00Z"),
            ));
        }

        let rental_id = h
            .service
            .request_rental(
                item_id(),
                renter_id(),
                at("2025-06-10T00:00:00Z"),
                at("2025-06-13T00:00:00Z"),
            )
            .await?;

        let rental = h.ledger.get(rental_id);
        assert_eq!(rental.fee_percent, Decimal::from(8));
        // 手数料 8% の 150 = 12.00
        assert_eq!(
            rental.total_price * rental.fee_percent / Decimal::ONE_HUNDRED,
            Decimal::from(12)
        );
        Ok(())
    }

    #[tokio::test]
    async fn request_rejects_inactive_item() {
        let h = harness();
        h.items.active.store(false, Ordering::SeqCst);
        let res = h
            .service
            .request_rental(
                item_id(),
                renter_id(),
                at("2025-06-10T00:00:00Z"),
                at("2025-06-13T00:00:00Z"),
            )
            .await;
        assert!(matches!(res, Err(AppError::UnprocessableEntity(_))));
    }

    #[tokio::test]
    async fn approve_is_owner_only() -> anyhow::Result<()> {
        let h = harness();
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Pending,
            at("2025-06-10T00:00:00Z"),
            at("2025-06-13T00:00:00Z"),
        ));

        let res = h.service.approve_rental(rental_id, renter_id()).await;
        assert!(matches!(res, Err(AppError::ForbiddenOperation(_))));
        assert_eq!(h.ledger.get(rental_id).status, RentalStatus::Pending);

        h.service.approve_rental(rental_id, owner_id()).await?;
        assert_eq!(h.ledger.get(rental_id).status, RentalStatus::Approved);
        // 借り手に承認通知
        assert_eq!(h.notifier.sent_to(renter_id()).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn decline_moves_to_terminal_declined() -> anyhow::Result<()> {
        let h = harness();
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Pending,
            at("2025-06-10T00:00:00Z"),
            at("2025-06-13T00:00:00Z"),
        ));

        h.service.decline_rental(rental_id, owner_id()).await?;
        assert_eq!(h.ledger.get(rental_id).status, RentalStatus::Declined);

        // 終端なのでキャンセルもできない
        let res = h.service.cancel_rental(rental_id, renter_id()).await;
        assert!(matches!(res, Err(AppError::InvalidStateTransition(_))));
        Ok(())
    }

    #[tokio::test]
    async fn activation_requires_confirmed_charge() -> anyhow::Result<()> {
        let h = harness();
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Approved,
            at("2025-06-10T00:00:00Z"),
            at("2025-06-13T00:00:00Z"),
        ));

        // 決済未確認のうちは active にならない
        let res = h.service.activate_rental(rental_id).await;
        assert!(matches!(res, Err(AppError::UnprocessableEntity(_))));
        assert_eq!(h.ledger.get(rental_id).status, RentalStatus::Approved);

        h.payment.confirmed.store(true, Ordering::SeqCst);
        h.service.activate_rental(rental_id).await?;
        assert_eq!(h.ledger.get(rental_id).status, RentalStatus::Active);
        // 双方に開始通知
        assert_eq!(h.notifier.sent_to(renter_id()).len(), 1);
        assert_eq!(h.notifier.sent_to(owner_id()).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn mark_complete_is_time_locked_until_end_date() -> anyhow::Result<()> {
        let h = harness();
        let end_date = at("2025-06-13T00:00:00Z");
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Active,
            at("2025-06-10T00:00:00Z"),
            end_date,
        ));

        // 1 時間前も 1 秒前も弾く
        h.clock.set(end_date - Duration::hours(1));
        let res = h.service.mark_complete(rental_id, owner_id()).await;
        assert!(matches!(res, Err(AppError::CompletionTooEarly(_))));

        h.clock.set(end_date - Duration::seconds(1));
        let res = h.service.mark_complete(rental_id, owner_id()).await;
        assert!(matches!(res, Err(AppError::CompletionTooEarly(_))));
        assert_eq!(h.ledger.get(rental_id).status, RentalStatus::Active);

        // end_date ちょうどから受け付ける
        h.clock.set(end_date);
        h.service.mark_complete(rental_id, owner_id()).await?;

        let rental = h.ledger.get(rental_id);
        assert_eq!(rental.status, RentalStatus::PendingCompletion);
        assert!(rental.owner_confirmed_return);
        assert_eq!(rental.auto_complete_at, Some(end_date + Duration::hours(72)));
        Ok(())
    }

    #[tokio::test]
    async fn confirm_return_finalizes_when_both_confirmed() -> anyhow::Result<()> {
        let h = harness();
        let end_date = at("2025-06-13T00:00:00Z");
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Active,
            at("2025-06-10T00:00:00Z"),
            end_date,
        ));

        h.clock.set(end_date + Duration::minutes(1));
        h.service.mark_complete(rental_id, owner_id()).await?;

        let confirmed_at = end_date + Duration::hours(5);
        h.clock.set(confirmed_at);
        h.service.confirm_return(rental_id, renter_id()).await?;

        let rental = h.ledger.get(rental_id);
        assert_eq!(rental.status, RentalStatus::CompletedPendingPayout);
        assert!(rental.both_confirmed());
        assert!(!rental.auto_completed);
        assert_eq!(rental.completed_at, Some(confirmed_at));
        assert_eq!(
            rental.payout_eligible_at,
            Some(confirmed_at + Duration::hours(48))
        );
        assert!(!rental.payout_frozen);
        // デポジット解放は 1 回だけ
        assert_eq!(h.deposit.calls.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn confirm_return_rejects_wrong_state_and_wrong_party() {
        let h = harness();
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Active,
            at("2025-06-10T00:00:00Z"),
            at("2025-06-13T00:00:00Z"),
        ));

        let res = h.service.confirm_return(rental_id, owner_id()).await;
        assert!(matches!(res, Err(AppError::ForbiddenOperation(_))));

        let res = h.service.confirm_return(rental_id, renter_id()).await;
        assert!(matches!(res, Err(AppError::InvalidStateTransition(_))));
        assert_eq!(h.ledger.get(rental_id).status, RentalStatus::Active);
    }

    #[tokio::test]
    async fn concurrent_confirmations_finalize_exactly_once() -> anyhow::Result<()> {
        let h = harness();
        let end_date = at("2025-06-13T00:00:00Z");
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Active,
            at("2025-06-10T00:00:00Z"),
            end_date,
        ));
        h.clock.set(end_date + Duration::minutes(1));
        h.service.mark_complete(rental_id, owner_id()).await?;
        let before = h.notifier.count();

        let (a, b) = tokio::join!(
            h.service.confirm_return(rental_id, renter_id()),
            h.service.confirm_return(rental_id, renter_id()),
        );
        // 負けた側は何もしないか、状態ガードに弾かれるかのどちらか
        for res in [a, b] {
            if let Err(e) = res {
                assert!(matches!(e, AppError::InvalidStateTransition(_)));
            }
        }

        let rental = h.ledger.get(rental_id);
        assert_eq!(rental.status, RentalStatus::CompletedPendingPayout);
        assert!(rental.completed_at.is_some());
        // 完了通知は両当事者へ 1 回ずつ、デポジット解放は 1 回だけ
        assert_eq!(h.notifier.count() - before, 2);
        assert_eq!(h.deposit.calls.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn auto_complete_fires_after_grace_period() -> anyhow::Result<()> {
        let h = harness();
        let end_date = at("2025-06-13T00:00:00Z");
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Active,
            at("2025-06-10T00:00:00Z"),
            end_date,
        ));
        h.clock.set(end_date);
        h.service.mark_complete(rental_id, owner_id()).await?;

        // 期限前は何も起きない
        h.clock.set(end_date + Duration::hours(71));
        assert_eq!(h.service.run_auto_complete_pass().await?, 0);
        assert_eq!(
            h.ledger.get(rental_id).status,
            RentalStatus::PendingCompletion
        );

        // end_date + 72h で借り手に代わって確認する
        let fired_at = end_date + Duration::hours(72);
        h.clock.set(fired_at);
        assert_eq!(h.service.run_auto_complete_pass().await?, 1);

        let rental = h.ledger.get(rental_id);
        assert_eq!(rental.status, RentalStatus::CompletedPendingPayout);
        assert!(rental.renter_confirmed_return);
        assert!(rental.auto_completed);
        assert_eq!(rental.completed_at, Some(fired_at));
        let auto_notices = h.notifier.sent_to(renter_id());
        assert!(auto_notices
            .iter()
            .any(|(title, _)| title.contains("自動完了")));
        Ok(())
    }

    #[tokio::test]
    async fn auto_complete_is_noop_when_renter_already_confirmed() -> anyhow::Result<()> {
        let h = harness();
        let end_date = at("2025-06-13T00:00:00Z");
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Active,
            at("2025-06-10T00:00:00Z"),
            end_date,
        ));
        h.clock.set(end_date);
        h.service.mark_complete(rental_id, owner_id()).await?;
        h.clock.set(end_date + Duration::hours(1));
        h.service.confirm_return(rental_id, renter_id()).await?;

        let completed_at = h.ledger.get(rental_id).completed_at;
        let sent = h.notifier.count();

        // タイマーが遅れて発火しても上書き・二重通知はしない
        h.clock.set(end_date + Duration::hours(73));
        assert_eq!(h.service.run_auto_complete_pass().await?, 0);

        let rental = h.ledger.get(rental_id);
        assert_eq!(rental.completed_at, completed_at);
        assert!(!rental.auto_completed);
        assert_eq!(h.notifier.count(), sent);
        Ok(())
    }

    #[tokio::test]
    async fn payout_check_is_idempotent_before_eligibility() -> anyhow::Result<()> {
        let h = harness();
        let end_date = at("2025-06-13T00:00:00Z");
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Active,
            at("2025-06-10T00:00:00Z"),
            end_date,
        ));
        h.clock.set(end_date);
        h.service.mark_complete(rental_id, owner_id()).await?;
        let completed_at = end_date + Duration::hours(1);
        h.clock.set(completed_at);
        h.service.confirm_return(rental_id, renter_id()).await?;

        // 47 時間 59 分後では何度呼んでも適格にならず、payout_status も動かない
        h.clock.set(completed_at + Duration::hours(47) + Duration::minutes(59));
        for _ in 0..3 {
            let outcome = h.service.check_payout(rental_id).await?;
            assert_eq!(outcome, PayoutCheckOutcome::NotYetEligible);
        }
        let rental = h.ledger.get(rental_id);
        assert_eq!(rental.payout_status, PayoutStatus::Pending);
        assert!(h.payout.calls.lock().unwrap().is_empty());

        // ちょうど 48 時間で送金される
        h.clock.set(completed_at + Duration::hours(48));
        let outcome = h.service.check_payout(rental_id).await?;
        assert_eq!(outcome, PayoutCheckOutcome::Settled);

        let rental = h.ledger.get(rental_id);
        assert_eq!(rental.status, RentalStatus::Completed);
        assert_eq!(rental.payout_status, PayoutStatus::Completed);
        assert_eq!(rental.payout_transfer_id.as_deref(), Some("tr_test_1"));

        // 手数料 10% を差し引いた 135 を貸し手へ
        let calls = h.payout.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, owner_id());
        assert_eq!(calls[0].2, Decimal::from(135));
        Ok(())
    }

    #[tokio::test]
    async fn frozen_payout_never_settles() -> anyhow::Result<()> {
        let h = harness();
        let end_date = at("2025-06-13T00:00:00Z");
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Active,
            at("2025-06-10T00:00:00Z"),
            end_date,
        ));
        h.clock.set(end_date);
        h.service.mark_complete(rental_id, owner_id()).await?;
        h.service.confirm_return(rental_id, renter_id()).await?;

        h.service.file_dispute(rental_id).await?;
        assert!(h.ledger.get(rental_id).payout_frozen);
        assert_eq!(
            h.ledger.get(rental_id).status,
            RentalStatus::CompletedPendingPayout
        );

        // どれだけ時間が経っても凍結が勝つ
        h.clock.set(end_date + Duration::days(365));
        assert_eq!(
            h.service.check_payout(rental_id).await?,
            PayoutCheckOutcome::NotYetEligible
        );
        assert_eq!(h.service.run_payout_pass().await?, 0);
        assert!(h.payout.calls.lock().unwrap().is_empty());
        assert_eq!(h.ledger.get(rental_id).payout_status, PayoutStatus::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn dispute_outside_payout_window_is_rejected() {
        let h = harness();
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Pending,
            at("2025-06-10T00:00:00Z"),
            at("2025-06-13T00:00:00Z"),
        ));
        let res = h.service.file_dispute(rental_id).await;
        assert!(matches!(res, Err(AppError::InvalidStateTransition(_))));
    }

    #[tokio::test]
    async fn payout_failure_keeps_status_and_allows_manual_retry() -> anyhow::Result<()> {
        let h = harness();
        let end_date = at("2025-06-13T00:00:00Z");
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Active,
            at("2025-06-10T00:00:00Z"),
            end_date,
        ));
        h.clock.set(end_date);
        h.service.mark_complete(rental_id, owner_id()).await?;
        h.service.confirm_return(rental_id, renter_id()).await?;
        h.clock.set(end_date + Duration::hours(49));

        h.payout.fail.store(true, Ordering::SeqCst);
        let res = h.service.check_payout(rental_id).await;
        assert!(matches!(res, Err(AppError::PayoutFailed(_))));

        // status は巻き戻らず、payout_status だけが failed になる
        let rental = h.ledger.get(rental_id);
        assert_eq!(rental.status, RentalStatus::CompletedPendingPayout);
        assert_eq!(rental.payout_status, PayoutStatus::Failed);

        // 定期パスは failed を拾わない
        assert_eq!(h.service.run_payout_pass().await?, 0);

        // 手動 retry で回復する
        h.payout.fail.store(false, Ordering::SeqCst);
        h.service.retry_payout(rental_id).await?;
        let rental = h.ledger.get(rental_id);
        assert_eq!(rental.status, RentalStatus::Completed);
        assert_eq!(rental.payout_status, PayoutStatus::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn payout_pass_settles_due_rentals() -> anyhow::Result<()> {
        let h = harness();
        let end_date = at("2025-06-13T00:00:00Z");
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Active,
            at("2025-06-10T00:00:00Z"),
            end_date,
        ));
        h.clock.set(end_date);
        h.service.mark_complete(rental_id, owner_id()).await?;
        h.service.confirm_return(rental_id, renter_id()).await?;

        h.clock.set(end_date + Duration::hours(47));
        assert_eq!(h.service.run_payout_pass().await?, 0);

        h.clock.set(end_date + Duration::hours(48));
        assert_eq!(h.service.run_payout_pass().await?, 1);
        assert_eq!(h.ledger.get(rental_id).status, RentalStatus::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn cancel_is_terminal_and_blocks_late_payout_checks() -> anyhow::Result<()> {
        let h = harness();
        let end_date = at("2025-06-13T00:00:00Z");
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Active,
            at("2025-06-10T00:00:00Z"),
            end_date,
        ));
        h.clock.set(end_date);
        h.service.mark_complete(rental_id, owner_id()).await?;
        h.service.confirm_return(rental_id, renter_id()).await?;

        // completed_pending_payout は非終端なのでキャンセルできる
        h.service.cancel_rental(rental_id, renter_id()).await?;
        assert_eq!(h.ledger.get(rental_id).status, RentalStatus::Cancelled);

        // 2 回目のキャンセルは弾かれる
        let res = h.service.cancel_rental(rental_id, renter_id()).await;
        assert!(matches!(res, Err(AppError::InvalidStateTransition(_))));

        // 遅れて着弾した送金チェックは状態不一致を検出して何もしない
        h.clock.set(end_date + Duration::days(10));
        assert_eq!(
            h.service.check_payout(rental_id).await?,
            PayoutCheckOutcome::NotYetEligible
        );
        assert!(h.payout.calls.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn cancel_requires_a_party_to_the_rental() {
        let h = harness();
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Pending,
            at("2025-06-10T00:00:00Z"),
            at("2025-06-13T00:00:00Z"),
        ));
        let stranger: UserId = "99999999-9999-9999-9999-999999999999".parse().unwrap();
        let res = h.service.cancel_rental(rental_id, stranger).await;
        assert!(matches!(res, Err(AppError::ForbiddenOperation(_))));
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_the_transition() -> anyhow::Result<()> {
        let h = harness();
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Pending,
            at("2025-06-10T00:00:00Z"),
            at("2025-06-13T00:00:00Z"),
        ));
        h.notifier.fail.store(true, Ordering::SeqCst);

        // 通知が全滅しても承認は成立する
        h.service.approve_rental(rental_id, owner_id()).await?;
        assert_eq!(h.ledger.get(rental_id).status, RentalStatus::Approved);
        Ok(())
    }

    #[tokio::test]
    async fn deposit_failure_does_not_block_completion() -> anyhow::Result<()> {
        let h = harness();
        let end_date = at("2025-06-13T00:00:00Z");
        let rental_id = h.ledger.insert(rental_in(
            RentalStatus::Active,
            at("2025-06-10T00:00:00Z"),
            end_date,
        ));
        h.clock.set(end_date);
        h.service.mark_complete(rental_id, owner_id()).await?;

        h.deposit.fail.store(true, Ordering::SeqCst);
        h.service.confirm_return(rental_id, renter_id()).await?;
        assert_eq!(
            h.ledger.get(rental_id).status,
            RentalStatus::CompletedPendingPayout
        );
        Ok(())
    }
}
