use async_trait::async_trait;
use derive_new::new;

use kernel::model::{
    id::ItemId,
    item::{
        event::{CreateItem, DeactivateItem},
        Item,
    },
};
use kernel::repository::item::ItemRepository;
use shared::error::{AppError, AppResult};

use crate::database::{model::item::ItemRow, ConnectionPool};

const SELECT_ITEM: &str = r#"
    SELECT
        i.item_id,
        i.item_name,
        i.description,
        i.price_per_day,
        i.deposit_amount,
        i.address,
        i.is_active,
        i.owned_by,
        o.user_name AS owner_name
    FROM items AS i
    INNER JOIN users AS o ON i.owned_by = o.user_id
"#;

#[derive(new)]
pub struct ItemRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl ItemRepository for ItemRepositoryImpl {
    async fn create(&self, event: CreateItem) -> AppResult<ItemId> {
        let item_id = ItemId::new();
        let res = sqlx::query(
            r#"
            INSERT INTO items
            (item_id, item_name, description, price_per_day,
             deposit_amount, address, is_active, owned_by)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7)
            "#,
        )
        .bind(item_id)
        .bind(event.item_name)
        .bind(event.description)
        .bind(event.price_per_day)
        .bind(event.deposit_amount)
        .bind(event.address)
        .bind(event.owned_by)
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No item record has been created".into(),
            ));
        }

        Ok(item_id)
    }

    async fn find_all(&self) -> AppResult<Vec<Item>> {
        let rows: Vec<ItemRow> =
            sqlx::query_as(&format!("{SELECT_ITEM} ORDER BY i.created_at DESC"))
                .fetch_all(self.db.inner_ref())
                .await
                .map_err(AppError::SpecificOperationError)?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn find_by_id(&self, item_id: ItemId) -> AppResult<Option<Item>> {
        let row: Option<ItemRow> = sqlx::query_as(&format!("{SELECT_ITEM} WHERE i.item_id = $1"))
            .bind(item_id)
            .fetch_optional(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?;

        Ok(row.map(Item::from))
    }

    // 新規受付を止めるだけで、進行中のレンタルには触らない
    async fn deactivate(&self, event: DeactivateItem) -> AppResult<()> {
        let res = sqlx::query(
            "UPDATE items SET is_active = FALSE WHERE item_id = $1 AND owned_by = $2",
        )
        .bind(event.item_id)
        .bind(event.requested_user)
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::EntityNotFound(format!(
                "アイテム（{}）が見つからないか、所有者が一致しません。",
                event.item_id
            )));
        }

        Ok(())
    }
}
